//! Withdrawal request model and status

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status of a withdrawal request: `Pending -> {Approved, Rejected}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(Error::Database(format!(
                "unknown withdrawal status: {other}"
            ))),
        }
    }
}

/// A point-to-currency conversion request
///
/// Points are debited before the request is persisted; rejection credits
/// them back. Approved and rejected are terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub request_id: i64,
    pub account_id: i64,
    /// Destination payout handle (mobile-money number)
    pub payout_handle: String,
    /// Points debited from the account
    pub points: i64,
    /// Currency amount computed at request time
    pub amount_currency: f64,
    pub status: WithdrawalStatus,
    /// Unix seconds at creation
    pub created_at: i64,
}

/// Pending request projection for admin display, joined with the
/// requester's display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWithdrawal {
    pub request_id: i64,
    pub account_id: i64,
    pub display_name: String,
    pub payout_handle: String,
    pub points: i64,
    pub amount_currency: f64,
    pub created_at: i64,
}

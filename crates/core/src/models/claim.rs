//! Point claim model and status state machine

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status of a point claim
///
/// `AwaitingProof -> AwaitingNote -> AwaitingAdminReview -> {Approved, Rejected}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    AwaitingProof,
    AwaitingNote,
    AwaitingAdminReview,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::AwaitingProof => "awaiting_proof",
            ClaimStatus::AwaitingNote => "awaiting_note",
            ClaimStatus::AwaitingAdminReview => "awaiting_admin_review",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }

    /// Whether the claim has reached admin review and is retained for audit
    pub fn is_submitted(&self) -> bool {
        !matches!(self, ClaimStatus::AwaitingProof | ClaimStatus::AwaitingNote)
    }
}

impl FromStr for ClaimStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_proof" => Ok(ClaimStatus::AwaitingProof),
            "awaiting_note" => Ok(ClaimStatus::AwaitingNote),
            "awaiting_admin_review" => Ok(ClaimStatus::AwaitingAdminReview),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            other => Err(Error::Database(format!("unknown claim status: {other}"))),
        }
    }
}

/// A user's assertion of having completed a watch, pending evidence and
/// admin approval
///
/// The reward is frozen at claim creation; catalog edits never change an
/// in-flight claim's payout. Identity and content are immutable once the
/// claim reaches admin review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub account_id: i64,
    pub video_id: i64,
    /// Reward frozen at creation time
    pub points: i64,
    pub status: ClaimStatus,
    /// Platform reference to the submitted screenshot
    pub proof_ref: Option<String>,
    /// Free-text verification note from the user
    pub note: Option<String>,
    /// Unix seconds at creation
    pub created_at: i64,
}

impl Claim {
    /// Derive the unique claim id from its owning account, video, and
    /// creation time
    pub fn derive_id(account_id: i64, video_id: i64, created_at: i64) -> String {
        format!("claim_{account_id}_{video_id}_{created_at}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ClaimStatus::AwaitingProof,
            ClaimStatus::AwaitingNote,
            ClaimStatus::AwaitingAdminReview,
            ClaimStatus::Approved,
            ClaimStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_submitted_statuses() {
        assert!(!ClaimStatus::AwaitingProof.is_submitted());
        assert!(!ClaimStatus::AwaitingNote.is_submitted());
        assert!(ClaimStatus::AwaitingAdminReview.is_submitted());
        assert!(ClaimStatus::Approved.is_submitted());
        assert!(ClaimStatus::Rejected.is_submitted());
    }
}

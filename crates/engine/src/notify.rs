//! Best-effort notification channel
//!
//! The chat integration consumes the receiver and renders messages; the
//! engine only emits events. Delivery is never allowed to affect ledger
//! state: a full or closed channel drops the event with a warning.

use tokio::sync::mpsc;
use tracing::warn;

/// An event the chat layer should relay to the admin or a user
#[derive(Debug, Clone)]
pub enum Notification {
    /// A claim reached admin review (to admin)
    ClaimSubmitted {
        claim_id: String,
        account_id: i64,
        video_id: i64,
        points: i64,
    },
    /// A claim was approved and credited (to the user)
    ClaimApproved {
        claim_id: String,
        account_id: i64,
        video_id: i64,
        points: i64,
    },
    /// A claim was rejected (to the user)
    ClaimRejected {
        claim_id: String,
        account_id: i64,
        video_id: i64,
        reason: String,
    },
    /// A referral commission was credited (to the referrer)
    CommissionPaid {
        referrer_id: i64,
        referred_id: i64,
        points: i64,
    },
    /// A withdrawal request was filed (to admin)
    WithdrawalRequested {
        request_id: i64,
        account_id: i64,
        payout_handle: String,
        points: i64,
        amount_currency: f64,
    },
    /// A withdrawal was approved; payout happens outside the system (to the user)
    WithdrawalApproved {
        request_id: i64,
        account_id: i64,
        points: i64,
        amount_currency: f64,
    },
    /// A withdrawal was rejected and the points restored (to the user)
    WithdrawalRejected {
        request_id: i64,
        account_id: i64,
        points: i64,
        reason: String,
    },
}

/// Handle for emitting notifications
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notification>>,
}

impl Notifier {
    /// Create a notifier with a bounded channel; the receiver goes to the
    /// chat integration
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that drops everything (tests, headless runs)
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub(crate) fn send(&self, notification: Notification) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(notification) {
                warn!("Dropping notification: {e}");
            }
        }
    }
}

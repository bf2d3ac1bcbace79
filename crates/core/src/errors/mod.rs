//! Error types and Result alias for the WatchRewards bot

use thiserror::Error;

/// Main error type for the WatchRewards bot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Video not found: {0}")]
    VideoNotFound(i64),

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Withdrawal request not found: {0}")]
    RequestNotFound(i64),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Already watching a video")]
    AlreadyWatching,

    #[error("No active watch session to cancel")]
    NothingToCancel,

    #[error("Video on cooldown: {seconds_remaining}s remaining")]
    Ineligible { seconds_remaining: i64 },

    #[error("No active session for this video")]
    SessionMismatch,

    #[error("Watch incomplete: {seconds_short}s short of required duration")]
    WatchIncomplete { seconds_short: i64 },

    #[error("Invalid claim state: expected {expected}, found {actual}")]
    InvalidClaimState {
        expected: &'static str,
        actual: String,
    },

    #[error("Claim already approved")]
    AlreadyApproved,

    #[error("Withdrawal request already decided")]
    AlreadyDecided,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Could not generate a unique referral code")]
    CodeGenerationFailed,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transient store error (retryable): {0}")]
    TransientStore(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller may safely retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientStore(_))
    }
}

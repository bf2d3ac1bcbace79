//! Account and watch-session models

use serde::{Deserialize, Serialize};

/// A user account in the rewards ledger
///
/// Created on first contact, never deleted. The point balance is owned
/// exclusively by the account store; everything else mutates through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Platform-supplied opaque unique id
    pub account_id: i64,
    pub display_name: String,
    /// Point balance, never negative
    pub points: i64,
    /// Unique referral code; generated lazily if creation raced a duplicate
    pub referral_code: Option<String>,
    /// Referring account, set at most once and never overwritten
    pub referred_by: Option<i64>,
    pub channel_member: bool,
    /// Active watch session, at most one per account
    pub session: Option<WatchSession>,
}

impl Account {
    /// Whether the account currently has an active watch session
    pub fn is_watching(&self) -> bool {
        self.session.is_some()
    }
}

/// Ephemeral per-account watch state: which video, since when
///
/// Both fields exist together or not at all; partially-null rows from the
/// store are treated as no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSession {
    pub video_id: i64,
    /// Unix seconds at watch start
    pub started_at: i64,
}

impl WatchSession {
    /// Seconds elapsed since the session started (never negative)
    pub fn elapsed(&self, now: i64) -> i64 {
        (now - self.started_at).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_never_negative() {
        let session = WatchSession {
            video_id: 1,
            started_at: 100,
        };
        assert_eq!(session.elapsed(130), 30);
        assert_eq!(session.elapsed(90), 0);
    }
}

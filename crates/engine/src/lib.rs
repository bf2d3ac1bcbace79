//! WatchRewards Engine - Rewards ledger workflows
//!
//! The watch-session state machine, claim workflow, withdrawal workflow and
//! referral commission engine, layered over the persistence crate. The chat
//! integration calls in here and consumes the notification channel; it never
//! touches the stores directly.

pub mod accounts;
pub mod catalog;
pub mod claims;
pub mod config;
pub mod notify;
pub mod watch;
pub mod withdrawals;

pub use config::RewardsConfig;
pub use notify::{Notification, Notifier};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use watchrewards_persistence::Database;

/// Time source for cooldowns and session elapsed-time checks
#[derive(Clone)]
pub enum Clock {
    System,
    /// Fixed, manually advanced time (tests)
    Fixed(Arc<AtomicI64>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn fixed(start: i64) -> Self {
        Clock::Fixed(Arc::new(AtomicI64::new(start)))
    }

    /// Current unix time in seconds
    pub fn now(&self) -> i64 {
        match self {
            Clock::System => chrono::Utc::now().timestamp(),
            Clock::Fixed(t) => t.load(Ordering::SeqCst),
        }
    }

    /// Advance a fixed clock; ignored for the system clock
    pub fn advance(&self, secs: i64) {
        if let Clock::Fixed(t) = self {
            t.fetch_add(secs, Ordering::SeqCst);
        }
    }
}

/// Entry point for all ledger operations
pub struct RewardsEngine {
    db: Arc<Database>,
    config: RewardsConfig,
    notifier: Notifier,
    clock: Clock,
}

impl RewardsEngine {
    pub fn new(db: Arc<Database>, config: RewardsConfig, notifier: Notifier) -> Self {
        Self::with_clock(db, config, notifier, Clock::system())
    }

    pub fn with_clock(
        db: Arc<Database>,
        config: RewardsConfig,
        notifier: Notifier,
        clock: Clock,
    ) -> Self {
        Self {
            db,
            config,
            notifier,
            clock,
        }
    }

    pub fn config(&self) -> &RewardsConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    pub(crate) const TEST_EPOCH: i64 = 1_000_000;

    /// Engine over an in-memory store with a fixed clock
    pub(crate) async fn test_engine() -> RewardsEngine {
        // Surface engine logs in failing tests; repeated init is fine
        let _ = tracing_subscriber::fmt()
            .with_env_filter("watchrewards_engine=debug")
            .with_test_writer()
            .try_init();

        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        RewardsEngine::with_clock(
            db,
            RewardsConfig::default(),
            Notifier::disabled(),
            Clock::fixed(TEST_EPOCH),
        )
    }
}

//! WatchRewards Persistence - SQLite ledger storage

pub mod sqlite;

pub use sqlite::Database;

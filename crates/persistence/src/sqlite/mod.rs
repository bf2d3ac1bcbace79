//! SQLite database management

pub mod accounts;
pub mod claims;
mod connection;
pub mod cooldowns;
pub mod videos;
pub mod withdrawals;

pub use accounts::CodeUpdate;
pub use connection::Database;

use watchrewards_core::Error;

/// Map an sqlx error into our error type, classifying lock contention and
/// pool timeouts as retryable
pub(crate) fn db_err(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::PoolTimedOut => Error::TransientStore(e.to_string()),
        sqlx::Error::Database(db) => {
            let msg = db.message();
            if msg.contains("database is locked") || msg.contains("database is busy") {
                Error::TransientStore(e.to_string())
            } else {
                Error::Database(e.to_string())
            }
        }
        _ => Error::Database(e.to_string()),
    }
}

/// Whether the error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
}

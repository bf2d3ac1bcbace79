//! Per-(account, video) watch cooldown tracking
//!
//! A row records the last credited watch, not the last attempt: it is only
//! written when an approved claim credits the reward.

use crate::sqlite::db_err;
use sqlx::SqliteConnection;
use watchrewards_core::Result;

/// Check whether the pair is eligible to watch again
///
/// Returns `(eligible, seconds_remaining)`; the remainder is exact and
/// never negative, and a pair with no history is always eligible.
pub async fn can_watch(
    conn: &mut SqliteConnection,
    account_id: i64,
    video_id: i64,
    now: i64,
    cooldown_secs: i64,
) -> Result<(bool, i64)> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT last_watched_at FROM watch_history WHERE account_id = ? AND video_id = ?",
    )
    .bind(account_id)
    .bind(video_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;

    match row {
        Some((last,)) => {
            let elapsed = now - last;
            if elapsed < cooldown_secs {
                Ok((false, cooldown_secs - elapsed))
            } else {
                Ok((true, 0))
            }
        }
        None => Ok((true, 0)),
    }
}

/// Record a credited watch, refreshing any prior record for the pair
pub async fn record_watch(
    conn: &mut SqliteConnection,
    account_id: i64,
    video_id: i64,
    timestamp: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO watch_history (account_id, video_id, last_watched_at)
        VALUES (?, ?, ?)
        ON CONFLICT (account_id, video_id)
        DO UPDATE SET last_watched_at = excluded.last_watched_at
        "#,
    )
    .bind(account_id)
    .bind(video_id)
    .bind(timestamp)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::{accounts, videos};
    use crate::Database;
    use sqlx::SqliteConnection;

    const WINDOW: i64 = 72_000;

    /// Create the account and video a history row references, returning
    /// the video id
    async fn seed_refs(conn: &mut SqliteConnection) -> i64 {
        accounts::create_if_absent(conn, 1, "alice", Some("AAAA1111"), None)
            .await
            .unwrap();
        videos::insert(conn, "https://youtu.be/a", 30, 20).await.unwrap()
    }

    #[tokio::test]
    async fn test_no_history_is_eligible() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        assert_eq!(
            can_watch(&mut conn, 1, 1, 1_000, WINDOW).await.unwrap(),
            (true, 0)
        );
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let video_id = seed_refs(&mut conn).await;

        record_watch(&mut conn, 1, video_id, 1_000).await.unwrap();

        // Immediately after the credit, the full window remains
        assert_eq!(
            can_watch(&mut conn, 1, video_id, 1_000, WINDOW).await.unwrap(),
            (false, WINDOW)
        );
        // One second short
        assert_eq!(
            can_watch(&mut conn, 1, video_id, 1_000 + WINDOW - 1, WINDOW)
                .await
                .unwrap(),
            (false, 1)
        );
        // Exactly at the window
        assert_eq!(
            can_watch(&mut conn, 1, video_id, 1_000 + WINDOW, WINDOW)
                .await
                .unwrap(),
            (true, 0)
        );
    }

    #[tokio::test]
    async fn test_upsert_refreshes_timestamp() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let video_id = seed_refs(&mut conn).await;

        record_watch(&mut conn, 1, video_id, 1_000).await.unwrap();
        record_watch(&mut conn, 1, video_id, 90_000).await.unwrap();

        let (eligible, remaining) = can_watch(&mut conn, 1, video_id, 100_000, WINDOW)
            .await
            .unwrap();
        assert!(!eligible);
        assert_eq!(remaining, WINDOW - 10_000);
    }
}

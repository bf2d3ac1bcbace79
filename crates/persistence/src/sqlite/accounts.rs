//! Account store operations
//!
//! The sole owner of balance mutation: every credit and debit in the system
//! goes through `credit`/`debit` here, each a single guarded UPDATE so the
//! read-modify-write on one account row is atomic.

use crate::sqlite::{db_err, is_unique_violation};
use sqlx::SqliteConnection;
use watchrewards_core::{Account, Error, Result, WatchSession};

/// Database row for an account
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    account_id: i64,
    display_name: String,
    points: i64,
    referral_code: Option<String>,
    referred_by: Option<i64>,
    channel_member: i64,
    watching_video_id: Option<i64>,
    watch_started_at: Option<i64>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        // A session exists only when both columns are set; a partially-null
        // pair reads as idle
        let session = match (row.watching_video_id, row.watch_started_at) {
            (Some(video_id), Some(started_at)) => Some(WatchSession {
                video_id,
                started_at,
            }),
            _ => None,
        };
        Account {
            account_id: row.account_id,
            display_name: row.display_name,
            points: row.points,
            referral_code: row.referral_code,
            referred_by: row.referred_by,
            channel_member: row.channel_member != 0,
            session,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "account_id, display_name, points, referral_code, \
     referred_by, channel_member, watching_video_id, watch_started_at";

/// Outcome of assigning a referral code to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUpdate {
    /// The code was stored on the account
    Assigned,
    /// The account already has a code; nothing changed
    AlreadyPresent,
    /// Another account holds this code; draw again
    Collision,
}

/// Insert an account if no row with this id exists
///
/// Do-nothing-on-conflict semantics: concurrent creates for the same id
/// resolve to exactly one stored row, and the caller re-reads for canonical
/// state. A `None` code stores the account without one, to be assigned
/// later. Returns whether this call inserted the row.
pub async fn create_if_absent(
    conn: &mut SqliteConnection,
    account_id: i64,
    display_name: &str,
    referral_code: Option<&str>,
    referred_by: Option<i64>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts (account_id, display_name, points, referral_code, referred_by)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT (account_id) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(display_name)
    .bind(referral_code)
    .bind(referred_by)
    .execute(conn)
    .await;

    match result {
        Ok(r) => Ok(r.rows_affected() > 0),
        // Fresh referral code collided with an existing account's code
        Err(e) if is_unique_violation(&e) => Err(Error::CodeGenerationFailed),
        Err(e) => Err(db_err(e)),
    }
}

/// Get an account by id
pub async fn get(conn: &mut SqliteConnection, account_id: i64) -> Result<Option<Account>> {
    let row: Option<AccountRow> = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ?"
    ))
    .bind(account_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;

    Ok(row.map(Account::from))
}

/// Refresh the stored display name
pub async fn set_display_name(
    conn: &mut SqliteConnection,
    account_id: i64,
    display_name: &str,
) -> Result<()> {
    sqlx::query("UPDATE accounts SET display_name = ? WHERE account_id = ?")
        .bind(display_name)
        .bind(account_id)
        .execute(conn)
        .await
        .map_err(db_err)?;

    Ok(())
}

/// Credit points to an account
pub async fn credit(conn: &mut SqliteConnection, account_id: i64, points: i64) -> Result<()> {
    let result = sqlx::query("UPDATE accounts SET points = points + ? WHERE account_id = ?")
        .bind(points)
        .bind(account_id)
        .execute(conn)
        .await
        .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(Error::AccountNotFound(account_id));
    }
    Ok(())
}

/// Debit points from an account, failing without mutation if the balance
/// does not cover it
///
/// The balance guard lives in the UPDATE itself, so two concurrent debits
/// against a balance that only covers one of them cannot both succeed.
pub async fn debit(conn: &mut SqliteConnection, account_id: i64, points: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE accounts SET points = points - ? WHERE account_id = ? AND points >= ?",
    )
    .bind(points)
    .bind(account_id)
    .bind(points)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        // Distinguish a missing account from an uncovered debit
        let available: Option<(i64,)> =
            sqlx::query_as("SELECT points FROM accounts WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(conn)
                .await
                .map_err(db_err)?;

        return match available {
            Some((balance,)) => Err(Error::InsufficientBalance {
                required: points,
                available: balance,
            }),
            None => Err(Error::AccountNotFound(account_id)),
        };
    }
    Ok(())
}

/// Set the channel-membership flag
pub async fn set_membership(
    conn: &mut SqliteConnection,
    account_id: i64,
    is_member: bool,
) -> Result<()> {
    sqlx::query("UPDATE accounts SET channel_member = ? WHERE account_id = ?")
        .bind(is_member as i64)
        .bind(account_id)
        .execute(conn)
        .await
        .map_err(db_err)?;

    Ok(())
}

/// Start a watch session, only if none is active
///
/// The guard lives in the UPDATE so two concurrent starts cannot both
/// succeed. Returns whether the session was stored.
pub async fn begin_session(
    conn: &mut SqliteConnection,
    account_id: i64,
    session: WatchSession,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE accounts SET watching_video_id = ?, watch_started_at = ?
        WHERE account_id = ? AND watching_video_id IS NULL
        "#,
    )
    .bind(session.video_id)
    .bind(session.started_at)
    .bind(account_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// Store the active watch session unconditionally
pub async fn set_session(
    conn: &mut SqliteConnection,
    account_id: i64,
    session: WatchSession,
) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET watching_video_id = ?, watch_started_at = ? WHERE account_id = ?",
    )
    .bind(session.video_id)
    .bind(session.started_at)
    .bind(account_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

/// Clear the active watch session
pub async fn clear_session(conn: &mut SqliteConnection, account_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET watching_video_id = NULL, watch_started_at = NULL WHERE account_id = ?",
    )
    .bind(account_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

/// Assign a referral code to an account that has none
pub async fn set_referral_code_if_missing(
    conn: &mut SqliteConnection,
    account_id: i64,
    code: &str,
) -> Result<CodeUpdate> {
    let result = sqlx::query(
        "UPDATE accounts SET referral_code = ? WHERE account_id = ? AND referral_code IS NULL",
    )
    .bind(code)
    .bind(account_id)
    .execute(conn)
    .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => Ok(CodeUpdate::Assigned),
        Ok(_) => Ok(CodeUpdate::AlreadyPresent),
        Err(e) if is_unique_violation(&e) => Ok(CodeUpdate::Collision),
        Err(e) => Err(db_err(e)),
    }
}

/// Resolve a referral code to the owning account id
pub async fn find_by_referral_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT account_id FROM accounts WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(conn)
            .await
            .map_err(db_err)?;

    Ok(row.map(|r| r.0))
}

/// Link a referrer to an account, only if none is set and never to itself
pub async fn link_referrer_if_unset(
    conn: &mut SqliteConnection,
    account_id: i64,
    referrer_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE accounts SET referred_by = ?
        WHERE account_id = ? AND referred_by IS NULL AND account_id != ?
        "#,
    )
    .bind(referrer_id)
    .bind(account_id)
    .bind(referrer_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// Get the referring account id, if any
pub async fn referrer_of(conn: &mut SqliteConnection, account_id: i64) -> Result<Option<i64>> {
    let row: Option<(Option<i64>,)> =
        sqlx::query_as("SELECT referred_by FROM accounts WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(conn)
            .await
            .map_err(db_err)?;

    match row {
        Some((referred_by,)) => Ok(referred_by),
        None => Err(Error::AccountNotFound(account_id)),
    }
}

/// Count accounts referred by this one
pub async fn count_referrals(conn: &mut SqliteConnection, account_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE referred_by = ?")
        .bind(account_id)
        .fetch_one(conn)
        .await
        .map_err(db_err)?;

    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup() -> Database {
        Database::connect_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        assert!(create_if_absent(&mut conn, 1, "alice", Some("AAAA1111"), None)
            .await
            .unwrap());
        assert!(!create_if_absent(&mut conn, 1, "alice", Some("BBBB2222"), None)
            .await
            .unwrap());

        let account = get(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(account.referral_code.as_deref(), Some("AAAA1111"));
        assert_eq!(account.points, 0);
    }

    #[tokio::test]
    async fn test_debit_never_overdraws() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        create_if_absent(&mut conn, 1, "alice", Some("AAAA1111"), None)
            .await
            .unwrap();
        credit(&mut conn, 1, 30).await.unwrap();

        debit(&mut conn, 1, 20).await.unwrap();
        let err = debit(&mut conn, 1, 20).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance {
                required: 20,
                available: 10
            }
        ));

        let account = get(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(account.points, 10);
    }

    #[tokio::test]
    async fn test_concurrent_debits_admit_only_what_fits() {
        let db = std::sync::Arc::new(setup().await);
        {
            let mut conn = db.acquire().await.unwrap();
            create_if_absent(&mut conn, 1, "alice", Some("AAAA1111"), None)
                .await
                .unwrap();
            credit(&mut conn, 1, 50).await.unwrap();
        }

        // Five concurrent debits of 20 against a balance of 50: exactly two
        // fit, the rest fail with InsufficientBalance
        let mut handles = Vec::new();
        for _ in 0..5 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = db.acquire().await.unwrap();
                debit(&mut conn, 1, 20).await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(Error::InsufficientBalance { .. }) => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 2);
        assert_eq!(insufficient, 3);

        let mut conn = db.acquire().await.unwrap();
        let account = get(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(account.points, 10);
    }

    #[tokio::test]
    async fn test_referrer_set_at_most_once_and_never_self() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        create_if_absent(&mut conn, 1, "alice", Some("AAAA1111"), None)
            .await
            .unwrap();
        create_if_absent(&mut conn, 2, "bob", Some("BBBB2222"), None)
            .await
            .unwrap();
        create_if_absent(&mut conn, 3, "carol", Some("CCCC3333"), None)
            .await
            .unwrap();

        assert!(!link_referrer_if_unset(&mut conn, 1, 1).await.unwrap());
        assert!(link_referrer_if_unset(&mut conn, 1, 2).await.unwrap());
        assert!(!link_referrer_if_unset(&mut conn, 1, 3).await.unwrap());

        assert_eq!(referrer_of(&mut conn, 1).await.unwrap(), Some(2));
        assert_eq!(count_referrals(&mut conn, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_code_assignment_outcomes() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        // Codeless account, as left behind by an exhausted generation run
        create_if_absent(&mut conn, 1, "alice", None, None).await.unwrap();
        create_if_absent(&mut conn, 2, "bob", Some("TAKEN000"), None)
            .await
            .unwrap();

        assert_eq!(
            set_referral_code_if_missing(&mut conn, 1, "TAKEN000")
                .await
                .unwrap(),
            CodeUpdate::Collision
        );
        assert_eq!(
            set_referral_code_if_missing(&mut conn, 1, "FRESH001")
                .await
                .unwrap(),
            CodeUpdate::Assigned
        );
        assert_eq!(
            set_referral_code_if_missing(&mut conn, 1, "FRESH002")
                .await
                .unwrap(),
            CodeUpdate::AlreadyPresent
        );
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        create_if_absent(&mut conn, 1, "alice", Some("AAAA1111"), None)
            .await
            .unwrap();

        let session = WatchSession {
            video_id: 7,
            started_at: 1000,
        };
        set_session(&mut conn, 1, session).await.unwrap();
        let account = get(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(account.session, Some(session));

        clear_session(&mut conn, 1).await.unwrap();
        let account = get(&mut conn, 1).await.unwrap().unwrap();
        assert!(account.session.is_none());
    }
}

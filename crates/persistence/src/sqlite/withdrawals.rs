//! Withdrawal request persistence operations

use crate::sqlite::db_err;
use sqlx::SqliteConnection;
use std::str::FromStr;
use watchrewards_core::{PendingWithdrawal, Result, WithdrawalRequest, WithdrawalStatus};

#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    request_id: i64,
    account_id: i64,
    payout_handle: String,
    points: i64,
    amount_currency: f64,
    status: String,
    created_at: i64,
}

impl WithdrawalRow {
    fn into_request(self) -> Result<WithdrawalRequest> {
        Ok(WithdrawalRequest {
            request_id: self.request_id,
            account_id: self.account_id,
            payout_handle: self.payout_handle,
            points: self.points,
            amount_currency: self.amount_currency,
            status: WithdrawalStatus::from_str(&self.status)?,
            created_at: self.created_at,
        })
    }
}

/// Persist a new pending request, returning its id
///
/// The caller has already debited the points; a failure here obliges it to
/// credit them back.
pub async fn insert(
    conn: &mut SqliteConnection,
    account_id: i64,
    payout_handle: &str,
    points: i64,
    amount_currency: f64,
    created_at: i64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO withdrawal_requests
            (account_id, payout_handle, points, amount_currency, status, created_at)
        VALUES (?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(account_id)
    .bind(payout_handle)
    .bind(points)
    .bind(amount_currency)
    .bind(created_at)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.last_insert_rowid())
}

/// Get a request by id
pub async fn get(
    conn: &mut SqliteConnection,
    request_id: i64,
) -> Result<Option<WithdrawalRequest>> {
    let row: Option<WithdrawalRow> = sqlx::query_as(
        r#"
        SELECT request_id, account_id, payout_handle, points, amount_currency, status, created_at
        FROM withdrawal_requests
        WHERE request_id = ?
        "#,
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;

    row.map(WithdrawalRow::into_request).transpose()
}

/// Apply the admin decision to a pending request
///
/// Returns false when the request was no longer pending, which makes the
/// decision idempotent under retry.
pub async fn mark_decided(
    conn: &mut SqliteConnection,
    request_id: i64,
    decision: WithdrawalStatus,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE withdrawal_requests SET status = ? WHERE request_id = ? AND status = 'pending'",
    )
    .bind(decision.as_str())
    .bind(request_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// List pending requests for admin display, oldest first
pub async fn list_pending(conn: &mut SqliteConnection) -> Result<Vec<PendingWithdrawal>> {
    let rows: Vec<(i64, i64, String, String, i64, f64, i64)> = sqlx::query_as(
        r#"
        SELECT w.request_id, w.account_id, a.display_name, w.payout_handle,
               w.points, w.amount_currency, w.created_at
        FROM withdrawal_requests w
        JOIN accounts a ON w.account_id = a.account_id
        WHERE w.status = 'pending'
        ORDER BY w.created_at ASC
        "#,
    )
    .fetch_all(conn)
    .await
    .map_err(db_err)?;

    Ok(rows
        .into_iter()
        .map(
            |(request_id, account_id, display_name, payout_handle, points, amount, created_at)| {
                PendingWithdrawal {
                    request_id,
                    account_id,
                    display_name,
                    payout_handle,
                    points,
                    amount_currency: amount,
                    created_at,
                }
            },
        )
        .collect())
}

//! Claim persistence operations
//!
//! Claims are keyed by a derived string id and indexed by status so admin
//! review survives process restarts. All forward transitions are guarded
//! UPDATEs on the expected current status.

use crate::sqlite::db_err;
use sqlx::SqliteConnection;
use std::str::FromStr;
use watchrewards_core::{Claim, ClaimStatus, Result};

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    claim_id: String,
    account_id: i64,
    video_id: i64,
    points: i64,
    status: String,
    proof_ref: Option<String>,
    note: Option<String>,
    created_at: i64,
}

impl ClaimRow {
    fn into_claim(self) -> Result<Claim> {
        Ok(Claim {
            claim_id: self.claim_id,
            account_id: self.account_id,
            video_id: self.video_id,
            points: self.points,
            status: ClaimStatus::from_str(&self.status)?,
            proof_ref: self.proof_ref,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

const CLAIM_COLUMNS: &str =
    "claim_id, account_id, video_id, points, status, proof_ref, note, created_at";

/// Insert a freshly created claim
pub async fn insert(conn: &mut SqliteConnection, claim: &Claim) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO claims (claim_id, account_id, video_id, points, status, proof_ref, note, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&claim.claim_id)
    .bind(claim.account_id)
    .bind(claim.video_id)
    .bind(claim.points)
    .bind(claim.status.as_str())
    .bind(&claim.proof_ref)
    .bind(&claim.note)
    .bind(claim.created_at)
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

/// Get a claim by id
pub async fn get(conn: &mut SqliteConnection, claim_id: &str) -> Result<Option<Claim>> {
    let row: Option<ClaimRow> = sqlx::query_as(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?"
    ))
    .bind(claim_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;

    row.map(ClaimRow::into_claim).transpose()
}

/// Attach the proof artifact: `awaiting_proof -> awaiting_note`
///
/// Returns false when the claim was not in `awaiting_proof`.
pub async fn set_proof(
    conn: &mut SqliteConnection,
    claim_id: &str,
    proof_ref: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE claims SET proof_ref = ?, status = ?
        WHERE claim_id = ? AND status = ?
        "#,
    )
    .bind(proof_ref)
    .bind(ClaimStatus::AwaitingNote.as_str())
    .bind(claim_id)
    .bind(ClaimStatus::AwaitingProof.as_str())
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// Freeze the user note: `awaiting_note -> awaiting_admin_review`
///
/// Returns false when the claim was not in `awaiting_note`.
pub async fn set_note(conn: &mut SqliteConnection, claim_id: &str, note: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE claims SET note = ?, status = ?
        WHERE claim_id = ? AND status = ?
        "#,
    )
    .bind(note)
    .bind(ClaimStatus::AwaitingAdminReview.as_str())
    .bind(claim_id)
    .bind(ClaimStatus::AwaitingNote.as_str())
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// Apply the admin decision: `awaiting_admin_review -> {approved, rejected}`
///
/// Returns false when the claim was not awaiting review, which makes the
/// decision idempotent under retry.
pub async fn decide(
    conn: &mut SqliteConnection,
    claim_id: &str,
    decision: ClaimStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE claims SET status = ? WHERE claim_id = ? AND status = ?")
        .bind(decision.as_str())
        .bind(claim_id)
        .bind(ClaimStatus::AwaitingAdminReview.as_str())
        .execute(conn)
        .await
        .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// Delete a claim the owner abandoned before it reached admin review
///
/// Claims at or past review are retained for audit; returns whether a row
/// was deleted.
pub async fn delete_if_unsubmitted(
    conn: &mut SqliteConnection,
    claim_id: &str,
    account_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM claims
        WHERE claim_id = ? AND account_id = ? AND status IN (?, ?)
        "#,
    )
    .bind(claim_id)
    .bind(account_id)
    .bind(ClaimStatus::AwaitingProof.as_str())
    .bind(ClaimStatus::AwaitingNote.as_str())
    .execute(conn)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// List claims in a given status, oldest first
pub async fn list_by_status(
    conn: &mut SqliteConnection,
    status: ClaimStatus,
) -> Result<Vec<Claim>> {
    let rows: Vec<ClaimRow> = sqlx::query_as(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE status = ? ORDER BY created_at ASC"
    ))
    .bind(status.as_str())
    .fetch_all(conn)
    .await
    .map_err(db_err)?;

    rows.into_iter().map(ClaimRow::into_claim).collect()
}

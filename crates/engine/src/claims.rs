//! Claim workflow: evidence submission and admin review
//!
//! `awaiting_proof -> awaiting_note -> awaiting_admin_review ->
//! {approved, rejected}`. Approval credits the frozen reward, starts the
//! cooldown, and pays the referral commission as one atomic unit keyed on
//! the claim id.

use crate::{Notification, RewardsEngine};
use tracing::info;
use watchrewards_core::{Claim, ClaimStatus, Error, Points, Result};
use watchrewards_persistence::sqlite::{accounts, claims, cooldowns};

impl RewardsEngine {
    /// Look up a claim by id
    pub async fn claim(&self, claim_id: &str) -> Result<Claim> {
        let mut conn = self.db.acquire().await?;
        claims::get(&mut conn, claim_id)
            .await?
            .ok_or_else(|| Error::ClaimNotFound(claim_id.to_string()))
    }

    /// Attach the proof screenshot to an open claim
    pub async fn submit_proof(
        &self,
        claim_id: &str,
        account_id: i64,
        proof_ref: &str,
    ) -> Result<()> {
        let mut conn = self.db.acquire().await?;

        let claim = claims::get(&mut conn, claim_id)
            .await?
            .filter(|c| c.account_id == account_id)
            .ok_or_else(|| Error::ClaimNotFound(claim_id.to_string()))?;

        if !claims::set_proof(&mut conn, claim_id, proof_ref).await? {
            return Err(Error::InvalidClaimState {
                expected: ClaimStatus::AwaitingProof.as_str(),
                actual: claim.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Attach the free-text note, sending the claim to admin review
    ///
    /// From here the claim is frozen and permanently retained; the admin is
    /// alerted best-effort.
    pub async fn submit_note(&self, claim_id: &str, account_id: i64, note: &str) -> Result<()> {
        let mut conn = self.db.acquire().await?;

        let claim = claims::get(&mut conn, claim_id)
            .await?
            .filter(|c| c.account_id == account_id)
            .ok_or_else(|| Error::ClaimNotFound(claim_id.to_string()))?;

        if !claims::set_note(&mut conn, claim_id, note).await? {
            return Err(Error::InvalidClaimState {
                expected: ClaimStatus::AwaitingNote.as_str(),
                actual: claim.status.as_str().to_string(),
            });
        }

        info!("Claim {claim_id} submitted for admin review");
        self.notifier.send(Notification::ClaimSubmitted {
            claim_id: claim_id.to_string(),
            account_id: claim.account_id,
            video_id: claim.video_id,
            points: claim.points,
        });
        Ok(())
    }

    /// Abandon a claim before it reaches admin review
    ///
    /// Claims at or past review are kept for audit; cancelling them does
    /// nothing. Returns whether a claim was deleted.
    pub async fn cancel_claim(&self, claim_id: &str, account_id: i64) -> Result<bool> {
        let mut conn = self.db.acquire().await?;
        let deleted = claims::delete_if_unsubmitted(&mut conn, claim_id, account_id).await?;
        if deleted {
            info!("Claim {claim_id} abandoned by account {account_id}");
        }
        Ok(deleted)
    }

    /// Approve a reviewed claim and credit its reward (admin)
    ///
    /// One transaction covers the status flip, the reward credit, the
    /// cooldown record, and the referral commission, so a crash or retry can
    /// never double-credit: approving an already approved claim reports
    /// `AlreadyApproved` without side effects.
    pub async fn approve_claim(&self, claim_id: &str) -> Result<Claim> {
        let now = self.now();
        let mut tx = self.db.begin().await?;

        let mut claim = claims::get(&mut tx, claim_id)
            .await?
            .ok_or_else(|| Error::ClaimNotFound(claim_id.to_string()))?;
        match claim.status {
            ClaimStatus::AwaitingAdminReview => {}
            ClaimStatus::Approved => return Err(Error::AlreadyApproved),
            other => {
                return Err(Error::InvalidClaimState {
                    expected: ClaimStatus::AwaitingAdminReview.as_str(),
                    actual: other.as_str().to_string(),
                })
            }
        }

        if !claims::decide(&mut tx, claim_id, ClaimStatus::Approved).await? {
            return Err(Error::AlreadyApproved);
        }

        accounts::credit(&mut tx, claim.account_id, claim.points).await?;
        cooldowns::record_watch(&mut tx, claim.account_id, claim.video_id, now).await?;

        // Single-level referral commission, credited within the same
        // transaction so it always lands after the triggering credit
        let commission = Points(claim.points).commission(self.config.referral_rate);
        let paid_referrer = match accounts::referrer_of(&mut tx, claim.account_id).await? {
            Some(referrer_id) if commission.as_i64() > 0 => {
                accounts::credit(&mut tx, referrer_id, commission.as_i64()).await?;
                Some(referrer_id)
            }
            _ => None,
        };

        tx.commit().await.map_err(|e| Error::Database(e.to_string()))?;
        claim.status = ClaimStatus::Approved;

        info!(
            "Claim {claim_id} approved: {} points to account {}",
            claim.points, claim.account_id
        );
        self.notifier.send(Notification::ClaimApproved {
            claim_id: claim_id.to_string(),
            account_id: claim.account_id,
            video_id: claim.video_id,
            points: claim.points,
        });
        if let Some(referrer_id) = paid_referrer {
            info!(
                "Commission of {} points to referrer {referrer_id}",
                commission.as_i64()
            );
            self.notifier.send(Notification::CommissionPaid {
                referrer_id,
                referred_id: claim.account_id,
                points: commission.as_i64(),
            });
        }
        Ok(claim)
    }

    /// Reject a reviewed claim (admin); no points were ever granted
    pub async fn reject_claim(&self, claim_id: &str, reason: &str) -> Result<Claim> {
        let mut conn = self.db.acquire().await?;

        let mut claim = claims::get(&mut conn, claim_id)
            .await?
            .ok_or_else(|| Error::ClaimNotFound(claim_id.to_string()))?;
        if claim.status != ClaimStatus::AwaitingAdminReview {
            return Err(Error::InvalidClaimState {
                expected: ClaimStatus::AwaitingAdminReview.as_str(),
                actual: claim.status.as_str().to_string(),
            });
        }

        if !claims::decide(&mut conn, claim_id, ClaimStatus::Rejected).await? {
            return Err(Error::InvalidClaimState {
                expected: ClaimStatus::AwaitingAdminReview.as_str(),
                actual: "decided".to_string(),
            });
        }
        claim.status = ClaimStatus::Rejected;

        info!("Claim {claim_id} rejected: {reason}");
        self.notifier.send(Notification::ClaimRejected {
            claim_id: claim_id.to_string(),
            account_id: claim.account_id,
            video_id: claim.video_id,
            reason: reason.to_string(),
        });
        Ok(claim)
    }

    /// Claims waiting on an admin decision, oldest first
    pub async fn claims_awaiting_review(&self) -> Result<Vec<Claim>> {
        let mut conn = self.db.acquire().await?;
        claims::list_by_status(&mut conn, ClaimStatus::AwaitingAdminReview).await
    }
}

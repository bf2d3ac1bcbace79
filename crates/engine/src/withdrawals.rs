//! Withdrawal workflow: point-to-currency conversion requests
//!
//! `pending -> {approved, rejected}`. Points leave the balance when the
//! request is filed; approval only records the decision (the actual payout
//! is manual), rejection credits the points back.

use crate::{Notification, RewardsEngine};
use tracing::{error, info};
use watchrewards_core::{
    Error, PendingWithdrawal, Points, Result, WithdrawalRequest, WithdrawalStatus,
};
use watchrewards_persistence::sqlite::{accounts, withdrawals};

impl RewardsEngine {
    /// File a withdrawal request, debiting the points up front
    ///
    /// The debit happens first under the account store's balance guard; if
    /// the request itself cannot be persisted, a compensating credit
    /// restores the points before the error surfaces, so points are never
    /// lost without a durable request.
    pub async fn request_withdrawal(
        &self,
        account_id: i64,
        payout_handle: &str,
        points: i64,
    ) -> Result<WithdrawalRequest> {
        if payout_handle.trim().is_empty() {
            return Err(Error::Validation("payout handle must not be empty".into()));
        }
        if points < self.config.min_withdrawal_points {
            return Err(Error::Validation(format!(
                "minimum withdrawal is {} points",
                self.config.min_withdrawal_points
            )));
        }

        let now = self.now();
        let amount = Points(points).to_currency(self.config.points_to_currency_rate);
        let mut conn = self.db.acquire().await?;

        accounts::debit(&mut conn, account_id, points).await?;

        let request_id = match withdrawals::insert(
            &mut conn,
            account_id,
            payout_handle,
            points,
            amount.as_f64(),
            now,
        )
        .await
        {
            Ok(id) => id,
            Err(e) => {
                // Points must not vanish without a durable request
                if let Err(refund_err) = accounts::credit(&mut conn, account_id, points).await {
                    error!(
                        "Failed to refund {points} points to account {account_id} \
                         after request persistence failure: {refund_err}"
                    );
                }
                return Err(e);
            }
        };

        info!(
            "Withdrawal request {request_id}: {points} points from account {account_id} \
             to {payout_handle}"
        );
        self.notifier.send(Notification::WithdrawalRequested {
            request_id,
            account_id,
            payout_handle: payout_handle.to_string(),
            points,
            amount_currency: amount.as_f64(),
        });

        Ok(WithdrawalRequest {
            request_id,
            account_id,
            payout_handle: payout_handle.to_string(),
            points,
            amount_currency: amount.as_f64(),
            status: WithdrawalStatus::Pending,
            created_at: now,
        })
    }

    /// Approve a pending request (admin); the payout itself is manual
    pub async fn approve_withdrawal(&self, request_id: i64) -> Result<WithdrawalRequest> {
        self.decide_withdrawal(request_id, WithdrawalStatus::Approved, None)
            .await
    }

    /// Reject a pending request (admin), crediting the points back
    pub async fn reject_withdrawal(
        &self,
        request_id: i64,
        reason: &str,
    ) -> Result<WithdrawalRequest> {
        self.decide_withdrawal(request_id, WithdrawalStatus::Rejected, Some(reason))
            .await
    }

    async fn decide_withdrawal(
        &self,
        request_id: i64,
        decision: WithdrawalStatus,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let mut tx = self.db.begin().await?;

        let mut request = withdrawals::get(&mut tx, request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(Error::AlreadyDecided);
        }

        if !withdrawals::mark_decided(&mut tx, request_id, decision).await? {
            return Err(Error::AlreadyDecided);
        }

        // Refund rides in the same transaction as the status flip
        if decision == WithdrawalStatus::Rejected {
            accounts::credit(&mut tx, request.account_id, request.points).await?;
        }

        tx.commit().await.map_err(|e| Error::Database(e.to_string()))?;
        request.status = decision;

        match decision {
            WithdrawalStatus::Approved => {
                info!(
                    "Withdrawal {request_id} approved: pay {} to {}",
                    request.amount_currency, request.payout_handle
                );
                self.notifier.send(Notification::WithdrawalApproved {
                    request_id,
                    account_id: request.account_id,
                    points: request.points,
                    amount_currency: request.amount_currency,
                });
            }
            WithdrawalStatus::Rejected => {
                let reason = reason.unwrap_or("rejected by admin").to_string();
                info!(
                    "Withdrawal {request_id} rejected ({reason}); {} points refunded",
                    request.points
                );
                self.notifier.send(Notification::WithdrawalRejected {
                    request_id,
                    account_id: request.account_id,
                    points: request.points,
                    reason,
                });
            }
            WithdrawalStatus::Pending => unreachable!("decisions are terminal"),
        }
        Ok(request)
    }

    /// Pending requests for admin review, oldest first
    pub async fn pending_withdrawals(&self) -> Result<Vec<PendingWithdrawal>> {
        let mut conn = self.db.acquire().await?;
        withdrawals::list_pending(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_engine;
    use watchrewards_persistence::sqlite::accounts as account_store;

    async fn funded_engine(points: i64) -> RewardsEngine {
        let engine = test_engine().await;
        engine.register(1, "alice", None).await.unwrap();
        let mut conn = engine.db.acquire().await.unwrap();
        account_store::credit(&mut conn, 1, points).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_request_debits_and_converts() {
        let engine = funded_engine(100).await;

        let request = engine.request_withdrawal(1, "01711111111", 50).await.unwrap();
        assert_eq!(request.points, 50);
        assert_eq!(request.amount_currency, 5.0);
        assert_eq!(request.status, WithdrawalStatus::Pending);

        assert_eq!(engine.balance(1).await.unwrap(), 50);
        assert_eq!(engine.pending_withdrawals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let engine = funded_engine(100).await;

        assert!(matches!(
            engine.request_withdrawal(1, "", 50).await.unwrap_err(),
            Error::Validation(_)
        ));
        // Below the minimum
        assert!(matches!(
            engine.request_withdrawal(1, "01711111111", 9).await.unwrap_err(),
            Error::Validation(_)
        ));
        // More than the balance
        assert!(matches!(
            engine
                .request_withdrawal(1, "01711111111", 101)
                .await
                .unwrap_err(),
            Error::InsufficientBalance {
                required: 101,
                available: 100
            }
        ));
        // Nothing was debited along the way
        assert_eq!(engine.balance(1).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_reject_restores_exact_balance() {
        let engine = funded_engine(100).await;
        let request = engine.request_withdrawal(1, "01711111111", 60).await.unwrap();
        assert_eq!(engine.balance(1).await.unwrap(), 40);

        engine
            .reject_withdrawal(request.request_id, "invalid number")
            .await
            .unwrap();
        assert_eq!(engine.balance(1).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_approve_keeps_post_debit_balance() {
        let engine = funded_engine(100).await;
        let request = engine.request_withdrawal(1, "01711111111", 60).await.unwrap();

        let approved = engine.approve_withdrawal(request.request_id).await.unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(engine.balance(1).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_decisions_are_idempotent() {
        let engine = funded_engine(100).await;
        let request = engine.request_withdrawal(1, "01711111111", 60).await.unwrap();

        engine
            .reject_withdrawal(request.request_id, "bad handle")
            .await
            .unwrap();
        assert_eq!(engine.balance(1).await.unwrap(), 100);

        // A repeated decision must not refund twice or flip the status
        assert!(matches!(
            engine
                .reject_withdrawal(request.request_id, "again")
                .await
                .unwrap_err(),
            Error::AlreadyDecided
        ));
        assert!(matches!(
            engine
                .approve_withdrawal(request.request_id)
                .await
                .unwrap_err(),
            Error::AlreadyDecided
        ));
        assert_eq!(engine.balance(1).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_decide_missing_request() {
        let engine = funded_engine(100).await;
        assert!(matches!(
            engine.approve_withdrawal(999).await.unwrap_err(),
            Error::RequestNotFound(999)
        ));
    }
}

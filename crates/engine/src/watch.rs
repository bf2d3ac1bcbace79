//! Watch session state machine
//!
//! `Idle -> Watching -> (claim submitted, session cleared)`. At most one
//! active session per account; claiming and watching are mutually
//! exclusive.

use crate::RewardsEngine;
use tracing::info;
use watchrewards_core::{Claim, ClaimStatus, Error, Result, Video, WatchSession};
use watchrewards_persistence::sqlite::{accounts, claims, cooldowns, videos};

impl RewardsEngine {
    /// Start watching a video
    ///
    /// Fails with `AlreadyWatching` when a session is active, with
    /// `VideoNotFound` for an unknown catalog entry, and with `Ineligible`
    /// while the pair is on cooldown. Returns the video so the caller can
    /// show the required duration and reward.
    pub async fn start_watching(&self, account_id: i64, video_id: i64) -> Result<Video> {
        let now = self.now();
        let mut conn = self.db.acquire().await?;

        let account = accounts::get(&mut conn, account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))?;
        if account.is_watching() {
            return Err(Error::AlreadyWatching);
        }

        let video = videos::get(&mut conn, video_id)
            .await?
            .ok_or(Error::VideoNotFound(video_id))?;

        let (eligible, seconds_remaining) =
            cooldowns::can_watch(&mut conn, account_id, video_id, now, self.config.cooldown_secs)
                .await?;
        if !eligible {
            return Err(Error::Ineligible { seconds_remaining });
        }

        let session = WatchSession {
            video_id,
            started_at: now,
        };
        if !accounts::begin_session(&mut conn, account_id, session).await? {
            // Lost the race to another start on the same account
            return Err(Error::AlreadyWatching);
        }

        info!("Account {account_id} started watching video {video_id}");
        Ok(video)
    }

    /// Videos the account may watch right now, cooldowns filtered out
    pub async fn watchable_videos(&self, account_id: i64) -> Result<Vec<Video>> {
        let now = self.now();
        let mut conn = self.db.acquire().await?;

        let all = videos::list(&mut conn).await?;
        let mut available = Vec::with_capacity(all.len());
        for video in all {
            let (eligible, _) = cooldowns::can_watch(
                &mut conn,
                account_id,
                video.video_id,
                now,
                self.config.cooldown_secs,
            )
            .await?;
            if eligible {
                available.push(video);
            }
        }
        Ok(available)
    }

    /// Abandon the active watch session
    pub async fn cancel_watching(&self, account_id: i64) -> Result<()> {
        let mut conn = self.db.acquire().await?;

        let account = accounts::get(&mut conn, account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))?;
        if !account.is_watching() {
            return Err(Error::NothingToCancel);
        }

        accounts::clear_session(&mut conn, account_id).await?;
        info!("Account {account_id} cancelled watching");
        Ok(())
    }

    /// Claim the reward for a completed watch
    ///
    /// `SessionMismatch` guards against stale or replayed claim triggers: the
    /// active session must reference exactly this video. An incomplete watch
    /// leaves the session running; a complete one clears the session and
    /// creates the claim in one transaction, with the reward frozen at the
    /// video's current value.
    pub async fn attempt_claim(&self, account_id: i64, video_id: i64) -> Result<Claim> {
        let now = self.now();
        let mut tx = self.db.begin().await?;

        let account = accounts::get(&mut tx, account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))?;
        let session = match account.session {
            Some(s) if s.video_id == video_id => s,
            _ => return Err(Error::SessionMismatch),
        };

        let video = match videos::get(&mut tx, video_id).await? {
            Some(v) => v,
            None => {
                // Entry vanished mid-watch; drop the dangling session
                accounts::clear_session(&mut tx, account_id).await?;
                tx.commit().await.map_err(|e| Error::Database(e.to_string()))?;
                return Err(Error::VideoNotFound(video_id));
            }
        };

        let elapsed = session.elapsed(now);
        if elapsed < video.duration_secs {
            return Err(Error::WatchIncomplete {
                seconds_short: video.duration_secs - elapsed,
            });
        }

        let claim = Claim {
            claim_id: Claim::derive_id(account_id, video_id, now),
            account_id,
            video_id,
            points: video.points_reward,
            status: ClaimStatus::AwaitingProof,
            proof_ref: None,
            note: None,
            created_at: now,
        };

        accounts::clear_session(&mut tx, account_id).await?;
        claims::insert(&mut tx, &claim).await?;
        tx.commit().await.map_err(|e| Error::Database(e.to_string()))?;

        info!(
            "Account {account_id} completed video {video_id}; claim {} opened for {} points",
            claim.claim_id, claim.points
        );
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_engine;

    async fn setup() -> (crate::RewardsEngine, i64) {
        let engine = test_engine().await;
        engine.register(1, "alice", None).await.unwrap();
        let video = engine.add_video("https://youtu.be/a", 30, 20).await.unwrap();
        (engine, video.video_id)
    }

    #[tokio::test]
    async fn test_single_session_per_account() {
        let (engine, video_id) = setup().await;
        let other = engine.add_video("https://youtu.be/b", 10, 5).await.unwrap();

        engine.start_watching(1, video_id).await.unwrap();
        assert!(matches!(
            engine.start_watching(1, other.video_id).await.unwrap_err(),
            Error::AlreadyWatching
        ));

        engine.cancel_watching(1).await.unwrap();
        engine.start_watching(1, other.video_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_without_session() {
        let (engine, _) = setup().await;
        assert!(matches!(
            engine.cancel_watching(1).await.unwrap_err(),
            Error::NothingToCancel
        ));
    }

    #[tokio::test]
    async fn test_unknown_video() {
        let (engine, _) = setup().await;
        assert!(matches!(
            engine.start_watching(1, 99).await.unwrap_err(),
            Error::VideoNotFound(99)
        ));
    }

    #[tokio::test]
    async fn test_claim_requires_matching_session() {
        let (engine, video_id) = setup().await;

        // No session at all
        assert!(matches!(
            engine.attempt_claim(1, video_id).await.unwrap_err(),
            Error::SessionMismatch
        ));

        // Session for a different video
        let other = engine.add_video("https://youtu.be/b", 10, 5).await.unwrap();
        engine.start_watching(1, other.video_id).await.unwrap();
        assert!(matches!(
            engine.attempt_claim(1, video_id).await.unwrap_err(),
            Error::SessionMismatch
        ));
    }

    #[tokio::test]
    async fn test_incomplete_watch_keeps_session() {
        let (engine, video_id) = setup().await;
        engine.start_watching(1, video_id).await.unwrap();

        engine.clock.advance(29);
        let err = engine.attempt_claim(1, video_id).await.unwrap_err();
        assert!(matches!(err, Error::WatchIncomplete { seconds_short: 1 }));

        // Session still active: one more second and the claim succeeds
        engine.clock.advance(1);
        let claim = engine.attempt_claim(1, video_id).await.unwrap();
        assert_eq!(claim.status, ClaimStatus::AwaitingProof);
        assert_eq!(claim.points, 20);
    }

    #[tokio::test]
    async fn test_claim_clears_session_and_blocks_replay() {
        let (engine, video_id) = setup().await;
        engine.start_watching(1, video_id).await.unwrap();
        engine.clock.advance(30);
        engine.attempt_claim(1, video_id).await.unwrap();

        // The claim button replayed after a successful claim
        assert!(matches!(
            engine.attempt_claim(1, video_id).await.unwrap_err(),
            Error::SessionMismatch
        ));
        let account = engine.account(1).await.unwrap().unwrap();
        assert!(account.session.is_none());
    }

    #[tokio::test]
    async fn test_reward_frozen_at_claim_creation() {
        let (engine, video_id) = setup().await;
        engine.start_watching(1, video_id).await.unwrap();
        engine.clock.advance(30);
        let claim = engine.attempt_claim(1, video_id).await.unwrap();

        engine
            .update_video(video_id, "https://youtu.be/a", 30, 100)
            .await
            .unwrap();

        // The in-flight claim keeps the original reward
        assert_eq!(claim.points, 20);
        let stored = engine.claim(&claim.claim_id).await.unwrap();
        assert_eq!(stored.points, 20);
    }

    #[tokio::test]
    async fn test_watchable_filters_cooldown() {
        let (engine, video_id) = setup().await;
        let other = engine.add_video("https://youtu.be/b", 10, 5).await.unwrap();

        assert_eq!(engine.watchable_videos(1).await.unwrap().len(), 2);

        // Complete a full cycle for the first video
        engine.start_watching(1, video_id).await.unwrap();
        engine.clock.advance(30);
        let claim = engine.attempt_claim(1, video_id).await.unwrap();
        engine.submit_proof(&claim.claim_id, 1, "file_1").await.unwrap();
        engine.submit_note(&claim.claim_id, 1, "done").await.unwrap();
        engine.approve_claim(&claim.claim_id).await.unwrap();

        let available = engine.watchable_videos(1).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].video_id, other.video_id);

        // Eligible again once the window elapses
        engine.clock.advance(engine.config().cooldown_secs);
        assert_eq!(engine.watchable_videos(1).await.unwrap().len(), 2);
    }
}

//! Catalog administration and lookup
//!
//! Admin gating happens in the chat layer; these operations assume the
//! caller was already verified.

use crate::RewardsEngine;
use tracing::info;
use watchrewards_core::{Error, Result, Video};
use watchrewards_persistence::sqlite::videos;

fn validate_entry(link: &str, duration_secs: i64, points_reward: i64) -> Result<()> {
    if link.trim().is_empty() {
        return Err(Error::Validation("video link must not be empty".into()));
    }
    if duration_secs <= 0 {
        return Err(Error::Validation(
            "watch duration must be a positive number of seconds".into(),
        ));
    }
    if points_reward <= 0 {
        return Err(Error::Validation(
            "point reward must be a positive number".into(),
        ));
    }
    Ok(())
}

impl RewardsEngine {
    /// Add a video to the catalog (admin)
    pub async fn add_video(
        &self,
        link: &str,
        duration_secs: i64,
        points_reward: i64,
    ) -> Result<Video> {
        validate_entry(link, duration_secs, points_reward)?;

        let mut conn = self.db.acquire().await?;
        let video_id = videos::insert(&mut conn, link, duration_secs, points_reward).await?;
        info!("Added video {video_id}: {duration_secs}s for {points_reward} points");

        Ok(Video {
            video_id,
            link: link.to_string(),
            duration_secs,
            points_reward,
        })
    }

    /// Update a catalog entry in place (admin)
    ///
    /// Claims already in flight keep the reward frozen at their creation.
    pub async fn update_video(
        &self,
        video_id: i64,
        link: &str,
        duration_secs: i64,
        points_reward: i64,
    ) -> Result<()> {
        validate_entry(link, duration_secs, points_reward)?;

        let mut conn = self.db.acquire().await?;
        videos::update(&mut conn, video_id, link, duration_secs, points_reward).await?;
        info!("Updated video {video_id}: {duration_secs}s for {points_reward} points");
        Ok(())
    }

    /// Full catalog listing
    pub async fn list_videos(&self) -> Result<Vec<Video>> {
        let mut conn = self.db.acquire().await?;
        videos::list(&mut conn).await
    }

    /// Look up a single catalog entry
    pub async fn get_video(&self, video_id: i64) -> Result<Video> {
        let mut conn = self.db.acquire().await?;
        videos::get(&mut conn, video_id)
            .await?
            .ok_or(Error::VideoNotFound(video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_engine;

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let engine = test_engine().await;

        assert!(matches!(
            engine.add_video("", 30, 20).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            engine.add_video("https://youtu.be/a", 0, 20).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            engine.add_video("https://youtu.be/a", 30, -5).await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_add_list_update() {
        let engine = test_engine().await;

        let video = engine.add_video("https://youtu.be/a", 30, 20).await.unwrap();
        engine.add_video("https://youtu.be/b", 60, 40).await.unwrap();

        assert_eq!(engine.list_videos().await.unwrap().len(), 2);

        engine
            .update_video(video.video_id, "https://youtu.be/a", 90, 50)
            .await
            .unwrap();
        let updated = engine.get_video(video.video_id).await.unwrap();
        assert_eq!(updated.duration_secs, 90);
        assert_eq!(updated.points_reward, 50);
    }
}

//! Catalog entry model

use serde::{Deserialize, Serialize};

/// A watchable video with a required duration and point reward
///
/// Entries are created or updated by admins and never deleted, so claim
/// and cooldown history stays resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub video_id: i64,
    /// Source link, unique across the catalog
    pub link: String,
    /// Required watch time in seconds, always > 0
    pub duration_secs: i64,
    /// Points credited for a completed, approved watch, always > 0
    pub points_reward: i64,
}

//! Video catalog operations

use crate::sqlite::{db_err, is_unique_violation};
use sqlx::SqliteConnection;
use watchrewards_core::{Error, Result, Video};

#[derive(Debug, sqlx::FromRow)]
struct VideoRow {
    video_id: i64,
    link: String,
    duration_secs: i64,
    points_reward: i64,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            video_id: row.video_id,
            link: row.link,
            duration_secs: row.duration_secs,
            points_reward: row.points_reward,
        }
    }
}

/// Insert a new catalog entry, returning its id
pub async fn insert(
    conn: &mut SqliteConnection,
    link: &str,
    duration_secs: i64,
    points_reward: i64,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO videos (link, duration_secs, points_reward) VALUES (?, ?, ?)",
    )
    .bind(link)
    .bind(duration_secs)
    .bind(points_reward)
    .execute(conn)
    .await;

    match result {
        Ok(r) => Ok(r.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(Error::Validation(format!(
            "video link already in catalog: {link}"
        ))),
        Err(e) => Err(db_err(e)),
    }
}

/// Update an existing catalog entry
///
/// The new link must not belong to another entry.
pub async fn update(
    conn: &mut SqliteConnection,
    video_id: i64,
    link: &str,
    duration_secs: i64,
    points_reward: i64,
) -> Result<()> {
    let taken: Option<(i64,)> =
        sqlx::query_as("SELECT video_id FROM videos WHERE link = ? AND video_id != ?")
            .bind(link)
            .bind(video_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

    if let Some((other,)) = taken {
        return Err(Error::Validation(format!(
            "video link already used by video {other}"
        )));
    }

    let result = sqlx::query(
        "UPDATE videos SET link = ?, duration_secs = ?, points_reward = ? WHERE video_id = ?",
    )
    .bind(link)
    .bind(duration_secs)
    .bind(points_reward)
    .bind(video_id)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(Error::VideoNotFound(video_id));
    }
    Ok(())
}

/// Get a catalog entry by id
pub async fn get(conn: &mut SqliteConnection, video_id: i64) -> Result<Option<Video>> {
    let row: Option<VideoRow> = sqlx::query_as(
        "SELECT video_id, link, duration_secs, points_reward FROM videos WHERE video_id = ?",
    )
    .bind(video_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;

    Ok(row.map(Video::from))
}

/// List the whole catalog
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Video>> {
    let rows: Vec<VideoRow> = sqlx::query_as(
        "SELECT video_id, link, duration_secs, points_reward FROM videos ORDER BY video_id",
    )
    .fetch_all(conn)
    .await
    .map_err(db_err)?;

    Ok(rows.into_iter().map(Video::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_duplicate_link_rejected() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert(&mut conn, "https://youtu.be/abc", 30, 20).await.unwrap();
        let err = insert(&mut conn, "https://youtu.be/abc", 60, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_guards_link_uniqueness() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let first = insert(&mut conn, "https://youtu.be/abc", 30, 20).await.unwrap();
        let second = insert(&mut conn, "https://youtu.be/def", 60, 10).await.unwrap();

        let err = update(&mut conn, second, "https://youtu.be/abc", 60, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Re-using its own link is fine
        update(&mut conn, first, "https://youtu.be/abc", 45, 25)
            .await
            .unwrap();
        let video = get(&mut conn, first).await.unwrap().unwrap();
        assert_eq!(video.duration_secs, 45);
        assert_eq!(video.points_reward, 25);
    }

    #[tokio::test]
    async fn test_update_missing_video() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let err = update(&mut conn, 99, "https://youtu.be/abc", 30, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(99)));
    }
}

//! Feed queries
//!
//! Relationship → User → Photo join for one session owner, shaped the way the
//! serving API returns it: one entry per followed user (the owner included via
//! the self-loop), each with that user's photos, newest first.

use feedmirror_common::Result;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// One followed user and their photos
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: String,
    pub username: String,
    pub profile_picture: Option<String>,
    pub photos: Vec<FeedPhoto>,
}

/// Photo as served to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPhoto {
    pub id: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "secondaryPhotoURL")]
    pub secondary_photo_url: Option<String>,
    pub caption: Option<String>,
    /// Day bucket, `YYYY-MM-DD`
    pub date: String,
    /// Capture time, unix seconds
    #[serde(rename = "takenAt")]
    pub taken_at: i64,
}

const FEED_SELECT: &str = r#"
    SELECT r.target_user_id AS user_id,
           u.username AS username,
           u.profile_picture AS profile_picture,
           p.id AS photo_id,
           CAST(json_extract(p.details, '$.photoURL') AS TEXT) AS photo_url,
           CAST(json_extract(p.details, '$.secondaryPhotoURL') AS TEXT) AS secondary_photo_url,
           CAST(json_extract(p.details, '$.caption') AS TEXT) AS caption,
           p.date AS date,
           p.taken_at / 1000 AS taken_at_secs
    FROM relationships r
    JOIN users u ON u.id = r.target_user_id
    LEFT JOIN photos p ON p.user_id = r.target_user_id
    WHERE r.user_id = ?
"#;

const FEED_ORDER: &str = "ORDER BY p.taken_at IS NULL, p.taken_at DESC, r.id";

/// Everything `user_id` follows, grouped per followed user
///
/// Entries are ordered by their newest photo; users without photos come last.
pub async fn query_feed(pool: &SqlitePool, user_id: &str) -> Result<Vec<FeedEntry>> {
    let sql = format!("{} {}", FEED_SELECT, FEED_ORDER);
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;

    group_rows(&rows)
}

/// The entry for one followed user, looked up by username
///
/// `None` when `user_id` does not follow anyone called `username`.
pub async fn query_feed_for_user(
    pool: &SqlitePool,
    user_id: &str,
    username: &str,
) -> Result<Option<FeedEntry>> {
    let sql = format!("{} AND u.username = ? {}", FEED_SELECT, FEED_ORDER);
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(username)
        .fetch_all(pool)
        .await?;

    Ok(group_rows(&rows)?.into_iter().next())
}

fn group_rows(rows: &[SqliteRow]) -> Result<Vec<FeedEntry>> {
    let mut entries: Vec<FeedEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let user_id: String = row.try_get("user_id")?;

        let position = match index.get(&user_id) {
            Some(&pos) => pos,
            None => {
                index.insert(user_id.clone(), entries.len());
                entries.push(FeedEntry {
                    id: user_id,
                    username: row.try_get("username")?,
                    profile_picture: row.try_get("profile_picture")?,
                    photos: Vec::new(),
                });
                entries.len() - 1
            }
        };

        let photo_id: Option<String> = row.try_get("photo_id")?;
        if let Some(photo_id) = photo_id {
            entries[position].photos.push(FeedPhoto {
                id: photo_id,
                photo_url: row.try_get("photo_url")?,
                secondary_photo_url: row.try_get("secondary_photo_url")?,
                caption: row.try_get("caption")?,
                date: row.try_get("date")?,
                taken_at: row.try_get("taken_at_secs")?,
            });
        }
    }

    Ok(entries)
}

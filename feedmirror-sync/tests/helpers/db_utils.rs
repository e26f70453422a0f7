//! Database Test Utilities

use chrono::{DateTime, Utc};
use feedmirror_common::db::{UserField, UserRecord};
use feedmirror_sync::db::users;
use feedmirror_sync::services::{NormalizedPost, UserStub};
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary on-disk database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_feedmirror.db");
    let pool = feedmirror_common::db::init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

/// Insert the session owner row, as login does
pub async fn seed_owner(pool: &SqlitePool, id: &str, username: &str) {
    let mut conn = pool.acquire().await.unwrap();
    users::upsert_users(&mut conn, &[UserRecord::new(id, username)], UserField::PROFILE)
        .await
        .unwrap();
}

/// Normalized post owned by `owner_id`/`username`
pub fn feed_post(id: &str, owner_id: &str, username: &str, photo_url: &str, taken_at_secs: i64) -> NormalizedPost {
    let taken_at = DateTime::<Utc>::from_timestamp(taken_at_secs, 0).unwrap();
    NormalizedPost {
        id: id.to_string(),
        owner: UserStub {
            id: owner_id.to_string(),
            username: username.to_string(),
            fullname: None,
            profile_picture_url: None,
        },
        calendar_date: taken_at.date_naive(),
        taken_at,
        details: json!({
            "photoURL": photo_url,
            "secondaryPhotoURL": null,
            "caption": null,
        }),
    }
}

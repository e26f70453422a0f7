//! Photo (post) database operations

use chrono::{DateTime, NaiveDate, Utc};
use feedmirror_common::db::{PhotoField, PhotoRecord};
use feedmirror_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert photos, updating only `fields` on conflict(id)
///
/// `id` and `user_id` are never updated: a post keeps its original owner even
/// if a later payload attributes it elsewhere.
pub async fn upsert_photos(
    conn: &mut SqliteConnection,
    photos: &[PhotoRecord],
    fields: &[PhotoField],
) -> Result<u64> {
    if photos.is_empty() {
        return Ok(0);
    }

    let sql = upsert_sql(fields);
    let mut affected = 0;

    for photo in photos {
        let details = serde_json::to_string(&photo.details)
            .map_err(|e| Error::InvalidInput(format!("photo {} details: {}", photo.id, e)))?;

        let result = sqlx::query(&sql)
            .bind(&photo.id)
            .bind(&photo.user_id)
            .bind(photo.date.format("%Y-%m-%d").to_string())
            .bind(photo.taken_at.timestamp_millis())
            .bind(details)
            .execute(&mut *conn)
            .await?;
        affected += result.rows_affected();
    }

    Ok(affected)
}

fn upsert_sql(fields: &[PhotoField]) -> String {
    let insert = "INSERT INTO photos (id, user_id, date, taken_at, details, created_at, updated_at) \
                  VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP) ON CONFLICT(id) DO";

    if fields.is_empty() {
        return format!("{} NOTHING", insert);
    }

    let assignments: Vec<String> = fields
        .iter()
        .map(|field| format!("{0} = excluded.{0}", field.column()))
        .collect();

    format!(
        "{} UPDATE SET {}, updated_at = CURRENT_TIMESTAMP",
        insert,
        assignments.join(", ")
    )
}

/// Load a photo by id
pub async fn load_photo(pool: &SqlitePool, id: &str) -> Result<Option<PhotoRecord>> {
    let row = sqlx::query("SELECT id, user_id, date, taken_at, details FROM photos WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let date: String = row.get("date");
    let taken_at_ms: i64 = row.get("taken_at");
    let details: Option<String> = row.get("details");

    Ok(Some(PhotoRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| Error::Internal(format!("stored date '{}': {}", date, e)))?,
        taken_at: DateTime::<Utc>::from_timestamp_millis(taken_at_ms)
            .ok_or_else(|| Error::Internal(format!("stored taken_at {} out of range", taken_at_ms)))?,
        details: match details {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Internal(format!("stored details: {}", e)))?,
            None => serde_json::Value::Null,
        },
    }))
}

/// Total number of photo rows
pub async fn count_photos(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

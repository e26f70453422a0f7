//! Relationship (social edge) database operations

use feedmirror_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// Insert edges `(owner_id, target)` for each target, ignoring existing ones
///
/// Returns the number of edges actually created.
pub async fn upsert_edges(conn: &mut SqliteConnection, owner_id: &str, targets: &[String]) -> Result<u64> {
    let mut created = 0;

    for target in targets {
        let result = sqlx::query(
            r#"
            INSERT INTO relationships (user_id, target_user_id, created_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id, target_user_id) DO NOTHING
            "#,
        )
        .bind(owner_id)
        .bind(target)
        .execute(&mut *conn)
        .await?;
        created += result.rows_affected();
    }

    Ok(created)
}

/// Number of edges from `owner_id` to `target_id` (0 or 1)
pub async fn count_edge(pool: &SqlitePool, owner_id: &str, target_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM relationships WHERE user_id = ? AND target_user_id = ?",
    )
    .bind(owner_id)
    .bind(target_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Total number of edge rows
pub async fn count_edges(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

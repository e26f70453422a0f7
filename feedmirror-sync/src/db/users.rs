//! User database operations

use feedmirror_common::db::{UserField, UserRecord};
use feedmirror_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert users, updating only `fields` on conflict(id)
///
/// `username` is always present and overwritten when named. The nullable
/// display fields keep their stored value when the incoming one is `NULL`, so
/// a sighting that lacks a picture never erases a known picture. `id` is never
/// updated.
pub async fn upsert_users(
    conn: &mut SqliteConnection,
    users: &[UserRecord],
    fields: &[UserField],
) -> Result<u64> {
    if users.is_empty() {
        return Ok(0);
    }

    let sql = upsert_sql(fields);
    let writes_username = fields.contains(&UserField::Username);
    let mut affected = 0;

    for user in users {
        if writes_username || !user_exists(&mut *conn, &user.id).await? {
            release_username(&mut *conn, &user.username, &user.id).await?;
        }

        let result = sqlx::query(&sql)
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.fullname)
            .bind(&user.phone)
            .bind(&user.profile_picture)
            .execute(&mut *conn)
            .await?;
        affected += result.rows_affected();
    }

    Ok(affected)
}

/// Placeholder username for a row whose name was taken by another id
///
/// Unique because ids are. The row keeps it until its owner is seen again
/// under a new name.
pub fn released_username(id: &str) -> String {
    format!("released:{}", id)
}

/// Take `username` away from any user other than `id`
///
/// Usernames are unique but mutable upstream: when a name moves to another
/// account before the previous holder's new name has been seen, the stale
/// holder is parked on [`released_username`].
async fn release_username(conn: &mut SqliteConnection, username: &str, id: &str) -> Result<u64> {
    let holder: Option<String> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = ? AND id != ?")
            .bind(username)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(holder) = holder else {
        return Ok(0);
    };

    let result = sqlx::query(
        "UPDATE users SET username = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(released_username(&holder))
    .bind(&holder)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(username, from = %holder, to = id, "Username handed over");

    Ok(result.rows_affected())
}

fn upsert_sql(fields: &[UserField]) -> String {
    let insert = "INSERT INTO users (id, username, fullname, phone, profile_picture, created_at, updated_at) \
                  VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP) ON CONFLICT(id) DO";

    if fields.is_empty() {
        return format!("{} NOTHING", insert);
    }

    let assignments: Vec<String> = fields
        .iter()
        .map(|field| match field {
            UserField::Username => "username = excluded.username".to_string(),
            other => {
                let column = other.column();
                format!("{column} = COALESCE(excluded.{column}, users.{column})")
            }
        })
        .collect();

    format!(
        "{} UPDATE SET {}, updated_at = CURRENT_TIMESTAMP",
        insert,
        assignments.join(", ")
    )
}

/// Load a user by id
pub async fn load_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, fullname, phone, profile_picture
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        fullname: row.get("fullname"),
        phone: row.get("phone"),
        profile_picture: row.get("profile_picture"),
    }))
}

/// True when a user row with `id` exists
pub async fn user_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Total number of user rows
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

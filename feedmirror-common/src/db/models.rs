//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable provider identifier
    pub id: String,
    pub username: String,
    pub fullname: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

impl UserRecord {
    /// Minimal record for a user seen only through a feed or friend list
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            fullname: None,
            phone: None,
            profile_picture: None,
        }
    }
}

/// Columns of `users` that an upsert may overwrite on conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Username,
    Fullname,
    ProfilePicture,
    Phone,
}

impl UserField {
    /// Display fields refreshed by every feed or friend-list sighting
    pub const DISPLAY: &'static [UserField] =
        &[UserField::Username, UserField::Fullname, UserField::ProfilePicture];

    /// Fields owned by the user's own profile fetch
    pub const PROFILE: &'static [UserField] = &[
        UserField::Username,
        UserField::Fullname,
        UserField::ProfilePicture,
        UserField::Phone,
    ];

    pub fn column(self) -> &'static str {
        match self {
            UserField::Username => "username",
            UserField::Fullname => "fullname",
            UserField::ProfilePicture => "profile_picture",
            UserField::Phone => "phone",
        }
    }
}

/// Row of the `relationships` table (directed social edge)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub user_id: String,
    pub target_user_id: String,
}

/// Row of the `photos` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Provider post identifier, unique across all users
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub taken_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Columns of `photos` that an upsert may overwrite on conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoField {
    Details,
    TakenAt,
    CalendarDate,
}

impl PhotoField {
    /// Payload fields refreshed when the provider re-serves a post
    pub const RESYNC: &'static [PhotoField] =
        &[PhotoField::Details, PhotoField::TakenAt, PhotoField::CalendarDate];

    pub fn column(self) -> &'static str {
        match self {
            PhotoField::Details => "details",
            PhotoField::TakenAt => "taken_at",
            PhotoField::CalendarDate => "date",
        }
    }
}

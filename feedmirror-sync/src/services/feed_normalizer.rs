//! Feed Normalizer
//!
//! Turns a raw provider feed into a flat list of posts with owner metadata.
//! The provider has served two shapes for the same feed:
//!
//! - **Legacy**: a flat array of posts, each carrying `ownerID`, `userName`
//!   and a single photo URL pair, with Firestore-style `takenAt`
//!   (`{"_seconds": .., "_nanoseconds": ..}`).
//! - **Grouped**: `{"userPosts": {..}, "friendsPosts": [{"user": {..},
//!   "posts": [..]}]}` with `primary`/`secondary` images and RFC 3339
//!   `takenAt`.
//!
//! [`FeedSchema`] is the only place that knows about these shapes; supporting a
//! new provider format means adding a variant. Normalization is pure: it never
//! touches storage or logs, and reports unusable posts back to the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::SyncError;
use crate::upstream::{FeedPayload, MediaRef};

/// Owner metadata carried by each post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStub {
    pub id: String,
    pub username: String,
    pub fullname: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// One post in storage-ready form
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPost {
    pub id: String,
    pub owner: UserStub,
    /// UTC day of this post's own capture time
    pub calendar_date: NaiveDate,
    pub taken_at: DateTime<Utc>,
    /// Provider post object, plus canonical `photoURL`/`secondaryPhotoURL`/`caption`
    pub details: Value,
}

/// Normalizer output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFeed {
    pub posts: Vec<NormalizedPost>,
    /// Reasons for posts that could not be used
    pub skipped: Vec<String>,
}

/// Recognized provider feed shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedSchema<'a> {
    Empty,
    Legacy(&'a [Value]),
    Grouped {
        own: Option<&'a Value>,
        friends: &'a [Value],
    },
}

impl<'a> FeedSchema<'a> {
    /// Identify which provider format `payload` is in
    pub fn detect(payload: &'a FeedPayload) -> Result<Self, SyncError> {
        match &payload.0 {
            Value::Null => Ok(FeedSchema::Empty),
            Value::Array(items) => Ok(FeedSchema::Legacy(items)),
            Value::Object(map) if map.is_empty() => Ok(FeedSchema::Empty),
            Value::Object(map)
                if map.contains_key("friendsPosts") || map.contains_key("userPosts") =>
            {
                let friends = match map.get("friendsPosts") {
                    None | Some(Value::Null) => &[][..],
                    Some(Value::Array(groups)) => groups.as_slice(),
                    Some(_) => {
                        return Err(SyncError::MalformedPayload(
                            "friendsPosts is not an array".to_string(),
                        ))
                    }
                };
                let own = map.get("userPosts").filter(|v| !v.is_null());
                Ok(FeedSchema::Grouped { own, friends })
            }
            Value::Object(map) => Err(SyncError::MalformedPayload(format!(
                "unrecognized feed object with keys [{}]",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
            other => Err(SyncError::MalformedPayload(format!(
                "unexpected feed root: {}",
                json_kind(other)
            ))),
        }
    }
}

/// Normalize a provider feed payload
///
/// # Errors
/// `MalformedPayload` when the top-level shape is not recognized. Individual
/// unusable posts are reported in [`NormalizedFeed::skipped`] instead.
pub fn normalize(payload: &FeedPayload) -> Result<NormalizedFeed, SyncError> {
    let mut collector = Collector::default();

    match FeedSchema::detect(payload)? {
        FeedSchema::Empty => {}
        FeedSchema::Legacy(items) => {
            for item in items {
                collector.push(normalize_legacy_post(item));
            }
        }
        FeedSchema::Grouped { own, friends } => {
            for group in own.into_iter().chain(friends.iter()) {
                collector.push_group(group);
            }
        }
    }

    Ok(collector.finish())
}

/// Accumulates posts in payload order; a repeated post id keeps its first
/// position but the last occurrence's content.
#[derive(Default)]
struct Collector {
    posts: Vec<NormalizedPost>,
    index: HashMap<String, usize>,
    skipped: Vec<String>,
}

impl Collector {
    fn push(&mut self, result: Result<NormalizedPost, String>) {
        match result {
            Ok(post) => match self.index.get(&post.id) {
                Some(&pos) => self.posts[pos] = post,
                None => {
                    self.index.insert(post.id.clone(), self.posts.len());
                    self.posts.push(post);
                }
            },
            Err(reason) => self.skipped.push(reason),
        }
    }

    fn push_group(&mut self, group: &Value) {
        let group: PostGroup = match serde_json::from_value(group.clone()) {
            Ok(g) => g,
            Err(e) => {
                self.skipped.push(format!("post group: {}", e));
                return;
            }
        };

        let owner = group.user.into_stub();
        for post in &group.posts {
            self.push(normalize_grouped_post(post, &owner));
        }
    }

    fn finish(self) -> NormalizedFeed {
        NormalizedFeed {
            posts: self.posts,
            skipped: self.skipped,
        }
    }
}

// ============================================================================
// Provider shapes
// ============================================================================

/// `takenAt` as the provider has sent it over time
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ProviderTimestamp {
    Firestore {
        #[serde(rename = "_seconds")]
        seconds: i64,
        #[serde(rename = "_nanoseconds", default)]
        nanoseconds: u32,
    },
    Rfc3339(String),
}

impl ProviderTimestamp {
    fn to_utc(&self) -> Result<DateTime<Utc>, String> {
        match self {
            ProviderTimestamp::Firestore {
                seconds,
                nanoseconds,
            } => DateTime::<Utc>::from_timestamp(*seconds, *nanoseconds)
                .ok_or_else(|| format!("timestamp out of range: {}s", seconds)),
            ProviderTimestamp::Rfc3339(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("invalid timestamp '{}': {}", text, e)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyOwner {
    #[serde(default)]
    profile_picture: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPost {
    id: String,
    #[serde(rename = "ownerID")]
    owner_id: String,
    user_name: String,
    #[serde(default)]
    user: Option<LegacyOwner>,
    #[serde(rename = "photoURL", default)]
    photo_url: Option<String>,
    #[serde(rename = "secondaryPhotoURL", default)]
    secondary_photo_url: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    taken_at: ProviderTimestamp,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupUser {
    id: String,
    username: String,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    profile_picture: Option<MediaRef>,
}

impl GroupUser {
    fn into_stub(self) -> UserStub {
        UserStub {
            id: self.id,
            username: self.username,
            fullname: self.fullname,
            profile_picture_url: self.profile_picture.and_then(|p| p.url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostGroup {
    user: GroupUser,
    #[serde(default)]
    posts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupedPost {
    id: String,
    #[serde(default)]
    primary: Option<MediaRef>,
    #[serde(default)]
    secondary: Option<MediaRef>,
    #[serde(default)]
    caption: Option<String>,
    taken_at: ProviderTimestamp,
}

fn normalize_legacy_post(raw: &Value) -> Result<NormalizedPost, String> {
    let post: LegacyPost =
        serde_json::from_value(raw.clone()).map_err(|e| format!("legacy post: {}", e))?;
    let taken_at = post.taken_at.to_utc()?;

    let owner = UserStub {
        id: post.owner_id,
        username: post.user_name,
        fullname: None,
        profile_picture_url: post.user.and_then(|u| u.profile_picture).and_then(|p| p.url),
    };

    Ok(NormalizedPost {
        details: canonical_details(raw, post.photo_url, post.secondary_photo_url, post.caption),
        id: post.id,
        owner,
        calendar_date: taken_at.date_naive(),
        taken_at,
    })
}

fn normalize_grouped_post(raw: &Value, owner: &UserStub) -> Result<NormalizedPost, String> {
    let post: GroupedPost =
        serde_json::from_value(raw.clone()).map_err(|e| format!("post of {}: {}", owner.id, e))?;
    let taken_at = post.taken_at.to_utc()?;

    Ok(NormalizedPost {
        details: canonical_details(
            raw,
            post.primary.and_then(|m| m.url),
            post.secondary.and_then(|m| m.url),
            post.caption,
        ),
        id: post.id,
        owner: owner.clone(),
        calendar_date: taken_at.date_naive(),
        taken_at,
    })
}

/// Provider object verbatim, with the keys the query layer reads filled in
fn canonical_details(
    raw: &Value,
    photo_url: Option<String>,
    secondary_photo_url: Option<String>,
    caption: Option<String>,
) -> Value {
    let mut details = match raw {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    details.insert("photoURL".to_string(), photo_url.map_or(Value::Null, Value::String));
    details.insert(
        "secondaryPhotoURL".to_string(),
        secondary_photo_url.map_or(Value::Null, Value::String),
    );
    details.insert("caption".to_string(), caption.map_or(Value::Null, Value::String));

    Value::Object(details)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> FeedPayload {
        FeedPayload(value)
    }

    #[test]
    fn test_empty_inputs_yield_empty_feed() {
        for value in [json!(null), json!([]), json!({}), json!({"friendsPosts": []})] {
            let feed = normalize(&payload(value.clone())).expect("empty feed is well-formed");
            assert!(feed.posts.is_empty(), "expected no posts for {}", value);
            assert!(feed.skipped.is_empty());
        }
    }

    #[test]
    fn test_unrecognized_shapes_are_malformed() {
        for value in [json!("feed"), json!(42), json!({"items": []}), json!({"friendsPosts": {}})] {
            let result = normalize(&payload(value));
            assert!(matches!(result, Err(SyncError::MalformedPayload(_))));
        }
    }

    #[test]
    fn test_legacy_post() {
        let feed = normalize(&payload(json!([{
            "id": "p1",
            "ownerID": "u1",
            "userName": "alice",
            "user": {"profilePicture": {"url": "https://img/alice.jpg"}},
            "photoURL": "https://img/p1.jpg",
            "secondaryPhotoURL": "https://img/p1-back.jpg",
            "caption": "hello",
            "takenAt": {"_seconds": 1_700_000_000, "_nanoseconds": 0},
            "location": {"lat": 1.0}
        }])))
        .unwrap();

        assert_eq!(feed.posts.len(), 1);
        let post = &feed.posts[0];
        assert_eq!(post.id, "p1");
        assert_eq!(post.owner.id, "u1");
        assert_eq!(post.owner.username, "alice");
        assert_eq!(post.owner.profile_picture_url.as_deref(), Some("https://img/alice.jpg"));
        assert_eq!(post.taken_at.timestamp(), 1_700_000_000);
        assert_eq!(post.calendar_date, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        assert_eq!(post.details["photoURL"], "https://img/p1.jpg");
        assert_eq!(post.details["caption"], "hello");
        // provider-specific fields survive
        assert_eq!(post.details["location"]["lat"], 1.0);
    }

    #[test]
    fn test_grouped_feed_includes_own_and_friend_posts() {
        let feed = normalize(&payload(json!({
            "userPosts": {
                "user": {"id": "u0", "username": "me"},
                "posts": [{
                    "id": "own1",
                    "primary": {"url": "https://img/own1.jpg"},
                    "takenAt": "2024-03-01T08:00:00Z"
                }]
            },
            "friendsPosts": [{
                "user": {
                    "id": "u1",
                    "username": "alice",
                    "fullname": "Alice A",
                    "profilePicture": {"url": "https://img/alice.jpg"}
                },
                "posts": [{
                    "id": "p1",
                    "primary": {"url": "https://img/p1.jpg"},
                    "secondary": {"url": "https://img/p1-back.jpg"},
                    "caption": "hi",
                    "takenAt": "2024-03-01T09:30:00.000Z"
                }]
            }]
        })))
        .unwrap();

        let ids: Vec<_> = feed.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["own1", "p1"]);

        let friend_post = &feed.posts[1];
        assert_eq!(friend_post.owner.fullname.as_deref(), Some("Alice A"));
        assert_eq!(friend_post.details["photoURL"], "https://img/p1.jpg");
        assert_eq!(friend_post.details["secondaryPhotoURL"], "https://img/p1-back.jpg");
        assert_eq!(friend_post.details["primary"]["url"], "https://img/p1.jpg");
        assert!(feed.posts[0].details["secondaryPhotoURL"].is_null());
    }

    #[test]
    fn test_calendar_date_is_per_post() {
        // batch straddles midnight UTC
        let feed = normalize(&payload(json!({
            "friendsPosts": [{
                "user": {"id": "u1", "username": "alice"},
                "posts": [
                    {"id": "late", "takenAt": "2024-01-01T23:59:00Z"},
                    {"id": "early", "takenAt": "2024-01-02T00:01:00Z"}
                ]
            }]
        })))
        .unwrap();

        assert_eq!(feed.posts[0].calendar_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(feed.posts[1].calendar_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_bad_posts_are_skipped_not_fatal() {
        let feed = normalize(&payload(json!([
            {"id": "ok", "ownerID": "u1", "userName": "alice", "takenAt": {"_seconds": 0}},
            {"id": "no-owner", "takenAt": {"_seconds": 0}},
            {"id": "bad-time", "ownerID": "u1", "userName": "alice", "takenAt": "yesterday"}
        ])))
        .unwrap();

        assert_eq!(feed.posts.len(), 1);
        assert_eq!(feed.skipped.len(), 2);
    }

    #[test]
    fn test_duplicate_post_keeps_last_content() {
        let feed = normalize(&payload(json!([
            {"id": "p1", "ownerID": "u1", "userName": "alice", "photoURL": "a", "takenAt": {"_seconds": 10}},
            {"id": "p2", "ownerID": "u1", "userName": "alice", "photoURL": "x", "takenAt": {"_seconds": 20}},
            {"id": "p1", "ownerID": "u1", "userName": "alice", "photoURL": "b", "takenAt": {"_seconds": 30}}
        ])))
        .unwrap();

        assert_eq!(feed.posts.len(), 2);
        assert_eq!(feed.posts[0].id, "p1");
        assert_eq!(feed.posts[0].details["photoURL"], "b");
    }
}

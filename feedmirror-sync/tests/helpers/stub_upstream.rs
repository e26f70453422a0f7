//! Scripted [`UpstreamApi`] for driving the pipeline without a network
//!
//! Each operation replays a queue of replies; the last reply repeats once the
//! queue is down to it. Every call is counted.

use async_trait::async_trait;
use feedmirror_sync::error::SyncError;
use feedmirror_sync::upstream::{FeedPayload, Friend, MediaRef, Profile, RefreshedToken, UpstreamApi};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted upstream answer
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Unauthorized,
    RefreshFailed,
    Status(u16),
    Transport,
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, SyncError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Unauthorized => Err(SyncError::Unauthorized),
            Reply::RefreshFailed => Err(SyncError::RefreshFailed("refresh token expired".to_string())),
            Reply::Status(status_code) => Err(SyncError::Upstream { status_code }),
            Reply::Transport => Err(SyncError::Transport("connection reset".to_string())),
        }
    }
}

pub struct Script<T> {
    replies: Mutex<VecDeque<Reply<T>>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(replies: Vec<Reply<T>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.expect("script has at least one reply").into_result()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct StubUpstream {
    pub feed: Script<Value>,
    pub refresh: Script<String>,
    pub profile: Script<Profile>,
    pub friends: Script<Vec<Friend>>,
    /// Access tokens presented to `fetch_feed`, in call order
    pub feed_tokens: Mutex<Vec<String>>,
}

impl StubUpstream {
    /// Empty feed, failing refresh, profile `u0`/`me`, no friends
    pub fn new() -> Self {
        Self {
            feed: Script::new(vec![Reply::Ok(json!([]))]),
            refresh: Script::new(vec![Reply::RefreshFailed]),
            profile: Script::new(vec![Reply::Ok(profile("u0", "me"))]),
            friends: Script::new(vec![Reply::Ok(Vec::new())]),
            feed_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_feed(mut self, replies: Vec<Reply<Value>>) -> Self {
        self.feed = Script::new(replies);
        self
    }

    pub fn with_refresh(mut self, replies: Vec<Reply<String>>) -> Self {
        self.refresh = Script::new(replies);
        self
    }

    pub fn with_profile(mut self, replies: Vec<Reply<Profile>>) -> Self {
        self.profile = Script::new(replies);
        self
    }

    pub fn with_friends(mut self, replies: Vec<Reply<Vec<Friend>>>) -> Self {
        self.friends = Script::new(replies);
        self
    }

    pub fn feed_tokens(&self) -> Vec<String> {
        self.feed_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamApi for StubUpstream {
    async fn fetch_feed(&self, access_token: &str) -> Result<FeedPayload, SyncError> {
        self.feed_tokens.lock().unwrap().push(access_token.to_string());
        self.feed.next().map(FeedPayload)
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        self.refresh.next().map(|access_token| RefreshedToken {
            access_token,
            id_token: None,
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<Profile, SyncError> {
        self.profile.next()
    }

    async fn fetch_friends(&self, _access_token: &str) -> Result<Vec<Friend>, SyncError> {
        self.friends.next()
    }
}

pub fn profile(id: &str, username: &str) -> Profile {
    Profile {
        id: id.to_string(),
        username: username.to_string(),
        phone_number: Some("+15550000000".to_string()),
        fullname: Some("Session Owner".to_string()),
        profile_picture: Some(MediaRef {
            url: Some(format!("https://img/{}.jpg", username)),
        }),
    }
}

pub fn friend(id: &str, username: &str) -> Friend {
    Friend {
        id: id.to_string(),
        username: username.to_string(),
        fullname: None,
        profile_picture: None,
    }
}

/// Grouped-format feed with one post per `(post_id, owner_id, username, photo_url)`
pub fn grouped_feed(posts: &[(&str, &str, &str, &str)]) -> Value {
    let groups: Vec<Value> = posts
        .iter()
        .map(|(post_id, owner_id, username, photo_url)| {
            json!({
                "user": {"id": owner_id, "username": username},
                "posts": [{
                    "id": post_id,
                    "primary": {"url": photo_url},
                    "takenAt": "2024-03-01T09:30:00Z"
                }]
            })
        })
        .collect();

    json!({ "friendsPosts": groups })
}

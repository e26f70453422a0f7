//! Reconciliation Engine
//!
//! Merges normalized posts into local storage: users, then edges, then posts,
//! in one transaction. Every step is an upsert, so replaying the same feed is
//! a no-op, and nothing is ever deleted.

use feedmirror_common::db::{PhotoField, PhotoRecord, UserField, UserRecord};
use feedmirror_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;

use super::feed_normalizer::{NormalizedPost, UserStub};
use crate::db::{photos, relationships, users};
use crate::upstream::{Friend, Profile};
use crate::utils::retry_on_lock;

/// Rows submitted per reconciliation step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub users: usize,
    pub edges: usize,
    pub posts: usize,
}

/// One unit of graph writes for a session owner
///
/// Owns all of its rows so a lock retry can replay it from any task.
#[derive(Debug, Default)]
struct GraphWrite {
    owner_id: String,
    /// Owner row, written with every profile field. `None` requires the owner
    /// to exist already.
    owner: Option<UserRecord>,
    users: Vec<UserRecord>,
    targets: Vec<String>,
    photos: Vec<PhotoRecord>,
}

impl GraphWrite {
    fn report(&self) -> ReconcileReport {
        ReconcileReport {
            users: self.users.len() + usize::from(self.owner.is_some()),
            edges: self.targets.len(),
            posts: self.photos.len(),
        }
    }

    /// Returns the number of edges created
    async fn apply(&self, pool: &SqlitePool) -> Result<u64> {
        let mut tx = pool.begin().await?;

        match &self.owner {
            Some(owner) => {
                users::upsert_users(&mut tx, std::slice::from_ref(owner), UserField::PROFILE).await?;
            }
            None => {
                if !users::user_exists(&mut tx, &self.owner_id).await? {
                    return Err(Error::NotFound(format!("session owner {}", self.owner_id)));
                }
            }
        }

        users::upsert_users(&mut tx, &self.users, UserField::DISPLAY).await?;
        let created = relationships::upsert_edges(&mut tx, &self.owner_id, &self.targets).await?;
        photos::upsert_photos(&mut tx, &self.photos, PhotoField::RESYNC).await?;

        tx.commit().await?;
        Ok(created)
    }
}

/// Writes normalized provider data into the Storage Layer
#[derive(Debug, Clone)]
pub struct Reconciler {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reconcile one feed for `session_user_id`
    ///
    /// # Errors
    /// `NotFound` when the session owner has no user row yet (login seeds it);
    /// nothing is written in that case. Storage failures roll the whole pass
    /// back.
    pub async fn reconcile(
        &self,
        posts: &[NormalizedPost],
        session_user_id: &str,
    ) -> Result<ReconcileReport> {
        let write = feed_write(posts, session_user_id);
        let report = write.report();

        let created = self.apply("feed reconcile", write).await?;

        tracing::info!(
            user_id = session_user_id,
            users = report.users,
            edges = report.edges,
            new_edges = created,
            posts = report.posts,
            "Feed reconciled"
        );

        Ok(report)
    }

    /// Seed the session owner at login
    ///
    /// Upserts the owner with every profile field (phone included) and the
    /// self-loop edge, so the feed is reconcilable before any friend is known.
    pub async fn seed_login(&self, profile: &Profile, friends: &[Friend]) -> Result<ReconcileReport> {
        let friend_rows = friend_records(&profile.id, friends);

        let mut targets = vec![profile.id.clone()];
        targets.extend(friend_rows.iter().map(|f| f.id.clone()));

        let write = GraphWrite {
            owner_id: profile.id.clone(),
            owner: Some(UserRecord {
                id: profile.id.clone(),
                username: profile.username.clone(),
                fullname: profile.fullname.clone(),
                phone: profile.phone_number.clone(),
                profile_picture: profile.profile_picture_url(),
            }),
            users: friend_rows,
            targets,
            photos: Vec::new(),
        };
        let report = write.report();

        self.apply("login seed", write).await?;

        tracing::info!(user_id = %profile.id, friends = report.users - 1, "Login graph seeded");

        Ok(report)
    }

    /// Add `friends` of an already seeded owner: users, then edges
    ///
    /// # Errors
    /// `NotFound` when `owner_id` has no user row.
    pub async fn seed_friends(&self, owner_id: &str, friends: &[Friend]) -> Result<ReconcileReport> {
        let friend_rows = friend_records(owner_id, friends);
        let targets = friend_rows.iter().map(|f| f.id.clone()).collect();

        let write = GraphWrite {
            owner_id: owner_id.to_string(),
            owner: None,
            users: friend_rows,
            targets,
            photos: Vec::new(),
        };
        let report = write.report();

        self.apply("friend seed", write).await?;

        Ok(report)
    }

    async fn apply(&self, operation: &'static str, write: GraphWrite) -> Result<u64> {
        let pool = self.pool.clone();
        let write = Arc::new(write);

        retry_on_lock(operation, self.max_lock_wait_ms, move || {
            let pool = pool.clone();
            let write = Arc::clone(&write);
            async move { write.apply(&pool).await }
        })
        .await
    }
}

/// Users for every distinct owner, edges to self and each owner, all posts
fn feed_write(posts: &[NormalizedPost], session_user_id: &str) -> GraphWrite {
    let owners = distinct_owners(posts);

    let mut targets = vec![session_user_id.to_string()];
    targets.extend(
        owners
            .iter()
            .filter(|o| o.id != session_user_id)
            .map(|o| o.id.clone()),
    );

    GraphWrite {
        owner_id: session_user_id.to_string(),
        owner: None,
        users: owners.into_iter().map(stub_to_record).collect(),
        targets,
        photos: posts.iter().map(post_to_record).collect(),
    }
}

fn friend_records(owner_id: &str, friends: &[Friend]) -> Vec<UserRecord> {
    friends
        .iter()
        .filter(|f| f.id != owner_id)
        .map(|f| UserRecord {
            fullname: f.fullname.clone(),
            profile_picture: f.profile_picture_url(),
            ..UserRecord::new(&f.id, &f.username)
        })
        .collect()
}

/// One stub per owner id, in first-seen order; later sightings win
fn distinct_owners(posts: &[NormalizedPost]) -> Vec<&UserStub> {
    let mut order: Vec<&UserStub> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for post in posts {
        match index.get(post.owner.id.as_str()) {
            Some(&pos) => order[pos] = &post.owner,
            None => {
                index.insert(post.owner.id.as_str(), order.len());
                order.push(&post.owner);
            }
        }
    }

    order
}

fn stub_to_record(stub: &UserStub) -> UserRecord {
    UserRecord {
        fullname: stub.fullname.clone(),
        profile_picture: stub.profile_picture_url.clone(),
        ..UserRecord::new(&stub.id, &stub.username)
    }
}

fn post_to_record(post: &NormalizedPost) -> PhotoRecord {
    PhotoRecord {
        id: post.id.clone(),
        user_id: post.owner.id.clone(),
        date: post.calendar_date,
        taken_at: post.taken_at,
        details: post.details.clone(),
    }
}

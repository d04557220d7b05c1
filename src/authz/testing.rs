//! Test doubles shared by the authz unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex, Notify};
use uuid::Uuid;

use super::{AccessError, Role, RoleRepository};
use crate::events::{ChangeFeed, ChangeKind, RoleChange};

/// Single-connection in-memory database with migrations applied.
pub async fn migrated_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("connect");
    sqlx::migrate!().run(&pool).await.expect("migrate");
    pool
}

/// In-memory repository with call counters and failure switches.
#[derive(Default)]
pub struct MockRepository {
    roles: Mutex<HashMap<Uuid, Vec<String>>>,
    grants: Mutex<HashSet<(String, String, String)>>,
    held: Mutex<HashMap<(String, String), Arc<Notify>>>,
    held_fetch: Mutex<Option<Arc<Notify>>>,
    pub entered: Notify,
    pub fail_fetch: AtomicBool,
    pub fail_grant: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub grant_calls: AtomicUsize,
    feed: ChangeFeed,
}

impl MockRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Store a raw value without publishing.
    pub async fn insert_raw(&self, user_id: Uuid, role: &str) {
        self.roles.lock().await.entry(user_id).or_default().push(role.to_string());
    }

    pub async fn insert(&self, user_id: Uuid, role: Role) {
        self.insert_raw(user_id, role.as_str()).await;
        self.feed.publish(RoleChange::new(ChangeKind::Insert, Some(user_id)));
    }

    pub async fn remove(&self, user_id: Uuid, role: Role) {
        if let Some(roles) = self.roles.lock().await.get_mut(&user_id) {
            roles.retain(|r| r != role.as_str());
        }
        self.feed.publish(RoleChange::new(ChangeKind::Delete, Some(user_id)));
    }

    pub async fn grant(&self, role: Role, resource: &str, action: &str) {
        self.grants
            .lock()
            .await
            .insert((role.as_str().to_string(), resource.to_string(), action.to_string()));
    }

    /// Block `has_grant` for this pair until the returned handle is notified.
    /// `entered` is notified when a blocked call arrives.
    pub async fn hold(&self, resource: &str, action: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.held
            .lock()
            .await
            .insert((resource.to_string(), action.to_string()), Arc::clone(&release));
        release
    }

    /// Block the next `fetch_roles` until the returned handle is notified.
    /// `entered` is notified when the blocked call arrives.
    pub async fn hold_fetch(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.held_fetch.lock().await = Some(Arc::clone(&release));
        release
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn grant_checks(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleRepository for MockRepository {
    async fn fetch_roles(&self, principal: Uuid) -> Result<Vec<String>, AccessError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let release = self.held_fetch.lock().await.take();
        if let Some(release) = release {
            self.entered.notify_one();
            release.notified().await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AccessError::StoreQueryFailed("connection reset".into()));
        }
        Ok(self.roles.lock().await.get(&principal).cloned().unwrap_or_default())
    }

    async fn has_grant(&self, principal: Uuid, resource: &str, action: &str) -> Result<bool, AccessError> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);

        let release = self.held.lock().await.get(&(resource.to_string(), action.to_string())).cloned();
        if let Some(release) = release {
            self.entered.notify_one();
            release.notified().await;
        }

        if self.fail_grant.load(Ordering::SeqCst) {
            return Err(AccessError::StoreQueryFailed("timeout".into()));
        }

        let roles = self.roles.lock().await.get(&principal).cloned().unwrap_or_default();
        let grants = self.grants.lock().await;
        Ok(roles
            .iter()
            .any(|role| grants.contains(&(role.clone(), resource.to_string(), action.to_string()))))
    }

    fn subscribe(&self) -> broadcast::Receiver<RoleChange> {
        self.feed.subscribe()
    }
}

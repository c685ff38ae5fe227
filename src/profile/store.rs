//! Profile store backends
//!
//! `ProfileStore` is the seam to the externally owned profile table. A
//! missing row is `Ok(None)`, not an error; implementations reserve `Err`
//! for transport and payload faults.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::debug;

use super::AuthorizationProfile;
use crate::http::HttpClient;

/// Lookup seam to the external profile table
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Find the profile row for a user id
    ///
    /// `Ok(None)` means no row exists for that id.
    async fn find_profile_by_id(&self, user_id: &str) -> Result<Option<AuthorizationProfile>>;
}

/// In-process store backed by a concurrent map
///
/// Used by tests and self-hosted portals. Lookups can be held, delayed or
/// failed on demand so completion-order races are reproducible.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<String, AuthorizationProfile>,
    lookup_delay: RwLock<Option<Duration>>,
    fail_remaining: AtomicU32,
    lookups: AtomicU64,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile row
    pub fn insert(&self, profile: AuthorizationProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Remove the row for a user id
    pub fn remove(&self, user_id: &str) {
        self.profiles.remove(user_id);
    }

    /// Number of rows currently held
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Make the next `count` lookups return an error
    pub fn fail_next_lookups(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::Release);
    }

    /// Total lookups served since construction
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Acquire)
    }

    /// Delay every lookup by `delay`; `None` restores immediate lookups
    pub async fn set_lookup_delay(&self, delay: Option<Duration>) {
        *self.lookup_delay.write().await = delay;
    }

    /// Hold the next lookup until the returned sender fires (or is dropped)
    pub async fn hold_next_lookup(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.push_back(rx);
        tx
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_profile_by_id(&self, user_id: &str) -> Result<Option<AuthorizationProfile>> {
        self.lookups.fetch_add(1, Ordering::AcqRel);

        let gate = self.gates.lock().await.pop_front();
        if let Some(gate) = gate {
            // A dropped sender releases the gate as well.
            let _ = gate.await;
        }

        if let Some(delay) = *self.lookup_delay.read().await {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .fail_remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            bail!("injected lookup failure for '{}'", user_id);
        }

        Ok(self.profiles.get(user_id).map(|entry| entry.value().clone()))
    }
}

/// Store backed by a PostgREST-style row endpoint
///
/// Issues `GET {base}/{table}?select=*&id=eq.{user_id}` and expects a JSON
/// array body. An empty array is a clean miss.
pub struct RestProfileStore {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestProfileStore {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: "profiles".to_string(),
        }
    }

    /// Override the table name (defaults to `profiles`)
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn row_url(&self, user_id: &str) -> String {
        format!(
            "{}/{}?select=*&id=eq.{}",
            self.base_url.trim_end_matches('/'),
            self.table,
            user_id
        )
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    fn name(&self) -> &str {
        "rest"
    }

    async fn find_profile_by_id(&self, user_id: &str) -> Result<Option<AuthorizationProfile>> {
        let url = self.row_url(user_id);
        debug!(store = %self.name(), url = %url, "looking up profile row");

        let mut headers = HashMap::new();
        headers.insert("apikey".to_string(), self.api_key.clone());
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());

        let response = self
            .http
            .get(&url, headers)
            .await
            .context("profile lookup request failed")?;

        if !response.is_success() {
            bail!(
                "profile lookup for '{}' returned status {}",
                user_id,
                response.status
            );
        }

        let rows: Vec<AuthorizationProfile> =
            serde_json::from_str(&response.body).context("malformed profile row payload")?;

        Ok(rows.into_iter().next())
    }
}

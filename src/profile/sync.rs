//! Profile synchronization
//!
//! Fetches authorization profiles and swallows every failure mode into
//! `None`: consumers of the snapshot see a missing profile (and therefore
//! the restricted tier), never a fetch error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::store::ProfileStore;
use super::AuthorizationProfile;

/// Result envelope for one deferred profile refresh
#[derive(Debug)]
pub(crate) struct RefreshOutcome {
    /// User id the fetch was issued for
    pub user_id: String,
    /// Identity epoch current when the fetch was spawned
    pub epoch: u64,
    /// The fetched profile; `None` covers failure and no-row alike
    pub profile: Option<AuthorizationProfile>,
}

/// Fetches profiles on behalf of the session manager
pub struct ProfileSynchronizer {
    store: Arc<dyn ProfileStore>,
    fetch_timeout: Duration,
}

impl ProfileSynchronizer {
    pub fn new(store: Arc<dyn ProfileStore>, fetch_timeout: Duration) -> Self {
        Self {
            store,
            fetch_timeout,
        }
    }

    /// Fetch the profile for a user id
    ///
    /// Never errors. A store fault, a timeout, a row for the wrong user and
    /// a plain missing row all come back as `None`; only their log levels
    /// differ. A missing row is expected for unprovisioned members and is
    /// not treated as a fault.
    pub async fn fetch(&self, user_id: &str) -> Option<AuthorizationProfile> {
        if user_id.trim().is_empty() {
            warn!(store = %self.store.name(), "profile fetch requested with an empty user id");
            return None;
        }

        let lookup = self.store.find_profile_by_id(user_id);
        let row = match timeout(self.fetch_timeout, lookup).await {
            Err(_) => {
                error!(
                    store = %self.store.name(),
                    user_id = %user_id,
                    timeout_secs = self.fetch_timeout.as_secs(),
                    "profile lookup timed out"
                );
                return None;
            }
            Ok(Err(err)) => {
                error!(
                    store = %self.store.name(),
                    user_id = %user_id,
                    error = %err,
                    "profile lookup failed"
                );
                return None;
            }
            Ok(Ok(row)) => row,
        };

        match row {
            None => {
                debug!(store = %self.store.name(), user_id = %user_id, "no profile row for user");
                None
            }
            Some(profile) if profile.id != user_id => {
                error!(
                    store = %self.store.name(),
                    requested = %user_id,
                    returned = %profile.id,
                    "store returned a row for a different user id"
                );
                None
            }
            Some(profile) => Some(profile),
        }
    }

    /// Spawn a deferred fetch whose result lands on the outcome channel
    ///
    /// The manager loop may be gone by the time the fetch completes; a
    /// closed channel silently drops the result.
    pub(crate) fn spawn_refresh(
        self: &Arc<Self>,
        user_id: String,
        epoch: u64,
        outcomes: mpsc::Sender<RefreshOutcome>,
    ) {
        debug!(user_id = %user_id, epoch, "profile refresh scheduled");

        let synchronizer = Arc::clone(self);
        tokio::spawn(async move {
            let profile = synchronizer.fetch(&user_id).await;
            let _ = outcomes
                .send(RefreshOutcome {
                    user_id,
                    epoch,
                    profile,
                })
                .await;
        });
    }
}

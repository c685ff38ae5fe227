//! Published authentication snapshot
//!
//! One value, one writer. Consumers read the latest snapshot or watch for
//! changes; every write goes through the session manager loop, which keeps
//! the crate-private mutators below as its only write surface.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::profile::AuthorizationProfile;
use crate::session::{Identity, Session};
use crate::tier::{resolve_tier, AccessTier};

/// The canonical record of who is signed in and at what tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    /// The signed-in member, if any
    pub user: Option<Identity>,

    /// The session backing that member
    pub session: Option<Session>,

    /// The member's authorization profile; `None` until fetched, on fetch
    /// failure, or when no row exists
    pub profile: Option<AuthorizationProfile>,

    /// True until the initial session resolution completes
    pub is_loading: bool,
}

impl AuthSnapshot {
    /// The startup value: nothing known yet, still resolving
    pub fn loading() -> Self {
        Self {
            user: None,
            session: None,
            profile: None,
            is_loading: true,
        }
    }

    /// A fully resolved signed-out snapshot
    pub fn signed_out() -> Self {
        Self {
            user: None,
            session: None,
            profile: None,
            is_loading: false,
        }
    }

    /// Whether a session is currently held
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Resolve the access tier for this snapshot's profile
    pub fn access_tier(&self) -> AccessTier {
        resolve_tier(self.profile.as_ref())
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

/// Store holding the published snapshot
///
/// Backed by a watch channel: a new subscriber immediately observes the
/// current value, and publishing with zero subscribers is fine.
pub struct AuthState {
    tx: watch::Sender<AuthSnapshot>,
}

impl AuthState {
    /// Create a store seeded with the loading snapshot
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::loading());
        Self { tx }
    }

    /// The latest published snapshot
    pub fn current(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    /// Replace the published snapshot
    pub(crate) fn publish(&self, snapshot: AuthSnapshot) {
        // send_replace updates the value even when nobody is subscribed.
        self.tx.send_replace(snapshot);
    }

    /// Mutate the published snapshot in place
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AuthSnapshot),
    {
        self.tx.send_modify(f);
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

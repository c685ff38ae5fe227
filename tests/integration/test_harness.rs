//! Integration test harness
//!
//! Bundles a running session manager with the in-process provider and
//! store, plus polling helpers for snapshot and counter conditions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use tessera::{
    AuthConfig, AuthSnapshot, AuthorizationProfile, IdentityProvider, LocalIdentityProvider,
    MemoryProfileStore, ProfileStore, Role, Session, SessionHandle, SessionManager, SessionStats,
};

/// Install a log subscriber once so failing tests print the loop's logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Poll a handle's snapshot until `pred` holds or the timeout elapses
pub async fn wait_for_snapshot<F>(handle: &SessionHandle, mut pred: F, timeout_ms: u64) -> bool
where
    F: FnMut(&AuthSnapshot) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if pred(&handle.snapshot()) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll a handle's counters until `pred` holds or the timeout elapses
pub async fn wait_for_stats<F>(handle: &SessionHandle, mut pred: F, timeout_ms: u64) -> bool
where
    F: FnMut(&SessionStats) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if pred(&handle.stats().await) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A running portal auth stack for integration tests
pub struct PortalEnvironment {
    /// In-process identity provider
    pub provider: Arc<LocalIdentityProvider>,
    /// In-process profile store
    pub store: Arc<MemoryProfileStore>,
    /// Handle over the running session manager
    pub handle: SessionHandle,
}

impl PortalEnvironment {
    /// Spawn the stack and wait for the startup session read to resolve
    pub async fn new() -> Self {
        init_tracing();

        let provider = Arc::new(LocalIdentityProvider::new());
        let store = Arc::new(MemoryProfileStore::new());
        let handle = SessionManager::spawn(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            AuthConfig::default(),
        )
        .expect("manager should spawn with default config");

        assert!(
            wait_for_snapshot(&handle, |s| !s.is_loading, 2_000).await,
            "startup session read did not resolve"
        );

        Self {
            provider,
            store,
            handle,
        }
    }

    /// Sign a member in with a provisioned profile row
    ///
    /// The lookup is gated until the row is in place, so the resulting
    /// profile fetch cannot race the insert.
    pub async fn sign_in_with_profile(&self, email: &str, role: Role) -> Session {
        let gate = self.store.hold_next_lookup().await;
        let session = self
            .provider
            .sign_in(email)
            .await
            .expect("sign-in should succeed");
        self.store
            .insert(AuthorizationProfile::new(&session.user.id, role));
        let _ = gate.send(());
        session
    }

    /// Stop the manager loop
    pub async fn shutdown(self) {
        self.handle
            .shutdown()
            .await
            .expect("first shutdown should succeed");
    }
}

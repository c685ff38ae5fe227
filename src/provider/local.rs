//! In-process identity provider
//!
//! Reference [`IdentityProvider`] used by tests, demos and self-hosted
//! portals. It mints opaque tokens, keeps user ids stable per email, and can
//! optionally rotate tokens ahead of expiry from a background task. Fault
//! injection hooks let tests exercise the degraded paths.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::IdentityProvider;
use crate::session::{Identity, Session, SessionEvent};

/// Fan-out capacity for session events
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Default session lifetime in seconds
const DEFAULT_SESSION_TTL_SECS: i64 = 3600; // 1 hour

/// Rotate tokens once a session is within this many seconds of expiry
const REFRESH_THRESHOLD_SECS: i64 = 300; // 5 minutes

/// Mint an opaque token
fn mint_token() -> String {
    format!("{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..))
}

struct MaintenanceTask {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-process identity provider with optional expiry maintenance
pub struct LocalIdentityProvider {
    events: broadcast::Sender<SessionEvent>,
    session: Arc<RwLock<Option<Session>>>,
    known_ids: DashMap<String, String>,
    session_ttl_secs: i64,
    fail_sign_out: AtomicBool,
    fail_session_reads: AtomicU32,
    maintenance: Mutex<Option<MaintenanceTask>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events,
            session: Arc::new(RwLock::new(None)),
            known_ids: DashMap::new(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            fail_sign_out: AtomicBool::new(false),
            fail_session_reads: AtomicU32::new(0),
            maintenance: Mutex::new(None),
        }
    }

    /// Override the session lifetime
    pub fn with_session_ttl(mut self, ttl_secs: i64) -> Self {
        self.session_ttl_secs = ttl_secs;
        self
    }

    /// Sign a member in, replacing any held session
    ///
    /// A previously seen email gets its original user id back; a new email
    /// gets a fresh one.
    pub async fn sign_in(&self, email: &str) -> Result<Session> {
        if email.trim().is_empty() {
            bail!("cannot sign in with an empty email");
        }

        let user_id = self
            .known_ids
            .entry(email.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let session = Session::new(
            Identity::with_email(user_id, email),
            mint_token(),
            Some(mint_token()),
            Some(Utc::now() + chrono::Duration::seconds(self.session_ttl_secs)),
        );

        *self.session.write().await = Some(session.clone());

        info!(provider = %self.name(), user_id = %session.user.id, "member signed in");
        self.emit(SessionEvent::signed_in(session.clone()));

        Ok(session)
    }

    /// Rotate the held session's access token and expiry
    pub async fn refresh_session(&self) -> Result<Session> {
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow!("no session to refresh"))?;

        rotate(session, self.session_ttl_secs);
        let refreshed = session.clone();
        drop(guard);

        debug!(provider = %self.name(), user_id = %refreshed.user.id, "session tokens rotated");
        self.emit(SessionEvent::token_refreshed(refreshed.clone()));

        Ok(refreshed)
    }

    /// Start a background task that rotates tokens shortly before expiry
    pub async fn start_expiry_maintenance(&self, interval: Duration) {
        let mut maintenance = self.maintenance.lock().await;
        if maintenance.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let ttl = self.session_ttl_secs;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        let mut guard = session.write().await;
                        if let Some(current) = guard.as_mut() {
                            if current.expires_soon(REFRESH_THRESHOLD_SECS) {
                                rotate(current, ttl);
                                let refreshed = current.clone();
                                drop(guard);
                                debug!(user_id = %refreshed.user.id, "proactively rotated session tokens");
                                let _ = events.send(SessionEvent::token_refreshed(refreshed));
                            }
                        }
                    }
                }
            }
        });

        *maintenance = Some(MaintenanceTask {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the expiry maintenance task, if running
    pub async fn stop_expiry_maintenance(&self) {
        let task = self.maintenance.lock().await.take();
        if let Some(task) = task {
            let _ = task.shutdown_tx.send(()).await;
            if tokio::time::timeout(Duration::from_millis(100), task.handle)
                .await
                .is_err()
            {
                warn!(provider = "local", "expiry maintenance did not stop in time");
            }
        }
    }

    /// Make the next call to `sign_out` fail without touching the session
    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::Release);
    }

    /// Make the next `count` calls to `current_session` fail
    pub fn fail_next_session_reads(&self, count: u32) {
        self.fail_session_reads.store(count, Ordering::Release);
    }

    fn emit(&self, event: SessionEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.events.send(event);
    }
}

/// Replace the session's access token and push out its expiry
fn rotate(session: &mut Session, ttl_secs: i64) {
    session.access_token = mint_token();
    session.expires_at = Some(Utc::now() + chrono::Duration::seconds(ttl_secs));
    session.issued_at = Utc::now();
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        let should_fail = self
            .fail_session_reads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            bail!("injected session read failure");
        }

        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        if self.fail_sign_out.load(Ordering::Acquire) {
            bail!("injected sign-out failure");
        }

        let previous = self.session.write().await.take();
        if previous.is_some() {
            info!(provider = %self.name(), "member signed out");
            self.emit(SessionEvent::signed_out());
        }

        Ok(())
    }
}

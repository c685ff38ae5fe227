//! Session manager
//!
//! The manager loop is the single writer of the published snapshot. It
//! selects over the provider's event stream, an internal command channel,
//! and the refresh-outcome channel, processes events in delivery order, and
//! applies profile fetch results only when they are still fresh. Consumers
//! hold a [`SessionHandle`]; the loop owns everything else.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::profile::store::ProfileStore;
use crate::profile::sync::{ProfileSynchronizer, RefreshOutcome};
use crate::provider::IdentityProvider;
use crate::session::{Session, SessionEvent, SessionEventKind};
use crate::state::{AuthSnapshot, AuthState};
use crate::tier::AccessTier;
use crate::AuthConfig;

/// Counters kept by the manager loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Provider events processed, in delivery order
    pub events_processed: u64,
    /// Writes that replaced or cleared the held session
    pub sessions_replaced: u64,
    /// Profile refreshes spawned
    pub refreshes_started: u64,
    /// Refresh results applied to the snapshot
    pub refreshes_applied: u64,
    /// Refresh results discarded as stale
    pub refreshes_discarded: u64,
    /// Sign-out requests processed
    pub sign_outs: u64,
}

/// Requests and completions routed into the manager loop
enum Command {
    /// Result of the startup session read
    InitialSession(Option<Session>),
    /// Sign the member out; acked once local state is cleared
    SignOut { ack: oneshot::Sender<()> },
    /// Stop the loop; acked right before it exits
    Shutdown { ack: oneshot::Sender<()> },
}

/// Consumer surface over the manager loop
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: Arc<AuthState>,
    stats: Arc<RwLock<SessionStats>>,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            join: Arc::clone(&self.join),
        }
    }
}

impl SessionHandle {
    /// The latest published snapshot
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.current()
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Resolve the access tier for the current snapshot
    pub fn access_tier(&self) -> AccessTier {
        self.snapshot().access_tier()
    }

    /// Snapshot of the loop's counters
    pub async fn stats(&self) -> SessionStats {
        self.stats.read().await.clone()
    }

    /// Sign the member out
    ///
    /// Local state is cleared before this returns, whatever the provider
    /// does with its half of the sign-out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::SignOut { ack: ack_tx })
            .await
            .map_err(|_| AuthError::Terminated)?;
        ack_rx.await.map_err(|_| AuthError::Terminated)
    }

    /// Stop the manager loop
    ///
    /// After this returns no further snapshot writes occur. Subsequent
    /// handle calls fail with [`AuthError::Terminated`].
    pub async fn shutdown(&self) -> Result<(), AuthError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { ack: ack_tx })
            .await
            .map_err(|_| AuthError::Terminated)?;
        ack_rx.await.map_err(|_| AuthError::Terminated)?;

        let handle = self.join.lock().await.take();
        if let Some(handle) = handle {
            let _ = timeout(Duration::from_secs(1), handle).await;
        }
        Ok(())
    }
}

/// Owner of the manager loop and the snapshot it writes
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    synchronizer: Arc<ProfileSynchronizer>,
    state: Arc<AuthState>,
    stats: Arc<RwLock<SessionStats>>,
    outcomes_tx: mpsc::Sender<RefreshOutcome>,
    /// User id mirrored from the latest snapshot write
    current_user: Option<String>,
    /// Bumped on every identity transition; fetch results must match it
    epoch: u64,
    /// Set once the first event or the initial read resolves the session
    initial_resolved: bool,
}

impl SessionManager {
    /// Start the manager and return the consumer handle
    ///
    /// The loading snapshot is published synchronously, so an embedding
    /// application can render a "determining session" state immediately.
    /// The provider subscription is taken before the initial session read
    /// is issued, leaving no gap a transition could fall into.
    pub fn spawn(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        config: AuthConfig,
    ) -> Result<SessionHandle, AuthError> {
        config.validate()?;

        let state = Arc::new(AuthState::new());
        let stats = Arc::new(RwLock::new(SessionStats::default()));
        let synchronizer = Arc::new(ProfileSynchronizer::new(store, config.fetch_timeout()));

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(config.command_capacity);

        let events = provider.subscribe();

        let read_provider = Arc::clone(&provider);
        let read_tx = cmd_tx.clone();
        tokio::spawn(async move {
            let session = match read_provider.current_session().await {
                Ok(session) => session,
                Err(err) => {
                    warn!(
                        provider = %read_provider.name(),
                        error = %err,
                        "initial session read failed, treating as signed out"
                    );
                    None
                }
            };
            let _ = read_tx.send(Command::InitialSession(session)).await;
        });

        let manager = SessionManager {
            provider,
            synchronizer,
            state: Arc::clone(&state),
            stats: Arc::clone(&stats),
            outcomes_tx,
            current_user: None,
            epoch: 0,
            initial_resolved: false,
        };
        let join = tokio::spawn(manager.run(events, cmd_rx, outcomes_rx));

        Ok(SessionHandle {
            commands: cmd_tx,
            state,
            stats,
            join: Arc::new(Mutex::new(Some(join))),
        })
    }

    async fn run(
        mut self,
        mut events: broadcast::Receiver<SessionEvent>,
        mut commands: mpsc::Receiver<Command>,
        mut outcomes: mpsc::Receiver<RefreshOutcome>,
    ) {
        debug!(provider = %self.provider.name(), "session manager loop started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The next delivered event is authoritative, so the
                        // loop resynchronizes on it without special casing.
                        warn!(skipped, "session event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("provider event stream closed, stopping session manager");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::InitialSession(session)) => self.apply_initial(session).await,
                    Some(Command::SignOut { ack }) => self.handle_sign_out(ack).await,
                    Some(Command::Shutdown { ack }) => {
                        info!("session manager shutting down");
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        debug!("all session handles dropped, stopping session manager");
                        break;
                    }
                },
                Some(outcome) = outcomes.recv() => self.apply_refresh(outcome).await,
            }
        }
    }

    /// Process one provider event, in delivery order
    async fn handle_event(&mut self, event: SessionEvent) {
        self.stats.write().await.events_processed += 1;

        match (event.kind, event.session) {
            (SessionEventKind::SignedOut, _) => {
                info!("session signed out");
                self.clear_session().await;
            }
            (SessionEventKind::TokenRefreshed, Some(session)) => {
                debug!(user_id = %session.user.id, "session tokens refreshed");
                self.apply_session(session).await;
            }
            (kind, Some(session)) => {
                info!(user_id = %session.user.id, kind = ?kind, "session transition");
                self.apply_session(session).await;
            }
            (kind, None) => {
                warn!(kind = ?kind, "session event carried no session, ignoring");
            }
        }
    }

    /// Apply the startup session read, unless an event already beat it
    async fn apply_initial(&mut self, session: Option<Session>) {
        if self.initial_resolved {
            debug!("initial session read superseded by a delivered event, discarding");
            return;
        }

        match session {
            Some(session) => {
                info!(user_id = %session.user.id, "initial session resolved");
                self.apply_session(session).await;
            }
            None => {
                info!("initial session resolved as signed out");
                self.clear_session().await;
            }
        }
    }

    /// Install a session and schedule its profile refresh
    ///
    /// Every session-carrying event refreshes the profile, token rotations
    /// included; that is how remote role and status changes reach a
    /// long-lived session. The cached profile stays visible while the same
    /// member's refresh runs.
    async fn apply_session(&mut self, session: Session) {
        let user_id = session.user.id.clone();
        let same_user = self.current_user.as_deref() == Some(user_id.as_str());

        self.epoch += 1;
        self.current_user = Some(user_id.clone());
        self.initial_resolved = true;

        self.state.update(|snapshot| {
            snapshot.user = Some(session.user.clone());
            snapshot.session = Some(session);
            if !same_user {
                // Never show the previous member's profile under a new
                // identity, not even while the refresh is in flight.
                snapshot.profile = None;
            }
            snapshot.is_loading = false;
        });

        {
            let mut stats = self.stats.write().await;
            stats.sessions_replaced += 1;
            stats.refreshes_started += 1;
        }

        // The fetch runs on its own task and re-enters the loop as a refresh
        // outcome. Fetching inline here would stall event delivery behind a
        // slow store lookup, and a store sharing the provider's transport
        // could re-enter the event hook synchronously. Staleness is checked
        // when the outcome comes back, not here.
        self.synchronizer
            .spawn_refresh(user_id, self.epoch, self.outcomes_tx.clone());
    }

    /// Clear the published session and invalidate in-flight refreshes
    async fn clear_session(&mut self) {
        let had_session = self.current_user.take().is_some();
        self.epoch += 1;
        self.initial_resolved = true;

        if had_session {
            self.stats.write().await.sessions_replaced += 1;
        }
        self.state.publish(AuthSnapshot::signed_out());
    }

    /// Apply a refresh outcome if it is still fresh
    async fn apply_refresh(&mut self, outcome: RefreshOutcome) {
        let fresh = outcome.epoch == self.epoch
            && self.current_user.as_deref() == Some(outcome.user_id.as_str());

        if !fresh {
            debug!(
                user_id = %outcome.user_id,
                outcome_epoch = outcome.epoch,
                current_epoch = self.epoch,
                "discarding stale profile fetch"
            );
            self.stats.write().await.refreshes_discarded += 1;
            return;
        }

        debug!(
            user_id = %outcome.user_id,
            profile_found = outcome.profile.is_some(),
            "profile refresh applied"
        );
        self.stats.write().await.refreshes_applied += 1;
        self.state.update(|snapshot| {
            snapshot.profile = outcome.profile;
        });
    }

    /// Sign out: provider leg is best-effort, local clear is unconditional
    async fn handle_sign_out(&mut self, ack: oneshot::Sender<()>) {
        self.stats.write().await.sign_outs += 1;

        // Start the provider's half first, detached. The member is logged
        // out locally whether or not it ever lands.
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(err) = provider.sign_out().await {
                warn!(
                    provider = %provider.name(),
                    error = %err,
                    "provider sign-out failed, local state already cleared"
                );
            }
        });

        self.clear_session().await;
        let _ = ack.send(());
    }
}

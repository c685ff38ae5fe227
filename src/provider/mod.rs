//! Identity provider seam
//!
//! The provider owns credentials, token lifetimes and refresh mechanics.
//! This crate only reads the current session and reacts to the transition
//! events the provider emits.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::session::{Session, SessionEvent};

pub mod local;

pub use local::LocalIdentityProvider;

/// External identity service contract
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Read the session the provider currently holds, if any
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Subscribe to session transitions
    ///
    /// Each receiver observes events in emit order. Subscribing before the
    /// first [`current_session`](Self::current_session) read guarantees no
    /// transition falls between the read and the subscription.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Invalidate the provider-side session
    ///
    /// Implementations emit [`SessionEvent::signed_out`] once the
    /// invalidation lands. Callers treat this as best-effort and never block
    /// local sign-out on it.
    async fn sign_out(&self) -> Result<()>;
}

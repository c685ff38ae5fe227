//! Identity, session, and access-tier synchronization for membership portals.
//!
//! An [`IdentityProvider`] is the source of truth for who is signed in. The
//! [`SessionManager`] mirrors it into an [`AuthSnapshot`] that embedding
//! applications watch, enriches the snapshot with the member's
//! [`AuthorizationProfile`], and resolves an [`AccessTier`] from whatever is
//! currently known. Consumers never write any of this state directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod http;
pub mod profile;
pub mod provider;
pub mod session;
pub mod state;
pub mod tier;

#[cfg(test)]
mod tests;

pub use error::AuthError;
pub use http::{HttpClient, ReqwestHttpClient, SimpleHttpResponse};
pub use profile::{
    AccountStatus, AuthorizationProfile, MemoryProfileStore, PaymentStatus, ProfileLevel,
    ProfileStore, ProfileSynchronizer, RestProfileStore, Role,
};
pub use provider::{IdentityProvider, LocalIdentityProvider};
pub use session::{
    Identity, Session, SessionEvent, SessionEventKind, SessionHandle, SessionManager, SessionStats,
};
pub use state::{AuthSnapshot, AuthState};
pub use tier::{resolve_tier, AccessTier, Capability};

/// Default bound for the manager's command and refresh-outcome channels
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Default ceiling on a single profile fetch, in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Configuration for the session manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Capacity of the command and refresh-outcome channels
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    /// Ceiling on a single profile fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_command_capacity() -> usize {
    DEFAULT_COMMAND_CAPACITY
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl AuthConfig {
    /// Reject configurations the manager cannot run with
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.command_capacity == 0 {
            return Err(AuthError::config("command_capacity must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(AuthError::config("fetch_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// The fetch ceiling as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

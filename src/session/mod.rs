//! Session types and the session manager
//!
//! A `Session` is owned by the identity provider; this crate treats it as
//! opaque except for its presence and the identity it carries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod manager;

pub use manager::{SessionHandle, SessionManager, SessionStats};

/// The signed-in member as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-owned opaque user identifier
    pub id: String,

    /// Email address, when the provider discloses one
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
        }
    }
}

/// Credentials for one signed-in member
///
/// Tokens are minted and rotated by the provider; the expiry helpers exist
/// for provider implementations, not for consumers of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The member this session belongs to
    pub user: Identity,

    /// The access token used for API requests
    pub access_token: String,

    /// An optional refresh token used to obtain new access tokens
    pub refresh_token: Option<String>,

    /// When the access token expires (if known)
    pub expires_at: Option<DateTime<Utc>>,

    /// When this session was created or last refreshed
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session issued now
    pub fn new(
        user: Identity,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user,
            access_token,
            refresh_token,
            expires_at,
            issued_at: Utc::now(),
        }
    }

    /// Check if the session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |exp| exp <= Utc::now())
    }

    /// Check if the session will expire within the given threshold
    pub fn expires_soon(&self, threshold_secs: i64) -> bool {
        self.expires_at.map_or(false, |exp| {
            exp - Utc::now() < Duration::seconds(threshold_secs)
        })
    }

    /// Seconds until expiration, if an expiry is known
    pub fn seconds_until_expiration(&self) -> Option<i64> {
        self.expires_at.map(|exp| (exp - Utc::now()).num_seconds())
    }
}

/// Kinds of session transitions a provider can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A member signed in
    SignedIn,
    /// The member signed out or the session was revoked
    SignedOut,
    /// The provider rotated the session's tokens
    TokenRefreshed,
}

/// One session transition, fanned out to subscribers in emit order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Unique identifier for this event instance
    pub id: Uuid,

    /// What happened
    pub kind: SessionEventKind,

    /// The session after the transition; `None` for sign-out
    pub session: Option<Session>,

    /// When the provider observed the transition
    pub occurred_at: DateTime<Utc>,
}

impl SessionEvent {
    fn new(kind: SessionEventKind, session: Option<Session>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            session,
            occurred_at: Utc::now(),
        }
    }

    /// Event for a completed sign-in
    pub fn signed_in(session: Session) -> Self {
        Self::new(SessionEventKind::SignedIn, Some(session))
    }

    /// Event for a sign-out; carries no session
    pub fn signed_out() -> Self {
        Self::new(SessionEventKind::SignedOut, None)
    }

    /// Event for a token rotation on a live session
    pub fn token_refreshed(session: Session) -> Self {
        Self::new(SessionEventKind::TokenRefreshed, Some(session))
    }

    /// The user id this event is about, when it carries a session
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }
}

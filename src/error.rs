//! Error types for the synchronization crate
//!
//! Failures on the synchronization path itself (provider reads, profile
//! fetches) are absorbed and degraded, never surfaced to consumers. The
//! variants here cover the narrow handle surface and configuration faults.

use thiserror::Error;

/// Unified error type for the public handle surface
#[derive(Error, Debug)]
pub enum AuthError {
    /// The session manager loop has been shut down
    #[error("session manager has been shut down")]
    Terminated,

    /// Identity provider error
    #[error("provider error: {message}")]
    Provider {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Profile store error
    #[error("profile store error: {message}")]
    Store {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
        /// Optional context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

// Clone by hand: boxed error sources are not cloneable, so copies keep the
// message and drop the source.
impl Clone for AuthError {
    fn clone(&self) -> Self {
        match self {
            Self::Terminated => Self::Terminated,
            Self::Provider { message, source: _ } => Self::Provider {
                message: message.clone(),
                source: None,
            },
            Self::Store { message, source: _ } => Self::Store {
                message: message.clone(),
                source: None,
            },
            Self::Config { message } => Self::Config {
                message: message.clone(),
            },
            Self::Internal { message, source: _ } => Self::Internal {
                message: message.clone(),
                source: None,
            },
        }
    }
}

impl AuthError {
    /// Create a new provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new provider error with source
    pub fn provider_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new profile store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new profile store error with source
    pub fn store_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new internal error with source
    pub fn internal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if the manager loop is gone
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Check if this is a provider error
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }

    /// Check if this is a profile store error
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this is an internal error
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

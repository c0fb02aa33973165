//! Error types shared across the Scenaria simulation kernel.

use thiserror::Error;

/// Errors raised by the simulation kernel and its collaborators.
///
/// Normal negative results (an exhausted distribution, an undefined
/// distance, a backend call that completed but reported `success = false`)
/// are ordinary return values, never errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed or unsupported scenario configuration: a bad distribution
    /// element, an unknown coordinate tag, an invalid catalog entry.
    /// Fatal to the current sample/run; never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backend RPC channel itself failed (protocol fault), as opposed
    /// to a call that completed and reported a negative result.
    #[error("Backend communication error (code {code}): {message}")]
    BackendCommunication {
        /// Message reported by the backend or transport
        message: String,

        /// Backend fault code
        code: i64,
    },

    /// A status query named an entity the manager has no status for.
    #[error("No status available for entity: {0}")]
    EntityLookup(String),
}

impl SimError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a backend communication error.
    pub fn backend(message: impl Into<String>, code: i64) -> Self {
        Self::BackendCommunication {
            message: message.into(),
            code,
        }
    }

    /// Creates an entity lookup error.
    pub fn lookup(name: impl std::fmt::Display) -> Self {
        Self::EntityLookup(name.to_string())
    }

    /// True for errors that advisory checks may swallow and degrade to
    /// a plain negative answer.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::EntityLookup(_))
    }
}

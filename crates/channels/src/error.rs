use std::error::Error as StdError;

use crate::event::ChannelId;

/// Crate-wide result type for mirroring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared across the mirroring core and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A send/edit/delete call against the transport failed.
    #[error("{operation} to {destination} failed: {source}")]
    Transport {
        operation: &'static str,
        destination: ChannelId,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The raw transport event has no mirrorable counterpart.
    #[error("unrecognized event: {reason}")]
    Unrecognized { reason: String },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn transport(
        operation: &'static str,
        destination: ChannelId,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            operation,
            destination,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn unrecognized(reason: impl std::fmt::Display) -> Self {
        Self::Unrecognized {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this is a transport failure (recovered per destination).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

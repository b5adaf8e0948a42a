//! Error taxonomy shared by every Nimbus agent client.

use thiserror::Error;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the remote fabric agent or the client layer above it.
///
/// The agent is an opaque collaborator; everything it can signal is folded
/// into this taxonomy so that callers (and the retry loops in this crate)
/// can classify without knowing the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied malformed parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller supplied an unusable configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The resource group does not exist or is malformed.
    #[error("invalid group: {0}")]
    InvalidGroup(String),

    /// Requested remote object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflicting create.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency conflict: the caller's version of the object
    /// no longer matches the agent's current version.
    #[error("stale version: {0}")]
    StaleVersion(String),

    /// Certificate is past its validity window.
    #[error("certificate expired")]
    Expired,

    /// The agent does not implement the requested operation.
    #[error("operation not supported by agent")]
    NotSupported,

    /// The agent rejected the presented identity.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The agent cannot be reached. Returned to the caller so the embedding
    /// application decides whether to terminate.
    #[error("agent unavailable: {0}")]
    TransportUnavailable(String),

    /// A single RPC exceeded its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// True for optimistic-concurrency conflicts, the only error class the
    /// update executor retries.
    #[must_use]
    pub const fn is_stale_version(&self) -> bool {
        matches!(self, Self::StaleVersion(_))
    }

    /// True when a certificate is past its validity window.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// True when the agent does not implement the requested operation.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }

    /// True when the agent cannot be reached at all.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_))
    }

    /// True when the remote object was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

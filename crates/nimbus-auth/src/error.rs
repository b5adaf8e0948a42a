//! Authentication error types.

use thiserror::Error;

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// CSR generation failed. Fatal to login.
    #[error("CSR generation failed: {0}")]
    CsrGeneration(String),

    /// Certificate parsing failed.
    #[error("certificate parsing failed: {0}")]
    Parse(String),

    /// Persisting or loading the credential bundle failed.
    #[error("credential storage failed: {0}")]
    Storage(String),

    /// The login configuration is unusable.
    #[error("invalid login configuration: {0}")]
    InvalidConfiguration(String),

    /// No login has happened yet, so there is no retained configuration to
    /// re-login with.
    #[error("no retained login configuration")]
    NoLoginConfig,

    /// Error surfaced by the remote agent.
    #[error(transparent)]
    Rpc(#[from] nimbus_core::Error),
}

impl Error {
    /// True when the underlying agent error is a certificate expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Rpc(e) if e.is_expired())
    }

    /// True when the agent does not support the requested operation.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::Rpc(e) if e.is_not_supported())
    }
}

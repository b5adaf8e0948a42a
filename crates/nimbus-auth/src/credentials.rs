//! Credential bundle and login configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// How the client certificate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateType {
    /// Issued by the fabric agent's certificate authority in response to a
    /// CSR.
    CaSigned,
    /// Self-signed.
    SelfSigned,
}

/// The credential material persisted after a successful login or renewal.
///
/// Written to disk as JSON with owner-only permissions; the private key is
/// zeroized when the bundle is dropped and redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialBundle {
    /// PEM-encoded client certificate signed by the agent.
    pub client_certificate: String,
    /// PEM-encoded private key matching the client certificate.
    pub client_key: String,
    /// PEM-encoded certificate of the cloud's authority.
    pub cloud_certificate: String,
    /// How the client certificate was obtained.
    #[zeroize(skip)]
    pub certificate_type: CertificateType,
    /// Identity the certificate was issued for.
    #[zeroize(skip)]
    pub identity_name: String,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("client_certificate", &self.client_certificate)
            .field("client_key", &"[REDACTED]")
            .field("cloud_certificate", &self.cloud_certificate)
            .field("certificate_type", &self.certificate_type)
            .field("identity_name", &self.identity_name)
            .finish()
    }
}

/// Everything needed to log in, retained by the session for the lifetime of
/// the renewal loop so that re-login after expiry needs no caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Identity name presented to the agent.
    pub identity_name: String,
    /// Bootstrap token authorizing the initial login.
    pub token: String,
    /// PEM-encoded bootstrap certificate (the cloud authority).
    pub certificate: String,
    /// Fully qualified domain name of the fabric agent.
    pub cloud_fqdn: String,
    /// Overrides the session's credential file location when set.
    pub output_path: Option<PathBuf>,
}

impl LoginConfig {
    /// Validates the configuration before it is used for a login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when a required field is
    /// empty.
    pub fn validate(&self) -> Result<()> {
        if self.identity_name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "identity name cannot be empty".into(),
            ));
        }
        if self.token.is_empty() {
            return Err(Error::InvalidConfiguration(
                "bootstrap token cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// An identity presented to the authentication agent: a name plus either a
/// CSR (login) or a certificate.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Identity name.
    pub name: String,
    /// PEM-encoded CSR or certificate.
    pub certificate: String,
}

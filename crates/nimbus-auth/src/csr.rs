//! Client CSR generation and certificate window parsing.

use chrono::{DateTime, Utc};
use rcgen::{CertificateParams, DnType, KeyPair};

use crate::credentials::LoginConfig;
use crate::error::{Error, Result};

/// A freshly generated certificate signing request with its private key.
///
/// The key never leaves the client; only the CSR is submitted to the agent.
pub struct ClientCsr {
    /// PEM-encoded certificate signing request.
    pub csr_pem: String,
    /// PEM-encoded private key matching the CSR.
    pub key_pem: String,
}

/// Generates a CSR for the identity named in the login configuration,
/// backed by a fresh key pair.
///
/// # Errors
///
/// Returns [`Error::CsrGeneration`] when key or request generation fails.
/// CSR failure is fatal to login and propagates to the caller.
pub fn generate_client_csr(config: &LoginConfig) -> Result<ClientCsr> {
    csr_for_identity(&config.identity_name)
}

/// Generates a CSR for a bare identity name. Renewal uses this form, since
/// the bundle on disk carries the identity without a full login
/// configuration.
pub(crate) fn csr_for_identity(identity_name: &str) -> Result<ClientCsr> {
    let key_pair = KeyPair::generate()
        .map_err(|e| Error::CsrGeneration(format!("failed to generate key pair: {e}")))?;

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, identity_name);

    let csr = params
        .serialize_request(&key_pair)
        .map_err(|e| Error::CsrGeneration(format!("failed to serialize request: {e}")))?;
    let csr_pem = csr
        .pem()
        .map_err(|e| Error::CsrGeneration(format!("failed to encode request: {e}")))?;

    Ok(ClientCsr {
        csr_pem,
        key_pem: key_pair.serialize_pem(),
    })
}

/// Parses the validity window of a PEM-encoded certificate.
///
/// Recomputed from the active certificate every renewal cycle; never cached.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the input is not a valid certificate.
pub fn validity_window(cert_pem: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| Error::Parse(format!("failed to parse PEM: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
        .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
    let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

    Ok((not_before, not_after))
}

/// Generates a self-signed PEM certificate with an explicit validity window.
#[cfg(test)]
pub(crate) fn self_signed_cert(
    name: &str,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> (String, String) {
    let key_pair = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, name);
    params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before.timestamp()).unwrap();
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();

    let cert = params.self_signed(&key_pair).unwrap();
    (cert.pem(), key_pair.serialize_pem())
}

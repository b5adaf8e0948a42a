//! Certificate-based authentication for the Nimbus SDK.
//!
//! This crate owns the client side of the fabric agent's security model:
//!
//! - [`Session`]: login with a bootstrap token, exchange a CSR for a
//!   signed client certificate, and persist the resulting
//!   [`CredentialBundle`].
//! - [`CredentialStore`]: atomic, owner-only persistence of the bundle.
//! - Background renewal: a task started through
//!   [`Session::start_renewal`] renews the certificate once 30% of its
//!   validity window remains and re-logs-in when it has already expired.
//!
//! The transport to the agent is abstracted behind the
//! [`AuthenticationAgent`] and [`RenewalAgent`] traits, so the session
//! logic is independent of the wire protocol.

#![forbid(unsafe_code)]

pub mod credentials;
pub mod csr;
pub mod error;
pub mod renewal;
pub mod session;
pub mod store;

pub use credentials::{CertificateType, CredentialBundle, Identity, LoginConfig};
pub use csr::{ClientCsr, generate_client_csr, validity_window};
pub use error::{Error, Result};
pub use renewal::{
    RENEWAL_BACKOFF_FRACTION, RenewalHandle, RenewalOptions, RenewalState, VALIDITY_THRESHOLD,
    calculate_renewal, renew_required,
};
pub use session::{AuthenticationAgent, RenewalAgent, Session};
pub use store::CredentialStore;

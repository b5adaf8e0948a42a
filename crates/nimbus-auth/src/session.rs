//! The authenticated session.
//!
//! A [`Session`] owns the credential lifecycle against a fabric agent:
//! initial certificate-based login, persistence of the resulting bundle,
//! and the background renewal task that keeps the certificate fresh for
//! the lifetime of the process.

use std::sync::Arc;

use nimbus_core::with_deadline;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::credentials::{CertificateType, CredentialBundle, Identity, LoginConfig};
use crate::csr;
use crate::error::{Error, Result};
use crate::renewal::{self, RenewalHandle, RenewalOptions};
use crate::store::CredentialStore;

/// Performs the initial login exchange against the fabric agent.
///
/// The agent receives an identity carrying a CSR and answers with the
/// signed client certificate in PEM form.
pub trait AuthenticationAgent {
    /// Submits the identity and returns the signed client certificate.
    fn login(&self, identity: &Identity) -> impl Future<Output = nimbus_core::Result<String>> + Send;
}

/// Renews an existing client certificate.
///
/// The agent receives the currently held certificate as proof of identity
/// together with a CSR for the replacement, and answers with the new
/// certificate in PEM form. Agents that do not support renewal return
/// [`nimbus_core::Error::NotSupported`]; agents facing an expired
/// certificate return [`nimbus_core::Error::Expired`].
pub trait RenewalAgent {
    /// Exchanges the old certificate and a CSR for a renewed certificate.
    fn renew_certificate(
        &self,
        old_certificate: &str,
        csr: &str,
    ) -> impl Future<Output = nimbus_core::Result<String>> + Send;
}

/// An authenticated session against a fabric agent.
pub struct Session<A> {
    agent: A,
    store: CredentialStore,
    config: Mutex<Option<LoginConfig>>,
    last_bundle: Mutex<Option<CredentialBundle>>,
    renewal: Mutex<Option<RenewalHandle>>,
}

impl<A> Session<A>
where
    A: AuthenticationAgent + RenewalAgent + Send + Sync + 'static,
{
    /// Creates a session using the given agent and credential store.
    pub fn new(agent: A, store: CredentialStore) -> Arc<Self> {
        Arc::new(Self {
            agent,
            store,
            config: Mutex::new(None),
            last_bundle: Mutex::new(None),
            renewal: Mutex::new(None),
        })
    }

    /// Submits a raw identity to the agent.
    ///
    /// # Errors
    ///
    /// Agent failures, including [`nimbus_core::Error::AuthFailed`], pass
    /// through unchanged; a call outliving the system-wide RPC ceiling
    /// fails with [`nimbus_core::Error::DeadlineExceeded`].
    pub async fn login(&self, identity: &Identity) -> Result<String> {
        with_deadline(self.agent.login(identity))
            .await
            .map_err(Error::from)
    }

    /// Logs in with a full configuration: generates a fresh CSR, submits
    /// it, persists the resulting bundle, and retains the configuration
    /// for later re-login. When `enable_renewal` is set, the background
    /// renewal task is started as well.
    ///
    /// # Errors
    ///
    /// Validation, CSR generation, and agent failures all abort the login.
    /// A persistence failure after a successful exchange is also an error,
    /// but the bundle stays available through
    /// [`Session::current_credentials`] and can be re-persisted with
    /// [`Session::persist_credentials`].
    pub async fn login_with_config(
        self: &Arc<Self>,
        config: LoginConfig,
        enable_renewal: bool,
    ) -> Result<CredentialBundle> {
        config.validate()?;

        let client_csr = csr::generate_client_csr(&config)?;
        let identity = Identity {
            name: config.identity_name.clone(),
            certificate: client_csr.csr_pem.clone(),
        };

        debug!(identity = %config.identity_name, "logging in");
        let client_certificate = with_deadline(self.agent.login(&identity)).await?;

        let bundle = CredentialBundle {
            client_certificate,
            client_key: client_csr.key_pem,
            cloud_certificate: config.certificate.clone(),
            certificate_type: CertificateType::CaSigned,
            identity_name: config.identity_name.clone(),
        };
        *self.last_bundle.lock() = Some(bundle.clone());

        let store = self.store_for(&config);
        *self.config.lock() = Some(config);
        store.save(&bundle)?;

        info!(identity = %bundle.identity_name, "login complete");
        if enable_renewal {
            self.start_renewal();
        }
        Ok(bundle)
    }

    /// Starts the background renewal task, or returns the handle of the
    /// task already running. At most one task exists per session.
    pub fn start_renewal(self: &Arc<Self>) -> RenewalHandle {
        self.start_renewal_with(RenewalOptions::default())
    }

    pub(crate) fn start_renewal_with(self: &Arc<Self>, options: RenewalOptions) -> RenewalHandle {
        let mut guard = self.renewal.lock();
        if let Some(handle) = guard.as_ref() {
            debug!("renewal task already running");
            return handle.clone();
        }
        let handle = renewal::spawn_renewal(Arc::clone(self), options);
        *guard = Some(handle.clone());
        handle
    }

    /// Performs a single renewal attempt against the bundle on disk.
    ///
    /// Returns `Ok(false)` when the certificate is not yet inside its
    /// renewal threshold or the agent does not support renewal, and
    /// `Ok(true)` when a renewed bundle was persisted.
    ///
    /// # Errors
    ///
    /// Surfaces storage, parse, and agent errors, including
    /// [`nimbus_core::Error::Expired`] for certificates past their window.
    pub async fn renew_once(&self) -> Result<bool> {
        let store = self.active_store();
        let bundle = store.load()?;
        let (not_before, not_after) = csr::validity_window(&bundle.client_certificate)?;

        if !renewal::renew_required(not_before, not_after, chrono::Utc::now()) {
            return Ok(false);
        }

        let client_csr = csr::csr_for_identity(&bundle.identity_name)?;
        match with_deadline(
            self.agent
                .renew_certificate(&bundle.client_certificate, &client_csr.csr_pem),
        )
        .await
        {
            Ok(client_certificate) => {
                let renewed = CredentialBundle {
                    client_certificate,
                    client_key: client_csr.key_pem,
                    cloud_certificate: bundle.cloud_certificate.clone(),
                    certificate_type: bundle.certificate_type,
                    identity_name: bundle.identity_name.clone(),
                };
                *self.last_bundle.lock() = Some(renewed.clone());
                store.save(&renewed)?;
                info!(identity = %renewed.identity_name, "certificate renewed");
                Ok(true)
            }
            Err(e) if e.is_not_supported() => {
                debug!("agent does not support certificate renewal");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Logs in again with the retained configuration, without starting a
    /// second renewal task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLoginConfig`] when no configuration was retained
    /// by a previous [`Session::login_with_config`].
    pub async fn relogin(self: &Arc<Self>) -> Result<()> {
        let config = self.current_config().ok_or(Error::NoLoginConfig)?;
        self.login_with_config(config, false).await.map(|_| ())
    }

    /// The retained login configuration, if any.
    #[must_use]
    pub fn current_config(&self) -> Option<LoginConfig> {
        self.config.lock().clone()
    }

    /// Replaces the retained login configuration.
    pub fn update_config(&self, config: LoginConfig) {
        *self.config.lock() = Some(config);
    }

    /// The most recent credential bundle held in memory.
    #[must_use]
    pub fn current_credentials(&self) -> Option<CredentialBundle> {
        self.last_bundle.lock().clone()
    }

    /// Persists the in-memory bundle again, for recovery after a failed
    /// save during login or renewal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLoginConfig`] when no bundle is held, otherwise
    /// storage errors from the write.
    pub fn persist_credentials(&self) -> Result<()> {
        let bundle = self
            .current_credentials()
            .ok_or(Error::NoLoginConfig)?;
        self.active_store().save(&bundle)
    }

    /// The store the session currently reads and writes, honoring a
    /// configured output path override.
    pub(crate) fn active_store(&self) -> CredentialStore {
        match self.config.lock().as_ref() {
            Some(config) => self.store_for(config),
            None => self.store.clone(),
        }
    }

    fn store_for(&self, config: &LoginConfig) -> CredentialStore {
        config
            .output_path
            .as_ref()
            .map_or_else(|| self.store.clone(), CredentialStore::new)
    }
}

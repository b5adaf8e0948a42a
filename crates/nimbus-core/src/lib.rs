//! Shared foundations for the Nimbus SDK.
//!
//! Every Nimbus resource client talks to the same remote fabric agent and
//! shares three concerns, which live here:
//!
//! - [`error`] - the error taxonomy the agent can signal, with predicates
//!   for the classes that drive retry decisions
//! - [`endpoint`] - endpoint formatting and the system-wide RPC deadline
//! - [`update`] - the optimistic read-modify-write executor used by every
//!   mutating resource operation
//!
//! # Example
//!
//! ```
//! use nimbus_core::{RetryPolicy, VersionedStore, apply_update};
//!
//! struct Counter;
//!
//! impl VersionedStore for Counter {
//!     type Item = u64;
//!
//!     async fn fetch(&self, _group: &str, _name: &str) -> nimbus_core::Result<Option<u64>> {
//!         Ok(Some(1))
//!     }
//!
//!     async fn commit(&self, _group: &str, _name: &str, item: u64) -> nimbus_core::Result<u64> {
//!         Ok(item)
//!     }
//! }
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let updated = apply_update(&Counter, "group", "name", &RetryPolicy::default(), |v| Ok(v + 1))
//!     .await
//!     .unwrap();
//! assert_eq!(updated, 2);
//! # });
//! ```

#![forbid(unsafe_code)]

pub mod endpoint;
pub mod error;
pub mod update;

pub use endpoint::{AUTH_PORT, DEFAULT_RPC_TIMEOUT, SERVER_PORT, auth_endpoint, server_endpoint, with_deadline};
pub use error::{Error, Result};
pub use update::{RetryPolicy, VersionedStore, apply_update};

//! Agent endpoint formatting and RPC deadlines.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Port the fabric agent serves resource operations on.
pub const SERVER_PORT: u16 = 55000;

/// Port the fabric agent serves authentication on.
pub const AUTH_PORT: u16 = 65000;

/// System-wide ceiling for any single RPC.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Formats the resource endpoint for a server address, appending the
/// default port unless the address already carries one.
#[must_use]
pub fn server_endpoint(address: &str) -> String {
    if address.contains(':') {
        return address.to_string();
    }
    format!("{address}:{SERVER_PORT}")
}

/// Formats the authentication endpoint for a server address.
#[must_use]
pub fn auth_endpoint(address: &str) -> String {
    format!("{address}:{AUTH_PORT}")
}

/// Bounds an agent call by the system-wide RPC ceiling.
///
/// # Errors
///
/// Returns [`Error::DeadlineExceeded`] when the call outlives the ceiling.
pub async fn with_deadline<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(DEFAULT_RPC_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("fabric.local", "fabric.local:55000"; "bare fqdn gets port")]
    #[test_case("fabric.local:9000", "fabric.local:9000"; "explicit port kept")]
    #[test_case("10.0.0.5", "10.0.0.5:55000"; "bare address gets port")]
    fn server_endpoint_formatting(address: &str, expected: &str) {
        assert_eq!(server_endpoint(address), expected);
    }

    #[test]
    fn auth_endpoint_uses_auth_port() {
        assert_eq!(auth_endpoint("fabric.local"), "fabric.local:65000");
    }

    #[tokio::test]
    async fn with_deadline_passes_through_result() {
        let result = with_deadline(async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.ok(), Some(7));

        let result: Result<i32> =
            with_deadline(async { Err(Error::NotFound("vm-1".into())) }).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn with_deadline_times_out() {
        let result: Result<()> = with_deadline(async {
            tokio::time::sleep(DEFAULT_RPC_TIMEOUT * 2).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }
}

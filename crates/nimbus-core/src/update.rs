//! Optimistic read-modify-write against a versioned remote store.
//!
//! The fabric agent has no transactional API: every mutable object carries a
//! monotonically increasing version number and a write whose input version no
//! longer matches is rejected with [`Error::StaleVersion`]. [`apply_update`]
//! wraps a caller-supplied mutation around the Get/Write pair and retries
//! only on that conflict; everything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Retry behavior for optimistic updates.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed delay between attempts after a stale-version rejection.
    pub interval: Duration,
    /// Maximum number of write attempts (None = retry until success).
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: None,
        }
    }
}

/// A remote store of versioned objects addressed by group and name.
///
/// Implemented by resource clients; `fetch` and `commit` are single agent
/// round trips.
pub trait VersionedStore {
    /// The resource type held by the store.
    type Item;

    /// Reads the current state of the object, or `None` if it does not
    /// exist.
    fn fetch(
        &self,
        group: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Self::Item>>> + Send;

    /// Writes the object back. The agent rejects the write with
    /// [`Error::StaleVersion`] if the embedded version is no longer current.
    fn commit(
        &self,
        group: &str,
        name: &str,
        item: Self::Item,
    ) -> impl Future<Output = Result<Self::Item>> + Send;
}

/// Applies `mutate` to the current state of an object and writes it back,
/// retrying the whole read-modify-write cycle on stale-version rejections.
///
/// `mutate` must be a pure transformation of the fetched state; any error it
/// returns propagates without a retry. The sleeps between attempts are async,
/// so the returned future can be cancelled (dropped) or bounded with
/// `tokio::time::timeout` at any point.
///
/// # Errors
///
/// [`Error::NotFound`] if the object does not exist, the mutation's own
/// error, or any non-stale commit error, all on the first occurrence. With a
/// capped policy, the last [`Error::StaleVersion`] once the cap is reached.
pub async fn apply_update<S, F>(
    store: &S,
    group: &str,
    name: &str,
    policy: &RetryPolicy,
    mut mutate: F,
) -> Result<S::Item>
where
    S: VersionedStore + Sync,
    F: FnMut(S::Item) -> Result<S::Item>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let Some(current) = store.fetch(group, name).await? else {
            return Err(Error::NotFound(format!("{group}/{name}")));
        };

        let updated = mutate(current)?;

        match store.commit(group, name, updated).await {
            Ok(item) => return Ok(item),
            Err(err) if err.is_stale_version() => {
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(err);
                    }
                }
                debug!(group, name, attempt, "retrying update on stale version");
                tokio::time::sleep(policy.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Simulated versioned object store: rejects the first `reject` commits
    /// with a stale-version error and counts round trips.
    struct FlakyStore {
        item: Mutex<Option<u64>>,
        reject: u32,
        fetches: AtomicU32,
        commits: AtomicU32,
    }

    impl FlakyStore {
        fn new(item: Option<u64>, reject: u32) -> Self {
            Self {
                item: Mutex::new(item),
                reject,
                fetches: AtomicU32::new(0),
                commits: AtomicU32::new(0),
            }
        }
    }

    impl VersionedStore for FlakyStore {
        type Item = u64;

        async fn fetch(&self, _group: &str, _name: &str) -> Result<Option<u64>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(*self.item.lock().unwrap())
        }

        async fn commit(&self, _group: &str, name: &str, item: u64) -> Result<u64> {
            let n = self.commits.fetch_add(1, Ordering::SeqCst);
            if n < self.reject {
                return Err(Error::StaleVersion(name.to_string()));
            }
            *self.item.lock().unwrap() = Some(item);
            Ok(item)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(1),
            max_attempts: None,
        }
    }

    #[test]
    fn default_policy_matches_agent_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(100));
        assert!(policy.max_attempts.is_none());
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retry() {
        let store = FlakyStore::new(Some(1), 0);
        let result = apply_update(&store, "g", "vm", &fast_policy(), |v| Ok(v + 1)).await;

        assert_eq!(result.ok(), Some(2));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn converges_after_exactly_n_plus_one_round_trips() {
        let n = 4;
        let store = FlakyStore::new(Some(1), n);
        let result = apply_update(&store, "g", "vm", &fast_policy(), |v| Ok(v + 1)).await;

        assert_eq!(result.ok(), Some(2));
        assert_eq!(store.fetches.load(Ordering::SeqCst), n + 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), n + 1);
    }

    #[tokio::test]
    async fn missing_object_fails_not_found() {
        let store = FlakyStore::new(None, 0);
        let result = apply_update(&store, "g", "vm", &fast_policy(), Ok).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mutation_error_propagates_without_commit() {
        let store = FlakyStore::new(Some(1), 0);
        let result = apply_update(&store, "g", "vm", &fast_policy(), |_| {
            Err(Error::InvalidInput("bad disk uri".into()))
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_stale_commit_error_propagates_on_first_attempt() {
        struct RefusingStore;

        impl VersionedStore for RefusingStore {
            type Item = u64;

            async fn fetch(&self, _group: &str, _name: &str) -> Result<Option<u64>> {
                Ok(Some(1))
            }

            async fn commit(&self, _group: &str, _name: &str, _item: u64) -> Result<u64> {
                Err(Error::TransportUnavailable("connection refused".into()))
            }
        }

        let result = apply_update(&RefusingStore, "g", "vm", &fast_policy(), Ok).await;
        assert!(matches!(result, Err(Error::TransportUnavailable(_))));
    }

    #[tokio::test]
    async fn capped_policy_returns_last_stale_error() {
        let store = FlakyStore::new(Some(1), u32::MAX);
        let policy = RetryPolicy {
            interval: Duration::from_millis(1),
            max_attempts: Some(3),
        };
        let result = apply_update(&store, "g", "vm", &policy, Ok).await;

        assert!(matches!(result, Err(Error::StaleVersion(_))));
        assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_future_is_cancellable_by_deadline() {
        let store = FlakyStore::new(Some(1), u32::MAX);
        let policy = RetryPolicy {
            interval: Duration::from_millis(20),
            max_attempts: None,
        };

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            apply_update(&store, "g", "vm", &policy, Ok),
        )
        .await;

        // The unbounded retry loop is abandoned at the caller's deadline.
        assert!(result.is_err());
    }
}

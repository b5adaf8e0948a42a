//! Background certificate renewal.
//!
//! A single long-lived task watches the active certificate's validity
//! window, renews it once 30% of the window remains, and falls back to a
//! full re-login when the certificate has already expired. The task never
//! stops itself; it runs for the process lifetime unless stopped through
//! its [`RenewalHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::csr;
use crate::session::{AuthenticationAgent, RenewalAgent, Session};

/// Fraction of the validity window remaining at which renewal is attempted.
pub const VALIDITY_THRESHOLD: f64 = 0.30;

/// Fraction of the validity window waited between failed renewal attempts.
pub const RENEWAL_BACKOFF_FRACTION: f64 = 0.02;

/// Upper bound on the random jitter added to the backoff, as a fraction of
/// the backoff itself. Keeps many clients renewing against the same agent
/// from retrying in lockstep.
const JITTER_FRACTION: f64 = 0.25;

/// Options for the renewal task.
#[derive(Debug, Clone)]
pub struct RenewalOptions {
    /// Delay before the first cycle, so a burst of simultaneous client
    /// startups does not turn into a renewal storm.
    pub settle_delay: StdDuration,
}

impl Default for RenewalOptions {
    fn default() -> Self {
        Self {
            settle_delay: StdDuration::from_secs(5),
        }
    }
}

/// State of the renewal task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalState {
    /// Not yet past the settling delay.
    Idle,
    /// Sleeping until the renewal threshold.
    Waiting,
    /// A renewal attempt is in flight.
    Renewing,
    /// The certificate expired; re-login in flight.
    ReLoggingIn,
    /// The last attempt failed; backing off before retrying.
    Failed,
}

/// Atomic wrapper for the renewal state.
#[derive(Debug)]
pub struct AtomicRenewalState(AtomicU32);

impl AtomicRenewalState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: RenewalState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> RenewalState {
        match self.0.load(Ordering::SeqCst) {
            0 => RenewalState::Idle,
            1 => RenewalState::Waiting,
            2 => RenewalState::Renewing,
            3 => RenewalState::ReLoggingIn,
            _ => RenewalState::Failed,
        }
    }

    /// Store a new state.
    pub fn store(&self, state: RenewalState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

/// Handle for observing and stopping the renewal task.
#[derive(Debug, Clone)]
pub struct RenewalHandle {
    pub(crate) state: Arc<AtomicRenewalState>,
    pub(crate) running: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl RenewalHandle {
    /// Current state of the task.
    #[must_use]
    pub fn state(&self) -> RenewalState {
        self.state.load()
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the task at its next cancellation point.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Computes when to renew relative to `now`.
///
/// Returns the sleep until the renewal threshold (negative when renewal is
/// already due; callers clamp to zero) and the backoff between failed
/// attempts.
#[must_use]
pub fn calculate_renewal(
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (Duration, Duration) {
    let validity = not_after - not_before;
    let backoff = fraction_of(validity, RENEWAL_BACKOFF_FRACTION);
    let threshold = fraction_of(validity, VALIDITY_THRESHOLD);

    ((not_after - threshold) - now, backoff)
}

/// True when the certificate is inside its renewal threshold.
#[must_use]
pub fn renew_required(
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    calculate_renewal(not_before, not_after, now).0 <= Duration::zero()
}

fn fraction_of(duration: Duration, fraction: f64) -> Duration {
    let nanos = duration.num_nanoseconds().unwrap_or(i64::MAX) as f64;
    Duration::nanoseconds((nanos * fraction) as i64)
}

/// Adds random jitter of up to [`JITTER_FRACTION`] of the backoff.
fn with_jitter(backoff: StdDuration) -> StdDuration {
    let jitter = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
    backoff + backoff.mul_f64(jitter)
}

/// Sleeps for `duration`, returning early with `true` when shutdown is
/// signalled.
async fn wait_or_shutdown(duration: StdDuration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = sleep(duration) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Sender gone means nothing can stop us later; treat as shutdown.
            Err(_) => true,
        },
    }
}

/// Spawns the renewal task for a session. Called at most once per session
/// through [`Session::start_renewal`].
pub(crate) fn spawn_renewal<A>(session: Arc<Session<A>>, options: RenewalOptions) -> RenewalHandle
where
    A: AuthenticationAgent + RenewalAgent + Send + Sync + 'static,
{
    let state = Arc::new(AtomicRenewalState::new(RenewalState::Idle));
    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = RenewalHandle {
        state: Arc::clone(&state),
        running: Arc::clone(&running),
        shutdown: shutdown_tx,
    };

    tokio::spawn(async move {
        if wait_or_shutdown(options.settle_delay, &mut shutdown_rx).await {
            running.store(false, Ordering::SeqCst);
            return;
        }

        let mut attempts: u32 = 0;
        loop {
            state.store(RenewalState::Waiting);

            let bundle = match session.active_store().load() {
                Ok(bundle) => bundle,
                Err(e) => {
                    error!(error = %e, "failed to load credential bundle, stopping renewal");
                    state.store(RenewalState::Failed);
                    break;
                }
            };
            let (not_before, not_after) = match csr::validity_window(&bundle.client_certificate)
            {
                Ok(window) => window,
                Err(e) => {
                    error!(error = %e, "failed to parse active certificate, stopping renewal");
                    state.store(RenewalState::Failed);
                    break;
                }
            };

            let (sleep_for, backoff) = calculate_renewal(not_before, not_after, Utc::now());
            let sleep_for = sleep_for.to_std().unwrap_or(StdDuration::ZERO);
            let backoff = backoff.to_std().unwrap_or(StdDuration::from_secs(1));

            info!(sleep_secs = sleep_for.as_secs(), "waiting to renew certificate");
            if wait_or_shutdown(sleep_for, &mut shutdown_rx).await {
                break;
            }

            state.store(RenewalState::Renewing);
            debug!("attempting certificate renewal");
            match session.renew_once().await {
                Ok(true) => {
                    attempts = 0;
                    info!("certificate renewal complete");
                    continue;
                }
                Ok(false) => {
                    // Agent does not support renewal (or the window moved);
                    // proceed as if nothing changed, but do not spin.
                    debug!("renewal skipped");
                    if wait_or_shutdown(backoff, &mut shutdown_rx).await {
                        break;
                    }
                    continue;
                }
                Err(e) if e.is_expired() => {
                    state.store(RenewalState::ReLoggingIn);
                    warn!(error = %e, "certificate expired, attempting re-login");
                    match session.relogin().await {
                        Ok(()) => {
                            attempts = 0;
                            info!("re-login successful");
                            continue;
                        }
                        Err(e) => error!(error = %e, "re-login failed"),
                    }
                }
                Err(e) => {
                    error!(
                        error = %e,
                        expiry = %not_after,
                        "failed to renew certificate"
                    );
                }
            }

            attempts += 1;
            state.store(RenewalState::Failed);
            warn!(attempts, "backing off before next renewal attempt");
            if wait_or_shutdown(with_jitter(backoff), &mut shutdown_rx).await {
                break;
            }
        }

        running.store(false, Ordering::SeqCst);
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn renewal_due_at_thirty_percent_remaining() {
        let now = Utc::now();
        let (sleep_for, backoff) =
            calculate_renewal(now - Duration::seconds(10), now + Duration::seconds(10), now);

        assert_eq!(sleep_for, Duration::seconds(4));
        assert_eq!(backoff, Duration::milliseconds(400));
    }

    #[test]
    fn expired_window_yields_negative_sleep() {
        let now = Utc::now();
        let (sleep_for, backoff) = calculate_renewal(
            now - Duration::seconds(20),
            now - Duration::seconds(10),
            now,
        );

        assert_eq!(sleep_for, Duration::seconds(-13));
        assert_eq!(backoff, Duration::milliseconds(200));
    }

    #[test]
    fn future_window_sleeps_past_not_before() {
        let now = Utc::now();
        let (sleep_for, backoff) = calculate_renewal(
            now + Duration::seconds(10),
            now + Duration::seconds(30),
            now,
        );

        assert_eq!(sleep_for, Duration::seconds(24));
        assert_eq!(backoff, Duration::milliseconds(400));
    }

    #[test_case(-10, 10, true; "past threshold")]
    #[test_case(-20, -10, true; "already expired")]
    #[test_case(-1, 100, false; "fresh certificate")]
    fn renew_required_cases(before_offset: i64, after_offset: i64, expected: bool) {
        let now = Utc::now();
        let required = renew_required(
            now + Duration::seconds(before_offset),
            now + Duration::seconds(after_offset),
            now,
        );
        assert_eq!(required, expected);
    }

    #[test]
    fn jitter_is_bounded() {
        let backoff = StdDuration::from_millis(400);
        for _ in 0..100 {
            let jittered = with_jitter(backoff);
            assert!(jittered >= backoff);
            assert!(jittered <= backoff + backoff.mul_f64(JITTER_FRACTION));
        }
    }

    #[test]
    fn atomic_state_round_trips_all_states() {
        let state = AtomicRenewalState::new(RenewalState::Idle);
        for s in [
            RenewalState::Waiting,
            RenewalState::Renewing,
            RenewalState::ReLoggingIn,
            RenewalState::Failed,
            RenewalState::Idle,
        ] {
            state.store(s);
            assert_eq!(state.load(), s);
        }
    }

    #[test]
    fn default_options_settle_five_seconds() {
        assert_eq!(
            RenewalOptions::default().settle_delay,
            StdDuration::from_secs(5)
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The backoff is always 2% of the validity window.
            #[test]
            fn backoff_is_two_percent_of_validity(validity_secs in 1i64..=10_000_000) {
                let now = Utc::now();
                let (_, backoff) = calculate_renewal(
                    now,
                    now + Duration::seconds(validity_secs),
                    now,
                );
                let expected_ms = validity_secs * 1000 / 50;
                let got_ms = backoff.num_milliseconds();
                prop_assert!((got_ms - expected_ms).abs() <= 1);
            }

            /// The sleep shrinks exactly as `now` advances.
            #[test]
            fn sleep_is_monotonic_in_now(advance_secs in 0i64..=1_000_000) {
                let now = Utc::now();
                let not_before = now - Duration::seconds(100);
                let not_after = now + Duration::seconds(1_000_000);

                let (base, _) = calculate_renewal(not_before, not_after, now);
                let (later, _) = calculate_renewal(
                    not_before,
                    not_after,
                    now + Duration::seconds(advance_secs),
                );
                prop_assert_eq!(base - later, Duration::seconds(advance_secs));
            }
        }
    }
}

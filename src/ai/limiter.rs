//! Remote Quota Rate Limiting
//!
//! Tracks a one-minute accounting window of requests and tokens against a
//! remote service's published RPM/TPM quotas and blocks the caller before a
//! request would exceed either. The window resets wholesale at rollover
//! rather than as a continuously sliding log, mirroring how the quotas are
//! enforced upstream and keeping the state a single pair of counters.
//!
//! One limiter instance guards one remote service and is owned by the batch
//! driver that uses it. It is not meant to be shared between workers; a
//! parallel deployment needs one limiter per worker with quotas divided
//! between them so the fleet stays under the service's true limit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::constants::limits;

// =============================================================================
// Clock
// =============================================================================

/// Injectable time source so tests can simulate window rollover without
/// real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time with tokio sleeps.
#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// =============================================================================
// Rate Window
// =============================================================================

/// One minute of quota accounting. Owned exclusively by a [`RateLimiter`];
/// counters only grow within a window and reset together at rollover.
#[derive(Debug, Clone)]
pub struct RateWindow {
    pub window_start: Instant,
    pub requests_used: u32,
    pub tokens_used: usize,
}

/// A single request alone exceeds the safety ceiling. Waiting cannot fix
/// this, so the caller must surface "prompt too large" instead of retrying
/// the request verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedRequest {
    pub estimated_tokens: usize,
    pub ceiling: usize,
}

impl std::fmt::Display for OversizedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "request of {} tokens exceeds the single-request ceiling of {}",
            self.estimated_tokens, self.ceiling
        )
    }
}

impl std::error::Error for OversizedRequest {}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Blocks the caller before a request would exceed the remote RPM or TPM
/// quota.
pub struct RateLimiter {
    rpm_limit: u32,
    tpm_limit: usize,
    /// Output tokens reserved on top of the prompt estimate when projecting
    /// window usage
    reserved_output_tokens: usize,
    ceiling: usize,
    window: RateWindow,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rpm_limit", &self.rpm_limit)
            .field("tpm_limit", &self.tpm_limit)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(rpm_limit: u32, tpm_limit: usize, reserved_output_tokens: usize) -> Self {
        Self::with_clock(
            rpm_limit,
            tpm_limit,
            reserved_output_tokens,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        rpm_limit: u32,
        tpm_limit: usize,
        reserved_output_tokens: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ceiling = (tpm_limit as f64 * limits::SINGLE_REQUEST_TPM_FRACTION) as usize;
        let window = RateWindow {
            window_start: clock.now(),
            requests_used: 0,
            tokens_used: 0,
        };
        Self {
            rpm_limit,
            tpm_limit,
            reserved_output_tokens,
            ceiling,
            window,
            clock,
        }
    }

    /// Largest prompt a single request may carry.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Current window state, for logging and inspection.
    pub fn window(&self) -> &RateWindow {
        &self.window
    }

    /// Admit one request of `estimated_tokens`, sleeping through window
    /// rollover when either quota would be exceeded. Never fails for a
    /// transient condition; the only error is a request that is too large
    /// to ever fit.
    pub async fn admit(&mut self, estimated_tokens: usize) -> Result<(), OversizedRequest> {
        self.roll_if_expired();

        if estimated_tokens > self.ceiling {
            return Err(OversizedRequest {
                estimated_tokens,
                ceiling: self.ceiling,
            });
        }

        if self.window.requests_used >= self.rpm_limit {
            info!(
                requests = self.window.requests_used,
                rpm = self.rpm_limit,
                "request quota reached, waiting for window rollover"
            );
            self.wait_for_rollover().await;
        }

        let projected = self.window.tokens_used + estimated_tokens + self.reserved_output_tokens;
        if projected > self.tpm_limit {
            info!(
                projected,
                tpm = self.tpm_limit,
                "token quota would be exceeded, waiting for window rollover"
            );
            self.wait_for_rollover().await;
        }

        Ok(())
    }

    /// Record a call that actually reached the network. `actual_tokens` is
    /// prompt plus completion, as reported by the service or estimated from
    /// the response.
    pub fn record(&mut self, actual_tokens: usize) {
        self.window.requests_used += 1;
        self.window.tokens_used += actual_tokens;
        debug!(
            requests = self.window.requests_used,
            tokens = self.window.tokens_used,
            "window usage"
        );
    }

    /// Reset the window immediately. Used when the remote service reports a
    /// quota error: its accounting is authoritative over ours.
    pub fn reset_window(&mut self) {
        self.window = RateWindow {
            window_start: self.clock.now(),
            requests_used: 0,
            tokens_used: 0,
        };
    }

    fn roll_if_expired(&mut self) {
        let now = self.clock.now();
        let elapsed = now.duration_since(self.window.window_start);
        if elapsed >= Duration::from_secs(limits::WINDOW_SECS) {
            debug!(
                requests = self.window.requests_used,
                tokens = self.window.tokens_used,
                "window expired, resetting counters"
            );
            self.window = RateWindow {
                window_start: now,
                requests_used: 0,
                tokens_used: 0,
            };
        }
    }

    async fn wait_for_rollover(&mut self) {
        let elapsed = self.clock.now().duration_since(self.window.window_start);
        let window = Duration::from_secs(limits::WINDOW_SECS)
            + Duration::from_millis(limits::ROLLOVER_SLACK_MS);
        if let Some(remaining) = window.checked_sub(elapsed) {
            self.clock.sleep(remaining).await;
        }
        self.reset_window();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Deterministic clock: `sleep` advances simulated time instantly and
    /// records the requested duration.
    struct MockClock {
        base: Instant,
        offset: Mutex<Duration>,
        slept: Mutex<Vec<Duration>>,
    }

    impl MockClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
                slept: Mutex::new(Vec::new()),
            })
        }

        fn advance(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
        }

        fn slept(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
            self.advance(duration);
        }
    }

    fn limiter_with_clock(rpm: u32, tpm: usize, reserved: usize) -> (RateLimiter, Arc<MockClock>) {
        let clock = MockClock::new();
        let limiter = RateLimiter::with_clock(rpm, tpm, reserved, clock.clone());
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_admit_within_quota_does_not_sleep() {
        let (mut limiter, clock) = limiter_with_clock(30, 6000, 768);
        limiter.admit(1000).await.unwrap();
        limiter.record(1200);
        limiter.admit(1000).await.unwrap();
        assert!(clock.slept().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_request_fails_fast() {
        let (mut limiter, clock) = limiter_with_clock(30, 6000, 768);
        let err = limiter.admit(5500).await.unwrap_err();
        assert_eq!(err.ceiling, 5400);
        assert_eq!(err.estimated_tokens, 5500);
        // No amount of waiting fixes an oversized request
        assert!(clock.slept().is_empty());
    }

    #[tokio::test]
    async fn test_thirty_first_request_blocks_until_rollover() {
        let (mut limiter, clock) = limiter_with_clock(30, 1_000_000, 0);

        for _ in 0..30 {
            limiter.admit(10).await.unwrap();
            limiter.record(10);
        }
        assert!(clock.slept().is_empty());

        clock.advance(Duration::from_secs(20));
        limiter.admit(10).await.unwrap();

        let slept = clock.slept();
        assert_eq!(slept.len(), 1);
        // 60.1s window minus the 20s already elapsed
        assert_eq!(slept[0], Duration::from_millis(40_100));
        // Counters rolled with the window; the admitted call proceeds fresh
        assert_eq!(limiter.window().requests_used, 0);
        assert_eq!(limiter.window().tokens_used, 0);
    }

    #[tokio::test]
    async fn test_token_projection_blocks_before_quota_is_hit() {
        let (mut limiter, clock) = limiter_with_clock(100, 6000, 768);

        limiter.admit(2500).await.unwrap();
        limiter.record(3000);
        // 3000 used + 2500 estimated + 768 reserved > 6000
        limiter.admit(2500).await.unwrap();

        assert_eq!(clock.slept().len(), 1);
        assert_eq!(limiter.window().tokens_used, 0);
    }

    #[tokio::test]
    async fn test_tokens_used_never_exceeds_tpm_within_a_window() {
        let (mut limiter, _clock) = limiter_with_clock(100, 6000, 500);

        for _ in 0..10 {
            limiter.admit(1500).await.unwrap();
            limiter.record(1800);
            // Admission projected usage + estimate + reserve against the
            // quota, so recorded usage stays under it across any sequence
            assert!(limiter.window().tokens_used <= 6000);
        }
    }

    #[tokio::test]
    async fn test_window_resets_exactly_once_per_boundary() {
        let (mut limiter, clock) = limiter_with_clock(30, 6000, 0);

        limiter.admit(100).await.unwrap();
        limiter.record(100);
        let first_start = limiter.window().window_start;

        // Crossing the boundary resets once
        clock.advance(Duration::from_secs(61));
        limiter.admit(100).await.unwrap();
        let second_start = limiter.window().window_start;
        assert_ne!(first_start, second_start);
        assert_eq!(limiter.window().tokens_used, 0);

        // A later admit inside the same window must not reset again
        limiter.record(100);
        clock.advance(Duration::from_secs(30));
        limiter.admit(100).await.unwrap();
        assert_eq!(limiter.window().window_start, second_start);
        assert_eq!(limiter.window().tokens_used, 100);
    }

    #[tokio::test]
    async fn test_reset_window_clears_counters() {
        let (mut limiter, _clock) = limiter_with_clock(30, 6000, 0);
        limiter.admit(100).await.unwrap();
        limiter.record(100);
        limiter.reset_window();
        assert_eq!(limiter.window().requests_used, 0);
        assert_eq!(limiter.window().tokens_used, 0);
    }

    #[tokio::test]
    async fn test_counters_grow_monotonically_within_window() {
        let (mut limiter, _clock) = limiter_with_clock(30, 100_000, 0);
        let mut last_tokens = 0;
        for i in 1..=5 {
            limiter.admit(100).await.unwrap();
            limiter.record(100);
            assert_eq!(limiter.window().requests_used, i);
            assert!(limiter.window().tokens_used > last_tokens);
            last_tokens = limiter.window().tokens_used;
        }
    }
}

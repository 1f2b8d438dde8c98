//! Round-trip and one-way latency from ping/pong.
//!
//! The client stamps each ping with its clock (`t0`); the server echoes the
//! stamp back in the pong. When the pong arrives at `t1`:
//!
//! ```text
//! rtt     = t1 - t0
//! latency = rtt / 2
//! ```
//!
//! The tracker is written by the receive task and read by anyone (the
//! writer uses it for [`SendDelay::MeasuredLatency`](crate::SendDelay)),
//! so its state lives in atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds.
///
/// Injectable so tests can control time.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// One completed ping/pong measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    /// Round-trip time in milliseconds.
    pub rtt_millis: i64,
    /// Estimated one-way latency (`rtt / 2`).
    pub latency_millis: i64,
}

/// A snapshot of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyState {
    pub last_rtt_millis: Option<i64>,
    pub last_latency_millis: Option<i64>,
    pub last_ping_sent_at_millis: Option<i64>,
}

/// Marks an atomic slot that has never been written.
const UNSET: i64 = i64::MIN;

fn read(slot: &AtomicI64) -> Option<i64> {
    match slot.load(Ordering::Acquire) {
        UNSET => None,
        v => Some(v),
    }
}

/// Records ping send times and computes latency from pongs.
pub struct LatencyTracker {
    clock: Arc<dyn Clock>,
    rtt: AtomicI64,
    latency: AtomicI64,
    sent_at: AtomicI64,
}

impl LatencyTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rtt: AtomicI64::new(UNSET),
            latency: AtomicI64::new(UNSET),
            sent_at: AtomicI64::new(UNSET),
        }
    }

    /// Reads the clock for a new ping and remembers it as the last send time.
    pub fn stamp_ping(&self) -> i64 {
        let now = self.clock.now_millis();
        self.sent_at.store(now, Ordering::Release);
        now
    }

    /// Computes and stores a sample for a pong carrying `t0`.
    ///
    /// A `t0` in the future (clock stepped backwards, or a bogus echo)
    /// yields an RTT of 0 rather than a negative latency.
    pub fn record_pong(&self, t0: i64) -> LatencySample {
        let now = self.clock.now_millis();
        let rtt_millis = now.saturating_sub(t0).max(0);
        let sample = LatencySample {
            rtt_millis,
            latency_millis: rtt_millis / 2,
        };
        self.rtt.store(sample.rtt_millis, Ordering::Release);
        self.latency.store(sample.latency_millis, Ordering::Release);
        tracing::debug!(
            rtt_ms = sample.rtt_millis,
            latency_ms = sample.latency_millis,
            "pong"
        );
        sample
    }

    /// Current state.
    pub fn snapshot(&self) -> LatencyState {
        LatencyState {
            last_rtt_millis: read(&self.rtt),
            last_latency_millis: read(&self.latency),
            last_ping_sent_at_millis: read(&self.sent_at),
        }
    }

    /// Last one-way latency, or zero before the first sample.
    pub fn current_latency(&self) -> Duration {
        read(&self.latency)
            .map(|ms| Duration::from_millis(ms.max(0) as u64))
            .unwrap_or(Duration::ZERO)
    }

    /// Current time on the tracker's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }
}

impl std::fmt::Debug for LatencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyTracker")
            .field("state", &self.snapshot())
            .finish()
    }
}

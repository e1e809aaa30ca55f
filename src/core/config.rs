/*!
 * Runtime Configuration
 *
 * Tuning knobs for frames, joins and clocks.
 *
 * Environment variables (read by `Config::from_env`):
 * - PROCTHREAD_MAX_FRAME_BYTES: largest accepted frame payload
 * - PROCTHREAD_JOIN_POLL_MS: blocking-join re-check interval
 * - PROCTHREAD_STALL_MS: how long a committed non-blocking receive waits on
 *   a silent sender
 * - PROCTHREAD_CLOCK: `monotonic` (default) or `realtime`
 */

use super::limits::{DEFAULT_JOIN_POLL_INTERVAL, DEFAULT_MAX_FRAME_BYTES, DEFAULT_STALL_TIMEOUT};
use crate::time::{ClockSource, SystemClock};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;
use tracing::warn;

pub const ENV_MAX_FRAME_BYTES: &str = "PROCTHREAD_MAX_FRAME_BYTES";
pub const ENV_JOIN_POLL_MS: &str = "PROCTHREAD_JOIN_POLL_MS";
pub const ENV_STALL_MS: &str = "PROCTHREAD_STALL_MS";
pub const ENV_CLOCK: &str = "PROCTHREAD_CLOCK";

/// Configuration shared by threads and channels
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Frames with a larger payload are rejected on both send and receive
    pub max_frame_bytes: usize,

    /// Upper bound on how long a blocking join sleeps on the result stream
    /// between process checks
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub join_poll_interval: Duration,

    /// Longest a non-blocking receive waits for a sender that is mid-frame
    /// and has stopped making progress
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub stall_timeout: Duration,

    /// Host clock behind `system_clock()`; `PROCTHREAD_CLOCK` also selects
    /// the clock of `time::timestamp()`
    pub clock: ClockSource,
}

impl Config {
    pub fn new() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            join_poll_interval: DEFAULT_JOIN_POLL_INTERVAL,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            clock: ClockSource::Monotonic,
        }
    }

    /// Small frames and fast polling, for tests
    pub fn testing() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
            join_poll_interval: Duration::from_millis(1),
            stall_timeout: Duration::from_millis(100),
            clock: ClockSource::Monotonic,
        }
    }

    /// Defaults overridden by any valid environment variables
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Some(bytes) = env_parse::<usize>(ENV_MAX_FRAME_BYTES) {
            if bytes > 0 {
                config.max_frame_bytes = bytes;
            } else {
                warn!(var = ENV_MAX_FRAME_BYTES, "Ignoring zero frame limit");
            }
        }

        if let Some(ms) = env_parse::<u64>(ENV_JOIN_POLL_MS) {
            config.join_poll_interval = Duration::from_millis(ms.max(1));
        }

        if let Some(ms) = env_parse::<u64>(ENV_STALL_MS) {
            config.stall_timeout = Duration::from_millis(ms.max(1));
        }

        if let Some(source) = clock_from_env() {
            config.clock = source;
        }

        config
    }

    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    pub fn with_join_poll_interval(mut self, interval: Duration) -> Self {
        self.join_poll_interval = interval;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: ClockSource) -> Self {
        self.clock = clock;
        self
    }

    /// Host clock for the configured source
    pub fn system_clock(&self) -> SystemClock {
        SystemClock::new(self.clock)
    }
}

/// Clock source named by `PROCTHREAD_CLOCK`, if set and valid
pub(crate) fn clock_from_env() -> Option<ClockSource> {
    let raw = std::env::var(ENV_CLOCK).ok()?;
    match raw.parse::<ClockSource>() {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(var = ENV_CLOCK, value = %raw, error = %e, "Ignoring clock setting");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(var, value = %raw, error = %e, "Ignoring unparsable setting");
            None
        }
    }
}

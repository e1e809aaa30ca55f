/*!
 * Causal Timestamps
 *
 * Totally ordered, serializable timestamps for ordering events reported by
 * independent processes on the same host.
 *
 * The clock is an explicit `Clock` value so tests can drive time by hand;
 * `timestamp()` is the shortcut that reads the host clock.
 */

use crate::core::config::clock_from_env;
use crate::core::serialization::{bincode, CodecResult};
use nix::time::{clock_gettime, ClockId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time as seen by one process
///
/// Ordered by nanoseconds first and by originating pid second, so two
/// processes sampling the same nanosecond still get a strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    nanos: u64,
    origin: u32,
}

impl Timestamp {
    pub const fn from_parts(nanos: u64, origin: u32) -> Self {
        Self { nanos, origin }
    }

    /// Nanoseconds since the clock's epoch
    #[inline]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Pid of the process that took the sample
    #[inline]
    pub const fn origin(&self) -> u32 {
        self.origin
    }

    #[inline]
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.nanos)
    }

    /// Time between `earlier` and `self`, zero if `earlier` is later
    pub fn saturating_since(&self, earlier: &Timestamp) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    /// Opaque external form
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        bincode::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        bincode::from_slice(bytes)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09}@{}",
            self.nanos / NANOS_PER_SEC,
            self.nanos % NANOS_PER_SEC,
            self.origin
        )
    }
}

/// Which host clock a `SystemClock` samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// CLOCK_MONOTONIC: host-wide, never steps backwards
    #[default]
    Monotonic,
    /// CLOCK_REALTIME: wall-clock time, may step under NTP
    Realtime,
}

impl ClockSource {
    fn clock_id(self) -> ClockId {
        match self {
            ClockSource::Monotonic => ClockId::CLOCK_MONOTONIC,
            ClockSource::Realtime => ClockId::CLOCK_REALTIME,
        }
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockSource::Monotonic => f.write_str("monotonic"),
            ClockSource::Realtime => f.write_str("realtime"),
        }
    }
}

impl FromStr for ClockSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monotonic" => Ok(ClockSource::Monotonic),
            "realtime" | "wall" => Ok(ClockSource::Realtime),
            other => Err(format!("unknown clock source '{}'", other)),
        }
    }
}

/// Source of timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Host clock
///
/// Both sources are shared by every process on the host, which is what makes
/// timestamps from different children comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    source: ClockSource,
}

impl SystemClock {
    pub const fn new(source: ClockSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = match clock_gettime(self.source.clock_id()) {
            Ok(spec) => (spec.tv_sec() as u64)
                .saturating_mul(NANOS_PER_SEC)
                .saturating_add(spec.tv_nsec() as u64),
            // clock_gettime only fails for unsupported clock ids
            Err(_) => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0),
        };
        // Read per call: a forked child must stamp its own pid
        Timestamp::from_parts(nanos, std::process::id())
    }
}

/// Hand-driven clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    origin: u32,
}

impl ManualClock {
    pub fn new(start: Duration, origin: u32) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos() as u64),
            origin,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_parts(self.nanos.load(Ordering::SeqCst), self.origin)
    }
}

/// Clock behind `timestamp()`: `PROCTHREAD_CLOCK` if set, monotonic otherwise
///
/// Read once per process image; children forked later inherit the choice.
pub fn default_clock() -> SystemClock {
    static SOURCE: OnceLock<ClockSource> = OnceLock::new();
    SystemClock::new(*SOURCE.get_or_init(|| clock_from_env().unwrap_or_default()))
}

/// Sample the default host clock
pub fn timestamp() -> Timestamp {
    default_clock().now()
}

/// Sample the default host clock and return its external form
pub fn now_serialized() -> CodecResult<Vec<u8>> {
    timestamp().to_bytes()
}

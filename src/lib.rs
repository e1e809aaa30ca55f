/*!
 * procthread
 *
 * Thread-style concurrency over OS processes: spawn a closure in a forked
 * child, join it, and read back its exit status and serialized return value.
 * Children and parents exchange values through framed channels and compare
 * events with process-tagged timestamps.
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod process;
pub mod time;

// Re-exports
pub use crate::core::{
    Bincode, ChildFailure, Codec, CodecError, Config, Error, Json, Result, TransportError,
    UsageError, Value,
};
pub use ipc::{Channel, ChannelId};
pub use monitoring::{init_test_tracing, init_tracing};
pub use process::{spawn, spawn_with, Invocation, Outcome, TaskRegistry, Thread, ThreadBuilder};
pub use time::{default_clock, timestamp, Clock, ClockSource, ManualClock, SystemClock, Timestamp};

/*!
 * Limits and Constants
 *
 * Centralized location for wire-format constants, exit-code conventions and
 * default tuning values.
 */

use std::time::Duration;

// =============================================================================
// FRAMING
// =============================================================================

/// Width of the little-endian length prefix in front of every frame
pub const FRAME_HEADER_SIZE: usize = std::mem::size_of::<u64>();

/// Default upper bound on a single frame payload (256MB)
/// Guards against allocating on a corrupt length prefix
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Stack buffer size used when draining a result stream
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

// =============================================================================
// EXIT CODES
// =============================================================================

/// Callable returned normally and its result frame was written
pub const EXIT_SUCCESS: i32 = 0;

/// Callable returned an error (or a named task could not be resolved)
pub const EXIT_FAILED: i32 = 1;

/// Report could not be encoded or written (BSD EX_SOFTWARE)
pub const EXIT_REPORT_UNDELIVERED: i32 = 70;

/// Callable panicked; matches the status of a panicking Rust main
pub const EXIT_PANICKED: i32 = 101;

/// Offset added to a signal number when the child was killed by a signal
pub const SIGNAL_EXIT_BASE: i32 = 128;

// =============================================================================
// JOIN
// =============================================================================

/// How long a blocking join waits on the result stream before re-checking
/// the child with a non-blocking waitpid
pub const DEFAULT_JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a non-blocking receive that has committed to a large frame waits
/// for the sender to make progress before giving the frame up as truncated
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Byte passed around a token lock
pub const LOCK_TOKEN: u8 = 0xA5;

/*!
 * Core Types
 * Common types used across the crate
 */

/// OS-level process ID
pub type Pid = i32;

/// Exit status as reported to callers (0 is success)
pub type ExitCode = i32;

/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::serialization::CodecError;
use super::types::{ExitCode, Pid};
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Misuse of a handle: touching a disposed resource, or reading completion
/// state before the child has exited
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum UsageError {
    #[error("{resource} has already been disposed")]
    #[diagnostic(
        code(usage::disposed),
        help("Dispose exactly once, after every process that shares the resource is done with it.")
    )]
    Disposed { resource: String },

    #[error("Process {pid} has not exited yet")]
    #[diagnostic(
        code(usage::not_exited),
        help("Call join() or poll try_join() until it returns true before reading status or result.")
    )]
    NotExited { pid: Pid },
}

impl UsageError {
    pub(crate) fn disposed(resource: impl Into<String>) -> Self {
        UsageError::Disposed {
            resource: resource.into(),
        }
    }
}

/// Failures of the underlying socket transport
#[derive(Error, Debug, Diagnostic)]
pub enum TransportError {
    #[error("I/O failure during {op}: {source}")]
    #[diagnostic(
        code(transport::io),
        help("The peer may have exited or closed its endpoint. Retry policy belongs to the caller.")
    )]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("System call failed during {op}: {errno}")]
    #[diagnostic(code(transport::os))]
    Os {
        op: &'static str,
        #[source]
        errno: Errno,
    },

    #[error("Transport closed by peer")]
    #[diagnostic(
        code(transport::closed),
        help("Every endpoint on the other side has been closed.")
    )]
    Closed,

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    #[diagnostic(
        code(transport::truncated),
        help("The writer stopped mid-frame, usually because its process died.")
    )]
    Truncated { expected: usize, actual: usize },

    #[error("Frame of {len} bytes exceeds limit of {max} bytes")]
    #[diagnostic(
        code(transport::frame_too_large),
        help("Raise PROCTHREAD_MAX_FRAME_BYTES or send smaller payloads.")
    )]
    FrameTooLarge { len: u64, max: usize },
}

impl TransportError {
    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| TransportError::Io { op, source }
    }

    pub(crate) fn os(op: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| TransportError::Os { op, errno }
    }
}

/// A child that did not return a value: it failed, panicked, or died
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[error("Child process {pid} failed with status {status}: {reason}")]
#[diagnostic(code(child::failed))]
pub struct ChildFailure {
    pub pid: Pid,
    pub status: ExitCode,
    pub reason: String,
}

/// Unified crate error with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("Usage error: {0}")]
    #[diagnostic(transparent)]
    Usage(#[from] UsageError),

    #[error("Child failure: {0}")]
    #[diagnostic(transparent)]
    Child(#[from] ChildFailure),

    #[error("Transport error: {0}")]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error("Failed to fork child process: {0}")]
    #[diagnostic(
        code(process::spawn_failed),
        help("Check the process limit (ulimit -u) and available memory.")
    )]
    Spawn(#[source] Errno),

    #[error("Failed to wait for process {pid}: {errno}")]
    #[diagnostic(
        code(process::wait_failed),
        help("Something else may have reaped the child, e.g. SIGCHLD set to SIG_IGN.")
    )]
    Wait {
        pid: Pid,
        #[source]
        errno: Errno,
    },
}

impl Error {
    /// True for misuse of a handle
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

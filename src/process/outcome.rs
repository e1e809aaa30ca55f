/*!
 * Child Outcomes
 * What a child reported, and what the parent concluded after reaping it
 */

use crate::core::limits::{
    EXIT_FAILED, EXIT_PANICKED, EXIT_REPORT_UNDELIVERED, EXIT_SUCCESS, SIGNAL_EXIT_BASE,
};
use crate::core::types::ExitCode;
use nix::sys::wait::WaitStatus;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// The single frame a child writes before exiting
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum ChildReport<T> {
    Returned(T),
    Failed(String),
    Panicked(String),
}

impl<T> ChildReport<T> {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            ChildReport::Returned(_) => EXIT_SUCCESS,
            ChildReport::Failed(_) => EXIT_FAILED,
            ChildReport::Panicked(_) => EXIT_PANICKED,
        }
    }
}

/// Final state of a reaped child
///
/// Only `Returned` carries a result. Every other variant is the "no result"
/// sentinel, with enough detail to tell how the child failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Exit status 0 and a decodable result frame
    Returned(T),
    /// The callable returned an error (or a named task was unknown)
    Failed(String),
    /// The callable panicked
    Panicked(String),
    /// No complete report: killed by a signal, crashed mid-write, exited
    /// on its own, or returned a value but did not exit cleanly
    Terminated,
    /// A complete frame arrived but could not be decoded
    Undecodable(String),
}

impl<T> Outcome<T> {
    /// Combine the decoded report with the exit status
    pub(crate) fn from_report(report: ChildReport<T>, status: ExitCode) -> Self {
        match report {
            ChildReport::Returned(value) if status == EXIT_SUCCESS => Outcome::Returned(value),
            ChildReport::Returned(_) => Outcome::Terminated,
            ChildReport::Failed(reason) => Outcome::Failed(reason),
            ChildReport::Panicked(reason) => Outcome::Panicked(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Returned(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Returned(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Returned(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable failure description, `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Outcome::Returned(_) => None,
            Outcome::Failed(reason) => Some(reason.clone()),
            Outcome::Panicked(reason) => Some(format!("panicked: {}", reason)),
            Outcome::Terminated => Some("terminated without a result".to_string()),
            Outcome::Undecodable(reason) => Some(format!("undecodable result: {}", reason)),
        }
    }
}

/// Exit status for a terminated child, `None` while it is still alive
///
/// Signals map to `128 + signo`, the shell convention.
pub(crate) fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(SIGNAL_EXIT_BASE + signal as i32),
        _ => None,
    }
}

/// Short description for trace output
pub(crate) fn describe_exit(status: ExitCode) -> &'static str {
    match status {
        EXIT_SUCCESS => "success",
        EXIT_FAILED => "failed",
        EXIT_PANICKED => "panicked",
        EXIT_REPORT_UNDELIVERED => "report undelivered",
        s if s > SIGNAL_EXIT_BASE => "killed by signal",
        _ => "exited abnormally",
    }
}

/// Extract the message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

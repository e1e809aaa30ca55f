/*!
 * Child Runtime
 *
 * Everything that runs in the forked child: execute the body, turn its
 * result or panic into a single report frame, flush, and `_exit`.
 *
 * Nothing here logs. The child inherits a copy of the parent's subscriber,
 * whose locks may have been held by another parent thread at fork time.
 */

use super::outcome::{panic_message, ChildReport};
use crate::core::limits::EXIT_REPORT_UNDELIVERED;
use crate::core::serialization::Codec;
use crate::core::types::ExitCode;
use crate::ipc::frame::write_frame;
use serde::Serialize;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::panic::{self, AssertUnwindSafe};

/// Run `body` and terminate the process; never returns
pub(crate) fn run<T, C, F>(stream: UnixStream, codec: &C, max_frame_bytes: usize, body: F) -> !
where
    T: Serialize,
    C: Codec,
    F: FnOnce(&UnixStream) -> Result<T, String>,
{
    let report = match panic::catch_unwind(AssertUnwindSafe(|| body(&stream))) {
        Ok(Ok(value)) => ChildReport::Returned(value),
        Ok(Err(reason)) => ChildReport::Failed(reason),
        Err(payload) => ChildReport::Panicked(panic_message(payload.as_ref())),
    };

    let code = deliver(&stream, codec, max_frame_bytes, &report);
    drop(stream);
    terminate(code)
}

/// Write the report frame and pick the exit code
///
/// A value that cannot be encoded (or does not fit in a frame) is replaced by
/// a failure report so the parent still learns why.
fn deliver<T: Serialize, C: Codec>(
    stream: &UnixStream,
    codec: &C,
    max_frame_bytes: usize,
    report: &ChildReport<T>,
) -> ExitCode {
    let attempt = codec
        .encode(report)
        .map_err(|e| e.to_string())
        .and_then(|bytes| {
            write_frame(stream, &bytes, max_frame_bytes).map_err(|e| e.to_string())
        });

    match attempt {
        Ok(()) => report.exit_code(),
        Err(reason) => {
            let fallback: ChildReport<()> =
                ChildReport::Failed(format!("result could not be delivered: {}", reason));
            if let Ok(bytes) = codec.encode(&fallback) {
                let _ = write_frame(stream, &bytes, max_frame_bytes);
            }
            EXIT_REPORT_UNDELIVERED
        }
    }
}

fn terminate(code: ExitCode) -> ! {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    // SAFETY: _exit only ends the process. Skipping atexit handlers and
    // destructors is intended: they belong to the parent's copy of the
    // program state and must not run twice.
    unsafe { nix::libc::_exit(code) }
}

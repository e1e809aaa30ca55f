/*!
 * Process Threads
 *
 * A thread-like handle over a forked child process: spawn, join or poll,
 * then read the exit status and the decoded return value.
 *
 * Each child gets one end of a Unix stream pair. It writes exactly one
 * report frame and exits. The parent drains the other end opportunistically
 * on every poll, so a child with a large result never stalls on a full
 * socket buffer while the parent is polling.
 */

use super::child;
use super::outcome::{describe_exit, exit_code, ChildReport, Outcome};
use super::task::{Invocation, TaskFn, TaskRegistry};
use crate::core::config::Config;
use crate::core::errors::{ChildFailure, Error, Result, TransportError, UsageError};
use crate::core::limits::READ_CHUNK_SIZE;
use crate::core::serialization::{Bincode, Codec, CodecError, Value};
use crate::core::types::{ExitCode, Pid};
use crate::ipc::frame::{read_frame, write_frame, FrameBuffer};
use nix::errno::Errno;
use nix::sys::socket::{recv, MsgFlags};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid as NixPid};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::io::{ErrorKind, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

enum State<T> {
    Running,
    Exited {
        status: ExitCode,
        outcome: Outcome<T>,
    },
}

enum StreamEvent {
    Data,
    Idle,
    Eof,
}

/// Handle to a unit of work running in a child process
///
/// The handle belongs to the process that spawned it; the child holds no
/// reference back. Call `dispose` when done to reap the child and close the
/// result stream.
pub struct Thread<T, C: Codec = Bincode> {
    pid: NixPid,
    name: Option<String>,
    /// Parent end of the result stream; closed once the child has exited
    stream: Option<UnixStream>,
    frames: FrameBuffer,
    state: State<T>,
    disposed: bool,
    codec: C,
}

impl<T, C: Codec> std::fmt::Debug for Thread<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match &self.state {
            State::Running => None,
            State::Exited { status, .. } => Some(*status),
        };
        f.debug_struct("Thread")
            .field("pid", &self.pid.as_raw())
            .field("name", &self.name)
            .field("exit_status", &status)
            .field("buffered_bytes", &self.frames.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<T> Thread<T, Bincode>
where
    T: Serialize + DeserializeOwned,
{
    /// Fork a child that runs `f` with default settings
    pub fn spawn<F>(f: F) -> Result<Self>
    where
        F: FnOnce() -> T,
    {
        ThreadBuilder::new().spawn(f)
    }
}

impl<T, C> Thread<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Codec,
{
    /// OS process id of the child
    pub fn pid(&self) -> Pid {
        self.pid.as_raw()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.state, State::Exited { .. })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(UsageError::disposed(format!("thread {}", self.pid)).into());
        }
        Ok(())
    }

    /// Non-blocking completion check
    ///
    /// Returns `true` once the child has exited, performing the transition to
    /// the exited state exactly once. Cheap enough for tight polling loops.
    pub fn try_join(&mut self) -> Result<bool> {
        self.ensure_live()?;
        if self.is_exited() {
            return Ok(true);
        }

        self.drain()?;
        match self.reap(Some(WaitPidFlag::WNOHANG))? {
            Some(status) => {
                self.finish(status)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Block until the child has exited
    #[instrument(skip_all, fields(pid = self.pid.as_raw()))]
    pub fn join(&mut self) -> Result<()> {
        loop {
            if self.try_join()? {
                return Ok(());
            }
            if let StreamEvent::Eof = self.wait_for_data()? {
                // Every write end is closed, so the child is on its way out
                if let Some(status) = self.reap(None)? {
                    self.finish(status)?;
                    return Ok(());
                }
            }
        }
    }

    /// Exit status of the child; 0 means success
    pub fn exit_status(&self) -> Result<ExitCode> {
        self.ensure_live()?;
        match &self.state {
            State::Exited { status, .. } => Ok(*status),
            State::Running => Err(self.not_exited()),
        }
    }

    /// Decoded return value
    ///
    /// `Ok(None)` is the "no result" sentinel for any unsuccessful child; use
    /// `outcome` to find out why. A result frame that arrived intact but
    /// could not be decoded is reported as a serialization error.
    pub fn result(&self) -> Result<Option<&T>> {
        match self.outcome()? {
            Outcome::Returned(value) => Ok(Some(value)),
            Outcome::Undecodable(reason) => Err(CodecError::Deserialization {
                codec: C::NAME,
                reason: reason.clone(),
            }
            .into()),
            _ => Ok(None),
        }
    }

    /// Full outcome, including failure details
    pub fn outcome(&self) -> Result<&Outcome<T>> {
        self.ensure_live()?;
        match &self.state {
            State::Exited { outcome, .. } => Ok(outcome),
            State::Running => Err(self.not_exited()),
        }
    }

    /// Join, dispose, and hand back the value or the reason there is none
    pub fn join_result(mut self) -> Result<T> {
        self.dispose()?;
        let state = std::mem::replace(&mut self.state, State::Running);

        let State::Exited { status, outcome } = state else {
            return Err(self.not_exited());
        };
        match outcome {
            Outcome::Returned(value) => Ok(value),
            Outcome::Undecodable(reason) => Err(CodecError::Deserialization {
                codec: C::NAME,
                reason,
            }
            .into()),
            other => Err(ChildFailure {
                pid: self.pid.as_raw(),
                status,
                reason: other.failure_reason().unwrap_or_default(),
            }
            .into()),
        }
    }

    /// Reap the child (blocking if it is still running) and close the stream
    ///
    /// A second dispose, or any call after it, is a usage error.
    pub fn dispose(&mut self) -> Result<()> {
        self.ensure_live()?;
        if !self.is_exited() {
            self.join()?;
        }
        self.stream = None;
        self.disposed = true;
        debug!(pid = self.pid.as_raw(), "Thread disposed");
        Ok(())
    }

    fn not_exited(&self) -> Error {
        UsageError::NotExited {
            pid: self.pid.as_raw(),
        }
        .into()
    }

    /// waitpid wrapper; `None` while the child is alive
    fn reap(&self, flags: Option<WaitPidFlag>) -> Result<Option<ExitCode>> {
        loop {
            match waitpid(self.pid, flags) {
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(status) => match exit_code(status) {
                    Some(code) => return Ok(Some(code)),
                    // Stop/continue notifications are not terminations
                    None if flags.is_some() => return Ok(None),
                    None => continue,
                },
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(Error::Wait {
                        pid: self.pid.as_raw(),
                        errno,
                    })
                }
            }
        }
    }

    /// Pull whatever the child has written so far without blocking
    fn drain(&mut self) -> Result<()> {
        let Some(stream) = &self.stream else {
            return Ok(());
        };
        let fd = stream.as_raw_fd();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match recv(fd, &mut chunk, MsgFlags::MSG_DONTWAIT) {
                Ok(0) => return Ok(()),
                Ok(n) => self.frames.extend_from_slice(&chunk[..n]),
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => return Ok(()),
                Err(errno) => return Err(TransportError::os("result drain")(errno).into()),
            }
        }
    }

    /// Wait up to the configured poll interval for the child to write or exit
    fn wait_for_data(&mut self) -> Result<StreamEvent> {
        let Some(stream) = &self.stream else {
            return Ok(StreamEvent::Eof);
        };
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match (&*stream).read(&mut chunk) {
            Ok(0) => Ok(StreamEvent::Eof),
            Ok(n) => {
                self.frames.extend_from_slice(&chunk[..n]);
                Ok(StreamEvent::Data)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(StreamEvent::Idle)
            }
            Err(e) => Err(TransportError::io("result wait")(e).into()),
        }
    }

    /// Transition to exited: collect the report and close the stream
    fn finish(&mut self, status: ExitCode) -> Result<()> {
        // The child wrote everything before exiting; it is all buffered now
        self.drain()?;
        self.stream = None;

        let outcome = match self.frames.next_frame() {
            Ok(Some(bytes)) => match self.codec.decode::<ChildReport<T>>(&bytes) {
                Ok(report) => Outcome::from_report(report, status),
                Err(e) => Outcome::Undecodable(e.to_string()),
            },
            // Nothing, or a partial frame from a child that died mid-write
            Ok(None) => Outcome::Terminated,
            Err(e) => Outcome::Undecodable(e.to_string()),
        };
        self.frames = FrameBuffer::new(0);

        info!(
            pid = self.pid.as_raw(),
            name = self.name.as_deref().unwrap_or(""),
            status,
            exit = describe_exit(status),
            "Child process exited"
        );

        self.state = State::Exited { status, outcome };
        Ok(())
    }
}

impl<T, C: Codec> Drop for Thread<T, C> {
    fn drop(&mut self) {
        if self.disposed || matches!(self.state, State::Exited { .. }) {
            return;
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => warn!(
                pid = self.pid.as_raw(),
                "Thread dropped while its child is still running; the child will not be reaped"
            ),
            Ok(_) => debug!(pid = self.pid.as_raw(), "Reaped child of dropped thread"),
            Err(e) => warn!(pid = self.pid.as_raw(), error = %e, "Failed to reap child of dropped thread"),
        }
    }
}

/// Spawn settings: name, configuration and codec
///
/// # Example
///
/// ```no_run
/// use procthread::ThreadBuilder;
///
/// let mut worker = ThreadBuilder::new()
///     .name("squares")
///     .spawn(|| (0..200u64).map(|i| i * i).collect::<Vec<_>>())?;
/// worker.join()?;
/// assert_eq!(worker.exit_status()?, 0);
/// assert_eq!(worker.result()?.map(Vec::len), Some(200));
/// worker.dispose()?;
/// # Ok::<(), procthread::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ThreadBuilder<C: Codec = Bincode> {
    name: Option<String>,
    config: Config,
    codec: C,
}

impl ThreadBuilder<Bincode> {
    pub fn new() -> Self {
        Self {
            name: None,
            config: Config::default(),
            codec: Bincode,
        }
    }
}

impl Default for ThreadBuilder<Bincode> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> ThreadBuilder<C> {
    /// Label used in trace output
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Switch the codec used for the result frame
    pub fn codec<C2: Codec>(self, codec: C2) -> ThreadBuilder<C2> {
        ThreadBuilder {
            name: self.name,
            config: self.config,
            codec,
        }
    }

    /// Fork a child that runs `f` and reports its return value
    ///
    /// Anything `f` captures is copied into the child by the fork; the
    /// parent's copy is dropped without running `f`.
    pub fn spawn<F, T>(&self, f: F) -> Result<Thread<T, C>>
    where
        F: FnOnce() -> T,
        T: Serialize + DeserializeOwned,
    {
        self.launch(move |_| Ok(f()), None)
    }

    /// Fork a child that runs `f(args)`
    pub fn spawn_with<F, A, T>(&self, f: F, args: A) -> Result<Thread<T, C>>
    where
        F: FnOnce(A) -> T,
        T: Serialize + DeserializeOwned,
    {
        self.launch(move |_| Ok(f(args)), None)
    }

    /// Fork a child whose error return counts as a failure (exit status 1)
    pub fn spawn_fallible<F, T, E>(&self, f: F) -> Result<Thread<T, C>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        T: Serialize + DeserializeOwned,
        E: Display,
    {
        self.launch(move |_| f().map_err(|e| e.to_string()), None)
    }

    /// Fork a child and ship it a named task to run
    ///
    /// The invocation is encoded and the task looked up here, so the child
    /// never touches the registry lock and an unencodable argument fails the
    /// spawn instead of the child. An unknown name is still reported by the
    /// child as a failure.
    pub fn spawn_invocation(
        &self,
        registry: &TaskRegistry,
        invocation: &Invocation,
    ) -> Result<Thread<Value, C>> {
        let task = registry.resolve(&invocation.task);
        self.spawn_resolved(task, invocation)
    }

    fn spawn_resolved(
        &self,
        task: std::result::Result<TaskFn, String>,
        invocation: &Invocation,
    ) -> Result<Thread<Value, C>> {
        let encoded = self.codec.encode(invocation)?;
        let codec = self.codec.clone();
        let max = self.config.max_frame_bytes;

        self.launch(
            move |stream| {
                let bytes = read_frame(stream, max).map_err(|e| e.to_string())?;
                let invocation: Invocation = codec.decode(&bytes).map_err(|e| e.to_string())?;
                let task = task?;
                task(invocation.args)
            },
            Some(encoded),
        )
    }

    fn launch<T, F>(&self, body: F, handoff: Option<Vec<u8>>) -> Result<Thread<T, C>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&UnixStream) -> std::result::Result<T, String>,
    {
        let (parent_end, child_end) =
            UnixStream::pair().map_err(TransportError::io("thread socketpair"))?;
        parent_end
            .set_read_timeout(Some(self.poll_interval()))
            .map_err(TransportError::io("thread read timeout"))?;
        let max = self.config.max_frame_bytes;

        // SAFETY: the child only runs `body`, encodes its report and calls
        // _exit; it never returns into the caller's stack frames.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(parent_end);
                child::run(child_end, &self.codec, max, body)
            }
            Ok(ForkResult::Parent { child }) => {
                drop(child_end);
                let mut thread = Thread {
                    pid: child,
                    name: self.name.clone(),
                    stream: Some(parent_end),
                    frames: FrameBuffer::new(max),
                    state: State::Running,
                    disposed: false,
                    codec: self.codec.clone(),
                };

                info!(
                    pid = child.as_raw(),
                    name = self.name.as_deref().unwrap_or(""),
                    codec = C::NAME,
                    "Spawned child process"
                );

                if let Some(bytes) = handoff {
                    if let Some(stream) = &thread.stream {
                        if let Err(e) = write_frame(stream, &bytes, max) {
                            // The child reports the missing invocation itself
                            warn!(pid = child.as_raw(), error = %e, "Failed to hand off invocation");
                        }
                    }
                }

                thread.drain()?;
                Ok(thread)
            }
            Err(errno) => Err(Error::Spawn(errno)),
        }
    }

    fn poll_interval(&self) -> Duration {
        // A zero timeout would mean "block forever" to SO_RCVTIMEO
        self.config.join_poll_interval.max(Duration::from_millis(1))
    }
}

/*!
 * Channel Implementation
 *
 * One Unix stream pair carries every frame: all holders write into `tx` and
 * read from `rx`. Forked children inherit both ends, so any process spawned
 * after the channel was created can send and receive.
 *
 * Two token locks keep the byte stream well-formed:
 * - the send lock makes each frame write atomic with respect to other senders
 * - the receive lock hands each frame to exactly one receiver
 */

use super::types::ChannelId;
use crate::core::config::Config;
use crate::core::errors::{Result, TransportError, UsageError};
use crate::core::limits::FRAME_HEADER_SIZE;
use crate::core::serialization::{Bincode, Codec};
use crate::ipc::frame::{checked_len, decode_header, encode_frame, read_frame, write_frame};
use crate::ipc::lock::TokenLock;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::socket::{getsockopt, recv, send, sockopt, MsgFlags};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::marker::PhantomData;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

mod sys {
    // Bytes queued in a socket's send buffer, skb overhead included
    nix::ioctl_read_bad!(send_queue_len, nix::libc::TIOCOUTQ, nix::libc::c_int);
}

/// Per-frame allowance for kernel bookkeeping when judging free send space
const SEND_OVERHEAD: usize = 4096;

struct Endpoints {
    tx: UnixStream,
    rx: UnixStream,
    send_lock: TokenLock,
    recv_lock: TokenLock,
    /// Largest frame that is guaranteed to fit in the socket buffer at once
    bufferable: usize,
    send_buffer: usize,
}

/// Multi-producer, multi-consumer message channel between processes
///
/// Create the channel before spawning the processes that use it. Messages
/// from one sender arrive in the order sent; messages from different senders
/// may interleave at frame granularity.
pub struct Channel<T, C: Codec = Bincode> {
    id: ChannelId,
    endpoints: Option<Endpoints>,
    max_frame_bytes: usize,
    stall_timeout: Duration,
    codec: C,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T, C: Codec> std::fmt::Debug for Channel<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("codec", &C::NAME)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("disposed", &self.endpoints.is_none())
            .finish()
    }
}

impl<T> Channel<T, Bincode>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a channel with default configuration and the bincode codec
    pub fn new() -> Result<Self> {
        Self::with_codec(&Config::default(), Bincode)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        Self::with_codec(config, Bincode)
    }
}

impl<T, C> Channel<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Codec,
{
    pub fn with_codec(config: &Config, codec: C) -> Result<Self> {
        let (tx, rx) = UnixStream::pair().map_err(TransportError::io("channel socketpair"))?;
        let send_buffer =
            getsockopt(&tx, sockopt::SndBuf).map_err(TransportError::os("channel sndbuf"))?;

        let endpoints = Endpoints {
            tx,
            rx,
            send_lock: TokenLock::new()?,
            recv_lock: TokenLock::new()?,
            // Unix stream sockets charge skb overhead against SO_SNDBUF, so
            // only a fraction of it is usable payload
            bufferable: send_buffer / 4,
            send_buffer,
        };

        let id = ChannelId::generate();
        info!(
            channel = %id,
            codec = C::NAME,
            max_frame_bytes = config.max_frame_bytes,
            "Channel created"
        );

        Ok(Self {
            id,
            endpoints: Some(endpoints),
            max_frame_bytes: config.max_frame_bytes,
            stall_timeout: config.stall_timeout,
            codec,
            _payload: PhantomData,
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.endpoints.is_none()
    }

    fn endpoints(&self) -> Result<&Endpoints> {
        self.endpoints
            .as_ref()
            .ok_or_else(|| UsageError::disposed(format!("channel {}", self.id)).into())
    }

    /// Encode and send one message
    ///
    /// Blocks while the socket buffer is full, i.e. until receivers drain it.
    pub fn send(&self, value: &T) -> Result<()> {
        let ends = self.endpoints()?;
        let payload = self.codec.encode(value)?;
        checked_len(payload.len() as u64, self.max_frame_bytes)?;

        let guard = ends.send_lock.acquire()?;
        let written = write_frame(&ends.tx, &payload, self.max_frame_bytes);
        guard.release()?;
        written?;
        Ok(())
    }

    /// Send one message only if that cannot block
    ///
    /// Returns `Ok(false)` without writing anything when the socket buffer
    /// lacks room for the whole frame or another sender is mid-write. A frame
    /// too large to ever fit in the buffer always gets `Ok(false)`; use
    /// `send` for those.
    pub fn try_send(&self, value: &T) -> Result<bool> {
        let ends = self.endpoints()?;
        let payload = self.codec.encode(value)?;
        checked_len(payload.len() as u64, self.max_frame_bytes)?;
        let frame = encode_frame(&payload);

        let Some(guard) = ends.send_lock.try_acquire()? else {
            return Ok(false);
        };
        let sent = self.send_if_room(ends, &frame);
        guard.release()?;
        Ok(sent?)
    }

    /// Caller holds the send lock
    fn send_if_room(
        &self,
        ends: &Endpoints,
        frame: &[u8],
    ) -> std::result::Result<bool, TransportError> {
        let fd = ends.tx.as_raw_fd();
        let mut queued: nix::libc::c_int = 0;
        // SAFETY: TIOCOUTQ writes one c_int through the pointer
        unsafe { sys::send_queue_len(fd, &mut queued) }
            .map_err(TransportError::os("channel queue length"))?;

        let needed = frame.len().saturating_mul(2).saturating_add(SEND_OVERHEAD);
        if frame.len() > ends.bufferable
            || (queued.max(0) as usize).saturating_add(needed) > ends.send_buffer
        {
            return Ok(false);
        }

        let written = loop {
            match send(fd, frame, MsgFlags::MSG_DONTWAIT) {
                Ok(n) => break n,
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => return Ok(false),
                Err(errno) => return Err(TransportError::os("channel try_send")(errno)),
            }
        };

        // The estimate was short. The head is already in the stream, so the
        // tail has to follow before the lock is released.
        if written < frame.len() {
            warn!(channel = %self.id, written, len = frame.len(), "Partial non-blocking send, completing");
            (&ends.tx)
                .write_all(&frame[written..])
                .map_err(TransportError::io("channel try_send"))?;
        }
        Ok(true)
    }

    /// Receive one message
    ///
    /// With `blocking` set, waits for a complete frame. Otherwise returns
    /// `Ok(None)` right away unless a whole frame is already buffered and no
    /// other receiver is mid-read.
    pub fn receive(&self, blocking: bool) -> Result<Option<T>> {
        let ends = self.endpoints()?;

        let payload = if blocking {
            let guard = ends.recv_lock.acquire()?;
            let read = read_frame(&ends.rx, self.max_frame_bytes);
            guard.release()?;
            Some(read?)
        } else {
            let Some(guard) = ends.recv_lock.try_acquire()? else {
                return Ok(None);
            };
            let read = self.take_buffered(ends);
            guard.release()?;
            read?
        };

        match payload {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Blocking receive
    pub fn receive_blocking(&self) -> Result<T> {
        let ends = self.endpoints()?;
        let guard = ends.recv_lock.acquire()?;
        let read = read_frame(&ends.rx, self.max_frame_bytes);
        guard.release()?;
        Ok(self.codec.decode(&read?)?)
    }

    /// Non-blocking receive
    #[inline]
    pub fn try_receive(&self) -> Result<Option<T>> {
        self.receive(false)
    }

    /// Pull the head frame only if it is complete; caller holds the receive lock
    fn take_buffered(
        &self,
        ends: &Endpoints,
    ) -> std::result::Result<Option<Vec<u8>>, TransportError> {
        let fd = ends.rx.as_raw_fd();
        let peek = MsgFlags::MSG_PEEK | MsgFlags::MSG_DONTWAIT;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        match recv(fd, &mut header, peek) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) if n < FRAME_HEADER_SIZE => return Ok(None),
            Ok(_) => {}
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => return Ok(None),
            Err(errno) => return Err(TransportError::os("channel peek")(errno)),
        }

        let total = FRAME_HEADER_SIZE + checked_len(decode_header(header), self.max_frame_bytes)?;

        // A frame this large can never be fully buffered; its sender is
        // mid-write under the send lock, so take it while it streams in
        if total > ends.bufferable {
            return self.read_streaming(ends, total).map(Some);
        }

        let mut whole = vec![0u8; total];
        match recv(fd, &mut whole, peek) {
            Ok(n) if n == total => read_frame(&ends.rx, self.max_frame_bytes).map(Some),
            Ok(_) | Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
            Err(errno) => Err(TransportError::os("channel peek")(errno)),
        }
    }

    /// Read a whole frame (header included) that is still being written
    ///
    /// Waits as long as the sender keeps making progress. A sender that goes
    /// quiet for `stall_timeout` has died or hung mid-frame; the bytes read so
    /// far are dropped and the frame is reported as truncated.
    fn read_streaming(
        &self,
        ends: &Endpoints,
        total: usize,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let fd = ends.rx.as_raw_fd();
        let mut frame = vec![0u8; total];
        let mut filled = 0;
        let mut last_progress = Instant::now();

        while filled < total {
            match recv(fd, &mut frame[filled..], MsgFlags::MSG_DONTWAIT) {
                Ok(0) => {
                    return Err(TransportError::Truncated {
                        expected: total,
                        actual: filled,
                    })
                }
                Ok(n) => {
                    filled += n;
                    last_progress = Instant::now();
                    continue;
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => {}
                Err(errno) => return Err(TransportError::os("channel read")(errno)),
            }

            let remaining = self.stall_timeout.saturating_sub(last_progress.elapsed());
            if remaining.is_zero() {
                warn!(channel = %self.id, expected = total, actual = filled, "Sender stalled mid-frame");
                return Err(TransportError::Truncated {
                    expected: total,
                    actual: filled,
                });
            }

            let timeout = PollTimeout::from(remaining.as_millis().clamp(1, u16::MAX as u128) as u16);
            let mut fds = [PollFd::new(ends.rx.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(_) | Err(Errno::EINTR) => {}
                Err(errno) => return Err(TransportError::os("channel poll")(errno)),
            }
        }

        Ok(frame.split_off(FRAME_HEADER_SIZE))
    }

    /// Close this handle's endpoints
    ///
    /// Dispose once, after every process that uses the channel has been
    /// joined. Any later call, including a second dispose, is a usage error.
    pub fn dispose(&mut self) -> Result<()> {
        match self.endpoints.take() {
            Some(ends) => {
                drop(ends);
                debug!(channel = %self.id, "Channel disposed");
                Ok(())
            }
            None => Err(UsageError::disposed(format!("channel {}", self.id)).into()),
        }
    }
}

/*!
 * Token Lock
 *
 * Mutual exclusion that survives fork: a single token byte circulates
 * through a socket pair. Taking the byte acquires the lock, writing it back
 * releases it. Every process (and every thread) holding a copy of the pair
 * competes for the same token, so the kernel does the arbitration.
 */

use crate::core::errors::TransportError;
use crate::core::limits::LOCK_TOKEN;
use nix::errno::Errno;
use nix::sys::socket::{recv, MsgFlags};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

/// Cross-process mutex built on a circulating token
#[derive(Debug)]
pub struct TokenLock {
    give: UnixStream,
    take: UnixStream,
}

impl TokenLock {
    /// Create an unlocked lock
    pub fn new() -> Result<Self, TransportError> {
        let (give, take) = UnixStream::pair().map_err(TransportError::io("lock socketpair"))?;
        (&give)
            .write_all(&[LOCK_TOKEN])
            .map_err(TransportError::io("lock seed"))?;
        Ok(Self { give, take })
    }

    /// Block until the token is ours
    pub fn acquire(&self) -> Result<TokenGuard<'_>, TransportError> {
        let mut token = [0u8; 1];
        loop {
            match (&self.take).read(&mut token) {
                Ok(1) => return Ok(TokenGuard::new(self)),
                Ok(_) => return Err(TransportError::Closed),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io("lock acquire")(e)),
            }
        }
    }

    /// Take the token only if it is free right now
    ///
    /// Uses a per-call MSG_DONTWAIT instead of O_NONBLOCK: the socket's file
    /// status flags are shared with every forked holder.
    pub fn try_acquire(&self) -> Result<Option<TokenGuard<'_>>, TransportError> {
        let mut token = [0u8; 1];
        match recv(self.take.as_raw_fd(), &mut token, MsgFlags::MSG_DONTWAIT) {
            Ok(1) => Ok(Some(TokenGuard::new(self))),
            Ok(_) => Err(TransportError::Closed),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
            Err(errno) => Err(TransportError::os("lock try_acquire")(errno)),
        }
    }

    fn put_back(&self) -> Result<(), TransportError> {
        (&self.give)
            .write_all(&[LOCK_TOKEN])
            .map_err(TransportError::io("lock release"))
    }
}

/// Holds the token; returns it on `release` or drop
#[derive(Debug)]
pub struct TokenGuard<'a> {
    lock: &'a TokenLock,
    held: bool,
}

impl<'a> TokenGuard<'a> {
    fn new(lock: &'a TokenLock) -> Self {
        Self { lock, held: true }
    }

    /// Return the token, reporting a failed write
    pub fn release(mut self) -> Result<(), TransportError> {
        self.held = false;
        self.lock.put_back()
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            // No caller left to report to; a lost token surfaces as a stuck
            // acquire in the next holder.
            let _ = self.lock.put_back();
        }
    }
}

/*!
 * Frame Transport
 *
 * Length-prefixed framing shared by channels and the child result stream.
 *
 * Wire format: [8-byte little-endian length][payload], repeated.
 * A reader never hands out a frame until every payload byte is present; a
 * stream that ends mid-frame is reported as truncated, never as data.
 */

use crate::core::errors::TransportError;
use crate::core::limits::FRAME_HEADER_SIZE;
use bytes::{Buf, Bytes, BytesMut};
use std::io::{ErrorKind, Read, Write};

/// Build a complete frame in one buffer so it can go out in a single write
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

#[inline]
pub fn decode_header(header: [u8; FRAME_HEADER_SIZE]) -> u64 {
    u64::from_le_bytes(header)
}

/// Validate a length prefix against the configured limit
#[inline]
pub fn checked_len(len: u64, max: usize) -> Result<usize, TransportError> {
    if len > max as u64 {
        return Err(TransportError::FrameTooLarge { len, max });
    }
    Ok(len as usize)
}

/// Write one frame; the caller is responsible for excluding other writers
pub fn write_frame<W: Write>(
    mut writer: W,
    payload: &[u8],
    max: usize,
) -> Result<(), TransportError> {
    checked_len(payload.len() as u64, max)?;
    writer
        .write_all(&encode_frame(payload))
        .map_err(TransportError::io("frame write"))?;
    writer.flush().map_err(TransportError::io("frame flush"))
}

/// Blocking read of one frame
///
/// Returns `TransportError::Closed` if the stream ends cleanly between
/// frames and `TransportError::Truncated` if it ends inside one.
pub fn read_frame<R: Read>(mut reader: R, max: usize) -> Result<Vec<u8>, TransportError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let got = read_full(&mut reader, &mut header)?;
    if got == 0 {
        return Err(TransportError::Closed);
    }
    if got < FRAME_HEADER_SIZE {
        return Err(TransportError::Truncated {
            expected: FRAME_HEADER_SIZE,
            actual: got,
        });
    }

    let len = checked_len(decode_header(header), max)?;
    let mut payload = vec![0u8; len];
    let got = read_full(&mut reader, &mut payload)?;
    if got < len {
        return Err(TransportError::Truncated {
            expected: len,
            actual: got,
        });
    }
    Ok(payload)
}

/// Fill `buf` unless the stream ends first; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::io("frame read")(e)),
        }
    }
    Ok(filled)
}

/// Incremental frame decoder
///
/// Accumulates bytes as they trickle in and yields whole frames only.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max: usize,
}

impl FrameBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max,
        }
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Buffered bytes not yet returned as frames
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pop the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&self.buf[..FRAME_HEADER_SIZE]);
        let len = checked_len(decode_header(header), self.max)?;

        if self.buf.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }

        self.buf.advance(FRAME_HEADER_SIZE);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Describe what is left once the stream has ended
    ///
    /// `Ok(())` when nothing is pending, `Truncated` for a partial frame.
    pub fn finish(&self) -> Result<(), TransportError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let expected = if self.buf.len() < FRAME_HEADER_SIZE {
            FRAME_HEADER_SIZE
        } else {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            header.copy_from_slice(&self.buf[..FRAME_HEADER_SIZE]);
            FRAME_HEADER_SIZE.saturating_add(decode_header(header) as usize)
        };
        Err(TransportError::Truncated {
            expected,
            actual: self.buf.len(),
        })
    }
}

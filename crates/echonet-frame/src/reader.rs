use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{CommonFrame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::payload::Payload;
use crate::validator::validate_payload;

const INITIAL_BUFFER_CAPACITY: usize = 512;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from a connection-oriented `Read` stream.
///
/// ECHONET Lite frames carry no outer length prefix, so the buffered bytes
/// are re-parsed after every read. A prefix counts as a frame once it
/// decodes and, for standard payloads, passes [`validate_payload`]. A
/// truncated or invalid prefix waits for more bytes, up to
/// `max_buffer_size`; a bad EHD1 or EHD2 means the stream is out of step and
/// fails the read.
///
/// A simple payload has no length of its own, so a simple frame takes every
/// byte buffered behind its header, including any frame that follows it.
/// Peers that mix simple frames into a stream should send one per session.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.min(config.max_buffer_size)),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::BufferOverflow)` when the buffer fills up without
    /// yielding a frame.
    pub fn read_frame(&mut self) -> Result<CommonFrame> {
        loop {
            if let Some(frame) = self.parse_buffered()? {
                return Ok(frame);
            }

            let room = self.config.max_buffer_size.saturating_sub(self.buf.len());
            if room == 0 {
                return Err(FrameError::BufferOverflow {
                    size: self.buf.len(),
                    max: self.config.max_buffer_size,
                });
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let want = room.min(READ_CHUNK_SIZE);
            let read = match self.inner.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            trace!(buffered = self.buf.len(), "buffered stream bytes");
        }
    }

    fn parse_buffered(&mut self) -> Result<Option<CommonFrame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        match CommonFrame::decode_prefix(&self.buf) {
            Ok((frame, used)) => {
                if let Payload::Standard(payload) = frame.payload() {
                    if !validate_payload(payload) {
                        return Ok(None);
                    }
                }
                self.buf.advance(used);
                Ok(Some(frame))
            }
            Err(err) if err.is_truncated() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Number of bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the buffer ceiling for subsequent reads.
    pub fn set_max_buffer_size(&mut self, max_buffer_size: usize) {
        self.config.max_buffer_size = max_buffer_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::payload::{Payload, SimplePayload, StandardPayload};
use crate::property::take;

/// Frame header: EHD1 (1) + EHD2 (1) + TID (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// EHD1: ECHONET Lite protocol marker.
pub const EHD1_ECHONET_LITE: u8 = 0x10;

/// EHD2: standard payload.
pub const EHD2_STANDARD: u8 = 0x81;

/// EHD2: opaque payload.
pub const EHD2_SIMPLE: u8 = 0x82;

/// Default ceiling for buffered stream data: 64 KiB.
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// An ECHONET Lite frame: header, transaction id and payload.
///
/// The payload-kind marker (EHD2) is derived from the payload variant, so it
/// can never disagree with the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonFrame {
    tid: u16,
    payload: Payload,
}

impl CommonFrame {
    pub fn new(tid: u16, payload: impl Into<Payload>) -> Self {
        Self {
            tid,
            payload: payload.into(),
        }
    }

    /// A frame with a standard payload.
    pub fn standard(tid: u16, payload: StandardPayload) -> Self {
        Self::new(tid, payload)
    }

    pub fn ehd1(&self) -> u8 {
        EHD1_ECHONET_LITE
    }

    pub fn ehd2(&self) -> u8 {
        match self.payload {
            Payload::Standard(_) => EHD2_STANDARD,
            Payload::Simple(_) => EHD2_SIMPLE,
        }
    }

    pub fn tid(&self) -> u16 {
        self.tid
    }

    pub fn set_tid(&mut self, tid: u16) {
        self.tid = tid;
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    pub fn standard_payload(&self) -> Option<&StandardPayload> {
        self.payload.as_standard()
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.payload, Payload::Standard(_))
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.wire_size()
    }

    /// Encode the frame into the wire format.
    ///
    /// ```text
    /// ┌────────┬────────┬───────────┬──────────────────┐
    /// │ EHD1   │ EHD2   │ TID       │ EDATA            │
    /// │ 0x10   │ 81/82  │ (2B BE)   │ (variable)       │
    /// └────────┴────────┴───────────┴──────────────────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(self.wire_size());
        dst.put_u8(EHD1_ECHONET_LITE);
        dst.put_u8(self.ehd2());
        dst.put_u16(self.tid);
        match &self.payload {
            Payload::Standard(payload) => payload.encode(dst),
            Payload::Simple(payload) => {
                dst.put_slice(&payload.data);
                Ok(())
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame from the start of `src`, ignoring any bytes after a
    /// standard payload.
    pub fn decode(src: &[u8]) -> Result<Self> {
        Self::decode_prefix(src).map(|(frame, _)| frame)
    }

    /// Decode a frame from the start of `src`.
    ///
    /// Returns the frame and the number of bytes it occupies. A simple
    /// payload consumes the remainder of the buffer.
    pub fn decode_prefix(src: &[u8]) -> Result<(Self, usize)> {
        let header = take(src, 0, HEADER_SIZE)?;
        if header[0] != EHD1_ECHONET_LITE {
            return Err(FrameError::InvalidHeader(header[0]));
        }
        let tid = u16::from_be_bytes([header[2], header[3]]);

        match header[1] {
            EHD2_STANDARD => {
                let (payload, end) = StandardPayload::decode(src, HEADER_SIZE)?;
                Ok((Self::new(tid, payload), end))
            }
            EHD2_SIMPLE => {
                let data = Bytes::copy_from_slice(&src[HEADER_SIZE..]);
                Ok((Self::new(tid, SimplePayload::new(data)), src.len()))
            }
            other => Err(FrameError::UnknownPayloadKind(other)),
        }
    }
}

/// Configuration for stream readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum number of buffered bytes before a frame must complete.
    /// Default: 64 KiB.
    pub max_buffer_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

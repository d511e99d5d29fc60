/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A declared length runs past the end of the buffer.
    #[error("truncated frame at offset {offset} (needed {needed} bytes, {available} available)")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The frame header does not carry the ECHONET Lite protocol marker.
    #[error("invalid frame header EHD1 0x{0:02x} (expected 0x10)")]
    InvalidHeader(u8),

    /// The payload-kind marker is neither standard nor opaque.
    #[error("unknown payload kind EHD2 0x{0:02x}")]
    UnknownPayloadKind(u8),

    /// Property data does not fit in a one-byte PDC.
    #[error("property data too long ({size} bytes, max 255)")]
    PropertyTooLong { size: usize },

    /// A property's declared length disagrees with its data.
    #[error("property 0x{epc:02x} declares {pdc} bytes but carries {actual}")]
    PropertyLengthMismatch { epc: u8, pdc: u8, actual: usize },

    /// A property list does not fit in a one-byte OPC.
    #[error("too many properties in one list ({count}, max 255)")]
    TooManyProperties { count: usize },

    /// A connection-oriented stream buffered more bytes than allowed without
    /// completing a valid frame.
    #[error("frame buffer overflow ({size} bytes, max {max})")]
    BufferOverflow { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when more input could turn the failure into a successful decode.
    pub fn is_truncated(&self) -> bool {
        matches!(self, FrameError::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

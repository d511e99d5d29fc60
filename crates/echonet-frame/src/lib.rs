//! ECHONET Lite frame codec.
//!
//! Every frame is a 4-byte common header followed by EDATA:
//! - EHD1 `0x10` (protocol marker)
//! - EHD2 `0x81` (standard payload) or `0x82` (opaque payload)
//! - a 2-byte big-endian transaction id
//!
//! Standard payloads carry source/destination objects, a service code and
//! one or two property lists. The [`validator`] checks that a decoded
//! payload has the shape its service code requires; connection-oriented
//! streams use it to decide whether buffered bytes form a complete frame.

pub mod codec;
pub mod eoj;
pub mod error;
pub mod esv;
pub mod payload;
pub mod property;
pub mod reader;
pub mod validator;
pub mod writer;

pub use codec::{
    CommonFrame, FrameConfig, DEFAULT_MAX_BUFFER, EHD1_ECHONET_LITE, EHD2_SIMPLE, EHD2_STANDARD,
    HEADER_SIZE,
};
pub use eoj::{Eoj, ALL_INSTANCES};
pub use error::{FrameError, Result};
pub use esv::Esv;
pub use payload::{Payload, SimplePayload, StandardPayload};
pub use property::{Epc, Property};
pub use reader::FrameReader;
pub use validator::{classify, validate_payload, PropertyListState};
pub use writer::FrameWriter;

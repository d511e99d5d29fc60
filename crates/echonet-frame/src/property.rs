use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// ECHONET property code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epc(pub u8);

impl Epc {
    /// Operation status.
    pub const OPERATION_STATUS: Epc = Epc(0x80);
    /// Instance list notification (node profile).
    pub const INSTANCE_LIST_NOTIFICATION: Epc = Epc(0xD5);
    /// Self-node instance list S (node profile).
    pub const SELF_NODE_INSTANCE_LIST_S: Epc = Epc(0xD6);

    /// Property codes below `0x80` are not assigned by the standard.
    pub const fn is_valid(self) -> bool {
        self.0 >= 0x80
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl From<u8> for Epc {
    fn from(code: u8) -> Self {
        Epc(code)
    }
}

/// One property entry: EPC, declared length (PDC) and data (EDT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    epc: Epc,
    pdc: u8,
    edt: Bytes,
}

impl Property {
    /// Header size of a property entry (EPC + PDC).
    pub const HEADER_SIZE: usize = 2;

    /// A property without data, as used in Get requests and Set responses.
    pub fn empty(epc: impl Into<Epc>) -> Self {
        Self {
            epc: epc.into(),
            pdc: 0,
            edt: Bytes::new(),
        }
    }

    /// A property carrying data; PDC is derived from the data length.
    pub fn with_data(epc: impl Into<Epc>, edt: impl Into<Bytes>) -> Result<Self> {
        let edt = edt.into();
        if edt.len() > u8::MAX as usize {
            return Err(FrameError::PropertyTooLong { size: edt.len() });
        }
        Ok(Self {
            epc: epc.into(),
            pdc: edt.len() as u8,
            edt,
        })
    }

    /// Assemble a property without checking that PDC agrees with the data.
    ///
    /// Encoding such a property fails; the validator reports it as invalid.
    pub fn from_raw(epc: impl Into<Epc>, pdc: u8, edt: impl Into<Bytes>) -> Self {
        Self {
            epc: epc.into(),
            pdc,
            edt: edt.into(),
        }
    }

    pub fn epc(&self) -> Epc {
        self.epc
    }

    pub fn pdc(&self) -> u8 {
        self.pdc
    }

    pub fn edt(&self) -> &Bytes {
        &self.edt
    }

    pub fn has_data(&self) -> bool {
        self.pdc > 0
    }

    /// True when the declared length matches the carried data.
    pub fn is_consistent(&self) -> bool {
        self.edt.len() == self.pdc as usize
    }

    pub fn wire_size(&self) -> usize {
        Self::HEADER_SIZE + self.edt.len()
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        if !self.is_consistent() {
            return Err(FrameError::PropertyLengthMismatch {
                epc: self.epc.0,
                pdc: self.pdc,
                actual: self.edt.len(),
            });
        }
        dst.put_u8(self.epc.0);
        dst.put_u8(self.pdc);
        dst.put_slice(&self.edt);
        Ok(())
    }

    /// Decode one property at `offset`, returning it and the offset after it.
    pub(crate) fn decode(src: &[u8], offset: usize) -> Result<(Self, usize)> {
        let header = take(src, offset, Self::HEADER_SIZE)?;
        let epc = Epc(header[0]);
        let pdc = header[1];
        let data_offset = offset + Self::HEADER_SIZE;
        let edt = take(src, data_offset, pdc as usize)?;
        Ok((
            Self {
                epc,
                pdc,
                edt: Bytes::copy_from_slice(edt),
            },
            data_offset + pdc as usize,
        ))
    }
}

/// Borrow `len` bytes at `offset`, or report how far the buffer falls short.
pub(crate) fn take(src: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset.saturating_add(len);
    if end > src.len() {
        return Err(FrameError::Truncated {
            offset,
            needed: len,
            available: src.len().saturating_sub(offset),
        });
    }
    Ok(&src[offset..end])
}

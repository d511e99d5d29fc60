use bytes::{BufMut, Bytes, BytesMut};

use crate::eoj::Eoj;
use crate::error::{FrameError, Result};
use crate::esv::Esv;
use crate::property::{take, Epc, Property};

/// Standard payload (EHD2 = 0x81).
///
/// ```text
/// SEOJ(3) DEOJ(3) ESV(1) OPC(1) Property{OPC} [OPC2(1) Property{OPC2}]
/// ```
///
/// The second list is only carried on the wire for SetGet-family service
/// codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardPayload {
    pub seoj: Eoj,
    pub deoj: Eoj,
    pub esv: Esv,
    first: Vec<Property>,
    second: Option<Vec<Property>>,
}

impl StandardPayload {
    /// Fixed part before the first property list: SEOJ + DEOJ + ESV + OPC.
    pub const FIXED_SIZE: usize = 8;

    pub fn new(seoj: Eoj, deoj: Eoj, esv: Esv) -> Self {
        Self {
            seoj,
            deoj,
            esv,
            first: Vec::new(),
            second: None,
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.first.push(property);
        self
    }

    pub fn with_second_property(mut self, property: Property) -> Self {
        self.add_second_property(property);
        self
    }

    pub fn add_first_property(&mut self, property: Property) {
        self.first.push(property);
    }

    pub fn add_second_property(&mut self, property: Property) {
        self.second.get_or_insert_with(Vec::new).push(property);
    }

    pub fn first_properties(&self) -> &[Property] {
        &self.first
    }

    pub fn second_properties(&self) -> Option<&[Property]> {
        self.second.as_deref()
    }

    pub fn first_opc(&self) -> usize {
        self.first.len()
    }

    pub fn second_opc(&self) -> usize {
        self.second.as_ref().map_or(0, Vec::len)
    }

    /// Look up a property in the first list by EPC.
    pub fn first_property(&self, epc: Epc) -> Option<&Property> {
        self.first.iter().find(|p| p.epc() == epc)
    }

    pub fn second_property(&self, epc: Epc) -> Option<&Property> {
        self.second
            .as_ref()
            .and_then(|props| props.iter().find(|p| p.epc() == epc))
    }

    pub fn clear_properties(&mut self) {
        self.first.clear();
        self.second = None;
    }

    pub fn wire_size(&self) -> usize {
        let mut size = Self::FIXED_SIZE + self.first.iter().map(Property::wire_size).sum::<usize>();
        if self.esv.has_second_list() {
            size += 1 + self
                .second
                .iter()
                .flatten()
                .map(Property::wire_size)
                .sum::<usize>();
        }
        size
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(self.wire_size());
        dst.put_slice(&self.seoj.to_bytes());
        dst.put_slice(&self.deoj.to_bytes());
        dst.put_u8(self.esv.code());
        encode_list(&self.first, dst)?;
        if self.esv.has_second_list() {
            encode_list(self.second.as_deref().unwrap_or(&[]), dst)?;
        }
        Ok(())
    }

    /// Decode a standard payload starting at `offset`.
    ///
    /// Returns the payload and the offset just past it.
    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize)> {
        let fixed = take(src, offset, Self::FIXED_SIZE - 1)?;
        let seoj = Eoj::from_bytes([fixed[0], fixed[1], fixed[2]]);
        let deoj = Eoj::from_bytes([fixed[3], fixed[4], fixed[5]]);
        let esv = Esv::from_u8(fixed[6]);

        let (first, mut pos) = decode_list(src, offset + Self::FIXED_SIZE - 1)?;
        let second = if esv.has_second_list() {
            let (list, next) = decode_list(src, pos)?;
            pos = next;
            Some(list)
        } else {
            None
        };

        Ok((
            Self {
                seoj,
                deoj,
                esv,
                first,
                second,
            },
            pos,
        ))
    }
}

fn encode_list(list: &[Property], dst: &mut BytesMut) -> Result<()> {
    if list.len() > u8::MAX as usize {
        return Err(FrameError::TooManyProperties { count: list.len() });
    }
    dst.put_u8(list.len() as u8);
    for property in list {
        property.encode(dst)?;
    }
    Ok(())
}

fn decode_list(src: &[u8], offset: usize) -> Result<(Vec<Property>, usize)> {
    let opc = take(src, offset, 1)?[0] as usize;
    let mut pos = offset + 1;
    let mut list = Vec::with_capacity(opc);
    for _ in 0..opc {
        let (property, next) = Property::decode(src, pos)?;
        list.push(property);
        pos = next;
    }
    Ok((list, pos))
}

/// Opaque payload (EHD2 = 0x82); the bytes are not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimplePayload {
    pub data: Bytes,
}

impl SimplePayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn wire_size(&self) -> usize {
        self.data.len()
    }
}

/// Payload carried by a common frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Standard(StandardPayload),
    Simple(SimplePayload),
}

impl Payload {
    pub fn as_standard(&self) -> Option<&StandardPayload> {
        match self {
            Payload::Standard(payload) => Some(payload),
            Payload::Simple(_) => None,
        }
    }

    pub fn as_standard_mut(&mut self) -> Option<&mut StandardPayload> {
        match self {
            Payload::Standard(payload) => Some(payload),
            Payload::Simple(_) => None,
        }
    }

    pub fn wire_size(&self) -> usize {
        match self {
            Payload::Standard(payload) => payload.wire_size(),
            Payload::Simple(payload) => payload.wire_size(),
        }
    }
}

impl From<StandardPayload> for Payload {
    fn from(payload: StandardPayload) -> Self {
        Payload::Standard(payload)
    }
}

impl From<SimplePayload> for Payload {
    fn from(payload: SimplePayload) -> Self {
        Payload::Simple(payload)
    }
}

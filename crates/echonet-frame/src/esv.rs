//! ECHONET Lite service codes.
//!
//! `0x6X` codes are requests, `0x7X` codes are responses and notifications,
//! `0x5X` codes are "service not available" responses.

use std::fmt;

/// Service code (ESV) of a standard payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Esv {
    SetISna,
    SetCSna,
    GetSna,
    InfSna,
    SetGetSna,
    SetI,
    SetC,
    Get,
    InfReq,
    SetGet,
    SetRes,
    GetRes,
    Inf,
    Infc,
    InfcRes,
    SetGetRes,
    /// A code outside the standard set, preserved as received.
    Unknown(u8),
}

impl Esv {
    pub const fn from_u8(code: u8) -> Self {
        match code {
            0x50 => Esv::SetISna,
            0x51 => Esv::SetCSna,
            0x52 => Esv::GetSna,
            0x53 => Esv::InfSna,
            0x5E => Esv::SetGetSna,
            0x60 => Esv::SetI,
            0x61 => Esv::SetC,
            0x62 => Esv::Get,
            0x63 => Esv::InfReq,
            0x6E => Esv::SetGet,
            0x71 => Esv::SetRes,
            0x72 => Esv::GetRes,
            0x73 => Esv::Inf,
            0x74 => Esv::Infc,
            0x7A => Esv::InfcRes,
            0x7E => Esv::SetGetRes,
            other => Esv::Unknown(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Esv::SetISna => 0x50,
            Esv::SetCSna => 0x51,
            Esv::GetSna => 0x52,
            Esv::InfSna => 0x53,
            Esv::SetGetSna => 0x5E,
            Esv::SetI => 0x60,
            Esv::SetC => 0x61,
            Esv::Get => 0x62,
            Esv::InfReq => 0x63,
            Esv::SetGet => 0x6E,
            Esv::SetRes => 0x71,
            Esv::GetRes => 0x72,
            Esv::Inf => 0x73,
            Esv::Infc => 0x74,
            Esv::InfcRes => 0x7A,
            Esv::SetGetRes => 0x7E,
            Esv::Unknown(code) => code,
        }
    }

    /// Requests a peer is expected to act upon.
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Esv::SetI | Esv::SetC | Esv::Get | Esv::InfReq | Esv::SetGet
        )
    }

    /// Unsolicited property announcements.
    pub const fn is_notification(self) -> bool {
        matches!(self, Esv::Inf | Esv::Infc)
    }

    pub const fn is_response(self) -> bool {
        matches!(
            self,
            Esv::SetRes | Esv::GetRes | Esv::InfcRes | Esv::SetGetRes
        ) || self.is_not_available()
    }

    /// "Service not available" responses.
    pub const fn is_not_available(self) -> bool {
        matches!(
            self,
            Esv::SetISna | Esv::SetCSna | Esv::GetSna | Esv::InfSna | Esv::SetGetSna
        )
    }

    /// Service codes whose payload carries a second property list.
    pub const fn has_second_list(self) -> bool {
        matches!(self, Esv::SetGet | Esv::SetGetRes | Esv::SetGetSna)
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, Esv::Unknown(_))
    }

    pub const fn name(self) -> &'static str {
        match self {
            Esv::SetISna => "SetI_SNA",
            Esv::SetCSna => "SetC_SNA",
            Esv::GetSna => "Get_SNA",
            Esv::InfSna => "INF_SNA",
            Esv::SetGetSna => "SetGet_SNA",
            Esv::SetI => "SetI",
            Esv::SetC => "SetC",
            Esv::Get => "Get",
            Esv::InfReq => "INF_REQ",
            Esv::SetGet => "SetGet",
            Esv::SetRes => "Set_Res",
            Esv::GetRes => "Get_Res",
            Esv::Inf => "INF",
            Esv::Infc => "INFC",
            Esv::InfcRes => "INFC_Res",
            Esv::SetGetRes => "SetGet_Res",
            Esv::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for Esv {
    fn from(code: u8) -> Self {
        Esv::from_u8(code)
    }
}

impl From<Esv> for u8 {
    fn from(esv: Esv) -> Self {
        esv.code()
    }
}

impl fmt::Display for Esv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Esv::Unknown(code) => write!(f, "UNKNOWN(0x{code:02x})"),
            known => f.write_str(known.name()),
        }
    }
}

//! Structural validation of standard payloads.
//!
//! Each property list is classified on its own, then the pair of
//! classifications is checked against the shape the service code requires.

use crate::esv::Esv;
use crate::payload::StandardPayload;
use crate::property::Property;

/// Shape of one property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyListState {
    /// The list is missing or empty.
    Absent,
    /// Every property carries data.
    WithData,
    /// No property carries data.
    WithoutData,
    /// Some properties carry data, some do not.
    Mixed,
    /// An EPC is invalid or a declared length disagrees with the data.
    Invalid,
}

/// Classify a single property list.
pub fn classify(list: Option<&[Property]>) -> PropertyListState {
    let list = match list {
        Some(list) if !list.is_empty() => list,
        _ => return PropertyListState::Absent,
    };

    let mut with_data = 0usize;
    for property in list {
        if !property.epc().is_valid() || !property.is_consistent() {
            return PropertyListState::Invalid;
        }
        if property.has_data() {
            with_data += 1;
        }
    }

    if with_data == list.len() {
        PropertyListState::WithData
    } else if with_data == 0 {
        PropertyListState::WithoutData
    } else {
        PropertyListState::Mixed
    }
}

/// True when the payload has the shape its service code requires.
pub fn validate_payload(payload: &StandardPayload) -> bool {
    use PropertyListState::*;

    let first = classify(Some(payload.first_properties()));
    let second = classify(payload.second_properties());

    match payload.esv {
        Esv::SetI | Esv::SetC => first == WithData && second == Absent,
        Esv::Get | Esv::InfReq => first == WithoutData && second == Absent,
        Esv::SetGet => first == WithData && second == WithoutData,
        Esv::SetRes | Esv::InfcRes => first == WithoutData && second == Absent,
        Esv::GetRes | Esv::Inf | Esv::Infc => first == WithData && second == Absent,
        Esv::SetGetRes => first == WithoutData && second == WithData,
        Esv::SetISna | Esv::SetCSna | Esv::GetSna | Esv::InfSna | Esv::SetGetSna => {
            first != Invalid && second != Invalid
        }
        Esv::Unknown(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eoj::Eoj;

    fn payload(esv: Esv) -> StandardPayload {
        StandardPayload::new(Eoj::CONTROLLER, Eoj::new(0x01, 0x30, 0x01), esv)
    }

    fn data(epc: u8) -> Property {
        Property::with_data(epc, vec![0x30]).unwrap()
    }

    #[test]
    fn classify_states() {
        assert_eq!(classify(None), PropertyListState::Absent);
        assert_eq!(classify(Some(&[])), PropertyListState::Absent);
        assert_eq!(classify(Some(&[data(0x80)])), PropertyListState::WithData);
        assert_eq!(
            classify(Some(&[Property::empty(0x80)])),
            PropertyListState::WithoutData
        );
        assert_eq!(
            classify(Some(&[data(0x80), Property::empty(0x81)])),
            PropertyListState::Mixed
        );
        assert_eq!(
            classify(Some(&[Property::empty(0x10)])),
            PropertyListState::Invalid
        );
        assert_eq!(
            classify(Some(&[Property::from_raw(0x80, 2, vec![0x01])])),
            PropertyListState::Invalid
        );
    }

    #[test]
    fn get_with_empty_property_is_valid() {
        assert!(validate_payload(
            &payload(Esv::Get).with_property(Property::empty(0x80))
        ));
    }

    #[test]
    fn get_with_declared_empty_but_data_is_invalid() {
        assert!(!validate_payload(
            &payload(Esv::Get).with_property(Property::from_raw(0x80, 0, vec![0x30]))
        ));
    }

    #[test]
    fn get_with_data_is_invalid() {
        assert!(!validate_payload(&payload(Esv::Get).with_property(data(0x80))));
    }

    #[test]
    fn set_requires_data_and_no_second_list() {
        assert!(validate_payload(&payload(Esv::SetC).with_property(data(0x80))));
        assert!(validate_payload(&payload(Esv::SetI).with_property(data(0x80))));
        assert!(!validate_payload(
            &payload(Esv::SetC).with_property(Property::empty(0x80))
        ));
        assert!(!validate_payload(&payload(Esv::SetC)));
    }

    #[test]
    fn set_get_shape() {
        let ok = payload(Esv::SetGet)
            .with_property(data(0x80))
            .with_second_property(Property::empty(0x80));
        assert!(validate_payload(&ok));

        let reversed = payload(Esv::SetGet)
            .with_property(Property::empty(0x80))
            .with_second_property(data(0x80));
        assert!(!validate_payload(&reversed));

        let missing_second = payload(Esv::SetGet).with_property(data(0x80));
        assert!(!validate_payload(&missing_second));
    }

    #[test]
    fn responses_reverse_request_shapes() {
        assert!(validate_payload(
            &payload(Esv::SetRes).with_property(Property::empty(0x80))
        ));
        assert!(validate_payload(&payload(Esv::GetRes).with_property(data(0x80))));
        assert!(validate_payload(
            &payload(Esv::SetGetRes)
                .with_property(Property::empty(0x80))
                .with_second_property(data(0x80))
        ));
        assert!(!validate_payload(
            &payload(Esv::GetRes).with_property(Property::empty(0x80))
        ));
    }

    #[test]
    fn notifications() {
        assert!(validate_payload(&payload(Esv::Inf).with_property(data(0xD5))));
        assert!(validate_payload(&payload(Esv::Infc).with_property(data(0xD5))));
        assert!(validate_payload(
            &payload(Esv::InfcRes).with_property(Property::empty(0xD5))
        ));
        assert!(validate_payload(
            &payload(Esv::InfReq).with_property(Property::empty(0xD5))
        ));
    }

    #[test]
    fn not_available_accepts_any_structurally_sound_shape() {
        let mixed = payload(Esv::GetSna)
            .with_property(data(0x80))
            .with_property(Property::empty(0x81));
        assert!(validate_payload(&mixed));
        assert!(validate_payload(&payload(Esv::SetCSna)));

        let broken = payload(Esv::GetSna).with_property(Property::empty(0x01));
        assert!(!validate_payload(&broken));
    }

    #[test]
    fn unknown_service_code_is_invalid() {
        assert!(!validate_payload(
            &payload(Esv::Unknown(0x99)).with_property(data(0x80))
        ));
    }
}

//! Descriptions of outbound exchanges.

use echonet_frame::{Eoj, Epc, Esv, Property, StandardPayload};
use echonet_transport::Node;

/// Strategy describing the request frames a transaction sends.
pub trait TransactionConfig: Send + Sync {
    fn sender(&self) -> Node;

    fn receiver(&self) -> Node;

    fn source_eoj(&self) -> Eoj;

    fn destination_eoj(&self) -> Eoj;

    fn esv(&self) -> Esv;

    /// Number of request frames to send.
    fn count_payloads(&self) -> usize;

    /// Attach the properties of request frame `index` to `payload`.
    fn add_payload_properties(&self, index: usize, payload: &mut StandardPayload);
}

/// Number of frames needed for `len` properties.
fn chunk_count(len: usize, max: Option<usize>) -> usize {
    match max {
        Some(max) if max > 0 && len > 0 => len.div_ceil(max),
        _ => 1,
    }
}

/// Properties carried by frame `index`.
fn chunk<T>(items: &[T], index: usize, max: Option<usize>) -> &[T] {
    match max {
        Some(max) if max > 0 => items.chunks(max).nth(index).unwrap_or(&[]),
        _ if index == 0 => items,
        _ => &[],
    }
}

/// Set, get, set-then-get and instance-request exchanges.
///
/// The service code follows from what was added: set and get properties
/// together use SetGet; set only uses SetC, or SetI when no response is
/// required; get only uses Get, or INF_REQ when announcing.
#[derive(Debug, Clone)]
pub struct SetGetTransactionConfig {
    sender: Node,
    receiver: Node,
    source_eoj: Eoj,
    destination_eoj: Eoj,
    set_properties: Vec<Property>,
    get_epcs: Vec<Epc>,
    response_required: bool,
    announce_request: bool,
    max_properties_per_frame: Option<usize>,
}

impl SetGetTransactionConfig {
    pub fn new(sender: Node, receiver: Node, source_eoj: Eoj, destination_eoj: Eoj) -> Self {
        Self {
            sender,
            receiver,
            source_eoj,
            destination_eoj,
            set_properties: Vec::new(),
            get_epcs: Vec::new(),
            response_required: true,
            announce_request: false,
            max_properties_per_frame: None,
        }
    }

    pub fn with_set(mut self, property: Property) -> Self {
        self.set_properties.push(property);
        self
    }

    pub fn with_get(mut self, epc: impl Into<Epc>) -> Self {
        self.get_epcs.push(epc.into());
        self
    }

    pub fn add_set(&mut self, property: Property) {
        self.set_properties.push(property);
    }

    pub fn add_get(&mut self, epc: impl Into<Epc>) {
        self.get_epcs.push(epc.into());
    }

    /// A set without a required response is sent as SetI.
    pub fn with_response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    /// A get sent as INF_REQ: the peer answers with announcements.
    pub fn with_announce_request(mut self, announce: bool) -> Self {
        self.announce_request = announce;
        self
    }

    /// Split set-only or get-only requests into frames of at most `max`
    /// properties. SetGet requests always use one frame.
    pub fn with_max_properties_per_frame(mut self, max: usize) -> Self {
        self.max_properties_per_frame = Some(max);
        self
    }

    pub fn set_properties(&self) -> &[Property] {
        &self.set_properties
    }

    pub fn get_epcs(&self) -> &[Epc] {
        &self.get_epcs
    }

    pub fn is_response_required(&self) -> bool {
        self.response_required
    }

    fn is_set_get(&self) -> bool {
        !self.set_properties.is_empty() && !self.get_epcs.is_empty()
    }
}

impl TransactionConfig for SetGetTransactionConfig {
    fn sender(&self) -> Node {
        self.sender.clone()
    }

    fn receiver(&self) -> Node {
        self.receiver.clone()
    }

    fn source_eoj(&self) -> Eoj {
        self.source_eoj
    }

    fn destination_eoj(&self) -> Eoj {
        self.destination_eoj
    }

    fn esv(&self) -> Esv {
        match (self.set_properties.is_empty(), self.get_epcs.is_empty()) {
            (false, false) => Esv::SetGet,
            (false, true) if self.response_required => Esv::SetC,
            (false, true) => Esv::SetI,
            _ if self.announce_request => Esv::InfReq,
            _ => Esv::Get,
        }
    }

    fn count_payloads(&self) -> usize {
        if self.is_set_get() {
            return 1;
        }
        let len = self.set_properties.len().max(self.get_epcs.len());
        chunk_count(len, self.max_properties_per_frame)
    }

    fn add_payload_properties(&self, index: usize, payload: &mut StandardPayload) {
        if self.is_set_get() {
            if index == 0 {
                for property in &self.set_properties {
                    payload.add_first_property(property.clone());
                }
                for &epc in &self.get_epcs {
                    payload.add_second_property(Property::empty(epc));
                }
            }
            return;
        }
        let max = self.max_properties_per_frame;
        for property in chunk(&self.set_properties, index, max) {
            payload.add_first_property(property.clone());
        }
        for &epc in chunk(&self.get_epcs, index, max) {
            payload.add_first_property(Property::empty(epc));
        }
    }
}

/// Announcements of property values: INF, or INFC when the receiver must
/// acknowledge.
#[derive(Debug, Clone)]
pub struct AnnounceTransactionConfig {
    sender: Node,
    receiver: Node,
    source_eoj: Eoj,
    destination_eoj: Eoj,
    properties: Vec<Property>,
    response_required: bool,
    max_properties_per_frame: Option<usize>,
}

impl AnnounceTransactionConfig {
    pub fn new(sender: Node, receiver: Node, source_eoj: Eoj, destination_eoj: Eoj) -> Self {
        Self {
            sender,
            receiver,
            source_eoj,
            destination_eoj,
            properties: Vec::new(),
            response_required: false,
            max_properties_per_frame: None,
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn with_response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    pub fn with_max_properties_per_frame(mut self, max: usize) -> Self {
        self.max_properties_per_frame = Some(max);
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
}

impl TransactionConfig for AnnounceTransactionConfig {
    fn sender(&self) -> Node {
        self.sender.clone()
    }

    fn receiver(&self) -> Node {
        self.receiver.clone()
    }

    fn source_eoj(&self) -> Eoj {
        self.source_eoj
    }

    fn destination_eoj(&self) -> Eoj {
        self.destination_eoj
    }

    fn esv(&self) -> Esv {
        if self.response_required {
            Esv::Infc
        } else {
            Esv::Inf
        }
    }

    fn count_payloads(&self) -> usize {
        chunk_count(self.properties.len(), self.max_properties_per_frame)
    }

    fn add_payload_properties(&self, index: usize, payload: &mut StandardPayload) {
        for property in chunk(&self.properties, index, self.max_properties_per_frame) {
            payload.add_first_property(property.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use echonet_frame::validate_payload;
    use echonet_transport::{NodeInfo, SubnetId};

    use super::*;

    fn nodes() -> (Node, Node) {
        let id = SubnetId::next();
        (
            Node::new(id, NodeInfo::internal("controller")),
            Node::new(id, NodeInfo::internal("device")),
        )
    }

    fn set_get() -> SetGetTransactionConfig {
        let (sender, receiver) = nodes();
        SetGetTransactionConfig::new(sender, receiver, Eoj::CONTROLLER, Eoj::NODE_PROFILE)
    }

    fn payload(config: &dyn TransactionConfig, index: usize) -> StandardPayload {
        let mut payload =
            StandardPayload::new(config.source_eoj(), config.destination_eoj(), config.esv());
        config.add_payload_properties(index, &mut payload);
        payload
    }

    fn on() -> Property {
        Property::with_data(0x80, vec![0x30]).unwrap()
    }

    #[test]
    fn service_code_follows_contents() {
        assert_eq!(set_get().with_get(0x80).esv(), Esv::Get);
        assert_eq!(
            set_get().with_get(0xD6).with_announce_request(true).esv(),
            Esv::InfReq
        );
        assert_eq!(set_get().with_set(on()).esv(), Esv::SetC);
        assert_eq!(
            set_get().with_set(on()).with_response_required(false).esv(),
            Esv::SetI
        );
        assert_eq!(set_get().with_set(on()).with_get(0x80).esv(), Esv::SetGet);
    }

    #[test]
    fn built_payloads_validate() {
        let configs = [
            set_get().with_get(0x80).with_get(0x81),
            set_get().with_set(on()),
            set_get().with_set(on()).with_get(0x80),
        ];
        for config in &configs {
            assert_eq!(config.count_payloads(), 1);
            let built = payload(config, 0);
            assert!(validate_payload(&built), "{:?} should validate", built.esv);
        }
    }

    #[test]
    fn set_get_puts_gets_in_second_list() {
        let config = set_get().with_set(on()).with_get(0x80).with_get(0x81);
        let built = payload(&config, 0);
        assert_eq!(built.first_opc(), 1);
        assert_eq!(built.second_opc(), 2);
        assert!(!built.second_properties().unwrap()[0].has_data());
    }

    #[test]
    fn gets_split_across_frames() {
        let config = set_get()
            .with_get(0x80)
            .with_get(0x81)
            .with_get(0x82)
            .with_max_properties_per_frame(2);
        assert_eq!(config.count_payloads(), 2);
        assert_eq!(payload(&config, 0).first_opc(), 2);
        assert_eq!(payload(&config, 1).first_opc(), 1);
        assert_eq!(payload(&config, 1).first_properties()[0].epc(), Epc(0x82));
    }

    #[test]
    fn set_get_ignores_frame_limit() {
        let config = set_get()
            .with_set(on())
            .with_set(Property::with_data(0x81, vec![0x01]).unwrap())
            .with_get(0x80)
            .with_max_properties_per_frame(1);
        assert_eq!(config.count_payloads(), 1);
        assert_eq!(payload(&config, 0).first_opc(), 2);
    }

    #[test]
    fn empty_config_sends_one_frame() {
        let config = set_get().with_max_properties_per_frame(3);
        assert_eq!(config.count_payloads(), 1);
        assert_eq!(payload(&config, 0).first_opc(), 0);
    }

    #[test]
    fn announce_uses_inf_or_infc() {
        let (sender, receiver) = nodes();
        let config =
            AnnounceTransactionConfig::new(sender, receiver, Eoj::NODE_PROFILE, Eoj::NODE_PROFILE)
                .with_property(on());
        assert_eq!(config.esv(), Esv::Inf);
        let config = config.with_response_required(true);
        assert_eq!(config.esv(), Esv::Infc);
        assert!(validate_payload(&payload(&config, 0)));
    }

    #[test]
    fn announce_splits_properties() {
        let (sender, receiver) = nodes();
        let mut config =
            AnnounceTransactionConfig::new(sender, receiver, Eoj::NODE_PROFILE, Eoj::NODE_PROFILE)
                .with_max_properties_per_frame(1);
        config.add_property(on());
        config.add_property(Property::with_data(0xD5, vec![0x01, 0x05, 0xFF, 0x01]).unwrap());
        assert_eq!(config.count_payloads(), 2);
        assert_eq!(payload(&config, 1).first_properties()[0].epc(), Epc(0xD5));
        assert!(payload(&config, 2).first_properties().is_empty());
    }
}

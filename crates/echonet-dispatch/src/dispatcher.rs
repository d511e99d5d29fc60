use std::sync::Arc;

use echonet_frame::{validate_payload, Esv};
use echonet_transport::{Frame, Listener, Subnet};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::processor::RequestProcessor;

/// Listener that fans requests and notifications out to processors.
///
/// Frames without a standard payload or with a response service code are
/// ignored. Malformed requests still reach the processors so they can
/// answer with the matching not-available response, unless payload
/// validation is switched on.
#[derive(Default)]
pub struct RequestDispatcher {
    processors: Mutex<Vec<Arc<dyn RequestProcessor>>>,
    validate: bool,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop requests whose property lists do not fit their service code
    /// before any processor sees them.
    pub fn with_payload_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn add_processor(&self, processor: Arc<dyn RequestProcessor>) {
        self.processors.lock().push(processor);
    }

    /// Remove a processor by identity. Returns false when it was not added.
    pub fn remove_processor(&self, processor: &Arc<dyn RequestProcessor>) -> bool {
        let mut processors = self.processors.lock();
        let before = processors.len();
        processors.retain(|p| !Arc::ptr_eq(p, processor));
        before != processors.len()
    }

    pub fn count_processors(&self) -> usize {
        self.processors.lock().len()
    }

    fn processors(&self) -> Vec<Arc<dyn RequestProcessor>> {
        self.processors.lock().clone()
    }
}

fn route(
    processor: &dyn RequestProcessor,
    esv: Esv,
    subnet: &dyn Subnet,
    frame: &Frame,
    processed: bool,
) -> bool {
    match esv {
        Esv::SetI => processor.process_set_i(subnet, frame, processed),
        Esv::SetC => processor.process_set_c(subnet, frame, processed),
        Esv::Get => processor.process_get(subnet, frame, processed),
        Esv::SetGet => processor.process_set_get(subnet, frame, processed),
        Esv::InfReq => processor.process_inf_req(subnet, frame, processed),
        Esv::Inf => processor.process_inf(subnet, frame, processed),
        Esv::Infc => processor.process_infc(subnet, frame, processed),
        _ => false,
    }
}

impl Listener for RequestDispatcher {
    fn process(&self, subnet: &dyn Subnet, frame: &Frame, processed: bool) -> bool {
        let Some(payload) = frame.standard_payload() else {
            return false;
        };
        let esv = payload.esv;
        if !esv.is_request() && !esv.is_notification() {
            return false;
        }
        if self.validate && !validate_payload(payload) {
            debug!(tid = frame.tid(), %esv, sender = %frame.sender(), "ignoring malformed request");
            return false;
        }

        trace!(tid = frame.tid(), %esv, "dispatching request");
        let mut processed = processed;
        let mut consumed = false;
        for processor in self.processors() {
            let result = route(&*processor, esv, subnet, frame, processed);
            processed |= result;
            consumed |= result;
        }
        consumed
    }
}

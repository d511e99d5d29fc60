#![allow(dead_code)]

use std::sync::Arc;

use echonet::dispatch::RequestProcessor;
use echonet::frame::{CommonFrame, Eoj, Esv, Property, StandardPayload};
use echonet::transaction::{Transaction, TransactionListener};
use echonet::transport::{Frame, Subnet};
use parking_lot::Mutex;

/// A device object answering Get and SetC for a single status byte per
/// property code.
pub struct Device {
    pub eoj: Eoj,
    pub status: Mutex<u8>,
}

impl Device {
    pub fn new(eoj: Eoj, status: u8) -> Arc<Self> {
        Arc::new(Self {
            eoj,
            status: Mutex::new(status),
        })
    }

    fn reply(&self, subnet: &dyn Subnet, request: &Frame, payload: StandardPayload) -> bool {
        let mut reply = Frame::new(
            subnet.local_node(),
            request.sender().clone(),
            CommonFrame::standard(request.tid(), payload),
        );
        reply.set_connection(request.connection().cloned());
        subnet.send(reply).is_ok()
    }
}

impl RequestProcessor for Device {
    fn process_get(&self, subnet: &dyn Subnet, frame: &Frame, _processed: bool) -> bool {
        let Some(request) = frame.standard_payload() else {
            return false;
        };
        if !self.eoj.is_member_of(request.deoj) {
            return false;
        }
        let status = *self.status.lock();
        let mut response = StandardPayload::new(self.eoj, request.seoj, Esv::GetRes);
        for property in request.first_properties() {
            response.add_first_property(
                Property::with_data(property.epc(), vec![status]).expect("one byte fits"),
            );
        }
        self.reply(subnet, frame, response)
    }

    fn process_set_c(&self, subnet: &dyn Subnet, frame: &Frame, _processed: bool) -> bool {
        let Some(request) = frame.standard_payload() else {
            return false;
        };
        if !self.eoj.is_member_of(request.deoj) {
            return false;
        }
        let mut response = StandardPayload::new(self.eoj, request.seoj, Esv::SetRes);
        for property in request.first_properties() {
            if let Some(&value) = property.edt().first() {
                *self.status.lock() = value;
            }
            response.add_first_property(Property::empty(property.epc()));
        }
        self.reply(subnet, frame, response)
    }
}

/// Records accepted responses.
#[derive(Default)]
pub struct Collector {
    pub responses: Mutex<Vec<Frame>>,
    pub finished: Mutex<usize>,
}

impl TransactionListener for Collector {
    fn receive(&self, _transaction: &Transaction, _subnet: &dyn Subnet, frame: &Frame) {
        self.responses.lock().push(frame.clone());
    }

    fn finish(&self, _transaction: &Transaction) {
        *self.finished.lock() += 1;
    }
}

/// Finishes the transaction on its first response.
pub struct FinishOnFirst;

impl TransactionListener for FinishOnFirst {
    fn receive(&self, transaction: &Transaction, _subnet: &dyn Subnet, _frame: &Frame) {
        transaction.finish();
    }
}

pub fn first_edt(frame: &Frame) -> Option<u8> {
    frame
        .standard_payload()?
        .first_properties()
        .first()?
        .edt()
        .first()
        .copied()
}

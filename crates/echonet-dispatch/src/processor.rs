use echonet_transport::{Frame, Subnet};

/// Handler for inbound requests and notifications, one method per service
/// code. Each returns whether it consumed the frame; all default to false.
///
/// `processed` reports whether an earlier processor already consumed the
/// frame. It is advisory: a processor may still act on it.
pub trait RequestProcessor: Send + Sync {
    fn process_set_i(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_set_c(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_get(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_set_get(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_inf_req(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_inf(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }

    fn process_infc(&self, _subnet: &dyn Subnet, _frame: &Frame, _processed: bool) -> bool {
        false
    }
}

use crate::frame::Frame;
use crate::subnet::Subnet;

/// Something that can be offered an inbound frame.
///
/// `processed` tells the listener whether an earlier listener already
/// consumed the frame; it is advisory. The return value reports whether
/// this listener consumed it.
pub trait Listener: Send + Sync {
    fn process(&self, subnet: &dyn Subnet, frame: &Frame, processed: bool) -> bool;
}

impl<F> Listener for F
where
    F: Fn(&dyn Subnet, &Frame, bool) -> bool + Send + Sync,
{
    fn process(&self, subnet: &dyn Subnet, frame: &Frame, processed: bool) -> bool {
        self(subnet, frame, processed)
    }
}

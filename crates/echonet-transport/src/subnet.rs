use std::time::Duration;

use crate::error::Result;
use crate::frame::Frame;
use crate::node::{Node, NodeInfo, SubnetId};

/// A network segment that moves frames between its nodes.
///
/// Implementations own their sockets and receiver threads; `receive` serves
/// frames from every channel through one hand-off point.
pub trait Subnet: Send + Sync {
    /// Identity used to check node membership.
    fn id(&self) -> SubnetId;

    /// Send a frame. Sender and receiver must be nodes of this subnet.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Block until a frame addressed to this node (or its group) arrives.
    fn receive(&self) -> Result<Frame>;

    /// Like [`Subnet::receive`] but gives up after `timeout`.
    fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>>;

    /// The node representing this endpoint.
    fn local_node(&self) -> Node;

    /// The broadcast/multicast node.
    fn group_node(&self) -> Node;

    /// Resolve an address to a node of this subnet.
    fn remote_node(&self, info: &NodeInfo) -> Result<Node>;

    fn is_valid_node(&self, node: &Node) -> bool {
        node.is_member_of(self.id())
    }
}

impl<S: Subnet + ?Sized> Subnet for std::sync::Arc<S> {
    fn id(&self) -> SubnetId {
        (**self).id()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn receive(&self) -> Result<Frame> {
        (**self).receive()
    }

    fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        (**self).receive_timeout(timeout)
    }

    fn local_node(&self) -> Node {
        (**self).local_node()
    }

    fn group_node(&self) -> Node {
        (**self).group_node()
    }

    fn remote_node(&self, info: &NodeInfo) -> Result<Node> {
        (**self).remote_node(info)
    }

    fn is_valid_node(&self, node: &Node) -> bool {
        (**self).is_valid_node(node)
    }
}

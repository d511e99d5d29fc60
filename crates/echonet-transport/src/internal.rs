//! In-process network.
//!
//! Every frame sent on an [`InternalNetwork`] is offered to every attached
//! subnet, the sender included. Each subnet keeps only frames addressed to
//! its own node or to the group, the same filter the datagram channel
//! applies to looped-back traffic. Like a datagram medium, the network
//! never waits on a slow member: a frame that finds a full receive queue
//! is dropped for that member.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Result, SubnetError};
use crate::frame::Frame;
use crate::node::{Node, NodeInfo, SubnetId};
use crate::queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
use crate::subnet::Subnet;

/// Name of the group node on an internal network.
pub const GROUP_NAME: &str = "*";

/// Shared medium that internal subnets attach to.
#[derive(Clone, Default)]
pub struct InternalNetwork {
    inner: Arc<NetworkInner>,
}

#[derive(Default)]
struct NetworkInner {
    members: Mutex<Vec<Weak<Member>>>,
}

struct Member {
    id: SubnetId,
    local: NodeInfo,
    queue: FrameQueue,
}

impl Member {
    fn offer(&self, sender: &NodeInfo, receiver: &NodeInfo, frame: &Frame) {
        if *receiver != self.local && *receiver != group_info() {
            trace!(subnet = %self.id, %receiver, "discarding frame for another node");
            return;
        }
        let mut delivered = Frame::new(
            Node::new(self.id, sender.clone()),
            Node::new(self.id, receiver.clone()),
            frame.common().clone(),
        );
        delivered.set_connection(frame.connection().cloned());
        match self.queue.try_push(delivered) {
            Ok(()) => {}
            Err(SubnetError::QueueFull) => {
                warn!(subnet = %self.id, tid = frame.tid(), "receive queue full, dropping frame");
            }
            Err(_) => debug!(subnet = %self.id, "dropping frame for stopped subnet"),
        }
    }
}

impl InternalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subnets currently attached.
    pub fn len(&self) -> usize {
        self.inner
            .members
            .lock()
            .iter()
            .filter(|m| m.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn attach(&self, member: &Arc<Member>) {
        let mut members = self.inner.members.lock();
        members.retain(|m| m.strong_count() > 0);
        members.push(Arc::downgrade(member));
    }

    fn detach(&self, id: SubnetId) {
        self.inner
            .members
            .lock()
            .retain(|m| m.upgrade().is_some_and(|member| member.id != id));
    }

    fn broadcast(&self, frame: &Frame) {
        let members: Vec<Arc<Member>> = self
            .inner
            .members
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        let sender = frame.sender().info();
        let receiver = frame.receiver().info();
        for member in members {
            member.offer(sender, receiver, frame);
        }
    }
}

/// A subnet attached to an [`InternalNetwork`].
pub struct InternalSubnet {
    member: Arc<Member>,
    network: InternalNetwork,
}

impl InternalSubnet {
    /// Attach a new subnet named `name` to `network`.
    pub fn new(network: &InternalNetwork, name: impl Into<String>) -> Result<Self> {
        Self::with_capacity(network, name, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        network: &InternalNetwork,
        name: impl Into<String>,
        capacity: usize,
    ) -> Result<Self> {
        let name = name.into();
        let local = NodeInfo::Internal(name);
        if local == group_info() {
            return Err(SubnetError::UnsupportedNode(local));
        }
        let member = Arc::new(Member {
            id: SubnetId::next(),
            local,
            queue: FrameQueue::new(capacity),
        });
        network.attach(&member);
        debug!(subnet = %member.id, local = %member.local, "internal subnet attached");
        Ok(Self {
            member,
            network: network.clone(),
        })
    }

    /// Detach from the network and wake blocked receivers.
    pub fn stop(&self) {
        self.member.queue.close();
        self.network.detach(self.member.id);
    }

    pub fn is_running(&self) -> bool {
        !self.member.queue.is_closed()
    }
}

impl Drop for InternalSubnet {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Subnet for InternalSubnet {
    fn id(&self) -> SubnetId {
        self.member.id
    }

    fn send(&self, frame: Frame) -> Result<()> {
        if !self.is_running() {
            return Err(SubnetError::NotStarted);
        }
        if !self.is_valid_node(frame.sender()) {
            return Err(SubnetError::InvalidSender(frame.sender().info().clone()));
        }
        if !self.is_valid_node(frame.receiver()) {
            return Err(SubnetError::InvalidReceiver(
                frame.receiver().info().clone(),
            ));
        }
        trace!(subnet = %self.member.id, tid = frame.tid(), receiver = %frame.receiver().info(), "internal send");
        self.network.broadcast(&frame);
        Ok(())
    }

    fn receive(&self) -> Result<Frame> {
        self.member.queue.pop()
    }

    fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        self.member.queue.pop_timeout(timeout)
    }

    fn local_node(&self) -> Node {
        Node::new(self.member.id, self.member.local.clone())
    }

    fn group_node(&self) -> Node {
        Node::new(self.member.id, group_info())
    }

    fn remote_node(&self, info: &NodeInfo) -> Result<Node> {
        match info {
            NodeInfo::Internal(_) => Ok(Node::new(self.member.id, info.clone())),
            other => Err(SubnetError::UnsupportedNode(other.clone())),
        }
    }
}

fn group_info() -> NodeInfo {
    NodeInfo::Internal(GROUP_NAME.to_string())
}

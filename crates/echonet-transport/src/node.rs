use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_SUBNET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one subnet instance.
///
/// Nodes remember the subnet that issued them; a subnet only accepts its
/// own nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubnetId(u64);

impl SubnetId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_SUBNET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subnet-{}", self.0)
    }
}

/// Subnet-independent, serializable address of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "address", rename_all = "snake_case")]
pub enum NodeInfo {
    /// An IP endpoint; the port is the peer's datagram port.
    Inet(SocketAddr),
    /// A named endpoint on an in-process network.
    Internal(String),
}

impl NodeInfo {
    pub fn internal(name: impl Into<String>) -> Self {
        NodeInfo::Internal(name.into())
    }

    pub fn as_socket_addr(&self) -> Option<SocketAddr> {
        match self {
            NodeInfo::Inet(addr) => Some(*addr),
            NodeInfo::Internal(_) => None,
        }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeInfo::Inet(addr) => write!(f, "{addr}"),
            NodeInfo::Internal(name) => write!(f, "internal:{name}"),
        }
    }
}

impl From<SocketAddr> for NodeInfo {
    fn from(addr: SocketAddr) -> Self {
        NodeInfo::Inet(addr)
    }
}

/// A node as seen by one particular subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    subnet: SubnetId,
    info: NodeInfo,
}

impl Node {
    /// Bind an address to a subnet. Normally called by the subnet itself.
    pub fn new(subnet: SubnetId, info: NodeInfo) -> Self {
        Self { subnet, info }
    }

    pub fn subnet_id(&self) -> SubnetId {
        self.subnet
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn is_member_of(&self, subnet: SubnetId) -> bool {
        self.subnet == subnet
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.info, self.subnet)
    }
}

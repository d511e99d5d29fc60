//! ECHONET Lite subnets.
//!
//! A [`Subnet`] moves [`Frame`]s between nodes and serves everything it
//! receives through one blocking hand-off point:
//! - [`InternalSubnet`] attaches to an in-process [`InternalNetwork`]
//! - [`InetSubnet`] speaks UDP (unicast and multicast) and, optionally,
//!   TCP sessions kept in a [`TcpConnectionPool`]
//!
//! Receiver threads decode inbound bytes and push frames into a bounded
//! [`FrameQueue`]; stopping a subnet closes the queue and wakes callers.

pub mod connection;
pub mod error;
pub mod frame;
pub mod inet;
pub mod internal;
pub mod listener;
pub mod node;
pub mod pool;
pub mod queue;
pub mod subnet;

mod tcp;
mod udp;

pub use connection::Connection;
pub use error::{Result, SubnetError};
pub use frame::Frame;
pub use inet::{
    InetSubnet, InetSubnetConfig, SessionPolicy, TcpConfig, DEFAULT_GROUP_V4, DEFAULT_GROUP_V6,
    DEFAULT_PORT,
};
pub use internal::{InternalNetwork, InternalSubnet, GROUP_NAME};
pub use listener::Listener;
pub use node::{Node, NodeInfo, SubnetId};
pub use pool::TcpConnectionPool;
pub use queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
pub use subnet::Subnet;

use std::net::SocketAddr;

use crate::node::NodeInfo;

/// Errors raised by subnets, sessions and their receiver threads.
#[derive(Debug, thiserror::Error)]
pub enum SubnetError {
    /// The frame's sender is not a node of this subnet.
    #[error("invalid sender node: {0}")]
    InvalidSender(NodeInfo),

    /// The frame's receiver is not a node of this subnet.
    #[error("invalid receiver node: {0}")]
    InvalidReceiver(NodeInfo),

    /// The node address cannot be used on this subnet.
    #[error("unsupported node address: {0}")]
    UnsupportedNode(NodeInfo),

    /// The subnet has not been started, or has been stopped.
    #[error("subnet not started")]
    NotStarted,

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to join the multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    JoinGroup {
        group: std::net::IpAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on a socket.
    #[error("subnet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or stream framing failed.
    #[error("frame error: {0}")]
    Frame(#[from] echonet_frame::FrameError),

    /// The session is closed in the direction that was used.
    #[error("connection {0} closed")]
    ConnectionClosed(u64),

    /// A receive queue was full and the frame was not queued.
    #[error("receive queue full")]
    QueueFull,

    /// The subnet shut down while a caller was waiting.
    #[error("subnet shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, SubnetError>;

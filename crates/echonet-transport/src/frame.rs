use std::fmt;

use echonet_frame::{CommonFrame, StandardPayload};

use crate::connection::Connection;
use crate::node::Node;

/// A common frame in transit between two nodes of one subnet.
#[derive(Clone)]
pub struct Frame {
    sender: Node,
    receiver: Node,
    common: CommonFrame,
    connection: Option<Connection>,
}

impl Frame {
    pub fn new(sender: Node, receiver: Node, common: CommonFrame) -> Self {
        Self {
            sender,
            receiver,
            common,
            connection: None,
        }
    }

    /// Attach the session this frame travels (or arrived) on.
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn sender(&self) -> &Node {
        &self.sender
    }

    pub fn receiver(&self) -> &Node {
        &self.receiver
    }

    pub fn common(&self) -> &CommonFrame {
        &self.common
    }

    pub fn common_mut(&mut self) -> &mut CommonFrame {
        &mut self.common
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: Option<Connection>) {
        self.connection = connection;
    }

    pub fn tid(&self) -> u16 {
        self.common.tid()
    }

    pub fn standard_payload(&self) -> Option<&StandardPayload> {
        self.common.standard_payload()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sender", &self.sender.to_string())
            .field("receiver", &self.receiver.to_string())
            .field("common", &self.common)
            .field("connection", &self.connection.as_ref().map(Connection::id))
            .finish()
    }
}

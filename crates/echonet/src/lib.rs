//! ECHONET Lite protocol core.
//!
//! # Crate Structure
//!
//! - [`frame`]: Frame codec, payload validator and stream framing
//! - [`transport`]: Subnets: in-process network, UDP multicast, TCP sessions
//! - [`transaction`]: TID-correlated request/response exchanges (behind `transaction` feature)
//! - [`dispatch`]: Receive loop and request dispatch (behind `dispatch` feature)
//! - [`logging`]: `tracing` subscriber setup (behind `logging` feature)

/// Re-export frame types.
pub mod frame {
    pub use echonet_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use echonet_transport::*;
}

/// Re-export transaction types (requires `transaction` feature).
#[cfg(feature = "transaction")]
pub mod transaction {
    pub use echonet_transaction::*;
}

/// Re-export dispatch types (requires `dispatch` feature).
#[cfg(feature = "dispatch")]
pub mod dispatch {
    pub use echonet_dispatch::*;
}

#[cfg(feature = "logging")]
pub mod logging;

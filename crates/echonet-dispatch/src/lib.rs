//! Receive loop and request dispatch.
//!
//! [`MainLoop`] pulls frames from a subnet and offers each one to its
//! listeners in order; every listener learns whether an earlier one already
//! consumed the frame. [`RequestDispatcher`] is a listener that forwards
//! requests and notifications to [`RequestProcessor`]s by service code.

pub mod dispatcher;
pub mod main_loop;
pub mod processor;

pub use dispatcher::RequestDispatcher;
pub use main_loop::{MainLoop, MainLoopHandle, DEFAULT_POLL_INTERVAL};
pub use processor::RequestProcessor;

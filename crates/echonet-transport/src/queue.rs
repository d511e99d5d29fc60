use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, SubnetError};
use crate::frame::Frame;

/// Default number of frames buffered between receiver threads and the
/// consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Bounded hand-off point between receiver threads and `Subnet::receive`.
///
/// [`push`](Self::push) blocks while the queue is full and
/// [`try_push`](Self::try_push) refuses instead. Closing the queue wakes every
/// blocked producer and consumer with [`SubnetError::Shutdown`].
pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    closed: AtomicBool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        let (shutdown_tx, shutdown_rx) = channel::bounded(0);
        Self {
            tx,
            rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Hand a frame to the consumer, blocking while the queue is full.
    pub fn push(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(SubnetError::Shutdown);
        }
        channel::select! {
            send(self.tx, frame) -> res => res.map_err(|_| SubnetError::Shutdown),
            recv(self.shutdown_rx) -> _ => Err(SubnetError::Shutdown),
        }
    }

    /// Hand a frame to the consumer without waiting. Fails with
    /// [`SubnetError::QueueFull`] when there is no room.
    pub fn try_push(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(SubnetError::Shutdown);
        }
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => SubnetError::QueueFull,
            TrySendError::Disconnected(_) => SubnetError::Shutdown,
        })
    }

    /// Block until a frame is available.
    pub fn pop(&self) -> Result<Frame> {
        if self.is_closed() {
            return Err(SubnetError::Shutdown);
        }
        channel::select! {
            recv(self.rx) -> frame => frame.map_err(|_| SubnetError::Shutdown),
            recv(self.shutdown_rx) -> _ => Err(SubnetError::Shutdown),
        }
    }

    /// Wait up to `timeout` for a frame.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        if self.is_closed() {
            return Err(SubnetError::Shutdown);
        }
        channel::select! {
            recv(self.rx) -> frame => frame.map(Some).map_err(|_| SubnetError::Shutdown),
            recv(self.shutdown_rx) -> _ => Err(SubnetError::Shutdown),
            default(timeout) => Ok(None),
        }
    }

    /// Close the queue. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown_tx.lock().take();
            debug!(pending = self.rx.len(), "frame queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

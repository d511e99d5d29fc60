use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use echonet_frame::{CommonFrame, StandardPayload};
use echonet_transport::{Frame, Subnet};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, trace, warn};

use crate::config::TransactionConfig;
use crate::error::{Result, TransactionError};
use crate::listener::TransactionListener;
use crate::manager::ManagerInner;
use crate::rules;
use crate::timer::{Timer, TimerHandle};

/// Lifecycle of a transaction. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Idle,
    Waiting,
    Done,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "idle",
            TransactionState::Waiting => "waiting",
            TransactionState::Done => "done",
        };
        f.write_str(name)
    }
}

struct Core {
    state: TransactionState,
    responses: usize,
    timeout: Duration,
    timer: Option<TimerHandle>,
}

struct TransactionInner {
    tid: u16,
    subnet: Arc<dyn Subnet>,
    config: Box<dyn TransactionConfig>,
    manager: Weak<ManagerInner>,
    timer: Timer,
    // `execute`, `recv_response` and `finish` serialize on this lock. It is
    // re-entrant so listener callbacks may call `finish`; the cell borrow is
    // never held across a callback.
    core: ReentrantMutex<RefCell<Core>>,
    listeners: Mutex<Vec<Arc<dyn TransactionListener>>>,
    done: Mutex<bool>,
    done_signal: Condvar,
}

/// A correlated request/response exchange.
///
/// Created by a [`TransactionManager`](crate::TransactionManager). Cloning
/// yields another handle to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    pub(crate) fn new(
        tid: u16,
        subnet: Arc<dyn Subnet>,
        config: Box<dyn TransactionConfig>,
        manager: Weak<ManagerInner>,
        timer: Timer,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                tid,
                subnet,
                config,
                manager,
                timer,
                core: ReentrantMutex::new(RefCell::new(Core {
                    state: TransactionState::Idle,
                    responses: 0,
                    timeout,
                    timer: None,
                })),
                listeners: Mutex::new(Vec::new()),
                done: Mutex::new(false),
                done_signal: Condvar::new(),
            }),
        }
    }

    pub fn tid(&self) -> u16 {
        self.inner.tid
    }

    pub fn subnet(&self) -> &dyn Subnet {
        &*self.inner.subnet
    }

    pub fn config(&self) -> &dyn TransactionConfig {
        &*self.inner.config
    }

    pub fn state(&self) -> TransactionState {
        self.inner.core.lock().borrow().state
    }

    pub fn is_done(&self) -> bool {
        self.state() == TransactionState::Done
    }

    /// Responses accepted so far.
    pub fn count_responses(&self) -> usize {
        self.inner.core.lock().borrow().responses
    }

    pub fn timeout(&self) -> Duration {
        self.inner.core.lock().borrow().timeout
    }

    /// Takes effect on the next `execute`. Zero waits until `finish`.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.core.lock().borrow_mut().timeout = timeout;
    }

    pub fn add_listener(&self, listener: Arc<dyn TransactionListener>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Remove a listener by identity. Returns false when it was not added.
    pub fn remove_listener(&self, listener: &Arc<dyn TransactionListener>) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    fn listeners(&self) -> Vec<Arc<dyn TransactionListener>> {
        self.inner.listeners.lock().clone()
    }

    /// Send the request frames and start waiting for responses.
    ///
    /// A send failure finishes the transaction and is returned.
    pub fn execute(&self) -> Result<()> {
        let guard = self.inner.core.lock();
        {
            let mut core = guard.borrow_mut();
            if core.state != TransactionState::Idle {
                return Err(TransactionError::NotIdle {
                    tid: self.tid(),
                    state: core.state,
                });
            }
            core.state = TransactionState::Waiting;
        }
        debug!(tid = self.tid(), esv = %self.inner.config.esv(), "transaction started");

        for listener in self.listeners() {
            listener.begin(self);
        }
        if let Some(manager) = self.inner.manager.upgrade() {
            manager.add(self.clone());
        }

        let subnet = &*self.inner.subnet;
        for index in 0..self.inner.config.count_payloads() {
            let frame = self.build_frame(index);
            let result = subnet.send(frame.clone());
            for listener in self.listeners() {
                listener.send(self, subnet, &frame, result.is_ok());
            }
            if let Err(err) = result {
                warn!(tid = self.tid(), index, error = %err, "request send failed");
                self.finish();
                return Err(err.into());
            }
            trace!(tid = self.tid(), index, "request sent");
        }

        let timeout = guard.borrow().timeout;
        // A listener may already have finished the transaction.
        if timeout.is_zero() || guard.borrow().state != TransactionState::Waiting {
            return Ok(());
        }
        let weak = Arc::downgrade(&self.inner);
        let scheduled = self.inner.timer.schedule(timeout, move || {
            if let Some(inner) = weak.upgrade() {
                let transaction = Transaction { inner };
                trace!(tid = transaction.tid(), "transaction timed out");
                transaction.finish();
            }
        });
        match scheduled {
            Ok(handle) => {
                guard.borrow_mut().timer = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.finish();
                Err(err)
            }
        }
    }

    fn build_frame(&self, index: usize) -> Frame {
        let config = &*self.inner.config;
        let mut payload =
            StandardPayload::new(config.source_eoj(), config.destination_eoj(), config.esv());
        config.add_payload_properties(index, &mut payload);
        Frame::new(
            config.sender(),
            config.receiver(),
            CommonFrame::standard(self.tid(), payload),
        )
    }

    /// Offer an inbound frame. Returns true if it was accepted as a
    /// response; anything else is left for other listeners.
    pub fn recv_response(&self, frame: &Frame) -> bool {
        let guard = self.inner.core.lock();
        if guard.borrow().state != TransactionState::Waiting {
            return false;
        }
        let Some(payload) = frame.standard_payload() else {
            return false;
        };
        if frame.tid() != self.tid() {
            return false;
        }

        let config = &*self.inner.config;
        if !payload.seoj.is_member_of(config.destination_eoj()) {
            trace!(tid = self.tid(), seoj = %payload.seoj, "response from unexpected object");
            return false;
        }
        if payload.deoj != config.source_eoj() {
            trace!(tid = self.tid(), deoj = %payload.deoj, "response to another object");
            return false;
        }
        if !rules::is_legal_response(config.esv(), payload.esv) {
            trace!(tid = self.tid(), request = %config.esv(), response = %payload.esv, "illegal response");
            return false;
        }

        let count = {
            let mut core = guard.borrow_mut();
            core.responses += 1;
            core.responses
        };
        debug!(tid = self.tid(), count, sender = %frame.sender(), "response accepted");
        for listener in self.listeners() {
            listener.receive(self, &*self.inner.subnet, frame);
        }
        true
    }

    /// Move to `Done`. Only the first call has any effect.
    pub fn finish(&self) {
        let guard = self.inner.core.lock();
        let timer = {
            let mut core = guard.borrow_mut();
            if core.state == TransactionState::Done {
                return;
            }
            core.state = TransactionState::Done;
            core.timer.take()
        };
        if let Some(handle) = timer {
            self.inner.timer.cancel(handle);
        }
        if let Some(manager) = self.inner.manager.upgrade() {
            manager.remove(self);
        }
        debug!(tid = self.tid(), responses = guard.borrow().responses, "transaction finished");

        for listener in self.listeners() {
            listener.finish(self);
        }

        *self.inner.done.lock() = true;
        self.inner.done_signal.notify_all();
    }

    /// Block until the transaction is done.
    pub fn join(&self) {
        let mut done = self.inner.done.lock();
        while !*done {
            self.inner.done_signal.wait(&mut done);
        }
    }

    /// Block until done or `timeout` elapses. Returns whether it is done.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.inner.done.lock();
        while !*done {
            if self
                .inner
                .done_signal
                .wait_until(&mut done, deadline)
                .timed_out()
            {
                return *done;
            }
        }
        true
    }

    /// True when both handles refer to the same transaction.
    pub fn same_as(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("tid", &self.tid())
            .field("esv", &self.inner.config.esv())
            .field("state", &self.state())
            .field("responses", &self.count_responses())
            .finish()
    }
}

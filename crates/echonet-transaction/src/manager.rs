use std::sync::Arc;
use std::time::Duration;

use echonet_transport::{Frame, Listener, Subnet};
use parking_lot::Mutex;
use tracing::trace;

use crate::config::TransactionConfig;
use crate::tid::TidGenerator;
use crate::timer::Timer;
use crate::transaction::Transaction;

/// Per-transaction timeout applied to new transactions.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60);

pub(crate) struct ManagerInner {
    subnet: Arc<dyn Subnet>,
    tids: Arc<TidGenerator>,
    timer: Timer,
    timeout: Mutex<Duration>,
    active: Mutex<Vec<Transaction>>,
}

impl ManagerInner {
    pub(crate) fn add(&self, transaction: Transaction) {
        let mut active = self.active.lock();
        if !active.iter().any(|t| t.same_as(&transaction)) {
            active.push(transaction);
        }
    }

    pub(crate) fn remove(&self, transaction: &Transaction) -> bool {
        let mut active = self.active.lock();
        let before = active.len();
        active.retain(|t| !t.same_as(transaction));
        before != active.len()
    }
}

/// Creates transactions and routes inbound frames to the active ones.
///
/// Register it as a listener on the dispatch loop so responses reach their
/// transactions. Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<ManagerInner>,
}

impl TransactionManager {
    pub fn new(subnet: Arc<dyn Subnet>) -> Self {
        Self::with_tid_generator(subnet, Arc::new(TidGenerator::new()))
    }

    /// Draw ids from a shared generator.
    pub fn with_tid_generator(subnet: Arc<dyn Subnet>, tids: Arc<TidGenerator>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                subnet,
                tids,
                timer: Timer::new(),
                timeout: Mutex::new(DEFAULT_TIMEOUT),
                active: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Timeout given to transactions created from now on. Zero disables it.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    pub fn set_timeout(&self, timeout: Duration) {
        *self.inner.timeout.lock() = timeout;
    }

    pub fn timeout(&self) -> Duration {
        *self.inner.timeout.lock()
    }

    pub fn subnet(&self) -> &Arc<dyn Subnet> {
        &self.inner.subnet
    }

    pub fn timer(&self) -> &Timer {
        &self.inner.timer
    }

    /// A new idle transaction with a fresh id.
    pub fn create_transaction(&self, config: impl TransactionConfig + 'static) -> Transaction {
        let tid = self.inner.tids.next_tid();
        trace!(tid, "transaction created");
        Transaction::new(
            tid,
            Arc::clone(&self.inner.subnet),
            Box::new(config),
            Arc::downgrade(&self.inner),
            self.inner.timer.clone(),
            self.timeout(),
        )
    }

    /// Track a transaction. Executing one does this automatically.
    pub fn add(&self, transaction: &Transaction) {
        self.inner.add(transaction.clone());
    }

    pub fn remove(&self, transaction: &Transaction) -> bool {
        self.inner.remove(transaction)
    }

    /// Snapshot of the waiting transactions.
    pub fn active(&self) -> Vec<Transaction> {
        self.inner.active.lock().clone()
    }

    pub fn count_active(&self) -> usize {
        self.inner.active.lock().len()
    }
}

impl Listener for TransactionManager {
    fn process(&self, _subnet: &dyn Subnet, frame: &Frame, _processed: bool) -> bool {
        let tid = frame.tid();
        let mut accepted = false;
        for transaction in self.active().into_iter().filter(|t| t.tid() == tid) {
            accepted |= transaction.recv_response(frame);
        }
        accepted
    }
}

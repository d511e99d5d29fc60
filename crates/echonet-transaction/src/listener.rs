use echonet_transport::{Frame, Subnet};

use crate::transaction::Transaction;

/// Observer of one transaction's lifecycle. Every method defaults to a
/// no-op.
///
/// Callbacks run while the transaction is locked by the calling thread, so
/// they may call back into it (for example [`Transaction::finish`]).
pub trait TransactionListener: Send + Sync {
    /// `execute` started.
    fn begin(&self, _transaction: &Transaction) {}

    /// A request frame was handed to the subnet.
    fn send(&self, _transaction: &Transaction, _subnet: &dyn Subnet, _frame: &Frame, _success: bool) {
    }

    /// A response was accepted.
    fn receive(&self, _transaction: &Transaction, _subnet: &dyn Subnet, _frame: &Frame) {}

    /// The transaction reached its terminal state.
    fn finish(&self, _transaction: &Transaction) {}
}

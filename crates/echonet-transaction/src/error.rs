use echonet_transport::SubnetError;

use crate::transaction::TransactionState;

/// Errors raised while running a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// `execute` was called on a transaction that already ran.
    #[error("transaction {tid} is {state}, expected idle")]
    NotIdle { tid: u16, state: TransactionState },

    /// Sending a request frame failed.
    #[error("transport error: {0}")]
    Subnet(#[from] SubnetError),

    /// The timer thread could not be started.
    #[error("timer unavailable: {0}")]
    Timer(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

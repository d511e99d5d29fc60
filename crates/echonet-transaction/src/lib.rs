//! ECHONET Lite transactions.
//!
//! A [`Transaction`] sends the request frames described by a
//! [`TransactionConfig`] and then admits responses that carry its TID, come
//! from the addressed object (any instance of the class when the request
//! went to the all-instances code) and pair legally with the request
//! service code. It stays waiting until its timeout fires or it is
//! finished explicitly, so group requests can collect many responses.
//!
//! The [`TransactionManager`] allocates ids, owns the timer thread and acts
//! as a [`Listener`](echonet_transport::Listener) that hands inbound frames
//! to the active transactions.

pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod rules;
pub mod tid;
pub mod timer;
pub mod transaction;

pub use config::{AnnounceTransactionConfig, SetGetTransactionConfig, TransactionConfig};
pub use error::{Result, TransactionError};
pub use listener::TransactionListener;
pub use manager::{TransactionManager, DEFAULT_TIMEOUT};
pub use rules::{is_legal_response, legal_responses};
pub use tid::TidGenerator;
pub use timer::{Timer, TimerHandle};
pub use transaction::{Transaction, TransactionState};

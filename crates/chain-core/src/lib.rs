// chain-core/src/lib.rs

//! Chain-side collaborators of the contract engine
//!
//! This crate provides:
//! - Protocol epochs and the height → epoch schedule
//! - Token amounts and account principals
//! - The fee ledger boundary and an in-memory ledger
//! - Transaction admission policy and receipts

pub mod admission;
pub mod epoch;
pub mod ledger;
pub mod transaction;
pub mod types;

pub use admission::{AdmissionDecision, AdmissionPolicy};
pub use epoch::{EpochBoundary, EpochId, EpochSchedule};
pub use ledger::{Account, FeeLedger, InMemoryLedger, InsufficientFunds};
pub use transaction::{TransactionKind, TransactionReceipt, TxStatus};
pub use types::*;

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors that can occur in chain-side operations
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Unknown epoch: {0}")]
    UnknownEpoch(String),

    #[error("Invalid epoch schedule: {0}")]
    InvalidSchedule(String),
}

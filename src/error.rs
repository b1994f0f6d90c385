//! # Transaction Errors
//!
//! The fixed error vocabulary shared by every subsystem. Errors are values:
//! components return them explicitly, never smuggle them through shared state.
//!
//! Usage errors (wrong state or arguments) are raised synchronously to the
//! immediate caller and never enter the queue. Operation and backing-store
//! failures travel through the event chain instead.

use thiserror::Error;

/// Result type for transaction-engine operations
pub type TxResult<T> = Result<T, TxError>;

/// Transaction engine errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxError {
    // ==================
    // Lifecycle Errors
    // ==================
    /// A request or the whole transaction was aborted
    #[error("Abort: {0}")]
    Abort(String),

    /// A request was placed against a transaction which is not active or is finished
    #[error("Transaction inactive: {0}")]
    TransactionInactive(String),

    /// A write was attempted on a read-only transaction
    #[error("Read only: {0}")]
    ReadOnly(String),

    // ==================
    // Usage Errors
    // ==================
    /// The operation is not allowed in the transaction's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The named store does not exist or is outside the transaction's scope
    #[error("Not found: {0}")]
    NotFound(String),

    // ==================
    // Collaborator Errors
    // ==================
    /// Passthrough for errors reported by the backing storage engine
    #[error("Backing store error: {0}")]
    Backing(String),
}

impl TxError {
    /// Create an abort error
    pub fn abort(msg: impl Into<String>) -> Self {
        Self::Abort(msg.into())
    }

    /// Create a transaction-inactive error
    pub fn inactive(msg: impl Into<String>) -> Self {
        Self::TransactionInactive(msg.into())
    }

    /// Create a read-only error
    pub fn read_only(msg: impl Into<String>) -> Self {
        Self::ReadOnly(msg.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a backing-store error
    pub fn backing(msg: impl Into<String>) -> Self {
        Self::Backing(msg.into())
    }

    /// Stable string code for logs and assertions
    pub fn code(&self) -> &'static str {
        match self {
            Self::Abort(_) => "ABORT_ERROR",
            Self::TransactionInactive(_) => "TRANSACTION_INACTIVE_ERROR",
            Self::ReadOnly(_) => "READ_ONLY_ERROR",
            Self::InvalidState(_) => "INVALID_STATE_ERROR",
            Self::NotFound(_) => "NOT_FOUND_ERROR",
            Self::Backing(_) => "BACKING_STORE_ERROR",
        }
    }
}

//! Error taxonomy for the TCC coordinator.
//!
//! One flat enum: a single `thiserror`-derived type with one variant per
//! failure mode surfaced anywhere in the coordination kernel, and a
//! crate-wide `Result` alias.

use thiserror::Error;

/// Result type alias used across the `tcc-*` crates.
pub type TccResult<T> = std::result::Result<T, TccError>;

/// Unified error type for the TCC coordinator.
#[derive(Debug, Error)]
pub enum TccError {
    /// A distributed lock is currently held by another token. Retryable.
    #[error("lock held elsewhere: {key}")]
    LockHeldElsewhere {
        /// The lock key that was contested.
        key: String,
    },

    /// A blocking lock acquisition exceeded its wait budget.
    #[error("timed out waiting for lock: {key}")]
    WaitTimeout {
        /// The lock key being waited on.
        key: String,
    },

    /// The ambient context was cancelled before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// `UpdateBranch` referenced a branch id not present in the transaction.
    #[error("unknown branch {branch_id} in transaction {tx_id}")]
    UnknownBranch {
        /// Transaction identifier.
        tx_id: String,
        /// Branch (component) identifier.
        branch_id: String,
    },

    /// A submitted request named a component id not present in the registry.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// `Registry::register` was called twice for the same component id.
    #[error("component already registered: {0}")]
    AlreadyRegistered(String),

    /// A state transition was attempted that the data model forbids.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// The backing relational or key-value store is unreachable or erroring.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A participant's Try/Confirm/Cancel call returned an error.
    #[error("participant {component_id} error: {source}")]
    ParticipantError {
        /// The component that raised the error.
        component_id: String,
        /// The underlying error, boxed to keep this enum `Send + Sync + 'static`.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Catch-all for serialization failures on the branch-status blob.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TccError {
    /// Whether retrying the same operation is sound without any other state change.
    ///
    /// `LockHeldElsewhere` is the only class retryable by itself; everything
    /// else needs either the caller to change something (e.g. a different
    /// branch id) or the system to move on (recovery poller).
    pub fn is_retryable(&self) -> bool {
        matches!(self, TccError::LockHeldElsewhere { .. })
    }
}

//! Lock-specific error type, narrower than [`tcc_core::TccError`] and
//! converted into it at the coordinator boundary.

use thiserror::Error;
use tcc_kv::KvError;

/// Failure modes of [`crate::DistributedLock`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The lease key is currently held by a different token. Retryable.
    #[error("lock held elsewhere: {key}")]
    HeldElsewhere {
        /// The contested lease key.
        key: String,
    },
    /// A blocking acquire exceeded its wait budget.
    #[error("timed out waiting for lock: {key}")]
    WaitTimeout {
        /// The lease key being waited on.
        key: String,
    },
    /// The ambient deadline fired while blocking on acquisition.
    #[error("acquisition cancelled")]
    Cancelled,
    /// The key-value store backing the lock is unavailable.
    #[error(transparent)]
    Store(#[from] KvError),
}

impl LockError {
    /// Whether this class alone justifies a retry. Only `LockHeldElsewhere`
    /// is — everything else needs the caller or the system to change
    /// something first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::HeldElsewhere { .. })
    }
}

impl From<LockError> for tcc_core::TccError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::HeldElsewhere { key } => tcc_core::TccError::LockHeldElsewhere { key },
            LockError::WaitTimeout { key } => tcc_core::TccError::WaitTimeout { key },
            LockError::Cancelled => tcc_core::TccError::Cancelled,
            LockError::Store(e) => tcc_core::TccError::StoreUnavailable(e.to_string()),
        }
    }
}

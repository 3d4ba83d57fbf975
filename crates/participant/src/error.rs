//! Errors a [`crate::Participant`] call can raise.

use thiserror::Error;
use tcc_kv::KvError;
use tcc_lock::LockError;

/// Failure modes surfaced by a participant implementation.
#[derive(Debug, Error)]
pub enum ParticipantError {
    /// The requested transition is forbidden by the branch's own state
    /// machine (Cancel called after Confirm already landed).
    #[error("illegal transition for {component_id}/{tx_id}: {reason}")]
    IllegalTransition {
        /// The participant this branch belongs to.
        component_id: String,
        /// The transaction this branch belongs to.
        tx_id: String,
        /// Human-readable detail.
        reason: String,
    },
    /// Acquiring the branch lease failed or timed out.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// The underlying key-value store is unavailable.
    #[error(transparent)]
    Store(#[from] KvError),
}

impl From<ParticipantError> for tcc_core::TccError {
    fn from(err: ParticipantError) -> Self {
        match err {
            ParticipantError::IllegalTransition {
                component_id,
                tx_id,
                reason,
            } => tcc_core::TccError::IllegalTransition(format!(
                "{component_id}/{tx_id}: {reason}"
            )),
            ParticipantError::Lock(e) => e.into(),
            ParticipantError::Store(e) => tcc_core::TccError::StoreUnavailable(e.to_string()),
        }
    }
}

//! Participant contract (C2): the Try/Confirm/Cancel interface every branch
//! implements, plus a reference idempotent implementation over a key-value
//! store.
#![warn(missing_docs)]

mod error;
pub mod kv_participant;
mod types;

pub use error::ParticipantError;
pub use kv_participant::KvParticipant;
pub use types::{TccReq, TccResp};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One branch of a transaction. Implementations must be idempotent: Try,
/// Confirm, and Cancel are each retried by the coordinator and must tolerate
/// being called more than once for the same transaction.
#[async_trait]
pub trait Participant: Send + Sync {
    /// The component id this handle answers to, matching the registry key
    /// it was registered under.
    fn id(&self) -> &str;

    /// Reserve resources for `req.tx_id`. A `false` ack is a legal soft
    /// decline, not an error.
    async fn try_branch(
        &self,
        req: &TccReq,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError>;

    /// Make a prior successful Try durable.
    async fn confirm(
        &self,
        tx_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError>;

    /// Release resources reserved by a prior Try.
    async fn cancel(
        &self,
        tx_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError>;
}

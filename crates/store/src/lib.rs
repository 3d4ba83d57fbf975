//! Transaction store (C4): persistent per-transaction record with
//! row-lock-guarded state transitions, query by status, and status
//! derivation (the derivation itself lives on [`tcc_core::Transaction`]).
#![warn(missing_docs)]

mod in_memory;
pub mod postgres;
mod record;

pub use in_memory::InMemoryTransactionStore;
pub use postgres::PgTransactionStore;

use async_trait::async_trait;

use tcc_core::{TccResult, Transaction};

/// Persistence surface the transaction manager (C5) is built against.
///
/// All writes go through row-level locking internal to each implementation;
/// there is no unlocked write path.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a new record with every id in `branch_ids` at `TryHanging`
    /// and the final resolution status at `TryHanging`. Returns the
    /// store-assigned identifier.
    async fn create(&self, branch_ids: &[String]) -> TccResult<String>;

    /// Flip one branch's status to `Success` or `Failure`.
    ///
    /// Idempotent if the branch already holds the target status. Fails with
    /// `UnknownBranch` if `branch_id` isn't part of the transaction, or
    /// `IllegalTransition` if the branch is already terminal at a different
    /// value.
    async fn update_branch(&self, tx_id: &str, branch_id: &str, success: bool) -> TccResult<()>;

    /// Persist the final resolution (`Success` or `Failure`).
    ///
    /// Fails with `IllegalTransition` if the final status is already
    /// terminal at the other value; succeeds as a no-op if it already
    /// matches.
    async fn set_final(&self, tx_id: &str, success: bool) -> TccResult<()>;

    /// All transactions whose final resolution status is still `Hanging`.
    async fn list_hanging(&self) -> TccResult<Vec<Transaction>>;

    /// Load a single transaction by id.
    async fn get(&self, tx_id: &str) -> TccResult<Transaction>;
}

//! In-process [`TransactionStore`] used by tests and by the recovery
//! scenarios in `tcc-manager`'s integration suite. A `tokio::Mutex` around
//! the whole map stands in for the Postgres row lock: every write takes it
//! for the duration of a single record's read-modify-write, which is the
//! same serialisation guarantee `SELECT ... FOR UPDATE` gives a single row.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use tcc_core::{BranchStatus, TccError, TccResult, Transaction};

use crate::TransactionStore;

/// An in-memory [`TransactionStore`], suitable for tests and for running the
/// coordinator in a single process without a database.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    next_id: AtomicU64,
    records: Mutex<BTreeMap<String, Transaction>>,
}

impl InMemoryTransactionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, branch_ids: &[String]) -> TccResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = id.to_string();
        let tx = Transaction {
            id: id.clone(),
            final_status: BranchStatus::Hanging,
            branches: branch_ids
                .iter()
                .map(|b| (b.clone(), BranchStatus::Hanging))
                .collect(),
            created_at: Utc::now(),
        };
        self.records.lock().await.insert(id.clone(), tx);
        Ok(id)
    }

    async fn update_branch(&self, tx_id: &str, branch_id: &str, success: bool) -> TccResult<()> {
        let mut records = self.records.lock().await;
        let tx = records
            .get_mut(tx_id)
            .ok_or_else(|| TccError::UnknownBranch {
                tx_id: tx_id.to_string(),
                branch_id: branch_id.to_string(),
            })?;

        let target = if success {
            BranchStatus::Success
        } else {
            BranchStatus::Failure
        };

        let current = *tx
            .branches
            .get(branch_id)
            .ok_or_else(|| TccError::UnknownBranch {
                tx_id: tx_id.to_string(),
                branch_id: branch_id.to_string(),
            })?;

        if current == target {
            return Ok(());
        }
        if current.is_terminal() {
            return Err(TccError::IllegalTransition(format!(
                "branch {branch_id} of {tx_id} is terminal at {current:?}, cannot become {target:?}"
            )));
        }

        tx.branches.insert(branch_id.to_string(), target);
        Ok(())
    }

    async fn set_final(&self, tx_id: &str, success: bool) -> TccResult<()> {
        let mut records = self.records.lock().await;
        let tx = records
            .get_mut(tx_id)
            .ok_or_else(|| TccError::UnknownBranch {
                tx_id: tx_id.to_string(),
                branch_id: String::new(),
            })?;

        let target = if success {
            BranchStatus::Success
        } else {
            BranchStatus::Failure
        };

        if tx.final_status == target {
            return Ok(());
        }
        if tx.final_status.is_terminal() {
            return Err(TccError::IllegalTransition(format!(
                "transaction {tx_id} final status already {:?}, cannot become {target:?}",
                tx.final_status
            )));
        }

        tx.final_status = target;
        Ok(())
    }

    async fn list_hanging(&self) -> TccResult<Vec<Transaction>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|tx| tx.final_status == BranchStatus::Hanging)
            .cloned()
            .collect())
    }

    async fn get(&self, tx_id: &str) -> TccResult<Transaction> {
        let records = self.records.lock().await;
        records
            .get(tx_id)
            .cloned()
            .ok_or_else(|| TccError::UnknownBranch {
                tx_id: tx_id.to_string(),
                branch_id: String::new(),
            })
    }
}

//! Postgres-backed [`TransactionStore`], row-lock-guarded via
//! `SELECT ... FOR UPDATE` inside a single `sqlx` transaction per write.
//!
//! The schema is an explicit migration rather than an ORM model struct:
//! one table, soft-deletable, with the per-branch status vector flattened
//! into a single serialised column.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use tcc_core::{BranchStatus, TccError, TccResult, Transaction};

use crate::record::{decode_branches, encode_branches};
use crate::TransactionStore;

/// DDL for the single table this store reads and writes. Callers are
/// expected to run this (or an equivalent migration) once at provisioning
/// time; this crate does not run migrations itself.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tcc_transactions (
    id                      BIGSERIAL PRIMARY KEY,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at              TIMESTAMPTZ,
    status                  TEXT NOT NULL,
    component_try_statuses  TEXT NOT NULL
);
"#;

/// A [`TransactionStore`] backed by a Postgres table, per the schema in
/// [`SCHEMA_SQL`].
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    /// Wrap an already-connected pool. Run [`SCHEMA_SQL`] against it first
    /// if the table doesn't exist yet.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(
        id: i64,
        status: String,
        component_try_statuses: String,
        created_at: DateTime<Utc>,
    ) -> TccResult<Transaction> {
        let final_status = match status.as_str() {
            "TryHanging" => BranchStatus::Hanging,
            "TrySuccess" => BranchStatus::Success,
            "TryFailure" => BranchStatus::Failure,
            other => {
                return Err(TccError::StoreUnavailable(format!(
                    "unrecognised status column value: {other}"
                )))
            }
        };
        Ok(Transaction {
            id: id.to_string(),
            final_status,
            branches: decode_branches(&component_try_statuses)?,
            created_at,
        })
    }

    fn status_column(status: BranchStatus) -> &'static str {
        match status {
            BranchStatus::Hanging => "TryHanging",
            BranchStatus::Success => "TrySuccess",
            BranchStatus::Failure => "TryFailure",
        }
    }

    /// Open a transaction, lock the row for update, load it, and run `f`
    /// against the loaded state and branch map. `f` returns the new final
    /// status and branch map to persist, or an error to abort (rolling
    /// back) without writing anything.
    async fn with_row_lock<F>(&self, tx_id: &str, f: F) -> TccResult<()>
    where
        F: FnOnce(&Transaction) -> TccResult<(BranchStatus, std::collections::BTreeMap<String, BranchStatus>)>
            + Send,
    {
        let id: i64 = tx_id
            .parse()
            .map_err(|_| TccError::UnknownBranch {
                tx_id: tx_id.to_string(),
                branch_id: String::new(),
            })?;

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TccError::StoreUnavailable(e.to_string()))?;

        let row = sqlx::query(
            "SELECT id, status, component_try_statuses, created_at \
             FROM tcc_transactions WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| TccError::StoreUnavailable(e.to_string()))?
        .ok_or_else(|| TccError::UnknownBranch {
            tx_id: tx_id.to_string(),
            branch_id: String::new(),
        })?;

        let current = Self::row_to_transaction(
            row.get("id"),
            row.get("status"),
            row.get("component_try_statuses"),
            row.get("created_at"),
        )?;

        let (new_status, new_branches) = f(&current)?;

        sqlx::query(
            "UPDATE tcc_transactions SET status = $1, component_try_statuses = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(Self::status_column(new_status))
        .bind(encode_branches(&new_branches))
        .bind(id)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| TccError::StoreUnavailable(e.to_string()))?;

        db_tx
            .commit()
            .await
            .map_err(|e| TccError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, branch_ids: &[String]) -> TccResult<String> {
        let branches: std::collections::BTreeMap<String, BranchStatus> = branch_ids
            .iter()
            .map(|id| (id.clone(), BranchStatus::Hanging))
            .collect();

        let row = sqlx::query(
            "INSERT INTO tcc_transactions (status, component_try_statuses) VALUES ($1, $2) \
             RETURNING id",
        )
        .bind(Self::status_column(BranchStatus::Hanging))
        .bind(encode_branches(&branches))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "create failed to reach postgres");
            TccError::StoreUnavailable(e.to_string())
        })?;

        let id: i64 = row.get("id");
        debug!(tx_id = %id, branches = branch_ids.len(), "transaction created");
        Ok(id.to_string())
    }

    async fn update_branch(&self, tx_id: &str, branch_id: &str, success: bool) -> TccResult<()> {
        let branch_id = branch_id.to_string();
        self.with_row_lock(tx_id, move |current| {
            let target = if success {
                BranchStatus::Success
            } else {
                BranchStatus::Failure
            };
            let existing = *current.branches.get(&branch_id).ok_or_else(|| {
                TccError::UnknownBranch {
                    tx_id: current.id.clone(),
                    branch_id: branch_id.clone(),
                }
            })?;

            let mut branches = current.branches.clone();
            if existing == target {
                return Ok((current.final_status, branches));
            }
            if existing.is_terminal() {
                warn!(
                    %branch_id, tx_id = %current.id, ?existing, ?target,
                    "rejected illegal branch transition"
                );
                return Err(TccError::IllegalTransition(format!(
                    "branch {branch_id} of {} is terminal at {existing:?}, cannot become {target:?}",
                    current.id
                )));
            }
            branches.insert(branch_id.clone(), target);
            debug!(%branch_id, tx_id = %current.id, ?target, "branch status updated");
            Ok((current.final_status, branches))
        })
        .await
    }

    async fn set_final(&self, tx_id: &str, success: bool) -> TccResult<()> {
        self.with_row_lock(tx_id, move |current| {
            let target = if success {
                BranchStatus::Success
            } else {
                BranchStatus::Failure
            };
            if current.final_status == target {
                return Ok((target, current.branches.clone()));
            }
            if current.final_status.is_terminal() {
                warn!(
                    tx_id = %current.id, existing = ?current.final_status, ?target,
                    "rejected illegal final-status transition"
                );
                return Err(TccError::IllegalTransition(format!(
                    "transaction {} final status already {:?}, cannot become {target:?}",
                    current.id, current.final_status
                )));
            }
            debug!(tx_id = %current.id, ?target, "final status set");
            Ok((target, current.branches.clone()))
        })
        .await
    }

    async fn list_hanging(&self) -> TccResult<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT id, status, component_try_statuses, created_at FROM tcc_transactions \
             WHERE status = $1 AND deleted_at IS NULL",
        )
        .bind(Self::status_column(BranchStatus::Hanging))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TccError::StoreUnavailable(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Self::row_to_transaction(
                    row.get("id"),
                    row.get("status"),
                    row.get("component_try_statuses"),
                    row.get("created_at"),
                )
            })
            .collect()
    }

    async fn get(&self, tx_id: &str) -> TccResult<Transaction> {
        let id: i64 = tx_id.parse().map_err(|_| TccError::UnknownBranch {
            tx_id: tx_id.to_string(),
            branch_id: String::new(),
        })?;

        let row = sqlx::query(
            "SELECT id, status, component_try_statuses, created_at FROM tcc_transactions \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TccError::StoreUnavailable(e.to_string()))?
        .ok_or_else(|| TccError::UnknownBranch {
            tx_id: tx_id.to_string(),
            branch_id: String::new(),
        })?;

        Self::row_to_transaction(
            row.get("id"),
            row.get("status"),
            row.get("component_try_statuses"),
            row.get("created_at"),
        )
    }
}

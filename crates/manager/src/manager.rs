//! The transaction manager (C5): Submit's Try fan-out and outcome
//! derivation, `AdvanceTX`'s phase-two fan-out, and the recovery poller.
//!
//! The Try fan-out drains every branch task before deciding `successful`
//! rather than racing ahead on the first observed failure: a branch task
//! that's still writing its outcome to the store must be allowed to finish
//! before the coordinator decides anything.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tcc_core::keys::POLL_LEASE_KEY;
use tcc_core::{TccError, TccResult, Transaction, TxStatus};
use tcc_kv::KvStore;
use tcc_lock::{AcquireOptions, DistributedLock};
use tcc_participant::TccReq;
use tcc_registry::Registry;
use tcc_store::TransactionStore;

use crate::config::{ManagerConfig, BACKOFF_CEILING_MULTIPLIER, POLL_LEASE_TTL_MULTIPLIER};
use crate::types::SubmitRequest;

/// Orchestrates the whole coordination kernel: Submit, AdvanceTX, and an
/// owned recovery-poller task.
///
/// Generic over the store and key-value backends so the same logic runs
/// against `InMemoryTransactionStore`/`FakeKvStore` in tests and
/// `PgTransactionStore`/`RedisKvStore` in production.
pub struct TransactionManager<S, K>
where
    S: TransactionStore + 'static,
    K: KvStore + 'static,
{
    config: ManagerConfig,
    registry: Arc<Registry>,
    store: Arc<S>,
    poll_lock: Arc<DistributedLock<K>>,
    cancel: CancellationToken,
    poller: StdMutex<Option<JoinHandle<()>>>,
    sweeps_run: AtomicU64,
}

impl<S, K> TransactionManager<S, K>
where
    S: TransactionStore + 'static,
    K: KvStore + 'static,
{
    /// Build a manager and start its recovery poller immediately.
    pub fn new(store: Arc<S>, registry: Arc<Registry>, kv: Arc<K>, config: ManagerConfig) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            registry,
            store,
            poll_lock: Arc::new(DistributedLock::new(kv, POLL_LEASE_KEY)),
            cancel: CancellationToken::new(),
            poller: StdMutex::new(None),
            sweeps_run: AtomicU64::new(0),
        });

        let handle = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.poll_loop().await })
        };
        *manager.poller.lock().unwrap() = Some(handle);
        manager
    }

    /// Cancel the ambient context: stops the poller and prevents the
    /// manager from starting new submissions. In-flight submissions still
    /// run to their own deadline.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Number of recovery sweeps completed so far. Exposed for tests that
    /// assert on poller activity, e.g. lease mutual exclusion across
    /// multiple coordinator replicas.
    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run.load(Ordering::SeqCst)
    }

    /// Resolve `reqs` against the registry, persist a new transaction, fan
    /// out Try calls, and return whether every branch acknowledged.
    ///
    /// `Err` is returned only for resolution failures (an unknown component
    /// id) before any store write happens; per-branch Try failures are
    /// reflected in the `Ok(false)` return instead.
    pub async fn submit(&self, reqs: Vec<SubmitRequest>) -> TccResult<bool> {
        if self.cancel.is_cancelled() {
            return Err(TccError::StoreUnavailable(
                "manager is shutting down".to_string(),
            ));
        }

        let component_ids: Vec<String> = reqs.iter().map(|r| r.component_id.clone()).collect();
        let participants = self.registry.lookup(&component_ids)?;

        let tx_id = self.store.create(&component_ids).await?;

        let branch_cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(reqs.len());

        for (req, participant) in reqs.into_iter().zip(participants.into_iter()) {
            let store = Arc::clone(&self.store);
            let tx_id = tx_id.clone();
            let branch_cancel = branch_cancel.clone();
            let timeout = self.config.timeout;

            tasks.push(tokio::spawn(async move {
                let tcc_req = TccReq {
                    tx_id: tx_id.clone(),
                    component_id: req.component_id.clone(),
                    request_arg: req.request_arg,
                };

                let outcome =
                    tokio::time::timeout(timeout, participant.try_branch(&tcc_req, &branch_cancel))
                        .await;

                let success = match outcome {
                    Ok(Ok(resp)) => resp.ack,
                    Ok(Err(err)) => {
                        warn!(component_id = %req.component_id, %tx_id, error = %err, "try failed");
                        false
                    }
                    Err(_elapsed) => {
                        warn!(component_id = %req.component_id, %tx_id, "try timed out");
                        false
                    }
                };

                if !success {
                    branch_cancel.cancel();
                }

                if let Err(err) = store.update_branch(&tx_id, &req.component_id, success).await {
                    error!(component_id = %req.component_id, %tx_id, %err, "update_branch failed");
                }

                success
            }));
        }

        // Drain every branch task before deciding, even once one has failed:
        // cancellation only asks in-flight branches to abort early, it never
        // lets the coordinator skip waiting for their result to land in the
        // store.
        let mut successful = true;
        for task in tasks {
            match task.await {
                Ok(ok) => successful &= ok,
                Err(join_err) => {
                    error!(%tx_id, error = %join_err, "branch task panicked");
                    successful = false;
                }
            }
        }

        let tx_id_for_advance = tx_id.clone();
        let manager_store = Arc::clone(&self.store);
        let manager_registry = Arc::clone(&self.registry);
        let monitor_tick = self.config.monitor_tick;
        let advance_cancel = self.cancel.child_token();
        tokio::spawn(async move {
            if let Err(err) =
                advance_tx(&manager_store, &manager_registry, &tx_id_for_advance, monitor_tick, &advance_cancel).await
            {
                info!(tx_id = %tx_id_for_advance, %err, "advance_tx did not complete, left for the poller");
            }
        });

        Ok(successful)
    }

    /// Drive one transaction toward a terminal state if its derived status
    /// already permits it.
    pub async fn advance_tx(&self, tx_id: &str) -> TccResult<()> {
        let cancel = self.cancel.child_token();
        advance_tx(&self.store, &self.registry, tx_id, self.config.monitor_tick, &cancel).await
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut tick = self.config.monitor_tick;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(tick) => {}
            }

            let acquire = self
                .poll_lock
                .acquire(
                    AcquireOptions::default().ttl(self.config.monitor_tick * POLL_LEASE_TTL_MULTIPLIER),
                    &self.cancel,
                )
                .await;
            if acquire.is_err() {
                continue;
            }

            let result = self.poll_once().await;
            let _ = self.poll_lock.release().await;
            self.sweeps_run.fetch_add(1, Ordering::SeqCst);

            tick = match result {
                Ok(()) => self.config.monitor_tick,
                Err(err) => {
                    warn!(%err, "recovery sweep failed, backing off");
                    back_off(tick, self.config.monitor_tick)
                }
            };
        }
    }

    async fn poll_once(&self) -> TccResult<()> {
        let txs = self.store.list_hanging().await?;
        let results = futures::future::join_all(
            txs.iter()
                .map(|tx| self.advance_tx(&tx.id)),
        )
        .await;

        let mut first_err = None;
        for result in results {
            if let Err(err) = result {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn back_off(tick: std::time::Duration, base: std::time::Duration) -> std::time::Duration {
    let ceiling = base * BACKOFF_CEILING_MULTIPLIER;
    std::cmp::min(tick * 2, ceiling)
}

/// Load a transaction, derive its status at `theta = now - monitor_tick`,
/// and drive phase two if the derivation says it's no longer hanging.
async fn advance_tx<S>(
    store: &Arc<S>,
    registry: &Arc<Registry>,
    tx_id: &str,
    monitor_tick: std::time::Duration,
    cancel: &CancellationToken,
) -> TccResult<()>
where
    S: TransactionStore + 'static,
{
    let tx: Transaction = store.get(tx_id).await?;
    let theta = Utc::now()
        - chrono::Duration::from_std(monitor_tick).unwrap_or(chrono::Duration::zero());
    let status = tx.derive_status(theta);

    let success = match status {
        TxStatus::Hanging => return Ok(()),
        TxStatus::Success => true,
        TxStatus::Failure => false,
    };

    drive_phase_two(store, registry, &tx, success, cancel).await
}

async fn drive_phase_two<S>(
    store: &Arc<S>,
    registry: &Arc<Registry>,
    tx: &Transaction,
    success: bool,
    cancel: &CancellationToken,
) -> TccResult<()>
where
    S: TransactionStore + 'static,
{
    for component_id in branch_ids_in_order(&tx.branches) {
        let participant = registry
            .lookup(std::slice::from_ref(&component_id))?
            .remove(0);

        let resp = if success {
            participant.confirm(&tx.id, cancel).await
        } else {
            participant.cancel(&tx.id, cancel).await
        }
        .map_err(tcc_core::TccError::from)?;

        if !resp.ack {
            return Err(TccError::ParticipantError {
                component_id,
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "phase two call returned ack=false",
                )),
            });
        }
    }

    store.set_final(&tx.id, success).await
}

fn branch_ids_in_order(branches: &BTreeMap<String, tcc_core::BranchStatus>) -> Vec<String> {
    branches.keys().cloned().collect()
}

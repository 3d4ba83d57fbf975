//! Reference [`Participant`] implementation over a [`KvStore`]: a per-branch
//! lease guards every call, a status key tracks which phase last landed, a
//! detail key remembers the business id, and a data key encodes the
//! reservation (`DataFrozen` after Try, `DataSuccess` after Confirm, absent
//! after Cancel).

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tcc_core::keys::{branch_lock_key, data_key, tx_detail_key, tx_status_key};
use tcc_kv::KvStore;
use tcc_lock::{AcquireOptions, DistributedLock};

use crate::error::ParticipantError;
use crate::types::{TccReq, TccResp};
use crate::Participant;

const STATUS_TRY: &str = "Try";
const STATUS_CONFIRM: &str = "Confirm";
const STATUS_CANCEL: &str = "Cancel";
const DATA_FROZEN: &str = "DataFrozen";
const DATA_SUCCESS: &str = "DataSuccess";

/// A participant backed directly by a [`KvStore`], usable both as a
/// standalone branch and as the shape every networked participant adapter
/// wraps.
pub struct KvParticipant<K: KvStore> {
    id: String,
    kv: Arc<K>,
}

impl<K: KvStore + 'static> KvParticipant<K> {
    /// Build a participant registered under `id`, storing its state in `kv`.
    pub fn new(id: impl Into<String>, kv: Arc<K>) -> Self {
        Self { id: id.into(), kv }
    }

    async fn with_branch_lease<F, Fut, T>(
        &self,
        tx_id: &str,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T, ParticipantError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ParticipantError>>,
    {
        let lock = Arc::new(DistributedLock::new(
            Arc::clone(&self.kv),
            branch_lock_key(&self.id, tx_id),
        ));
        lock.acquire(AcquireOptions::default().blocking(), cancel)
            .await?;
        let result = body().await;
        let _ = lock.release().await;
        result
    }

    fn resp(&self, tx_id: &str, ack: bool) -> TccResp {
        TccResp {
            tx_id: tx_id.to_string(),
            component_id: self.id.clone(),
            ack,
        }
    }
}

#[async_trait]
impl<K: KvStore + 'static> Participant for KvParticipant<K> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn try_branch(
        &self,
        req: &TccReq,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        let tx_id = req.tx_id.clone();
        self.with_branch_lease(&tx_id, cancel, || async move {
            let status_key = tx_status_key(&self.id, &tx_id);
            let status = self.kv.get(&status_key).await?;

            match status.as_deref() {
                Some(STATUS_TRY) | Some(STATUS_CONFIRM) => return Ok(self.resp(&tx_id, true)),
                Some(STATUS_CANCEL) => return Ok(self.resp(&tx_id, false)),
                _ => {}
            }

            let biz_id = req.biz_id().unwrap_or_default();
            self.kv.set(&tx_detail_key(&self.id, &tx_id), &biz_id).await?;

            let created = self
                .kv
                .set_nx(&data_key(&self.id, &tx_id, &biz_id), DATA_FROZEN)
                .await?;
            if !created {
                // Data key already exists from a previous call: preserve
                // idempotency by declining rather than re-freezing.
                debug!(component_id = %self.id, %tx_id, "try declined, data key already frozen");
                return Ok(self.resp(&tx_id, false));
            }

            self.kv.set(&status_key, STATUS_TRY).await?;
            debug!(component_id = %self.id, %tx_id, "try froze reservation");
            Ok(self.resp(&tx_id, true))
        })
        .await
    }

    async fn confirm(
        &self,
        tx_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        let tx_id = tx_id.to_string();
        self.with_branch_lease(&tx_id, cancel, || async move {
            let status_key = tx_status_key(&self.id, &tx_id);
            let status = self.kv.get(&status_key).await?;

            match status.as_deref() {
                Some(STATUS_CONFIRM) => return Ok(self.resp(&tx_id, true)),
                Some(STATUS_CANCEL) => {
                    warn!(component_id = %self.id, %tx_id, "confirm rejected, branch already cancelled");
                    return Err(ParticipantError::IllegalTransition {
                        component_id: self.id.clone(),
                        tx_id: tx_id.clone(),
                        reason: "cannot confirm a cancelled branch".to_string(),
                    });
                }
                _ => {}
            }

            let biz_id = self
                .kv
                .get(&tx_detail_key(&self.id, &tx_id))
                .await?
                .unwrap_or_default();
            let data_key = data_key(&self.id, &tx_id, &biz_id);
            let data_status = self.kv.get(&data_key).await?;

            if data_status.as_deref() != Some(DATA_FROZEN) {
                debug!(component_id = %self.id, %tx_id, "confirm declined, no frozen reservation found");
                return Ok(self.resp(&tx_id, false));
            }

            self.kv.set(&data_key, DATA_SUCCESS).await?;
            self.kv.set(&status_key, STATUS_CONFIRM).await?;
            debug!(component_id = %self.id, %tx_id, "confirm committed reservation");
            Ok(self.resp(&tx_id, true))
        })
        .await
    }

    async fn cancel(
        &self,
        tx_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        let tx_id = tx_id.to_string();
        self.with_branch_lease(&tx_id, cancel, || async move {
            let status_key = tx_status_key(&self.id, &tx_id);
            let status = self.kv.get(&status_key).await?;

            if status.as_deref() == Some(STATUS_CONFIRM) {
                warn!(component_id = %self.id, %tx_id, "cancel rejected, branch already confirmed");
                return Err(ParticipantError::IllegalTransition {
                    component_id: self.id.clone(),
                    tx_id: tx_id.clone(),
                    reason: "cannot cancel a confirmed branch".to_string(),
                });
            }

            let biz_id = self
                .kv
                .get(&tx_detail_key(&self.id, &tx_id))
                .await?
                .unwrap_or_default();
            self.kv.del(&data_key(&self.id, &tx_id, &biz_id)).await?;
            self.kv.set(&status_key, STATUS_CANCEL).await?;
            debug!(component_id = %self.id, %tx_id, "cancel released reservation");
            Ok(self.resp(&tx_id, true))
        })
        .await
    }
}

//! End-to-end coordination scenarios, exercising `Submit` and the recovery
//! poller together against in-memory backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tcc_core::BranchStatus;
use tcc_kv::fake::FakeKvStore;
use tcc_manager::{ManagerConfig, SubmitRequest, TransactionManager};
use tcc_participant::{KvParticipant, Participant, ParticipantError, TccReq, TccResp};
use tcc_registry::Registry;
use tcc_store::{InMemoryTransactionStore, TransactionStore};

fn biz_args(biz_id: &str) -> HashMap<String, serde_json::Value> {
    let mut args = HashMap::new();
    args.insert("biz_id".to_string(), serde_json::json!(biz_id));
    args
}

/// A participant whose Try/Confirm/Cancel behavior is scripted for tests
/// that need a hard error, a soft decline, or an artificial delay instead
/// of the reference key-value semantics.
struct ScriptedParticipant {
    id: &'static str,
    try_result: ScriptedOutcome,
    try_delay: Option<Duration>,
    confirms: AtomicU32,
    cancels: AtomicU32,
}

enum ScriptedOutcome {
    Ack,
    Decline,
    Error,
}

impl ScriptedParticipant {
    fn new(id: &'static str, try_result: ScriptedOutcome) -> Arc<Self> {
        Arc::new(Self {
            id,
            try_result,
            try_delay: None,
            confirms: AtomicU32::new(0),
            cancels: AtomicU32::new(0),
        })
    }

    fn with_delay(id: &'static str, try_result: ScriptedOutcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            try_result,
            try_delay: Some(delay),
            confirms: AtomicU32::new(0),
            cancels: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Participant for ScriptedParticipant {
    fn id(&self) -> &str {
        self.id
    }

    async fn try_branch(
        &self,
        req: &TccReq,
        _cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        if let Some(delay) = self.try_delay {
            tokio::time::sleep(delay).await;
        }
        match self.try_result {
            ScriptedOutcome::Ack => Ok(TccResp {
                tx_id: req.tx_id.clone(),
                component_id: self.id.to_string(),
                ack: true,
            }),
            ScriptedOutcome::Decline => Ok(TccResp {
                tx_id: req.tx_id.clone(),
                component_id: self.id.to_string(),
                ack: false,
            }),
            ScriptedOutcome::Error => Err(ParticipantError::IllegalTransition {
                component_id: self.id.to_string(),
                tx_id: req.tx_id.clone(),
                reason: "scripted failure".to_string(),
            }),
        }
    }

    async fn confirm(
        &self,
        tx_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        Ok(TccResp {
            tx_id: tx_id.to_string(),
            component_id: self.id.to_string(),
            ack: true,
        })
    }

    async fn cancel(
        &self,
        tx_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<TccResp, ParticipantError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(TccResp {
            tx_id: tx_id.to_string(),
            component_id: self.id.to_string(),
            ack: true,
        })
    }
}

async fn wait_until_resolved(store: &InMemoryTransactionStore, tx_id: &str) -> BranchStatus {
    for _ in 0..200 {
        let tx = store.get(tx_id).await.unwrap();
        if tx.final_status != BranchStatus::Hanging {
            return tx.final_status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transaction {tx_id} never resolved");
}

fn fast_config() -> ManagerConfig {
    ManagerConfig::default()
        .with_timeout(Duration::from_millis(200))
        .with_monitor_tick(Duration::from_millis(60))
}

#[tokio::test]
async fn happy_path_confirms_every_branch() {
    let kv = Arc::new(FakeKvStore::new());
    let store = Arc::new(InMemoryTransactionStore::new());
    let registry = Arc::new(Registry::new());
    registry
        .register(Arc::new(KvParticipant::new("a", Arc::clone(&kv))))
        .unwrap();
    registry
        .register(Arc::new(KvParticipant::new("b", Arc::clone(&kv))))
        .unwrap();

    let manager = TransactionManager::new(Arc::clone(&store), registry, Arc::clone(&kv), fast_config());

    let successful = manager
        .submit(vec![
            SubmitRequest::new("a", biz_args("x")),
            SubmitRequest::new("b", biz_args("y")),
        ])
        .await
        .unwrap();
    assert!(successful);

    let tx_id = "1".to_string();
    let final_status = wait_until_resolved(&store, &tx_id).await;
    assert_eq!(final_status, BranchStatus::Success);

    assert_eq!(
        kv.get(&tcc_core::keys::data_key("a", &tx_id, "x")).await.unwrap().as_deref(),
        Some("DataSuccess")
    );
    assert_eq!(
        kv.get(&tcc_core::keys::data_key("b", &tx_id, "y")).await.unwrap().as_deref(),
        Some("DataSuccess")
    );

    manager.shutdown();
}

#[tokio::test]
async fn soft_decline_cancels_every_branch() {
    let kv = Arc::new(FakeKvStore::new());
    let store = Arc::new(InMemoryTransactionStore::new());
    let registry = Arc::new(Registry::new());
    registry
        .register(Arc::new(KvParticipant::new("a", Arc::clone(&kv))))
        .unwrap();
    registry
        .register(ScriptedParticipant::new("b", ScriptedOutcome::Decline))
        .unwrap();

    let manager = TransactionManager::new(Arc::clone(&store), registry, Arc::clone(&kv), fast_config());

    let successful = manager
        .submit(vec![
            SubmitRequest::new("a", biz_args("x")),
            SubmitRequest::new("b", biz_args("y")),
        ])
        .await
        .unwrap();
    assert!(!successful);

    let tx_id = "1".to_string();
    let final_status = wait_until_resolved(&store, &tx_id).await;
    assert_eq!(final_status, BranchStatus::Failure);

    assert_eq!(
        kv.get(&tcc_core::keys::data_key("a", &tx_id, "x")).await.unwrap(),
        None,
        "a's reservation must be released on cancel"
    );

    manager.shutdown();
}

#[tokio::test]
async fn hard_try_failure_cancels_the_acked_branch() {
    let kv = Arc::new(FakeKvStore::new());
    let store = Arc::new(InMemoryTransactionStore::new());
    let registry = Arc::new(Registry::new());
    registry
        .register(ScriptedParticipant::new("a", ScriptedOutcome::Error))
        .unwrap();
    registry
        .register(Arc::new(KvParticipant::new("b", Arc::clone(&kv))))
        .unwrap();

    let manager = TransactionManager::new(Arc::clone(&store), registry, Arc::clone(&kv), fast_config());

    let successful = manager
        .submit(vec![
            SubmitRequest::new("a", biz_args("x")),
            SubmitRequest::new("b", biz_args("y")),
        ])
        .await
        .unwrap();
    assert!(!successful);

    let tx_id = "1".to_string();
    let final_status = wait_until_resolved(&store, &tx_id).await;
    assert_eq!(final_status, BranchStatus::Failure);

    assert_eq!(
        kv.get(&tcc_core::keys::data_key("b", &tx_id, "y")).await.unwrap(),
        None,
        "b's reservation must be released even though its Try acked"
    );

    manager.shutdown();
}

#[tokio::test]
async fn timeout_during_try_is_recorded_as_failure() {
    let kv = Arc::new(FakeKvStore::new());
    let store = Arc::new(InMemoryTransactionStore::new());
    let registry = Arc::new(Registry::new());
    registry
        .register(Arc::new(KvParticipant::new("a", Arc::clone(&kv))))
        .unwrap();
    registry
        .register(ScriptedParticipant::with_delay(
            "b",
            ScriptedOutcome::Ack,
            Duration::from_millis(500),
        ))
        .unwrap();

    let config = ManagerConfig::default()
        .with_timeout(Duration::from_millis(30))
        .with_monitor_tick(Duration::from_millis(60));
    let manager = TransactionManager::new(Arc::clone(&store), registry, Arc::clone(&kv), config);

    let successful = manager
        .submit(vec![
            SubmitRequest::new("a", biz_args("x")),
            SubmitRequest::new("b", biz_args("y")),
        ])
        .await
        .unwrap();
    assert!(!successful);

    let tx_id = "1".to_string();
    let final_status = wait_until_resolved(&store, &tx_id).await;
    assert_eq!(final_status, BranchStatus::Failure);

    manager.shutdown();
}

#[tokio::test]
async fn a_second_manager_recovers_a_transaction_the_first_never_advanced() {
    let kv = Arc::new(FakeKvStore::new());
    let store = Arc::new(InMemoryTransactionStore::new());
    let registry = Arc::new(Registry::new());
    registry
        .register(Arc::new(KvParticipant::new("a", Arc::clone(&kv))))
        .unwrap();
    registry
        .register(Arc::new(KvParticipant::new("b", Arc::clone(&kv))))
        .unwrap();

    // Simulate a coordinator that completed the Try phase (both branches
    // already TrySuccess in the store, and both participants already froze
    // their data keys) and then crashed before dispatching phase two:
    // create the record, run Try against each participant directly so the
    // key-value state a real Try would have left behind actually exists,
    // then flip both branches in the store, without ever calling `submit`
    // or `advance_tx`.
    let tx_id = store
        .create(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let participant_a = KvParticipant::new("a", Arc::clone(&kv));
    let participant_b = KvParticipant::new("b", Arc::clone(&kv));
    participant_a
        .try_branch(
            &TccReq {
                tx_id: tx_id.clone(),
                component_id: "a".to_string(),
                request_arg: biz_args("x"),
            },
            &cancel,
        )
        .await
        .unwrap();
    participant_b
        .try_branch(
            &TccReq {
                tx_id: tx_id.clone(),
                component_id: "b".to_string(),
                request_arg: biz_args("y"),
            },
            &cancel,
        )
        .await
        .unwrap();

    store.update_branch(&tx_id, "a", true).await.unwrap();
    store.update_branch(&tx_id, "b", true).await.unwrap();

    let config = ManagerConfig::default()
        .with_timeout(Duration::from_millis(100))
        .with_monitor_tick(Duration::from_millis(40));
    let recovering_manager =
        TransactionManager::new(Arc::clone(&store), registry, Arc::clone(&kv), config);

    let final_status = wait_until_resolved(&store, &tx_id).await;
    assert_eq!(final_status, BranchStatus::Success);
    assert!(recovering_manager.sweeps_run() >= 1);

    assert_eq!(
        kv.get(&tcc_core::keys::data_key("a", &tx_id, "x")).await.unwrap().as_deref(),
        Some("DataSuccess")
    );
    assert_eq!(
        kv.get(&tcc_core::keys::data_key("b", &tx_id, "y")).await.unwrap().as_deref(),
        Some("DataSuccess")
    );

    recovering_manager.shutdown();
}

//! # tcc
//!
//! A TCC (Try-Confirm/Cancel) distributed transaction coordinator: given a
//! set of heterogeneous branch operations addressed to registered
//! participant components, guarantees that either every branch is
//! eventually confirmed or every branch is eventually cancelled, despite
//! process crashes, transient store failures, and concurrent coordinator
//! replicas.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use tcc::{ManagerConfig, Registry, SubmitRequest, TransactionManager};
//! use tcc::kv::fake::FakeKvStore;
//! use tcc::participant::KvParticipant;
//! use tcc::store::InMemoryTransactionStore;
//!
//! # async fn run() -> tcc::TccResult<()> {
//! let kv = Arc::new(FakeKvStore::new());
//! let store = Arc::new(InMemoryTransactionStore::new());
//! let registry = Arc::new(Registry::new());
//! registry.register(Arc::new(KvParticipant::new("inventory", Arc::clone(&kv))))?;
//!
//! let manager = TransactionManager::new(store, registry, kv, ManagerConfig::default());
//! let mut args = HashMap::new();
//! args.insert("biz_id".to_string(), serde_json::json!("order-42"));
//! let successful = manager.submit(vec![SubmitRequest::new("inventory", args)]).await?;
//! assert!(successful);
//! # Ok(())
//! # }
//! ```
//!
//! Internal crates (`tcc-core`, `tcc-kv`, `tcc-lock`, `tcc-registry`,
//! `tcc-participant`, `tcc-store`, `tcc-manager`) implement the coordination
//! kernel; this root crate re-exports their public surface as the one
//! stable entry point.

#![warn(missing_docs)]

pub mod telemetry;

pub use tcc_core::{keys, BranchStatus, TccError, TccResult, Transaction, TxStatus};
pub use tcc_manager::{ManagerConfig, SubmitRequest, TransactionManager};
pub use tcc_participant::{Participant, ParticipantError, TccReq, TccResp};
pub use tcc_registry::Registry;

/// Key-value store surface and its reference implementations.
///
/// Re-exported as a module rather than flattened, since `tcc_kv::fake` and
/// `tcc_kv::redis_store` are themselves namespaces callers reach into
/// explicitly (`tcc::kv::fake::FakeKvStore`, `tcc::kv::redis_store::RedisKvStore`).
pub mod kv {
    pub use tcc_kv::*;
}

/// Distributed lease (C1): fencing-tokenised lock with auto-renewal.
pub mod lock {
    pub use tcc_lock::*;
}

/// The transaction store (C4): persistence trait plus the in-memory and
/// Postgres-backed implementations.
pub mod store {
    pub use tcc_store::*;
}

/// Participant contract (C2) plus the reference key-value-backed implementation.
pub mod participant {
    pub use tcc_participant::*;
}

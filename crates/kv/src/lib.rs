//! Key-value store surface required by the lock (C1) and reference
//! participant (C2) layers: `GET`, `SET`, `SET ... NX`, `SET ... NX EX`,
//! `DEL`, plus server-side `EVAL` scripting.
//!
//! No other commands are assumed anywhere above this crate — that is the
//! narrow interface the coordination kernel needs from the concrete
//! key-value driver.

mod error;
pub mod fake;
pub mod redis_store;

pub use error::KvError;

use async_trait::async_trait;

/// The key-value command surface the rest of the coordinator is built on.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); the
/// coordinator calls these concurrently from many branch tasks at once.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `GET key`. Returns `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// `SET key value` (unconditional).
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// `SET key value NX`. Returns `true` iff the key was absent and is now set.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError>;

    /// `SET key value NX EX ttl_secs`. Returns `true` iff the key was absent
    /// and is now set with the given expiry.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError>;

    /// `DEL key`. Not an error if the key was already absent.
    async fn del(&self, key: &str) -> Result<(), KvError>;

    /// `EVAL script numkeys key [key ...] arg [arg ...]`, returning the
    /// script's integer reply. The only two scripts ever issued against this
    /// method are [`CHECK_AND_RELEASE`](crate::redis_store::CHECK_AND_RELEASE)
    /// and [`CHECK_AND_RENEW`](crate::redis_store::CHECK_AND_RENEW); both
    /// return `0` or `1`.
    async fn eval_int(&self, script: &str, keys: &[&str], args: &[&str]) -> Result<i64, KvError>;
}

//! In-memory [`KvStore`] double for tests that don't want a real Redis.
//!
//! A simplified in-memory stand-in checked against the real backend's
//! behavior, rather than a mock with recorded expectations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::KvError;
use crate::redis_store::{CHECK_AND_RELEASE, CHECK_AND_RENEW};
use crate::KvStore;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// An in-process [`KvStore`] for unit and integration tests.
#[derive(Default)]
pub struct FakeKvStore {
    data: Mutex<HashMap<String, Entry>>,
}

impl FakeKvStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(entry: &Entry) -> Option<&str> {
        match entry.expires_at {
            Some(at) if Instant::now() >= at => None,
            _ => Some(entry.value.as_str()),
        }
    }
}

#[async_trait]
impl KvStore for FakeKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).and_then(Self::live_value).map(String::from))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut data = self.data.lock().unwrap();
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError> {
        let mut data = self.data.lock().unwrap();
        if data.get(key).and_then(Self::live_value).is_some() {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let mut data = self.data.lock().unwrap();
        if data.get(key).and_then(Self::live_value).is_some() {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut data = self.data.lock().unwrap();
        data.remove(key);
        Ok(())
    }

    async fn eval_int(&self, script: &str, keys: &[&str], args: &[&str]) -> Result<i64, KvError> {
        // Only the two fixed lock scripts are ever evaluated against this
        // store; interpret them directly instead of embedding a Lua engine.
        let key = keys.first().copied().unwrap_or_default();
        let token = args.first().copied().unwrap_or_default();

        let mut data = self.data.lock().unwrap();
        let current = data.get(key).and_then(Self::live_value).map(String::from);
        if current.as_deref() != Some(token) {
            return Ok(0);
        }

        if script == CHECK_AND_RELEASE {
            data.remove(key);
            Ok(1)
        } else if script == CHECK_AND_RENEW {
            let ttl_secs: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
            if let Some(entry) = data.get_mut(key) {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
            }
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_only_succeeds_once() {
        let kv = FakeKvStore::new();
        assert!(kv.set_nx("k", "v1").await.unwrap());
        assert!(!kv.set_nx("k", "v2").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn check_and_release_requires_matching_token() {
        let kv = FakeKvStore::new();
        kv.set("lock", "token-a").await.unwrap();

        let wrong = kv
            .eval_int(CHECK_AND_RELEASE, &["lock"], &["token-b"])
            .await
            .unwrap();
        assert_eq!(wrong, 0);
        assert_eq!(kv.get("lock").await.unwrap().as_deref(), Some("token-a"));

        let right = kv
            .eval_int(CHECK_AND_RELEASE, &["lock"], &["token-a"])
            .await
            .unwrap();
        assert_eq!(right, 1);
        assert_eq!(kv.get("lock").await.unwrap(), None);
    }
}

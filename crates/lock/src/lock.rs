//! The leased mutex itself: fencing-token acquisition, release, renewal and
//! the auto-renewing watchdog, generic over any [`KvStore`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use tcc_core::keys::REDIS_LOCK_PREFIX;
use tcc_kv::redis_store::{CHECK_AND_RELEASE, CHECK_AND_RENEW};
use tcc_kv::KvStore;

use crate::error::LockError;
use crate::options::{AcquireOptions, DEFAULT_RENEW_STEP_SECS, POLL_INTERVAL, RENEW_MARGIN_SECS};

/// Outcome of [`DistributedLock::release`]. Losing the race for a lease you
/// no longer hold is not fatal: the lease either expired or was never yours,
/// and the caller's own state machine decides what that means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lease was held by this token and has been deleted.
    Released,
    /// The lease was not held by this token (already expired, or never
    /// acquired). No-op.
    NotOwner,
}

struct Watchdog {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// A single named lease on top of a [`KvStore`].
///
/// One `DistributedLock` corresponds to one key; the branch lease and the
/// recovery poll lease are each a distinct instance. Not `Clone`: share via
/// `Arc` if multiple tasks need to observe the same handle.
pub struct DistributedLock<K: KvStore> {
    kv: Arc<K>,
    key: String,
    token: AsyncMutex<Option<String>>,
    watchdog: AsyncMutex<Option<Watchdog>>,
    held: AtomicBool,
}

impl<K: KvStore + 'static> DistributedLock<K> {
    /// Build a lock over `key` (before the [`REDIS_LOCK_PREFIX`] namespace is
    /// applied).
    pub fn new(kv: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: format!("{REDIS_LOCK_PREFIX}{}", key.into()),
            token: AsyncMutex::new(None),
            watchdog: AsyncMutex::new(None),
            held: AtomicBool::new(false),
        }
    }

    /// Acquire the lease, per `opts`.
    ///
    /// A fresh token is minted for this acquisition (process id plus a
    /// per-acquire UUID suffix) and becomes the fencing identity: only its
    /// holder may renew or release. On contention: a non-blocking caller
    /// gets `LockHeldElsewhere` back immediately; a blocking caller is
    /// retried at [`POLL_INTERVAL`] until it succeeds, `opts.block_wait`
    /// elapses (`WaitTimeout`), or `cancel` fires (`Cancelled`).
    pub async fn acquire(
        self: &Arc<Self>,
        opts: AcquireOptions,
        cancel: &CancellationToken,
    ) -> Result<(), LockError> {
        self.stop_watchdog().await;

        let new_token = format!("{}-{}", std::process::id(), Uuid::new_v4());
        let ttl = opts.effective_ttl();

        let acquired = if opts.blocking {
            self.blocking_try(&new_token, ttl, opts.block_wait, cancel)
                .await?
        } else {
            self.try_once(&new_token, ttl).await?
        };

        if !acquired {
            warn!(key = %self.key, "lease held elsewhere");
            return Err(LockError::HeldElsewhere {
                key: self.key.clone(),
            });
        }

        debug!(key = %self.key, token = %new_token, auto_renew = opts.effective_auto_renew(), "lease acquired");
        *self.token.lock().await = Some(new_token.clone());
        self.held.store(true, Ordering::SeqCst);
        if opts.effective_auto_renew() {
            self.start_watchdog(new_token).await;
        }
        Ok(())
    }

    async fn try_once(&self, token: &str, ttl: std::time::Duration) -> Result<bool, LockError> {
        self.kv
            .set_nx_ex(&self.key, token, ttl.as_secs())
            .await
            .map_err(LockError::from)
    }

    async fn blocking_try(
        &self,
        token: &str,
        ttl: std::time::Duration,
        block_wait: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, LockError> {
        let attempt = async {
            loop {
                if self.try_once(token, ttl).await? {
                    return Ok(true);
                }
                sleep(POLL_INTERVAL).await;
            }
        };

        tokio::select! {
            res = timeout(block_wait, attempt) => match res {
                Ok(inner) => inner,
                Err(_) => Err(LockError::WaitTimeout { key: self.key.clone() }),
            },
            _ = cancel.cancelled() => Err(LockError::Cancelled),
        }
    }

    /// Release the lease if this handle's current token still holds it.
    /// Stops the watchdog unconditionally, successful release or not.
    pub async fn release(&self) -> Result<ReleaseOutcome, LockError> {
        self.stop_watchdog().await;

        let token = self.token.lock().await.take();
        self.held.store(false, Ordering::SeqCst);
        let Some(token) = token else {
            return Ok(ReleaseOutcome::NotOwner);
        };

        let released = self
            .kv
            .eval_int(CHECK_AND_RELEASE, &[&self.key], &[&token])
            .await?;

        if released == 1 {
            debug!(key = %self.key, "lease released");
            Ok(ReleaseOutcome::Released)
        } else {
            warn!(key = %self.key, "release no-op, lease not held by this token");
            Ok(ReleaseOutcome::NotOwner)
        }
    }

    /// Extend the lease by `ttl`, provided the current token still owns it.
    pub async fn renew(&self, ttl: std::time::Duration) -> Result<ReleaseOutcome, LockError> {
        let guard = self.token.lock().await;
        let Some(token) = guard.as_deref() else {
            return Ok(ReleaseOutcome::NotOwner);
        };

        let renewed = self
            .kv
            .eval_int(
                CHECK_AND_RENEW,
                &[&self.key],
                &[token, &ttl.as_secs().to_string()],
            )
            .await?;

        Ok(if renewed == 1 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotOwner
        })
    }

    /// True while this handle believes it holds the lease. Best-effort: the
    /// lease may have expired server-side without the watchdog having run yet.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    async fn start_watchdog(self: &Arc<Self>, token: String) {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let this = Arc::clone(self);

        let task = tokio::spawn(async move {
            let step = std::time::Duration::from_secs(DEFAULT_RENEW_STEP_SECS);
            let renew_ttl = step + std::time::Duration::from_secs(RENEW_MARGIN_SECS);
            loop {
                tokio::select! {
                    _ = sleep(step) => {}
                    _ = child.cancelled() => return,
                }
                let guard = this.token.lock().await;
                if guard.as_deref() != Some(token.as_str()) {
                    return;
                }
                drop(guard);
                match this
                    .kv
                    .eval_int(
                        CHECK_AND_RENEW,
                        &[&this.key],
                        &[&token, &renew_ttl.as_secs().to_string()],
                    )
                    .await
                {
                    Ok(1) => continue,
                    _ => {
                        warn!(key = %this.key, "watchdog lost the lease, stopping renewal");
                        this.held.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
        });

        *self.watchdog.lock().await = Some(Watchdog { cancel, task });
    }

    /// Cancel and join any running watchdog before returning. A second
    /// `acquire` on the same handle must not start a new watchdog while a
    /// previous one is still winding down.
    async fn stop_watchdog(&self) {
        if let Some(watchdog) = self.watchdog.lock().await.take() {
            watchdog.cancel.cancel();
            let _ = watchdog.task.await;
        }
    }
}

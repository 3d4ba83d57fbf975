//! Configuration for acquiring a lease, as an explicit record rather than
//! functional options.

use std::time::Duration;

/// Default lease TTL used when the caller hasn't pinned one and auto-renew
/// takes over.
pub const DEFAULT_TTL_SECS: u64 = 30;
/// Watchdog renewal cadence.
pub const DEFAULT_RENEW_STEP_SECS: u64 = 10;
/// Added to the renewal step when computing the renewed TTL, to absorb
/// network jitter without letting the lease expire between renewals.
pub const RENEW_MARGIN_SECS: u64 = 5;
/// Default wait budget for a blocking acquire.
pub const DEFAULT_BLOCK_WAIT: Duration = Duration::from_secs(5);
/// Poll cadence used while blocking on a contested lock.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Options for [`crate::DistributedLock::acquire`].
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// If `false`, a single conditional acquire attempt is made and
    /// `LockHeldElsewhere` is returned immediately on contention. If `true`,
    /// failed attempts are retried at [`POLL_INTERVAL`] until success, the
    /// wait budget elapses (`WaitTimeout`), or the ambient deadline fires
    /// (`Cancelled`).
    pub blocking: bool,
    /// Wait budget for a blocking acquire.
    pub block_wait: Duration,
    /// Lease TTL. `None` means: use [`DEFAULT_TTL_SECS`] and turn on
    /// `auto_renew`.
    pub ttl: Option<Duration>,
    /// Whether a background watchdog renews the lease. Forced on when `ttl`
    /// is `None`.
    pub auto_renew: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            blocking: false,
            block_wait: DEFAULT_BLOCK_WAIT,
            ttl: None,
            auto_renew: true,
        }
    }
}

impl AcquireOptions {
    /// Enable blocking acquisition, retried until success/timeout/cancellation.
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Set the wait budget for a blocking acquire.
    pub fn block_wait(mut self, wait: Duration) -> Self {
        self.block_wait = wait;
        self
    }

    /// Pin an explicit TTL, disabling the auto-renew default.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self.auto_renew = false;
        self
    }

    /// Force auto-renew on even with a pinned TTL.
    pub fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    /// Resolve the effective TTL, applying the "unset -> default + auto-renew" rule.
    pub(crate) fn effective_ttl(&self) -> Duration {
        self.ttl.unwrap_or(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Resolve whether auto-renew is actually active.
    pub(crate) fn effective_auto_renew(&self) -> bool {
        self.ttl.is_none() || self.auto_renew
    }
}

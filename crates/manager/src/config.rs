//! Explicit configuration record for the transaction manager.

use std::time::Duration;

/// Default end-to-end Try deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default poller cadence and timeout floor.
pub const DEFAULT_MONITOR_TICK_SECS: u64 = 10;
/// Backoff ceiling: the poller never waits longer than `monitor_tick * 8`
/// after consecutive failed sweeps.
pub const BACKOFF_CEILING_MULTIPLIER: u32 = 8;
/// The recovery poller's distributed lease is held for
/// `monitor_tick * POLL_LEASE_TTL_MULTIPLIER`, comfortably longer than one
/// cadence so a sweep that runs long (a slow store, many hanging
/// transactions) doesn't have its lease expire out from under it mid-sweep
/// and let a second replica's poller start overlapping it.
pub const POLL_LEASE_TTL_MULTIPLIER: u32 = 8;

/// Tunables for [`crate::TransactionManager`].
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    /// End-to-end deadline applied to a `Submit` call's Try phase.
    pub timeout: Duration,
    /// Poller cadence, and the timeout floor `theta = now - monitor_tick`
    /// used to decide whether a hanging branch has aged out.
    pub monitor_tick: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            monitor_tick: Duration::from_secs(DEFAULT_MONITOR_TICK_SECS),
        }
    }
}

impl ManagerConfig {
    /// Override the Try-phase deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the poller cadence / timeout floor.
    pub fn with_monitor_tick(mut self, monitor_tick: Duration) -> Self {
        self.monitor_tick = monitor_tick;
        self
    }
}

//! Key-space conventions for the key-value store surface.
//!
//! Centralised here so `tcc-participant` and `tcc-lock` agree on the exact
//! templates without either crate depending on the other.

/// Prefix prepended by the lock layer to every lease key it manages.
pub const REDIS_LOCK_PREFIX: &str = "REDIS_LOCK_PREFIX";

/// Participant status key: `TX_key:{tx_id}_{component_id}`.
pub fn tx_status_key(component_id: &str, tx_id: &str) -> String {
    format!("TX_key:{tx_id}_{component_id}")
}

/// Participant business-id detail key: `TX_detail_key:{component_id}_{tx_id}`.
pub fn tx_detail_key(component_id: &str, tx_id: &str) -> String {
    format!("TX_detail_key:{component_id}_{tx_id}")
}

/// Branch lease key suffix (before `REDIS_LOCK_PREFIX` is prepended by the
/// lock layer): `TX_lock_key:{tx_id}_{component_id}`.
pub fn branch_lock_key(component_id: &str, tx_id: &str) -> String {
    format!("TX_lock_key:{tx_id}_{component_id}")
}

/// Reservation data key: `DATA_key:{tx_id}_{component_id}_{biz_id}`.
pub fn data_key(component_id: &str, tx_id: &str, biz_id: &str) -> String {
    format!("DATA_key:{tx_id}_{component_id}_{biz_id}")
}

/// Well-known key guarding the recovery poller's critical section, shared
/// across every coordinator instance so at most one sweep runs at a time.
pub const POLL_LEASE_KEY: &str = "tcc:poll-lease";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_render_as_expected() {
        assert_eq!(tx_status_key("comp", "42"), "TX_key:42_comp");
        assert_eq!(tx_detail_key("comp", "42"), "TX_detail_key:comp_42");
        assert_eq!(branch_lock_key("comp", "42"), "TX_lock_key:42_comp");
        assert_eq!(data_key("comp", "42", "biz"), "DATA_key:42_comp_biz");
    }
}

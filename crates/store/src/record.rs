//! Wire representation of the `component_try_statuses` blob: a map of
//! `{component_id, try_status}` entries, keyed again by component id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tcc_core::BranchStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BranchRecord {
    pub component_id: String,
    pub try_status: String,
}

const TRY_HANGING: &str = "TryHanging";
const TRY_SUCCESS: &str = "TrySuccess";
const TRY_FAILURE: &str = "TryFailure";

pub(crate) fn status_to_wire(status: BranchStatus) -> &'static str {
    match status {
        BranchStatus::Hanging => TRY_HANGING,
        BranchStatus::Success => TRY_SUCCESS,
        BranchStatus::Failure => TRY_FAILURE,
    }
}

pub(crate) fn status_from_wire(wire: &str) -> Option<BranchStatus> {
    match wire {
        TRY_HANGING => Some(BranchStatus::Hanging),
        TRY_SUCCESS => Some(BranchStatus::Success),
        TRY_FAILURE => Some(BranchStatus::Failure),
        _ => None,
    }
}

pub(crate) fn encode_branches(branches: &BTreeMap<String, BranchStatus>) -> String {
    let records: BTreeMap<&String, BranchRecord> = branches
        .iter()
        .map(|(id, status)| {
            (
                id,
                BranchRecord {
                    component_id: id.clone(),
                    try_status: status_to_wire(*status).to_string(),
                },
            )
        })
        .collect();
    serde_json::to_string(&records).expect("branch map serialises")
}

pub(crate) fn decode_branches(blob: &str) -> Result<BTreeMap<String, BranchStatus>, tcc_core::TccError> {
    let records: BTreeMap<String, BranchRecord> = serde_json::from_str(blob)?;
    Ok(records
        .into_iter()
        .filter_map(|(id, record)| status_from_wire(&record.try_status).map(|s| (id, s)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_branch_map() {
        let mut branches = BTreeMap::new();
        branches.insert("a".to_string(), BranchStatus::Success);
        branches.insert("b".to_string(), BranchStatus::Hanging);

        let encoded = encode_branches(&branches);
        let decoded = decode_branches(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded["a"], BranchStatus::Success);
        assert_eq!(decoded["b"], BranchStatus::Hanging);
    }
}

#[cfg(test)]
mod round_trip_law {
    //! Round-tripping the branch-status blob through persist/load must
    //! preserve the map exactly — key set, values, and count — checked
    //! against arbitrary branch maps, not just the one fixed example above.

    use super::*;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = BranchStatus> {
        prop_oneof![
            Just(BranchStatus::Hanging),
            Just(BranchStatus::Success),
            Just(BranchStatus::Failure),
        ]
    }

    proptest! {
        #[test]
        fn persist_then_load_preserves_the_map(
            entries in prop::collection::vec(
                ("[a-z]{1,12}", status_strategy()),
                0..16,
            ),
        ) {
            let branches: BTreeMap<String, BranchStatus> = entries.into_iter().collect();
            let encoded = encode_branches(&branches);
            let decoded = decode_branches(&encoded).unwrap();
            prop_assert_eq!(decoded, branches);
        }
    }
}

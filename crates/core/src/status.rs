//! Branch and transaction status, and the rule that derives the latter from
//! the former.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a single branch (participant) within a transaction.
///
/// Legal transitions: `Hanging -> Success`, `Hanging -> Failure`. Once
/// terminal, re-writing the same value is a no-op; writing the other
/// terminal value is an illegal transition (enforced by `tcc-store`, not by
/// this type — the type itself is a plain value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchStatus {
    /// Try has not yet resolved for this branch.
    Hanging,
    /// Try resolved successfully (`error == None && resp.ack == true`).
    Success,
    /// Try resolved unsuccessfully (error, or `resp.ack == false`).
    Failure,
}

impl BranchStatus {
    /// True once the branch can no longer change (`Success` or `Failure`).
    pub fn is_terminal(self) -> bool {
        !matches!(self, BranchStatus::Hanging)
    }
}

/// Derived status of a transaction as a whole. Never stored directly — always
/// recomputed from the branch map and a caller-supplied `theta`, and kept
/// distinct from the separately persisted final resolution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// At least one branch is still `Hanging` and the transaction has not
    /// yet aged past `theta`.
    Hanging,
    /// Every branch is `Success`.
    Success,
    /// At least one branch is `Failure`, or a branch is still `Hanging` but
    /// the transaction is older than `theta`.
    Failure,
}

/// A persisted transaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned identifier, kept as a string so in-memory and
    /// relational backends can share the same type without a numeric cast.
    pub id: String,
    /// The commit record: `Hanging` until phase two completes, then
    /// `Success` or `Failure`. Persisted by `SetFinal`.
    pub final_status: BranchStatus,
    /// Per-branch status, keyed by component id. Never loses keys once
    /// created by `Create`.
    pub branches: BTreeMap<String, BranchStatus>,
    /// Creation timestamp, used as `t0` in the derived-status rule.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Derive the in-flight status:
    ///
    /// - `Failure` if any branch is `Failure`, or any branch is still
    ///   `Hanging` and `created_at < theta`;
    /// - `Hanging` if at least one branch is `Hanging` and `created_at >= theta`;
    /// - `Success` otherwise (every branch `Success`).
    ///
    /// Only meaningful while `final_status == Hanging`; once a final
    /// resolution is persisted the derived status is moot.
    pub fn derive_status(&self, theta: DateTime<Utc>) -> TxStatus {
        let mut any_hanging = false;
        for status in self.branches.values() {
            if *status == BranchStatus::Failure {
                return TxStatus::Failure;
            }
            any_hanging |= *status == BranchStatus::Hanging;
        }

        if any_hanging && self.created_at < theta {
            return TxStatus::Failure;
        }
        if any_hanging {
            return TxStatus::Hanging;
        }
        TxStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tx_with(branches: &[(&str, BranchStatus)]) -> Transaction {
        Transaction {
            id: "1".to_string(),
            final_status: BranchStatus::Hanging,
            branches: branches
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn all_success_is_success() {
        let tx = tx_with(&[("a", BranchStatus::Success), ("b", BranchStatus::Success)]);
        assert_eq!(tx.derive_status(Utc::now() - Duration::seconds(10)), TxStatus::Success);
    }

    #[test]
    fn any_failure_is_failure_even_while_others_hang() {
        let tx = tx_with(&[("a", BranchStatus::Failure), ("b", BranchStatus::Hanging)]);
        assert_eq!(tx.derive_status(Utc::now() - Duration::seconds(10)), TxStatus::Failure);
    }

    #[test]
    fn hanging_before_theta_is_hanging() {
        let tx = tx_with(&[("a", BranchStatus::Hanging)]);
        assert_eq!(tx.derive_status(Utc::now() - Duration::seconds(10)), TxStatus::Hanging);
    }

    #[test]
    fn hanging_past_theta_is_failure() {
        let mut tx = tx_with(&[("a", BranchStatus::Hanging)]);
        tx.created_at = Utc::now() - Duration::seconds(30);
        assert_eq!(tx.derive_status(Utc::now() - Duration::seconds(10)), TxStatus::Failure);
    }
}

#[cfg(test)]
mod derive_status_laws {
    //! Property tests for the status derivation rule, checked against an
    //! independent oracle rather than the implementation's own branches.

    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn branch_status_strategy() -> impl Strategy<Value = BranchStatus> {
        prop_oneof![
            Just(BranchStatus::Hanging),
            Just(BranchStatus::Success),
            Just(BranchStatus::Failure),
        ]
    }

    /// An oracle independent of `Transaction::derive_status`'s own control
    /// flow, written directly from the derivation rule's prose description.
    fn oracle(branches: &[BranchStatus], aged_out: bool) -> TxStatus {
        if branches.iter().any(|b| *b == BranchStatus::Failure) {
            return TxStatus::Failure;
        }
        let any_hanging = branches.iter().any(|b| *b == BranchStatus::Hanging);
        if any_hanging && aged_out {
            return TxStatus::Failure;
        }
        if any_hanging {
            return TxStatus::Hanging;
        }
        TxStatus::Success
    }

    proptest! {
        #[test]
        fn matches_independent_oracle(
            statuses in prop::collection::vec(branch_status_strategy(), 0..8),
            aged_out in any::<bool>(),
        ) {
            let branches: BTreeMap<String, BranchStatus> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("branch-{i}"), *s))
                .collect();

            let now = Utc::now();
            let created_at = if aged_out {
                now - Duration::seconds(999)
            } else {
                now
            };
            let theta = now - Duration::seconds(10);

            let tx = Transaction {
                id: "1".to_string(),
                final_status: BranchStatus::Hanging,
                branches,
                created_at,
            };

            prop_assert_eq!(tx.derive_status(theta), oracle(&statuses, aged_out));
        }

        /// A transaction derived as `Success` must have every branch at
        /// `Success` — the forward half of the success/all-succeeded
        /// equivalence.
        #[test]
        fn success_implies_every_branch_succeeded(
            statuses in prop::collection::vec(branch_status_strategy(), 1..8),
        ) {
            let branches: BTreeMap<String, BranchStatus> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("branch-{i}"), *s))
                .collect();
            let tx = Transaction {
                id: "1".to_string(),
                final_status: BranchStatus::Hanging,
                branches,
                created_at: Utc::now(),
            };
            if tx.derive_status(Utc::now() - Duration::seconds(10)) == TxStatus::Success {
                prop_assert!(statuses.iter().all(|s| *s == BranchStatus::Success));
            }
        }
    }
}

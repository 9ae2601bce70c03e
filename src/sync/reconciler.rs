use std::collections::{BTreeSet, HashSet};

use crate::run_id::RunId;

/// Outcome of one reconciliation pass: which run directories must be created
/// and which removed to bring the mirror in line with the authority.
///
/// The two sets come from opposite set differences, so they are disjoint by
/// construction; a run id is never simultaneously new and deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub new_runs: BTreeSet<RunId>,
    pub deleted_runs: BTreeSet<RunId>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.new_runs.is_empty() && self.deleted_runs.is_empty()
    }
}

/// Diff the run ids present locally against the remote authority.
///
/// Pure set arithmetic over a single snapshot of each side; no I/O. The
/// ordered result sets make the subsequent copy/delete order deterministic.
pub fn reconcile(local: &HashSet<RunId>, remote: &HashSet<RunId>) -> Reconciliation {
    Reconciliation {
        new_runs: remote.difference(local).copied().collect(),
        deleted_runs: local.difference(remote).copied().collect(),
    }
}

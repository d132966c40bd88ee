//! Desired-state extraction from a manager's declared job list

use crate::crds::{CronJobManagerSpec, ManagedJob};
use crate::manager::types::ChildKey;
use std::collections::BTreeMap;

/// Keyed mapping of declared jobs, rebuilt from scratch on every reconcile
pub type DesiredState = BTreeMap<ChildKey, ManagedJob>;

/// What happens when two declared jobs share the same (namespace, name) key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateKeyPolicy {
    /// The entry later in declaration order replaces the earlier one
    LastWins,
}

/// Pinned duplicate-key policy; tests assert against this constant so the
/// behavior stays deliberate rather than incidental.
pub const DUPLICATE_KEY_POLICY: DuplicateKeyPolicy = DuplicateKeyPolicy::LastWins;

/// Build the desired state for one reconcile pass.
///
/// Pure and infallible: declared jobs are taken in order, and duplicate keys
/// resolve per [`DUPLICATE_KEY_POLICY`]. Field validation belongs to the CRD
/// schema, not here.
pub fn build_desired_state(spec: &CronJobManagerSpec) -> DesiredState {
    let mut desired = DesiredState::new();
    for job in &spec.jobs {
        let key = ChildKey::new(job.namespace.clone(), job.name.clone());
        match DUPLICATE_KEY_POLICY {
            DuplicateKeyPolicy::LastWins => {
                desired.insert(key, job.clone());
            }
        }
    }
    desired
}

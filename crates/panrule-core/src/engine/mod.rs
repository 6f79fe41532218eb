// ── Reconciliation engine ──
//
// Typed, bag-free algorithms shared by every rule family. `group` owns a
// contiguous run inside a shared rulebase; `policy` owns the whole of it.
// Both are generic over the `RulebaseClient` they drive and perform at most
// one write per apply.

pub mod group;
pub mod policy;

pub use group::{GroupSpec, GroupState, ReadOutcome};

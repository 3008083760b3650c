//! Coalition formation decisions.
//!
//! Both sides of a coalition exchange use the same severity-threshold rule,
//! exposed as pure functions so they are independently testable: an actor
//! facing a severe incident may solicit support, and a candidate helper
//! agrees only when it is free and the incident clears the cutoff.

use contracts::{PolicyConfig, Severity, UnitStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalitionDecision {
    Agree,
    Refuse,
}

/// Whether an actor working an incident of this severity should solicit
/// coalition support at all.
pub fn should_request_support(severity: Severity, policy: &PolicyConfig) -> bool {
    severity.rank() >= policy.coalition_trigger_rank
}

/// A candidate helper's answer to a coalition request: refuse while engaged,
/// otherwise agree iff the requested severity clears the configured cutoff.
pub fn evaluate_request(
    status: UnitStatus,
    severity: Severity,
    policy: &PolicyConfig,
) -> CoalitionDecision {
    if status == UnitStatus::Engaged {
        return CoalitionDecision::Refuse;
    }
    if severity.rank() >= policy.coalition_min_rank {
        CoalitionDecision::Agree
    } else {
        CoalitionDecision::Refuse
    }
}

//! Usage-control policies: construction and evaluation.

pub mod constraint;
pub mod evaluate;
pub mod simple;

use crate::types::Term;

pub use constraint::{evaluate_all, Constraint, ConstraintEvaluation};
pub use evaluate::{compliant_targets, evaluate_policies, PolicyEvaluation};
pub use simple::{
    create_simple_policy, create_simple_policy_at, IsoDuration, SimplePolicy, SimplePolicyOptions,
    DEFAULT_POLICY_DURATION,
};

/// Error type for policy construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Not an ISO 8601 duration.
    #[error("Invalid ISO 8601 duration: {0}")]
    InvalidDuration(String),
    /// Policies govern graphs and datasets only.
    #[error("Invalid policy target {0}")]
    InvalidTarget(Term),
}

//! Agreement evaluation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::constraint::{evaluate_all, Constraint};
use crate::containment::{classify, ContainmentType};
use crate::package::package_content_ids;
use crate::store::{InMemoryQuadStore, QuadPattern, QuadStore};
use crate::types::{vocab, Term};

/// Result of evaluating every agreement in a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEvaluation {
    /// Targets of compliant `use` permissions.
    pub compliant_targets: Vec<Term>,
    /// Graphs covered by those targets (dataset members included).
    pub compliant_graphs: Vec<Term>,
}

fn permission_targets<V: QuadStore + ?Sized>(
    view: &V,
    agreement: &Term,
    purpose: &str,
    now: DateTime<Utc>,
) -> Vec<Term> {
    let use_action = Term::named(vocab::odrl::USE);
    let mut targets = Vec::new();

    for permission in view.objects(agreement, vocab::odrl::PERMISSION) {
        if !view.objects(&permission, vocab::odrl::ACTION).contains(&use_action) {
            continue;
        }

        let constraints: Vec<Constraint> = view
            .objects(&permission, vocab::odrl::CONSTRAINT)
            .iter()
            .map(|node| Constraint::decode(view, node))
            .collect();
        let evaluation = evaluate_all(&constraints, purpose, now);
        if let Ok(json) = serde_json::to_string(&evaluation) {
            info!(permission = %permission, evaluation = %json, "Evaluated policy constraints");
        }

        if evaluation.status {
            targets.extend(view.objects(&permission, vocab::odrl::TARGET));
        }
    }

    targets
}

/// Targets of every `use` permission whose constraints hold for `purpose`
/// at `now`.
///
/// With `trusted_graphs`, only agreements stated inside those graphs count,
/// and each is read from its own graph alone.
pub fn compliant_targets<S: QuadStore + ?Sized>(
    store: &S,
    purpose: &str,
    now: DateTime<Utc>,
    trusted_graphs: Option<&BTreeSet<Term>>,
) -> Vec<Term> {
    let agreements = store.quads_matching(
        &QuadPattern::any()
            .predicate(vocab::rdf::TYPE)
            .object(Term::named(vocab::odrl::AGREEMENT)),
    );

    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();
    for declaration in agreements {
        let found = match trusted_graphs {
            Some(trusted) => {
                if !trusted.contains(&declaration.graph) {
                    continue;
                }
                let scoped = InMemoryQuadStore::from_quads(store.graph_quads(&declaration.graph));
                permission_targets(&scoped, &declaration.subject, purpose, now)
            }
            None => permission_targets(store, &declaration.subject, purpose, now),
        };
        for target in found {
            if seen.insert(target.clone()) {
                targets.push(target);
            }
        }
    }

    targets
}

/// Evaluate every agreement and resolve compliant targets to graphs.
///
/// Dataset targets contribute their member graphs; targets that are neither
/// graph nor dataset are skipped.
pub fn evaluate_policies<S: QuadStore + ?Sized>(
    store: &S,
    purpose: &str,
    now: DateTime<Utc>,
    trusted_graphs: Option<&BTreeSet<Term>>,
) -> PolicyEvaluation {
    let compliant_targets = compliant_targets(store, purpose, now, trusted_graphs);

    let mut graphs = BTreeSet::new();
    for target in &compliant_targets {
        match classify(store, target) {
            ContainmentType::Graph => {
                graphs.insert(target.clone());
            }
            ContainmentType::Dataset => match package_content_ids(store, target) {
                Ok(members) => graphs.extend(members),
                Err(e) => warn!(policy_target = %target, error = %e, "Could not resolve dataset members"),
            },
            ContainmentType::Other => {
                warn!(policy_target = %target, "Policy target is neither a graph nor a dataset");
            }
        }
    }

    PolicyEvaluation {
        compliant_targets,
        compliant_graphs: graphs.into_iter().collect(),
    }
}

//! Usage-control constraint trees.
//!
//! Constraints are decoded from the store once into a [`Constraint`] tree and
//! then evaluated in memory against a purpose and a clock reading.
//!
//! ## Fail-closed rules
//!
//! - A leaf must have exactly one left operand, operator and right operand
//! - `oac:Purpose` only supports `odrl:eq`
//! - `odrl:dateTime` only supports `odrl:gt` / `odrl:lt` and an RFC 3339 date
//! - Unknown left operands, malformed lists and empty `and`/`or` groups are
//!   non-compliant

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::package::decode_list;
use crate::store::QuadStore;
use crate::types::{vocab, Term};

/// A decoded constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `{leftOperand, operator, rightOperand}`.
    Leaf {
        /// Left operand.
        left: Term,
        /// Operator.
        op: Term,
        /// Right operand.
        right: Term,
    },
    /// Every child must hold.
    And(Vec<Constraint>),
    /// At least one child must hold.
    Or(Vec<Constraint>),
    /// Could not be decoded; always non-compliant.
    Malformed {
        /// Offending constraint node.
        node: Term,
        /// What is wrong with it.
        reason: String,
    },
}

/// Evaluated constraint tree, mirroring [`Constraint`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEvaluation {
    /// Whether the constraint holds.
    pub status: bool,
    /// Child evaluations of an `and` group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<ConstraintEvaluation>>,
    /// Child evaluations of an `or` group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<ConstraintEvaluation>>,
    /// Leaf left operand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    /// Leaf operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Leaf right operand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    /// Why a malformed constraint failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConstraintEvaluation {
    fn leaf(status: bool, left: &Term, op: &Term, right: &Term) -> Self {
        Self {
            status,
            left: Some(left.value().to_string()),
            op: Some(op.value().to_string()),
            right: Some(right.value().to_string()),
            ..Self::default()
        }
    }
}

fn single_object<S: QuadStore + ?Sized>(store: &S, node: &Term, predicate: &str) -> Result<Term, String> {
    let mut values = store.objects(node, predicate);
    values.sort();
    values.dedup();
    if values.len() == 1 {
        Ok(values.remove(0))
    } else {
        Err(format!("expected exactly one {}, found {}", predicate, values.len()))
    }
}

impl Constraint {
    /// Decode the constraint rooted at `node`.
    pub fn decode<S: QuadStore + ?Sized>(store: &S, node: &Term) -> Self {
        Self::decode_guarded(store, node, &mut BTreeSet::new())
    }

    fn decode_guarded<S: QuadStore + ?Sized>(store: &S, node: &Term, path: &mut BTreeSet<Term>) -> Self {
        if !path.insert(node.clone()) {
            return Self::Malformed {
                node: node.clone(),
                reason: "constraint contains itself".to_string(),
            };
        }

        let decoded = if !store.objects(node, vocab::odrl::AND).is_empty() {
            Self::decode_group(store, node, vocab::odrl::AND, path).map_or_else(
                |reason| Self::Malformed {
                    node: node.clone(),
                    reason,
                },
                Self::And,
            )
        } else if !store.objects(node, vocab::odrl::OR).is_empty() {
            Self::decode_group(store, node, vocab::odrl::OR, path).map_or_else(
                |reason| Self::Malformed {
                    node: node.clone(),
                    reason,
                },
                Self::Or,
            )
        } else {
            Self::decode_leaf(store, node)
        };

        path.remove(node);
        decoded
    }

    fn decode_group<S: QuadStore + ?Sized>(
        store: &S,
        node: &Term,
        predicate: &str,
        path: &mut BTreeSet<Term>,
    ) -> Result<Vec<Self>, String> {
        let head = single_object(store, node, predicate)?;
        let items = decode_list(store, &head).map_err(|e| e.to_string())?;
        Ok(items
            .iter()
            .map(|item| Self::decode_guarded(store, item, path))
            .collect())
    }

    fn decode_leaf<S: QuadStore + ?Sized>(store: &S, node: &Term) -> Self {
        let operands = single_object(store, node, vocab::odrl::LEFT_OPERAND).and_then(|left| {
            Ok((
                left,
                single_object(store, node, vocab::odrl::OPERATOR)?,
                single_object(store, node, vocab::odrl::RIGHT_OPERAND)?,
            ))
        });

        match operands {
            Ok((left, op, right)) => Self::Leaf { left, op, right },
            Err(reason) => Self::Malformed {
                node: node.clone(),
                reason,
            },
        }
    }

    /// Evaluate against a requested `purpose` at time `now`.
    pub fn evaluate(&self, purpose: &str, now: DateTime<Utc>) -> ConstraintEvaluation {
        match self {
            Self::And(children) => {
                let evaluations: Vec<_> = children.iter().map(|c| c.evaluate(purpose, now)).collect();
                ConstraintEvaluation {
                    status: !evaluations.is_empty() && evaluations.iter().all(|e| e.status),
                    and: Some(evaluations),
                    ..ConstraintEvaluation::default()
                }
            }
            Self::Or(children) => {
                let evaluations: Vec<_> = children.iter().map(|c| c.evaluate(purpose, now)).collect();
                ConstraintEvaluation {
                    status: evaluations.iter().any(|e| e.status),
                    or: Some(evaluations),
                    ..ConstraintEvaluation::default()
                }
            }
            Self::Malformed { node, reason } => {
                warn!(constraint = %node, reason = %reason, "Could not evaluate malformed policy constraint");
                ConstraintEvaluation {
                    status: false,
                    reason: Some(reason.clone()),
                    ..ConstraintEvaluation::default()
                }
            }
            Self::Leaf { left, op, right } => {
                ConstraintEvaluation::leaf(evaluate_leaf(left, op, right, purpose, now), left, op, right)
            }
        }
    }
}

fn evaluate_leaf(left: &Term, op: &Term, right: &Term, purpose: &str, now: DateTime<Utc>) -> bool {
    match left.value() {
        vocab::OAC_PURPOSE => {
            if op.value() != vocab::odrl::EQ {
                warn!(operator = %op, "Purpose constraints must use odrl:eq");
                return false;
            }
            right.value() == purpose
        }
        vocab::odrl::DATE_TIME => {
            let Some(date) = parse_date_time(right.value()) else {
                warn!(date = %right, "Could not parse dateTime constraint operand");
                return false;
            };
            match op.value() {
                vocab::odrl::GT => now > date,
                vocab::odrl::LT => now < date,
                _ => {
                    warn!(operator = %op, "dateTime constraints must use odrl:gt or odrl:lt");
                    false
                }
            }
        }
        other => {
            error!(left_operand = other, "Failing on unsupported left operand");
            false
        }
    }
}

/// Parse an xsd:dateTime. A value without a timezone is read as UTC.
fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Evaluate several constraints attached to one permission (implicit AND).
///
/// No constraints means trivially compliant.
pub fn evaluate_all(constraints: &[Constraint], purpose: &str, now: DateTime<Utc>) -> ConstraintEvaluation {
    match constraints {
        [] => ConstraintEvaluation {
            status: true,
            ..ConstraintEvaluation::default()
        },
        [single] => single.evaluate(purpose, now),
        many => Constraint::And(many.to_vec()).evaluate(purpose, now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::package::encode_list;
    use crate::store::InMemoryQuadStore;
    use crate::types::Quad;

    const A: &str = "https://w3id.org/dpv#ResearchAndDevelopment";
    const B: &str = "https://w3id.org/dpv#NonCommercialPurpose";

    fn leaf_quads(node: &Term, left: &str, op: &str, right: Term) -> Vec<Quad> {
        vec![
            Quad::triple(node.clone(), Term::named(vocab::odrl::LEFT_OPERAND), Term::named(left)),
            Quad::triple(node.clone(), Term::named(vocab::odrl::OPERATOR), Term::named(op)),
            Quad::triple(node.clone(), Term::named(vocab::odrl::RIGHT_OPERAND), right),
        ]
    }

    fn purpose_leaf(node: &Term, purpose: &str) -> Vec<Quad> {
        leaf_quads(node, vocab::OAC_PURPOSE, vocab::odrl::EQ, Term::named(purpose))
    }

    fn date_leaf(node: &Term, op: &str, date: DateTime<Utc>) -> Vec<Quad> {
        leaf_quads(
            node,
            vocab::odrl::DATE_TIME,
            op,
            Term::typed_literal(date.to_rfc3339(), vocab::xsd::DATE_TIME),
        )
    }

    fn group(node: &Term, predicate: &str, children: &[Term]) -> Vec<Quad> {
        let list = encode_list(children, &Term::DefaultGraph);
        let mut quads = list.quads;
        quads.push(Quad::triple(node.clone(), Term::named(predicate), list.head));
        quads
    }

    #[test]
    fn test_or_of_purposes() {
        let (root, a, b) = (Term::blank("c"), Term::blank("a"), Term::blank("b"));
        let mut quads = group(&root, vocab::odrl::OR, &[a.clone(), b.clone()]);
        quads.extend(purpose_leaf(&a, A));
        quads.extend(purpose_leaf(&b, B));
        let store = InMemoryQuadStore::from_quads(quads);

        let constraint = Constraint::decode(&store, &root);
        assert!(matches!(constraint, Constraint::Or(ref c) if c.len() == 2));
        assert!(constraint.evaluate(A, Utc::now()).status);
        assert!(!constraint.evaluate("https://w3id.org/dpv#Marketing", Utc::now()).status);
    }

    #[test]
    fn test_and_with_expired_date() {
        let (root, date, purpose) = (Term::blank("c"), Term::blank("d"), Term::blank("p"));
        let now = Utc::now();
        let mut quads = group(&root, vocab::odrl::AND, &[date.clone(), purpose.clone()]);
        quads.extend(date_leaf(&date, vocab::odrl::LT, now - Duration::seconds(1)));
        quads.extend(purpose_leaf(&purpose, A));
        let store = InMemoryQuadStore::from_quads(quads);

        let evaluation = Constraint::decode(&store, &root).evaluate(A, now);
        assert!(!evaluation.status);
        let children = evaluation.and.unwrap();
        assert!(!children[0].status);
        assert!(children[1].status);
    }

    #[test]
    fn test_two_right_operands_fail_closed() {
        let node = Term::blank("c");
        let mut quads = purpose_leaf(&node, A);
        quads.push(Quad::triple(
            node.clone(),
            Term::named(vocab::odrl::RIGHT_OPERAND),
            Term::named(B),
        ));
        let store = InMemoryQuadStore::from_quads(quads);

        let constraint = Constraint::decode(&store, &node);
        assert!(matches!(constraint, Constraint::Malformed { .. }));
        assert!(!constraint.evaluate(A, Utc::now()).status);
    }

    #[test]
    fn test_purpose_requires_eq() {
        let node = Term::blank("c");
        let store = InMemoryQuadStore::from_quads(leaf_quads(
            &node,
            vocab::OAC_PURPOSE,
            vocab::odrl::GT,
            Term::named(A),
        ));
        assert!(!Constraint::decode(&store, &node).evaluate(A, Utc::now()).status);
    }

    #[test]
    fn test_date_operators() {
        let now = Utc::now();
        let (before, after, bad) = (Term::blank("x"), Term::blank("y"), Term::blank("z"));
        let mut quads = date_leaf(&before, vocab::odrl::GT, now - Duration::days(1));
        quads.extend(date_leaf(&after, vocab::odrl::LT, now + Duration::days(1)));
        quads.extend(leaf_quads(
            &bad,
            vocab::odrl::DATE_TIME,
            vocab::odrl::LT,
            Term::literal("next tuesday"),
        ));
        let store = InMemoryQuadStore::from_quads(quads);

        assert!(Constraint::decode(&store, &before).evaluate(A, now).status);
        assert!(Constraint::decode(&store, &after).evaluate(A, now).status);
        assert!(!Constraint::decode(&store, &bad).evaluate(A, now).status);
    }

    #[test]
    fn test_date_without_timezone_is_utc() {
        let now = DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (until, since) = (Term::blank("u"), Term::blank("s"));
        let mut quads = leaf_quads(
            &until,
            vocab::odrl::DATE_TIME,
            vocab::odrl::LT,
            Term::typed_literal("2026-06-01T12:00:00.500", vocab::xsd::DATE_TIME),
        );
        quads.extend(leaf_quads(
            &since,
            vocab::odrl::DATE_TIME,
            vocab::odrl::GT,
            Term::typed_literal("2026-01-01T00:00:00", vocab::xsd::DATE_TIME),
        ));
        let store = InMemoryQuadStore::from_quads(quads);

        assert!(Constraint::decode(&store, &until).evaluate(A, now).status);
        assert!(Constraint::decode(&store, &since).evaluate(A, now).status);
        assert!(!Constraint::decode(&store, &until)
            .evaluate(A, now + Duration::seconds(1))
            .status);
    }

    #[test]
    fn test_empty_groups_fail_closed() {
        assert!(!Constraint::And(vec![]).evaluate(A, Utc::now()).status);
        assert!(!Constraint::Or(vec![]).evaluate(A, Utc::now()).status);
        assert!(evaluate_all(&[], A, Utc::now()).status);
    }

    #[test]
    fn test_self_referencing_group_is_malformed() {
        let root = Term::blank("c");
        let store = InMemoryQuadStore::from_quads(group(&root, vocab::odrl::AND, &[root.clone()]));

        match Constraint::decode(&store, &root) {
            Constraint::And(children) => assert!(matches!(children[0], Constraint::Malformed { .. })),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluation_serializes_without_empty_fields() {
        let json = serde_json::to_value(Constraint::Or(vec![]).evaluate(A, Utc::now())).unwrap();
        assert_eq!(json["status"], false);
        assert!(json.get("left").is_none());
        assert!(json["or"].as_array().unwrap().is_empty());
    }
}

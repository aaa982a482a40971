//! Construction of simple permission policies.
//!
//! A simple policy is one Agreement granting `use` and `read` on a target,
//! optionally limited in time and to a set of purposes:
//!
//! ```text
//! _:agreement a odrl:Agreement ; odrl:uid <urn:policy:...> ; odrl:permission _:perm .
//! _:perm odrl:target _:dataset ; odrl:action odrl:use, odrl:read ;
//!        odrl:constraint [ odrl:and ( _:expiry _:purpose ) ] .
//! _:expiry odrl:leftOperand odrl:dateTime ; odrl:operator odrl:lt ; odrl:rightOperand "..."^^xsd:dateTime .
//! _:purpose odrl:or ( _:p1 _:p2 ) .
//! ```

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use regex_lite::Regex;
use uuid::Uuid;

use super::PolicyError;
use crate::package::encode_list;
use crate::types::{vocab, Quad, Term};

/// Validity period used when none is given.
pub const DEFAULT_POLICY_DURATION: &str = "P7D";

/// A parsed ISO 8601 duration.
///
/// Years and months are calendar units; everything else is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoDuration {
    /// Whole months (years count twelve).
    pub months: u32,
    /// Weeks, days and time components.
    pub exact: Duration,
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
        )
        .expect("static regex is valid")
    })
}

impl IsoDuration {
    /// Parse `PnYnMnWnDTnHnMnS` (any component optional, at least one present).
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let invalid = || PolicyError::InvalidDuration(text.to_string());
        let captures = duration_pattern().captures(text).ok_or_else(invalid)?;
        if text == "P" || text.ends_with('T') {
            return Err(invalid());
        }

        let int = |i: usize| -> Result<i64, PolicyError> {
            captures
                .get(i)
                .map_or(Ok(0), |m| m.as_str().parse::<i64>().map_err(|_| invalid()))
        };

        let months = int(1)?
            .checked_mul(12)
            .and_then(|y| y.checked_add(int(2).ok()?))
            .and_then(|m| u32::try_from(m).ok())
            .ok_or_else(invalid)?;

        let seconds: f64 = captures
            .get(7)
            .map_or(Ok(0.0), |m| m.as_str().parse::<f64>().map_err(|_| invalid()))?;

        let exact = Duration::try_weeks(int(3)?)
            .zip(Duration::try_days(int(4)?))
            .zip(Duration::try_hours(int(5)?))
            .zip(Duration::try_minutes(int(6)?))
            .zip(Duration::try_milliseconds((seconds * 1_000.0).round() as i64))
            .map(|((((w, d), h), m), s)| w + d + h + m + s)
            .ok_or_else(invalid)?;

        Ok(Self { months, exact })
    }

    /// The instant this long after `start`.
    pub fn after(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start
            .checked_add_months(Months::new(self.months))?
            .checked_add_signed(self.exact)
    }
}

/// Options for [`create_simple_policy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePolicyOptions {
    /// Governed graph or dataset.
    pub target: Term,
    /// Validity period from now, ISO 8601.
    pub duration: Option<String>,
    /// Accepted purposes; any one of them suffices.
    pub purposes: Vec<String>,
    /// Party granting the permission.
    pub assigner: Option<String>,
    /// Party receiving the permission.
    pub assignee: Option<String>,
}

impl SimplePolicyOptions {
    /// Options for `target` with no constraints.
    pub fn new(target: Term) -> Self {
        Self {
            target,
            duration: None,
            purposes: Vec::new(),
            assigner: None,
            assignee: None,
        }
    }
}

/// A built policy, ready to be added to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePolicy {
    /// Agreement subject.
    pub agreement: Term,
    /// `urn:policy:<uuid>` identifier.
    pub uid: Term,
    /// Policy quads, all in the requested graph.
    pub quads: Vec<Quad>,
}

/// Build a simple policy into `graph`, timed from `now`.
pub fn create_simple_policy_at(
    options: &SimplePolicyOptions,
    graph: &Term,
    now: DateTime<Utc>,
) -> Result<SimplePolicy, PolicyError> {
    if !(options.target.is_named() || options.target.is_blank()) {
        return Err(PolicyError::InvalidTarget(options.target.clone()));
    }

    let q = |s: &Term, p: &str, o: Term| Quad::new(s.clone(), Term::named(p), o, graph.clone());
    let leaf = |quads: &mut Vec<Quad>, left: &str, op: &str, right: Term| -> Term {
        let node = Term::fresh_blank();
        quads.push(q(&node, vocab::rdf::TYPE, Term::named(vocab::odrl::CONSTRAINT_CLASS)));
        quads.push(q(&node, vocab::odrl::LEFT_OPERAND, Term::named(left)));
        quads.push(q(&node, vocab::odrl::OPERATOR, Term::named(op)));
        quads.push(q(&node, vocab::odrl::RIGHT_OPERAND, right));
        node
    };

    let mut quads = Vec::new();
    let mut constraints = Vec::new();

    if let Some(duration) = &options.duration {
        let end = IsoDuration::parse(duration)?
            .after(now)
            .ok_or_else(|| PolicyError::InvalidDuration(duration.clone()))?;
        constraints.push(leaf(
            &mut quads,
            vocab::odrl::DATE_TIME,
            vocab::odrl::LT,
            Term::typed_literal(end.to_rfc3339_opts(SecondsFormat::Millis, true), vocab::xsd::DATE_TIME),
        ));
    }

    match options.purposes.as_slice() {
        [] => {}
        [purpose] => constraints.push(leaf(
            &mut quads,
            vocab::OAC_PURPOSE,
            vocab::odrl::EQ,
            Term::named(purpose.clone()),
        )),
        purposes => {
            let alternatives: Vec<Term> = purposes
                .iter()
                .map(|p| leaf(&mut quads, vocab::OAC_PURPOSE, vocab::odrl::EQ, Term::named(p.clone())))
                .collect();
            let list = encode_list(&alternatives, graph);
            let node = Term::fresh_blank();
            quads.extend(list.quads);
            quads.push(q(&node, vocab::odrl::OR, list.head));
            constraints.push(node);
        }
    }

    let permission = Term::fresh_blank();
    quads.push(q(&permission, vocab::odrl::TARGET, options.target.clone()));
    quads.push(q(&permission, vocab::odrl::ACTION, Term::named(vocab::odrl::USE)));
    quads.push(q(&permission, vocab::odrl::ACTION, Term::named(vocab::odrl::READ)));
    if let Some(assigner) = &options.assigner {
        quads.push(q(&permission, vocab::odrl::ASSIGNER, Term::named(assigner.clone())));
    }
    if let Some(assignee) = &options.assignee {
        quads.push(q(&permission, vocab::odrl::ASSIGNEE, Term::named(assignee.clone())));
    }

    match constraints.as_slice() {
        [] => {}
        [single] => quads.push(q(&permission, vocab::odrl::CONSTRAINT, single.clone())),
        all => {
            let list = encode_list(all, graph);
            let node = Term::fresh_blank();
            quads.extend(list.quads);
            quads.push(q(&node, vocab::odrl::AND, list.head));
            quads.push(q(&permission, vocab::odrl::CONSTRAINT, node));
        }
    }

    let agreement = Term::fresh_blank();
    let uid = Term::named(format!("urn:policy:{}", Uuid::new_v4()));
    quads.push(q(&agreement, vocab::rdf::TYPE, Term::named(vocab::odrl::AGREEMENT)));
    quads.push(q(&agreement, vocab::odrl::UID, uid.clone()));
    quads.push(q(&agreement, vocab::odrl::PERMISSION, permission));

    Ok(SimplePolicy {
        agreement,
        uid,
        quads,
    })
}

/// Build a simple policy into `graph`, timed from the current instant.
pub fn create_simple_policy(options: &SimplePolicyOptions, graph: &Term) -> Result<SimplePolicy, PolicyError> {
    create_simple_policy_at(options, graph, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{compliant_targets, Constraint};
    use crate::store::{InMemoryQuadStore, QuadStore};

    const A: &str = "https://w3id.org/dpv#ResearchAndDevelopment";
    const B: &str = "https://w3id.org/dpv#NonCommercialPurpose";

    #[test]
    fn test_parse_durations() {
        assert_eq!(
            IsoDuration::parse("P7D").unwrap(),
            IsoDuration {
                months: 0,
                exact: Duration::days(7)
            }
        );
        assert_eq!(IsoDuration::parse("P1Y2M").unwrap().months, 14);
        assert_eq!(
            IsoDuration::parse("PT1H30M0.5S").unwrap().exact,
            Duration::minutes(90) + Duration::milliseconds(500)
        );
        assert!(IsoDuration::parse("P").is_err());
        assert!(IsoDuration::parse("P1DT").is_err());
        assert!(IsoDuration::parse("7 days").is_err());
    }

    #[test]
    fn test_calendar_months() {
        let start = DateTime::parse_from_rfc3339("2026-01-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = IsoDuration::parse("P1M").unwrap().after(start).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-02-28T00:00:00+00:00");
    }

    #[test]
    fn test_policy_shape() {
        let graph = Term::blank("pg");
        let mut options = SimplePolicyOptions::new(Term::blank("dataset"));
        options.duration = Some(DEFAULT_POLICY_DURATION.to_string());
        options.purposes = vec![A.to_string(), B.to_string()];
        options.assigner = Some("https://alice.example.org/#me".to_string());

        let policy = create_simple_policy(&options, &graph).unwrap();
        let store = InMemoryQuadStore::from_quads(policy.quads.clone());

        assert!(policy.uid.value().starts_with("urn:policy:"));
        assert!(policy.quads.iter().all(|q| q.graph == graph));

        let permission = store.objects(&policy.agreement, vocab::odrl::PERMISSION).remove(0);
        assert_eq!(store.objects(&permission, vocab::odrl::ACTION).len(), 2);
        let constraint = store.objects(&permission, vocab::odrl::CONSTRAINT).remove(0);
        match Constraint::decode(&store, &constraint) {
            Constraint::And(children) => {
                assert!(matches!(children[0], Constraint::Leaf { .. }));
                assert!(matches!(children[1], Constraint::Or(ref p) if p.len() == 2));
            }
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_is_compliant_for_listed_purpose_only() {
        let target = Term::blank("g");
        let mut options = SimplePolicyOptions::new(target.clone());
        options.duration = Some("P1D".to_string());
        options.purposes = vec![A.to_string()];
        let policy = create_simple_policy(&options, &Term::blank("pg")).unwrap();
        let store = InMemoryQuadStore::from_quads(policy.quads);

        assert_eq!(compliant_targets(&store, A, Utc::now(), None), vec![target]);
        assert!(compliant_targets(&store, B, Utc::now(), None).is_empty());
    }

    #[test]
    fn test_invalid_duration_and_target() {
        let mut options = SimplePolicyOptions::new(Term::blank("g"));
        options.duration = Some("soon".to_string());
        assert!(matches!(
            create_simple_policy(&options, &Term::blank("pg")),
            Err(PolicyError::InvalidDuration(_))
        ));

        let options = SimplePolicyOptions::new(Term::literal("g"));
        assert!(matches!(
            create_simple_policy(&options, &Term::blank("pg")),
            Err(PolicyError::InvalidTarget(_))
        ));
    }
}

//! Provenance metadata: writing it, and checking graphs against it.
//!
//! A provenance record is a set of `pack:origin`, `pack:issuer` and
//! `pack:timestamp` triples about a graph or dataset. Graphs without their
//! own record inherit the values of the datasets that contain them.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::package::containing_datasets;
use crate::store::QuadStore;
use crate::types::{vocab, Quad, Term};

/// Error type for provenance operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvenanceError {
    /// Provenance can only describe graphs and datasets named by IRIs or blank nodes.
    #[error("Invalid provenance target {0}")]
    InvalidTarget(Term),
}

/// What to record about a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceOptions {
    /// Where the content was retrieved from.
    pub origin: Option<Term>,
    /// Who retrieved or published it.
    pub issuer: Option<Term>,
}

/// Quads written by [`tag_provenance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceRecord {
    /// Described target.
    pub target: Term,
    /// Graph holding the record; `None` when nothing was written.
    pub graph: Option<Term>,
    /// The record itself.
    pub quads: Vec<Quad>,
}

impl ProvenanceRecord {
    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

/// Build the provenance quads for `target` in `graph`, stamped with `timestamp`.
///
/// Empty when neither origin nor issuer is given.
pub fn provenance_quads(
    target: &Term,
    options: &ProvenanceOptions,
    timestamp: DateTime<Utc>,
    graph: &Term,
) -> Vec<Quad> {
    if options.origin.is_none() && options.issuer.is_none() {
        return Vec::new();
    }

    let q = |p: &str, o: Term| Quad::new(target.clone(), Term::named(p), o, graph.clone());
    let mut quads = Vec::with_capacity(3);
    if let Some(origin) = &options.origin {
        quads.push(q(vocab::pack::ORIGIN, origin.clone()));
    }
    if let Some(issuer) = &options.issuer {
        quads.push(q(vocab::pack::ISSUER, issuer.clone()));
    }
    quads.push(q(
        vocab::pack::TIMESTAMP,
        Term::typed_literal(
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            vocab::xsd::DATE_TIME,
        ),
    ));
    quads
}

/// Record provenance for `target` in a fresh graph.
pub fn tag_provenance<S: QuadStore + ?Sized>(
    store: &mut S,
    target: &Term,
    options: &ProvenanceOptions,
) -> Result<ProvenanceRecord, ProvenanceError> {
    if !(target.is_named() || target.is_blank()) {
        return Err(ProvenanceError::InvalidTarget(target.clone()));
    }

    let graph = Term::fresh_blank();
    let quads = provenance_quads(target, options, Utc::now(), &graph);
    if quads.is_empty() {
        return Ok(ProvenanceRecord {
            target: target.clone(),
            graph: None,
            quads,
        });
    }

    for quad in &quads {
        store.insert(quad.clone());
    }
    Ok(ProvenanceRecord {
        target: target.clone(),
        graph: Some(graph),
        quads,
    })
}

/// Requirements a graph's provenance must meet.
///
/// Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRequirements {
    /// Accepted issuers.
    #[serde(default)]
    pub retrieved_by: Option<Vec<Term>>,
    /// Accepted origins.
    #[serde(default)]
    pub retrieved_from: Option<Vec<Term>>,
    /// Content must be timestamped strictly after this instant.
    #[serde(default)]
    pub retrieved_after: Option<DateTime<Utc>>,
    /// Only consider graphs whose signatures were validated.
    #[serde(default)]
    pub require_trusted: bool,
}

impl ProvenanceRequirements {
    /// Require one of `issuers`.
    pub fn retrieved_by<I, T>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.retrieved_by = Some(issuers.into_iter().map(Term::named).collect());
        self
    }

    /// Require one of `origins`.
    pub fn retrieved_from<I, T>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.retrieved_from = Some(origins.into_iter().map(Term::named).collect());
        self
    }

    /// Require a timestamp after `instant`.
    pub fn retrieved_after(mut self, instant: DateTime<Utc>) -> Self {
        self.retrieved_after = Some(instant);
        self
    }

    /// Restrict candidates to signature-validated graphs.
    pub fn trusted(mut self) -> Self {
        self.require_trusted = true;
        self
    }
}

/// Values of `predicate` for `graph`: its own, else those of the nearest
/// containing datasets.
pub fn resolved_values<S: QuadStore + ?Sized>(store: &S, graph: &Term, predicate: &str) -> Vec<Term> {
    let own = store.objects(graph, predicate);
    if !own.is_empty() {
        return own;
    }

    let mut visited = BTreeSet::from([graph.clone()]);
    let mut frontier = containing_datasets(store, graph);
    let mut values = Vec::new();

    while !frontier.is_empty() && values.is_empty() {
        let mut next = Vec::new();
        for dataset in frontier {
            if !visited.insert(dataset.clone()) {
                continue;
            }
            let found = store.objects(&dataset, predicate);
            if found.is_empty() {
                next.extend(containing_datasets(store, &dataset));
            } else {
                values.extend(found);
            }
        }
        frontier = next;
    }

    values
}

fn parse_timestamp(term: &Term) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(term.value())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Narrow `candidates` to the graphs meeting every requirement.
///
/// Requirements are applied in turn (issuer, origin, timestamp); a graph
/// passes one if any resolved value satisfies it.
pub fn evaluate_provenance<S: QuadStore + ?Sized>(
    store: &S,
    candidates: &[Term],
    requirements: &ProvenanceRequirements,
) -> Vec<Term> {
    let mut surviving: Vec<Term> = candidates.to_vec();

    if let Some(issuers) = &requirements.retrieved_by {
        surviving.retain(|g| {
            resolved_values(store, g, vocab::pack::ISSUER)
                .iter()
                .any(|v| issuers.contains(v))
        });
    }

    if let Some(origins) = &requirements.retrieved_from {
        surviving.retain(|g| {
            resolved_values(store, g, vocab::pack::ORIGIN)
                .iter()
                .any(|v| origins.contains(v))
        });
    }

    if let Some(after) = requirements.retrieved_after {
        surviving.retain(|g| {
            resolved_values(store, g, vocab::pack::TIMESTAMP)
                .iter()
                .filter_map(parse_timestamp)
                .any(|ts| ts > after)
        });
    }

    debug!(
        candidates = candidates.len(),
        passing = surviving.len(),
        "Evaluated provenance requirements"
    );
    surviving
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::package::wrap_as_dataset;
    use crate::store::InMemoryQuadStore;

    const X: &str = "https://origin.example.org/";

    fn content(graph: &Term) -> Quad {
        Quad::new(
            Term::named("https://example.org/s"),
            Term::named("https://example.org/p"),
            Term::literal("o"),
            graph.clone(),
        )
    }

    #[test]
    fn test_no_origin_no_issuer_writes_nothing() {
        let mut store = InMemoryQuadStore::new();
        let record = tag_provenance(&mut store, &Term::blank("g"), &ProvenanceOptions::default()).unwrap();

        assert!(record.is_empty());
        assert!(record.graph.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_is_timestamped() {
        let mut store = InMemoryQuadStore::new();
        let g = Term::blank("g");
        let options = ProvenanceOptions {
            origin: Some(Term::named(X)),
            issuer: None,
        };

        let record = tag_provenance(&mut store, &g, &options).unwrap();

        assert_eq!(record.quads.len(), 2);
        let stamps = store.objects(&g, vocab::pack::TIMESTAMP);
        assert_eq!(stamps.len(), 1);
        assert!(parse_timestamp(&stamps[0]).is_some());
    }

    #[test]
    fn test_literal_target_rejected() {
        let mut store = InMemoryQuadStore::new();
        assert!(tag_provenance(&mut store, &Term::literal("x"), &ProvenanceOptions::default()).is_err());
    }

    #[test]
    fn test_inherits_origin_from_dataset() {
        let g1 = Term::blank("g1");
        let g2 = Term::blank("g2");
        let mut store = InMemoryQuadStore::from_quads(vec![content(&g1), content(&g2)]);
        let wrapped = wrap_as_dataset(&mut store, &[g1.clone(), g2.clone()], None).unwrap();

        let origin = ProvenanceOptions {
            origin: Some(Term::named(X)),
            issuer: None,
        };
        tag_provenance(&mut store, &g1, &origin).unwrap();
        tag_provenance(&mut store, &wrapped.dataset_id, &origin).unwrap();

        let passing = evaluate_provenance(
            &store,
            &[g1.clone(), g2.clone()],
            &ProvenanceRequirements::default().retrieved_from([X]),
        );
        assert_eq!(passing, vec![g1, g2]);
    }

    #[test]
    fn test_own_value_shadows_dataset_value() {
        let g = Term::blank("g");
        let mut store = InMemoryQuadStore::from_quads(vec![content(&g)]);
        let wrapped = wrap_as_dataset(&mut store, &[g.clone()], None).unwrap();
        store.insert(Quad::triple(g.clone(), Term::named(vocab::pack::ORIGIN), Term::named("https://other/")));
        store.insert(Quad::triple(wrapped.dataset_id, Term::named(vocab::pack::ORIGIN), Term::named(X)));

        assert_eq!(resolved_values(&store, &g, vocab::pack::ORIGIN), vec![Term::named("https://other/")]);
    }

    #[test]
    fn test_requirements_narrow_in_sequence() {
        let g1 = Term::blank("g1");
        let g2 = Term::blank("g2");
        let mut store = InMemoryQuadStore::from_quads(vec![content(&g1), content(&g2)]);
        let alice = ProvenanceOptions {
            origin: Some(Term::named(X)),
            issuer: Some(Term::named("https://alice.example.org/#me")),
        };
        let bob = ProvenanceOptions {
            origin: Some(Term::named(X)),
            issuer: Some(Term::named("https://bob.example.org/#me")),
        };
        tag_provenance(&mut store, &g1, &alice).unwrap();
        tag_provenance(&mut store, &g2, &bob).unwrap();

        let requirements = ProvenanceRequirements::default()
            .retrieved_from([X])
            .retrieved_by(["https://alice.example.org/#me"])
            .retrieved_after(Utc::now() - Duration::hours(1));
        assert_eq!(evaluate_provenance(&store, &[g1.clone(), g2.clone()], &requirements), vec![g1.clone()]);

        let future = ProvenanceRequirements::default().retrieved_after(Utc::now() + Duration::hours(1));
        assert!(evaluate_provenance(&store, &[g1, g2], &future).is_empty());
    }
}

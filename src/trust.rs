//! Trust tags recorded during an evaluation session.
//!
//! Tags live in a ledger next to the store rather than in it, so recording
//! them never changes the content that signatures cover. At commit the ledger
//! filters the store down to the graphs holding every required tag.
//!
//! The default graph cannot be signed or tagged. Under a filter it keeps only
//! package metadata such as proofs and dataset lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{QuadPattern, QuadStore};
use crate::types::{vocab, Quad, Term};

/// A validation stage a graph has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustTag {
    /// Covered by a valid signature from a trusted issuer.
    SignatureValidated,
    /// Meets the provenance requirements.
    ProvenanceValidated,
    /// Governed by a policy compliant with the requested purpose.
    PolicyValidated,
}

impl TrustTag {
    /// All tags.
    pub const ALL: [TrustTag; 3] = [
        TrustTag::SignatureValidated,
        TrustTag::ProvenanceValidated,
        TrustTag::PolicyValidated,
    ];

    /// Marker IRI of this tag.
    pub fn iri(&self) -> &'static str {
        match self {
            TrustTag::SignatureValidated => vocab::verify::SIGNATURE_VALIDATED,
            TrustTag::ProvenanceValidated => vocab::verify::PROVENANCE_VALIDATED,
            TrustTag::PolicyValidated => vocab::verify::POLICY_VALIDATED,
        }
    }

    /// Tag named by a marker IRI.
    pub fn from_iri(iri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.iri() == iri)
    }
}

impl std::fmt::Display for TrustTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustTag::SignatureValidated => write!(f, "SignatureValidated"),
            TrustTag::ProvenanceValidated => write!(f, "ProvenanceValidated"),
            TrustTag::PolicyValidated => write!(f, "PolicyValidated"),
        }
    }
}

/// Per-session record of granted and required tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustLedger {
    granted: BTreeMap<Term, BTreeSet<TrustTag>>,
    required: BTreeSet<TrustTag>,
}

impl TrustLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `tag` to `graph`. Returns `false` if already granted.
    pub fn tag(&mut self, graph: &Term, tag: TrustTag) -> bool {
        self.granted.entry(graph.clone()).or_default().insert(tag)
    }

    /// Grant `tag` to every graph in `graphs`.
    pub fn tag_all<'a, I: IntoIterator<Item = &'a Term>>(&mut self, graphs: I, tag: TrustTag) -> usize {
        graphs.into_iter().filter(|g| self.tag(g, tag)).count()
    }

    /// Whether `graph` holds `tag`.
    pub fn has(&self, graph: &Term, tag: TrustTag) -> bool {
        self.granted.get(graph).is_some_and(|tags| tags.contains(&tag))
    }

    /// Tags held by `graph`.
    pub fn tags_of(&self, graph: &Term) -> BTreeSet<TrustTag> {
        self.granted.get(graph).cloned().unwrap_or_default()
    }

    /// Graphs holding `tag`.
    pub fn graphs_with(&self, tag: TrustTag) -> BTreeSet<Term> {
        self.granted
            .iter()
            .filter(|(_, tags)| tags.contains(&tag))
            .map(|(graph, _)| graph.clone())
            .collect()
    }

    /// Make `tag` a condition for surviving the commit filter.
    pub fn require(&mut self, tag: TrustTag) {
        self.required.insert(tag);
    }

    /// Tags a graph must hold to survive the commit filter.
    pub fn required(&self) -> &BTreeSet<TrustTag> {
        &self.required
    }

    /// Whether quads of `graph` survive the commit filter.
    pub fn passes(&self, graph: &Term) -> bool {
        let held = self.granted.get(graph);
        self.required
            .iter()
            .all(|tag| held.is_some_and(|tags| tags.contains(tag)))
    }

    /// Remove every graph failing the commit filter. Returns the removed graphs.
    pub fn apply_filter<S: QuadStore + ?Sized>(&self, store: &mut S) -> Vec<Term> {
        if self.required.is_empty() {
            return Vec::new();
        }

        let rejected: Vec<Term> = store
            .graphs()
            .into_iter()
            .filter(|g| !g.is_default_graph() && !self.passes(g))
            .collect();
        for graph in &rejected {
            store.remove_matching(&QuadPattern::any().graph(graph.clone()));
        }

        let mut untrusted_defaults = 0usize;
        for quad in store.graph_quads(&Term::DefaultGraph) {
            if !is_package_metadata(&quad) && store.remove(&quad) {
                untrusted_defaults += 1;
            }
        }
        if untrusted_defaults > 0 {
            warn!(
                removed = untrusted_defaults,
                "Removed unverifiable statements from the default graph"
            );
        }

        debug!(
            required = ?self.required,
            removed = rejected.len(),
            "Applied trust filter"
        );
        rejected
    }

    /// Granted tags as `(graph, verify:hasTag, tag)` marker quads in `graph`.
    pub fn marker_quads(&self, graph: &Term) -> Vec<Quad> {
        self.granted
            .iter()
            .flat_map(|(subject, tags)| {
                tags.iter().map(move |tag| {
                    Quad::new(
                        subject.clone(),
                        Term::named(vocab::verify::HAS_TAG),
                        Term::named(tag.iri()),
                        graph.clone(),
                    )
                })
            })
            .collect()
    }
}

/// Whether `quad` describes the package rather than its content.
///
/// Covers proof, provenance, policy, stream and trust-marker statements,
/// typing with one of their classes, and list cells.
pub fn is_package_metadata(quad: &Quad) -> bool {
    const NAMESPACES: [&str; 5] = [
        vocab::pack::NAMESPACE,
        vocab::sign::NAMESPACE,
        vocab::odrl::NAMESPACE,
        vocab::verify::NAMESPACE,
        vocab::tree::NAMESPACE,
    ];
    const CLASSES: [&str; 7] = [
        vocab::pack::DATASET,
        vocab::sign::DATA_INTEGRITY_PROOF,
        vocab::odrl::AGREEMENT,
        vocab::odrl::CONSTRAINT_CLASS,
        vocab::ldes::EVENT_STREAM,
        vocab::tree::NODE,
        vocab::tree::RELATION_CLASS,
    ];

    let Term::NamedNode(predicate) = &quad.predicate else {
        return false;
    };
    match predicate.as_str() {
        vocab::rdf::FIRST | vocab::rdf::REST => true,
        vocab::rdf::TYPE => matches!(&quad.object, Term::NamedNode(class) if CLASSES.contains(&class.as_str())),
        iri => NAMESPACES.iter().any(|ns| iri.starts_with(ns)),
    }
}

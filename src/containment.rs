//! Containment classification.
//!
//! Every signing, provenance and policy operation first decides whether its
//! target names a graph, a dataset, or neither. Graphs and datasets are
//! hashed, tagged and verified differently.

use serde::{Deserialize, Serialize};

use crate::store::{QuadPattern, QuadStore};
use crate::types::{vocab, Term};

/// What a term identifies inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainmentType {
    /// Some quad has this term as its graph component.
    Graph,
    /// The term is typed as a package dataset.
    Dataset,
    /// Neither, e.g. a bare remote resource URI.
    Other,
}

impl std::fmt::Display for ContainmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Dataset => write!(f, "dataset"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Classify `term` against the contents of `store`.
///
/// Graph membership takes precedence over a dataset typing.
pub fn classify<S: QuadStore + ?Sized>(store: &S, term: &Term) -> ContainmentType {
    if store.contains_graph(term) {
        return ContainmentType::Graph;
    }
    if is_dataset(store, term) {
        return ContainmentType::Dataset;
    }
    ContainmentType::Other
}

/// Whether `term` is the subject of a `rdf:type pack:Dataset` triple.
pub fn is_dataset<S: QuadStore + ?Sized>(store: &S, term: &Term) -> bool {
    if term.is_literal() || term.is_default_graph() {
        return false;
    }
    !store
        .quads_matching(
            &QuadPattern::any()
                .subject(term.clone())
                .predicate(vocab::rdf::TYPE)
                .object(Term::named(vocab::pack::DATASET)),
        )
        .is_empty()
}

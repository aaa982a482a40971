//! Quad storage backends.

pub mod memory;

use crate::types::{Quad, Term};

/// Error type for store writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A term cannot occupy this quad position.
    #[error("Invalid {position} term: {term}")]
    InvalidTerm {
        /// Quad position (`subject`, `predicate`, `object` or `graph`).
        position: &'static str,
        /// Offending term.
        term: Term,
    },
}

/// Check that every term of `quad` is allowed in its position.
///
/// Variables are never storable; literals only appear as objects.
pub fn validate_quad(quad: &Quad) -> Result<(), StoreError> {
    let invalid = |position: &'static str, term: &Term| StoreError::InvalidTerm {
        position,
        term: term.clone(),
    };

    if !(quad.subject.is_named() || quad.subject.is_blank()) {
        return Err(invalid("subject", &quad.subject));
    }
    if !quad.predicate.is_named() {
        return Err(invalid("predicate", &quad.predicate));
    }
    if quad.object.is_variable() || quad.object.is_default_graph() {
        return Err(invalid("object", &quad.object));
    }
    if quad.graph.is_literal() || quad.graph.is_variable() {
        return Err(invalid("graph", &quad.graph));
    }
    Ok(())
}

/// Pattern over the four quad positions. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadPattern {
    /// Subject constraint.
    pub subject: Option<Term>,
    /// Predicate constraint.
    pub predicate: Option<Term>,
    /// Object constraint.
    pub object: Option<Term>,
    /// Graph constraint.
    pub graph: Option<Term>,
}

impl QuadPattern {
    /// Pattern matching every quad.
    pub fn any() -> Self {
        Self::default()
    }

    /// Constrain the subject.
    pub fn subject(mut self, term: Term) -> Self {
        self.subject = Some(term);
        self
    }

    /// Constrain the predicate to a named node.
    pub fn predicate(mut self, iri: &str) -> Self {
        self.predicate = Some(Term::named(iri));
        self
    }

    /// Constrain the object.
    pub fn object(mut self, term: Term) -> Self {
        self.object = Some(term);
        self
    }

    /// Constrain the graph.
    pub fn graph(mut self, term: Term) -> Self {
        self.graph = Some(term);
        self
    }

    /// Whether a quad satisfies this pattern.
    pub fn matches(&self, quad: &Quad) -> bool {
        fn pos(constraint: &Option<Term>, term: &Term) -> bool {
            constraint.as_ref().map_or(true, |c| c == term)
        }
        pos(&self.subject, &quad.subject)
            && pos(&self.predicate, &quad.predicate)
            && pos(&self.object, &quad.object)
            && pos(&self.graph, &quad.graph)
    }
}

/// Trait for quad storage backends.
///
/// Implementations must return matches in a deterministic order. A store is
/// exclusively owned by the session operating on it, so methods take
/// `&mut self` for writes and need no interior locking.
pub trait QuadStore {
    /// Insert a quad. Returns `false` if it was already present.
    fn insert(&mut self, quad: Quad) -> bool;

    /// Remove a quad. Returns `false` if it was absent.
    fn remove(&mut self, quad: &Quad) -> bool;

    /// All quads matching a pattern.
    fn quads_matching(&self, pattern: &QuadPattern) -> Vec<Quad>;

    /// Every distinct graph identifier present (including the default graph
    /// when it holds quads).
    fn graphs(&self) -> Vec<Term>;

    /// Number of quads.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert many quads.
    fn extend<I: IntoIterator<Item = Quad>>(&mut self, quads: I)
    where
        Self: Sized,
    {
        for quad in quads {
            self.insert(quad);
        }
    }

    /// Validate and insert many quads; nothing is written if any quad is invalid.
    fn try_extend(&mut self, quads: Vec<Quad>) -> Result<usize, StoreError>
    where
        Self: Sized,
    {
        for quad in &quads {
            validate_quad(quad)?;
        }
        Ok(quads.into_iter().filter(|q| self.insert(q.clone())).count())
    }

    /// Every quad in the store.
    fn all_quads(&self) -> Vec<Quad> {
        self.quads_matching(&QuadPattern::any())
    }

    /// Quads whose graph component equals `graph`.
    fn graph_quads(&self, graph: &Term) -> Vec<Quad> {
        self.quads_matching(&QuadPattern::any().graph(graph.clone()))
    }

    /// Whether any quad lives in `graph`.
    fn contains_graph(&self, graph: &Term) -> bool {
        !self.graph_quads(graph).is_empty()
    }

    /// Objects of `(subject, predicate, ?, any graph)`.
    fn objects(&self, subject: &Term, predicate: &str) -> Vec<Term> {
        self.quads_matching(&QuadPattern::any().subject(subject.clone()).predicate(predicate))
            .into_iter()
            .map(|q| q.object)
            .collect()
    }

    /// Subjects of `(?, predicate, object, any graph)`.
    fn subjects(&self, predicate: &str, object: &Term) -> Vec<Term> {
        self.quads_matching(&QuadPattern::any().predicate(predicate).object(object.clone()))
            .into_iter()
            .map(|q| q.subject)
            .collect()
    }

    /// Remove every quad matching a pattern and return them.
    fn remove_matching(&mut self, pattern: &QuadPattern) -> Vec<Quad> {
        let matched = self.quads_matching(pattern);
        for quad in &matched {
            self.remove(quad);
        }
        matched
    }
}

pub use memory::InMemoryQuadStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_literal_subject_and_graph() {
        let p = Term::named("http://example.org/p");
        let bad_subject = Quad::triple(Term::literal("x"), p.clone(), Term::literal("y"));
        let bad_graph = Quad::new(Term::blank("s"), p.clone(), Term::literal("y"), Term::literal("g"));
        let ok = Quad::new(Term::blank("s"), p, Term::literal("y"), Term::blank("g"));

        assert!(matches!(
            validate_quad(&bad_subject),
            Err(StoreError::InvalidTerm { position: "subject", .. })
        ));
        assert!(matches!(
            validate_quad(&bad_graph),
            Err(StoreError::InvalidTerm { position: "graph", .. })
        ));
        assert!(validate_quad(&ok).is_ok());
    }

    #[test]
    fn test_try_extend_writes_nothing_on_error() {
        let mut store = InMemoryQuadStore::new();
        let p = Term::named("http://example.org/p");
        let quads = vec![
            Quad::triple(Term::blank("s"), p.clone(), Term::literal("ok")),
            Quad::triple(Term::blank("s"), Term::variable("v"), Term::literal("bad")),
        ];

        assert!(store.try_extend(quads).is_err());
        assert!(store.is_empty());
    }
}

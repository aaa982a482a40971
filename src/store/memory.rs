//! In-memory quad store.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Quad, Term};
use super::{QuadPattern, QuadStore};

/// In-memory quad store.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryQuadStore {
    /// All quads.
    quads: BTreeSet<Quad>,
    /// Subject -> quads index.
    by_subject: BTreeMap<Term, BTreeSet<Quad>>,
    /// Graph -> quads index.
    by_graph: BTreeMap<Term, BTreeSet<Quad>>,
}

impl InMemoryQuadStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given quads.
    pub fn from_quads<I: IntoIterator<Item = Quad>>(quads: I) -> Self {
        let mut store = Self::new();
        store.extend(quads);
        store
    }

    /// Iterate all quads in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }
}

fn unindex(index: &mut BTreeMap<Term, BTreeSet<Quad>>, key: &Term, quad: &Quad) {
    if let Some(set) = index.get_mut(key) {
        set.remove(quad);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

impl QuadStore for InMemoryQuadStore {
    fn insert(&mut self, quad: Quad) -> bool {
        if self.quads.contains(&quad) {
            return false;
        }
        self.by_subject
            .entry(quad.subject.clone())
            .or_default()
            .insert(quad.clone());
        self.by_graph
            .entry(quad.graph.clone())
            .or_default()
            .insert(quad.clone());
        self.quads.insert(quad)
    }

    fn remove(&mut self, quad: &Quad) -> bool {
        if !self.quads.remove(quad) {
            return false;
        }
        unindex(&mut self.by_subject, &quad.subject, quad);
        unindex(&mut self.by_graph, &quad.graph, quad);
        true
    }

    fn quads_matching(&self, pattern: &QuadPattern) -> Vec<Quad> {
        // Narrow with the most selective index available
        let candidates: Box<dyn Iterator<Item = &Quad>> = match (&pattern.subject, &pattern.graph) {
            (Some(subject), _) => match self.by_subject.get(subject) {
                Some(set) => Box::new(set.iter()),
                None => return Vec::new(),
            },
            (None, Some(graph)) => match self.by_graph.get(graph) {
                Some(set) => Box::new(set.iter()),
                None => return Vec::new(),
            },
            (None, None) => Box::new(self.quads.iter()),
        };

        candidates
            .filter(|q| pattern.matches(q))
            .cloned()
            .collect()
    }

    fn graphs(&self) -> Vec<Term> {
        self.by_graph.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.quads.len()
    }

    fn contains_graph(&self, graph: &Term) -> bool {
        self.by_graph.contains_key(graph)
    }
}

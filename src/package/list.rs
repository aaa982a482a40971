//! Ordered list encoding (`rdf:first` / `rdf:rest` chains).
//!
//! Used for dataset contains-lists and for `and`/`or` constraint groups.
//! Each list node carries exactly one `rdf:first` and one `rdf:rest` edge;
//! the chain ends at `rdf:nil`.

use std::collections::BTreeSet;

use crate::store::QuadStore;
use crate::types::{vocab, Quad, Term};

/// Error type for list decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// A list node has zero or several `rdf:first` edges.
    #[error("Malformed list at {node}: expected exactly one rdf:first, found {found}")]
    MalformedFirst {
        /// Offending list node.
        node: Term,
        /// Number of `rdf:first` edges found.
        found: usize,
    },
    /// A list node has zero or several `rdf:rest` edges.
    #[error("Malformed list at {node}: expected exactly one rdf:rest, found {found}")]
    MalformedRest {
        /// Offending list node.
        node: Term,
        /// Number of `rdf:rest` edges found.
        found: usize,
    },
    /// The chain revisits a node.
    #[error("Cyclic list at {0}")]
    Cycle(Term),
}

/// An encoded list: the head node plus the quads describing the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedList {
    /// First list node, or `rdf:nil` for the empty list.
    pub head: Term,
    /// Chain quads, in the requested graph.
    pub quads: Vec<Quad>,
}

/// The `rdf:nil` terminator.
pub fn nil() -> Term {
    Term::named(vocab::rdf::NIL)
}

/// Encode `items` as a chain of fresh blank nodes in `graph`.
pub fn encode_list(items: &[Term], graph: &Term) -> EncodedList {
    let mut quads = Vec::with_capacity(items.len() * 2);
    let mut rest = nil();

    for item in items.iter().rev() {
        let node = Term::fresh_blank();
        quads.push(Quad::new(node.clone(), Term::named(vocab::rdf::REST), rest, graph.clone()));
        quads.push(Quad::new(node.clone(), Term::named(vocab::rdf::FIRST), item.clone(), graph.clone()));
        rest = node;
    }

    EncodedList { head: rest, quads }
}

/// Decode the list starting at `head`, searching all graphs.
pub fn decode_list<S: QuadStore + ?Sized>(store: &S, head: &Term) -> Result<Vec<Term>, ListError> {
    let terminator = nil();
    let mut items = Vec::new();
    let mut visited = BTreeSet::new();
    let mut node = head.clone();

    while node != terminator {
        if !visited.insert(node.clone()) {
            return Err(ListError::Cycle(node));
        }

        let first = store.objects(&node, vocab::rdf::FIRST);
        if first.len() != 1 {
            return Err(ListError::MalformedFirst { node, found: first.len() });
        }
        let rest = store.objects(&node, vocab::rdf::REST);
        if rest.len() != 1 {
            return Err(ListError::MalformedRest { node, found: rest.len() });
        }

        items.extend(first);
        node = rest.into_iter().next().unwrap_or_else(nil);
    }

    Ok(items)
}

/// Whether `term` looks like a list node (or the empty list).
pub fn is_list_node<S: QuadStore + ?Sized>(store: &S, term: &Term) -> bool {
    *term == nil() || !store.objects(term, vocab::rdf::FIRST).is_empty()
}

/// Heads of every list that contains `item`, found by walking `rdf:rest`
/// edges backwards from the node holding it.
pub fn list_heads_containing<S: QuadStore + ?Sized>(store: &S, item: &Term) -> Vec<Term> {
    let mut heads = BTreeSet::new();

    for start in store.subjects(vocab::rdf::FIRST, item) {
        let mut visited = BTreeSet::new();
        let mut frontier = vec![start];

        while let Some(node) = frontier.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            let predecessors = store.subjects(vocab::rdf::REST, &node);
            if predecessors.is_empty() {
                heads.insert(node);
            } else {
                frontier.extend(predecessors);
            }
        }
    }

    heads.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQuadStore;

    fn items() -> Vec<Term> {
        vec![Term::blank("g1"), Term::blank("g2"), Term::blank("g3")]
    }

    #[test]
    fn test_encode_decode_preserves_order() {
        let encoded = encode_list(&items(), &Term::DefaultGraph);
        let store = InMemoryQuadStore::from_quads(encoded.quads);

        assert_eq!(decode_list(&store, &encoded.head).unwrap(), items());
    }

    #[test]
    fn test_empty_list_is_nil() {
        let encoded = encode_list(&[], &Term::DefaultGraph);
        assert_eq!(encoded.head, nil());
        assert!(encoded.quads.is_empty());

        let store = InMemoryQuadStore::new();
        assert!(decode_list(&store, &encoded.head).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_first_is_malformed() {
        let encoded = encode_list(&items(), &Term::DefaultGraph);
        let mut store = InMemoryQuadStore::from_quads(encoded.quads);
        store.insert(Quad::triple(
            encoded.head.clone(),
            Term::named(vocab::rdf::FIRST),
            Term::blank("intruder"),
        ));

        match decode_list(&store, &encoded.head) {
            Err(ListError::MalformedFirst { found, .. }) => assert_eq!(found, 2),
            other => panic!("Expected MalformedFirst, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_rest_is_malformed() {
        let node = Term::blank("n");
        let store = InMemoryQuadStore::from_quads(vec![Quad::triple(
            node.clone(),
            Term::named(vocab::rdf::FIRST),
            Term::blank("x"),
        )]);

        assert!(matches!(
            decode_list(&store, &node),
            Err(ListError::MalformedRest { found: 0, .. })
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let a = Term::blank("a");
        let store = InMemoryQuadStore::from_quads(vec![
            Quad::triple(a.clone(), Term::named(vocab::rdf::FIRST), Term::blank("x")),
            Quad::triple(a.clone(), Term::named(vocab::rdf::REST), a.clone()),
        ]);

        assert!(matches!(decode_list(&store, &a), Err(ListError::Cycle(_))));
    }

    #[test]
    fn test_backward_walk_finds_head() {
        let encoded = encode_list(&items(), &Term::DefaultGraph);
        let store = InMemoryQuadStore::from_quads(encoded.quads);

        let heads = list_heads_containing(&store, &Term::blank("g3"));
        assert_eq!(heads, vec![encoded.head]);
    }
}

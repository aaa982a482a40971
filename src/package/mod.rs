//! Graph isolation and dataset containment.
//!
//! Independently retrieved documents are merged into one store by moving
//! each of their graphs to a fresh identifier. A dataset is a subject typed
//! `pack:Dataset` whose `pack:contains` edge points at an ordered list of
//! member graph identifiers.
//!
//! ## Invariants
//!
//! - The default graph never appears in a contains-list; it must first be
//!   isolated into a fresh graph identifier.
//! - Renaming a graph rewrites it in graph, subject and object position, so
//!   contains-lists and signature targets that reference it stay valid.
//! - Validation happens before any write: a failed call leaves the store
//!   untouched.

pub mod list;

use std::collections::{BTreeMap, BTreeSet};

use crate::containment::is_dataset;
use crate::store::{InMemoryQuadStore, QuadPattern, QuadStore};
use crate::types::{vocab, Quad, Term};

pub use list::{decode_list, encode_list, EncodedList, ListError};

/// Error type for packaging operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackageError {
    /// The default graph was referenced where a graph identifier is required.
    #[error("Cannot reference the default graph in local scope; isolate it into a fresh graph first")]
    DefaultGraphReference,
    /// The term cannot name a graph.
    #[error("Invalid graph identifier {0}: graphs are named by IRIs or blank nodes")]
    InvalidGraphTerm(Term),
    /// The term is not typed as a dataset.
    #[error("Incorrect dataset reference: {0} is not a dataset in this store")]
    NotADataset(Term),
    /// A contains-list could not be decoded.
    #[error("Malformed contains-list: {0}")]
    List(#[from] ListError),
}

/// Result of wrapping graphs into a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedDataset {
    /// The new dataset subject.
    pub dataset_id: Term,
    /// Graph holding the dataset description.
    pub containing_graph: Term,
}

/// An external document relabelled for merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDocument {
    /// Relabelled quads, ready to be added to a shared store.
    pub quads: Vec<Quad>,
    /// Fresh identifier the document's default graph was moved to, if it had one.
    pub default_graph: Option<Term>,
    /// Every graph identifier of the relabelled document.
    pub graphs: Vec<Term>,
}

fn check_graph_term(term: &Term) -> Result<(), PackageError> {
    match term {
        Term::NamedNode(_) | Term::BlankNode(_) => Ok(()),
        Term::DefaultGraph => Err(PackageError::DefaultGraphReference),
        other => Err(PackageError::InvalidGraphTerm(other.clone())),
    }
}

/// Move every quad of `graph` into a fresh blank graph and return its id.
///
/// This is the only way to make default-graph content addressable.
pub fn isolate_graph<S: QuadStore + ?Sized>(store: &mut S, graph: &Term) -> Term {
    let fresh = Term::fresh_blank();
    for quad in store.remove_matching(&QuadPattern::any().graph(graph.clone())) {
        store.insert(quad.in_graph(&fresh));
    }
    fresh
}

/// Rename `source` to `target` (fresh blank node if `None`) wherever it
/// occurs as graph, object or subject.
///
/// With `retain_original` the original quads are kept next to the renamed ones.
pub fn rename_graph<S: QuadStore + ?Sized>(
    store: &mut S,
    source: &Term,
    target: Option<Term>,
    retain_original: bool,
) -> Result<Term, PackageError> {
    let target = target.unwrap_or_else(Term::fresh_blank);
    check_graph_term(&target)?;
    if source.is_literal() || source.is_variable() {
        return Err(PackageError::InvalidGraphTerm(source.clone()));
    }
    if *source == target {
        return Ok(target);
    }

    // Graph position
    for quad in store.quads_matching(&QuadPattern::any().graph(source.clone())) {
        store.insert(quad.in_graph(&target));
        if !retain_original {
            store.remove(&quad);
        }
    }

    // Object position
    for quad in store.quads_matching(&QuadPattern::any().object(source.clone())) {
        store.insert(Quad::new(
            quad.subject.clone(),
            quad.predicate.clone(),
            target.clone(),
            quad.graph.clone(),
        ));
        if !retain_original {
            store.remove(&quad);
        }
    }

    // Subject position
    for quad in store.quads_matching(&QuadPattern::any().subject(source.clone())) {
        store.insert(Quad::new(
            target.clone(),
            quad.predicate.clone(),
            quad.object.clone(),
            quad.graph.clone(),
        ));
        if !retain_original {
            store.remove(&quad);
        }
    }

    Ok(target)
}

/// Rename every graph in the store, by default to fresh blank nodes.
///
/// Returns the identifier the default graph was moved to, if it held quads.
pub fn rename_all_graphs<S: QuadStore + ?Sized>(
    store: &mut S,
    strategy: Option<&dyn Fn(&Term) -> Term>,
) -> Result<Option<Term>, PackageError> {
    let mut new_default = None;

    for graph in store.graphs() {
        let target = match strategy {
            Some(f) => f(&graph),
            None => Term::fresh_blank(),
        };
        let renamed = rename_graph(store, &graph, Some(target), false)?;
        if graph.is_default_graph() {
            new_default = Some(renamed);
        }
    }

    Ok(new_default)
}

/// Give every blank node in `quads` a fresh label, consistently within the batch.
///
/// Named graphs and the default graph keep their identifiers.
pub fn relabel_blank_nodes(quads: Vec<Quad>) -> Vec<Quad> {
    let mut labels: BTreeMap<Term, Term> = BTreeMap::new();
    let mut relabel = |term: Term| -> Term {
        if term.is_blank() {
            labels.entry(term).or_insert_with(Term::fresh_blank).clone()
        } else {
            term
        }
    };

    quads
        .into_iter()
        .map(|quad| {
            Quad::new(
                relabel(quad.subject),
                quad.predicate,
                relabel(quad.object),
                relabel(quad.graph),
            )
        })
        .collect()
}

/// Relabel an external document so it can be merged without collisions.
///
/// Every blank node gets a fresh label and every graph, the default graph
/// included, is renamed to a fresh blank graph.
pub fn import_document(quads: Vec<Quad>) -> Result<ImportedDocument, PackageError> {
    let mut store = InMemoryQuadStore::from_quads(relabel_blank_nodes(quads));
    let default_graph = rename_all_graphs(&mut store, None)?;
    let graphs = store.graphs();

    Ok(ImportedDocument {
        quads: store.all_quads(),
        default_graph,
        graphs,
    })
}

/// Build the quads describing a dataset over `graphs`, without writing them.
pub fn dataset_quads(
    graphs: &[Term],
    metadata_graph: Option<&Term>,
) -> Result<(Term, Term, Vec<Quad>), PackageError> {
    for graph in graphs {
        check_graph_term(graph)?;
    }

    let dataset_id = Term::fresh_blank();
    let containing_graph = metadata_graph.cloned().unwrap_or(Term::DefaultGraph);
    let encoded = encode_list(graphs, &containing_graph);

    let mut quads = vec![
        Quad::new(
            dataset_id.clone(),
            Term::named(vocab::rdf::TYPE),
            Term::named(vocab::pack::DATASET),
            containing_graph.clone(),
        ),
        Quad::new(
            dataset_id.clone(),
            Term::named(vocab::pack::CONTAINS),
            encoded.head,
            containing_graph.clone(),
        ),
    ];
    quads.extend(encoded.quads);

    Ok((dataset_id, containing_graph, quads))
}

/// Wrap `graphs` into a new dataset described in `metadata_graph` (or the
/// default graph).
pub fn wrap_as_dataset<S: QuadStore + ?Sized>(
    store: &mut S,
    graphs: &[Term],
    metadata_graph: Option<&Term>,
) -> Result<WrappedDataset, PackageError> {
    let (dataset_id, containing_graph, quads) = dataset_quads(graphs, metadata_graph)?;
    for quad in quads {
        store.insert(quad);
    }
    Ok(WrappedDataset {
        dataset_id,
        containing_graph,
    })
}

/// Member graphs of `dataset`, in contains-list order.
///
/// Plain `pack:contains` edges pointing directly at a graph are accepted too.
pub fn package_content_ids<S: QuadStore + ?Sized>(
    store: &S,
    dataset: &Term,
) -> Result<Vec<Term>, PackageError> {
    if !is_dataset(store, dataset) {
        return Err(PackageError::NotADataset(dataset.clone()));
    }

    let mut seen = BTreeSet::new();
    let mut members = Vec::new();
    for object in store.objects(dataset, vocab::pack::CONTAINS) {
        let items = if list::is_list_node(store, &object) {
            decode_list(store, &object)?
        } else {
            vec![object]
        };
        for item in items {
            if seen.insert(item.clone()) {
                members.push(item);
            }
        }
    }

    Ok(members)
}

/// Datasets whose contains-list includes `graph`.
pub fn containing_datasets<S: QuadStore + ?Sized>(store: &S, graph: &Term) -> Vec<Term> {
    let mut datasets: BTreeSet<Term> = store
        .subjects(vocab::pack::CONTAINS, graph)
        .into_iter()
        .collect();

    for head in list::list_heads_containing(store, graph) {
        datasets.extend(store.subjects(vocab::pack::CONTAINS, &head));
    }

    datasets.into_iter().collect()
}

/// Union of the quads of every member graph of `dataset`.
pub fn dataset_content<S: QuadStore + ?Sized>(
    store: &S,
    dataset: &Term,
) -> Result<Vec<Quad>, PackageError> {
    let mut quads = Vec::new();
    for member in package_content_ids(store, dataset)? {
        quads.extend(store.graph_quads(&member));
    }
    Ok(quads)
}

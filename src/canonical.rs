//! Canonical serialization of quads for deterministic hashing.
//!
//! Blank node labels are store-local, so the bytes that get signed must not
//! depend on them. Canonical labels `_:c14n0`, `_:c14n1`, ... are assigned in
//! three steps:
//!
//! 1. Each blank node is coloured by an xxh64 hash of its first-degree quads
//! 2. Colours are refined with the colours of neighbouring blank nodes until
//!    the partition stops splitting
//! 3. Remaining ties are broken by individualizing each candidate in turn and
//!    keeping the branch with the smallest output; candidates exchanged by a
//!    graph automorphism are explored once
//!
//! ## Determinism Guarantees
//!
//! - Isomorphic quad sets → identical bytes
//! - Duplicate quads collapse to one line
//! - Line order is lexicographic

use std::collections::{BTreeMap, BTreeSet};

use xxhash_rust::xxh64::xxh64;

use crate::types::{Quad, Term};

/// Identifier recorded as `canonicalizationMethod` for RDF content.
pub const C14N: &str = "c14n";

/// Seed separating individualized colours from refined ones.
const INDIVIDUALIZE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

type Colours<'a> = BTreeMap<&'a Term, u64>;
type Mentions<'a> = BTreeMap<&'a Term, Vec<&'a Quad>>;

/// Canonical N-Quads bytes of `quads`.
pub fn canonicalize(quads: &[Quad]) -> Vec<u8> {
    let distinct: BTreeSet<Quad> = quads.iter().cloned().collect();
    let mut mentions: Mentions<'_> = BTreeMap::new();
    for quad in &distinct {
        for blank in blank_nodes(quad) {
            mentions.entry(blank).or_default().push(quad);
        }
    }

    if mentions.is_empty() {
        return render(&distinct, &BTreeMap::new());
    }

    let colours: Colours<'_> = mentions
        .iter()
        .map(|(blank, qs)| (*blank, first_degree_hash(blank, qs)))
        .collect();
    search(&distinct, &mentions, colours).0
}

/// Canonical bytes of the triples of `quads`, ignoring graph membership.
pub fn canonicalize_triples(quads: &[Quad]) -> Vec<u8> {
    let triples: Vec<Quad> = quads.iter().map(|q| q.in_graph(&Term::DefaultGraph)).collect();
    canonicalize(&triples)
}

/// Compute the canonical hash of `quads` as hex (xxh64, not cryptographic).
pub fn canonical_hash_hex(quads: &[Quad]) -> String {
    format!("{:016x}", xxh64(&canonicalize(quads), 0))
}

fn blank_nodes(quad: &Quad) -> impl Iterator<Item = &Term> {
    [&quad.subject, &quad.predicate, &quad.object, &quad.graph]
        .into_iter()
        .filter(|t| t.is_blank())
}

fn first_degree_hash(focus: &Term, quads: &[&Quad]) -> u64 {
    neighbourhood_hash(focus, quads, |_| 0, 0)
}

/// Hash of `focus`'s quads with `focus` masked as `_:a` and every other blank
/// node masked by its colour, prefixed with `own`.
fn neighbourhood_hash(
    focus: &Term,
    quads: &[&Quad],
    colour_of: impl Fn(&Term) -> u64,
    own: u64,
) -> u64 {
    let mask = |term: &Term| -> Term {
        if term == focus {
            Term::blank("a")
        } else if term.is_blank() {
            Term::blank(format!("h{:016x}", colour_of(term)))
        } else {
            term.clone()
        }
    };

    let mut lines: Vec<String> = quads
        .iter()
        .map(|q| {
            Quad::new(mask(&q.subject), mask(&q.predicate), mask(&q.object), mask(&q.graph))
                .to_nquads()
        })
        .collect();
    lines.sort();
    lines.dedup();

    let mut input = format!("{:016x}\n", own);
    input.push_str(&lines.join("\n"));
    xxh64(input.as_bytes(), 0)
}

fn class_count(colours: &Colours<'_>) -> usize {
    colours.values().collect::<BTreeSet<_>>().len()
}

fn refine<'a>(mentions: &Mentions<'a>, mut colours: Colours<'a>) -> Colours<'a> {
    let mut classes = class_count(&colours);
    loop {
        let next: Colours<'a> = mentions
            .iter()
            .map(|(blank, qs)| {
                let own = colours.get(blank).copied().unwrap_or_default();
                let hash = neighbourhood_hash(
                    blank,
                    qs,
                    |t| colours.get(t).copied().unwrap_or_default(),
                    own,
                );
                (*blank, hash)
            })
            .collect();
        let next_classes = class_count(&next);
        if next_classes <= classes {
            return colours;
        }
        classes = next_classes;
        colours = next;
    }
}

/// The first colour class, in colour order, with more than one member.
fn first_tie<'a>(colours: &Colours<'a>) -> Option<Vec<&'a Term>> {
    let mut classes: BTreeMap<u64, Vec<&'a Term>> = BTreeMap::new();
    for (blank, colour) in colours {
        classes.entry(*colour).or_default().push(*blank);
    }
    classes.into_values().find(|members| members.len() > 1)
}

/// Whether exchanging `a` and `b` maps `quads` onto itself.
fn swap_is_automorphism(quads: &BTreeSet<Quad>, a: &Term, b: &Term) -> bool {
    let swap = |term: &Term| -> Term {
        if term == a {
            b.clone()
        } else if term == b {
            a.clone()
        } else {
            term.clone()
        }
    };
    quads.iter().all(|q| {
        quads.contains(&Quad::new(
            swap(&q.subject),
            swap(&q.predicate),
            swap(&q.object),
            swap(&q.graph),
        ))
    })
}

fn labels_by_colour(colours: &Colours<'_>) -> BTreeMap<Term, String> {
    let mut ordered: Vec<(u64, &Term)> = colours.iter().map(|(t, c)| (*c, *t)).collect();
    ordered.sort();
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, blank))| (blank.clone(), format!("c14n{}", i)))
        .collect()
}

fn search<'a>(
    quads: &BTreeSet<Quad>,
    mentions: &Mentions<'a>,
    colours: Colours<'a>,
) -> (Vec<u8>, BTreeMap<Term, String>) {
    let colours = refine(mentions, colours);
    let Some(tied) = first_tie(&colours) else {
        let labels = labels_by_colour(&colours);
        return (render(quads, &labels), labels);
    };

    let mut best: Option<(Vec<u8>, BTreeMap<Term, String>)> = None;
    let mut explored: Vec<&Term> = Vec::new();
    for candidate in tied {
        if explored.iter().any(|seen| swap_is_automorphism(quads, seen, candidate)) {
            continue;
        }
        explored.push(candidate);

        let mut branch = colours.clone();
        if let Some(colour) = branch.get_mut(candidate) {
            *colour = xxh64(&colour.to_le_bytes(), INDIVIDUALIZE_SEED);
        }
        let result = search(quads, mentions, branch);
        if best.as_ref().map_or(true, |(bytes, _)| result.0 < *bytes) {
            best = Some(result);
        }
    }

    best.unwrap_or_else(|| {
        let labels = labels_by_colour(&colours);
        (render(quads, &labels), labels)
    })
}

fn render(quads: &BTreeSet<Quad>, labels: &BTreeMap<Term, String>) -> Vec<u8> {
    let relabel = |term: &Term| -> Term {
        match labels.get(term) {
            Some(label) => Term::blank(label.clone()),
            None => term.clone(),
        }
    };

    let lines: BTreeSet<String> = quads
        .iter()
        .map(|q| {
            Quad::new(
                relabel(&q.subject),
                relabel(&q.predicate),
                relabel(&q.object),
                relabel(&q.graph),
            )
            .to_nquads()
        })
        .collect();

    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(subject: &str, graph: &str) -> Vec<Quad> {
        vec![
            Quad::new(
                Term::blank(subject),
                Term::named("http://xmlns.com/foaf/0.1/name"),
                Term::literal("Jos"),
                Term::blank(graph),
            ),
            Quad::new(
                Term::blank(subject),
                Term::named("http://xmlns.com/foaf/0.1/homepage"),
                Term::named("https://josd.github.io/"),
                Term::blank(graph),
            ),
        ]
    }

    #[test]
    fn test_determinism() {
        let quads = doc("me", "g");
        assert_eq!(canonicalize(&quads), canonicalize(&quads));
    }

    #[test]
    fn test_independent_of_blank_labels() {
        assert_eq!(canonicalize(&doc("me", "g")), canonicalize(&doc("x9", "other")));
    }

    #[test]
    fn test_independent_of_input_order() {
        let mut reversed = doc("me", "g");
        reversed.reverse();
        assert_eq!(canonicalize(&doc("me", "g")), canonicalize(&reversed));
    }

    #[test]
    fn test_content_change_changes_bytes() {
        let mut changed = doc("me", "g");
        changed[0].object = Term::literal("Jos DR");
        assert_ne!(canonicalize(&doc("me", "g")), canonicalize(&changed));
    }

    /// `_:x p _:y . _:z p _:w . _:y q "1" . _:w q "2"`, labels supplied.
    fn chained(x: &str, y: &str, z: &str, w: &str) -> Vec<Quad> {
        let p = Term::named("https://example.org/p");
        let q = Term::named("https://example.org/q");
        vec![
            Quad::triple(Term::blank(x), p.clone(), Term::blank(y)),
            Quad::triple(Term::blank(z), p, Term::blank(w)),
            Quad::triple(Term::blank(y), q.clone(), Term::literal("1")),
            Quad::triple(Term::blank(w), q, Term::literal("2")),
        ]
    }

    #[test]
    fn test_equal_first_degree_nodes_resolved_by_neighbours() {
        let a = canonicalize_triples(&chained("a", "c", "b", "d"));
        let b = canonicalize_triples(&chained("b", "d", "a", "c"));
        assert_eq!(a, b);

        let text = String::from_utf8(a).unwrap();
        assert!(text.contains("_:c14n"));
        assert!(!text.contains("_:a "));
    }

    #[test]
    fn test_symmetric_cycle_independent_of_labels() {
        let p = Term::named("https://example.org/p");
        let ring = |labels: [&str; 4]| -> Vec<Quad> {
            (0..4)
                .map(|i| {
                    Quad::triple(
                        Term::blank(labels[i]),
                        p.clone(),
                        Term::blank(labels[(i + 1) % 4]),
                    )
                })
                .collect()
        };

        let first = canonicalize_triples(&ring(["n1", "n2", "n3", "n4"]));
        let second = canonicalize_triples(&ring(["zz", "b", "m", "a"]));
        assert_eq!(first, second);
        assert_eq!(String::from_utf8(first).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_interchangeable_nodes_stay_distinct() {
        let p = Term::named("https://example.org/p");
        let copies = |labels: &[&str]| -> Vec<Quad> {
            labels
                .iter()
                .map(|l| Quad::triple(Term::blank(*l), p.clone(), Term::literal("same")))
                .collect()
        };

        let bytes = canonicalize_triples(&copies(&["a", "b", "c", "d", "e", "f"]));
        assert_eq!(bytes, canonicalize_triples(&copies(&["u", "v", "w", "x", "y", "z"])));
        assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 6);
    }

    #[test]
    fn test_triples_ignore_graph() {
        let a = doc("me", "g1");
        let b: Vec<Quad> = a.iter().map(|q| q.in_graph(&Term::named("http://g"))).collect();
        assert_eq!(canonicalize_triples(&a), canonicalize_triples(&b));
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }
}

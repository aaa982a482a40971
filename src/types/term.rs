//! RDF terms and quads.
//!
//! Terms and quads derive `Ord` so that every store iterates them in a
//! deterministic order. Blank node labels are store-scoped: two documents
//! using `_:b0` refer to different nodes until one of them is relabelled
//! (see [`crate::package::import_document`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A literal value with an optional datatype or language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// Lexical form.
    pub value: String,
    /// Datatype IRI (absent for plain and language-tagged literals).
    pub datatype: Option<String>,
    /// Language tag.
    pub language: Option<String>,
}

impl Literal {
    /// Create a plain literal.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a typed literal.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged literal.
    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }
}

/// An RDF term in any quad position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// IRI reference.
    NamedNode(String),
    /// Store-scoped blank node.
    BlankNode(String),
    /// Literal value.
    Literal(Literal),
    /// Query variable. Never a valid signature target.
    Variable(String),
    /// The unlabelled default graph.
    DefaultGraph,
}

impl Term {
    /// Create a named node.
    pub fn named(iri: impl Into<String>) -> Self {
        Self::NamedNode(iri.into())
    }

    /// Create a blank node with an explicit label.
    pub fn blank(label: impl Into<String>) -> Self {
        Self::BlankNode(label.into())
    }

    /// Mint a blank node that cannot collide with any existing label.
    pub fn fresh_blank() -> Self {
        Self::BlankNode(format!("b{}", Uuid::new_v4().simple()))
    }

    /// Create a plain literal.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(value))
    }

    /// Create a typed literal.
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal::typed(value, datatype))
    }

    /// Create a variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Whether this is the default graph.
    pub fn is_default_graph(&self) -> bool {
        matches!(self, Self::DefaultGraph)
    }

    /// Whether this is a blank node.
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::BlankNode(_))
    }

    /// Whether this is a named node.
    pub fn is_named(&self) -> bool {
        matches!(self, Self::NamedNode(_))
    }

    /// Whether this is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Whether this is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// The IRI of a named node.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::NamedNode(iri) => Some(iri),
            _ => None,
        }
    }

    /// The textual value of the term (IRI, label, lexical form or name).
    pub fn value(&self) -> &str {
        match self {
            Self::NamedNode(iri) => iri,
            Self::BlankNode(label) => label,
            Self::Literal(lit) => &lit.value,
            Self::Variable(name) => name,
            Self::DefaultGraph => "",
        }
    }

    /// Render the term in N-Quads syntax.
    ///
    /// The default graph renders as the empty string.
    pub fn to_nquads(&self) -> String {
        match self {
            Self::NamedNode(iri) => format!("<{}>", iri),
            Self::BlankNode(label) => format!("_:{}", label),
            Self::Literal(lit) => {
                let escaped = escape_literal(&lit.value);
                match (&lit.language, &lit.datatype) {
                    (Some(lang), _) => format!("\"{}\"@{}", escaped, lang),
                    (None, Some(dt)) => format!("\"{}\"^^<{}>", escaped, dt),
                    (None, None) => format!("\"{}\"", escaped),
                }
            }
            Self::Variable(name) => format!("?{}", name),
            Self::DefaultGraph => String::new(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultGraph => write!(f, "<default graph>"),
            other => write!(f, "{}", other.to_nquads()),
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// An RDF statement in a named graph.
///
/// Ordering is (subject, predicate, object, graph).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad {
    /// Subject.
    pub subject: Term,
    /// Predicate.
    pub predicate: Term,
    /// Object.
    pub object: Term,
    /// Graph the statement belongs to.
    pub graph: Term,
}

impl Quad {
    /// Create a new quad.
    pub fn new(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph,
        }
    }

    /// Create a quad in the default graph.
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Self::new(subject, predicate, object, Term::DefaultGraph)
    }

    /// Copy this quad into another graph.
    pub fn in_graph(&self, graph: &Term) -> Self {
        Self::new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
            graph.clone(),
        )
    }

    /// Render the quad as one N-Quads line (without trailing newline).
    pub fn to_nquads(&self) -> String {
        if self.graph.is_default_graph() {
            format!(
                "{} {} {} .",
                self.subject.to_nquads(),
                self.predicate.to_nquads(),
                self.object.to_nquads()
            )
        } else {
            format!(
                "{} {} {} {} .",
                self.subject.to_nquads(),
                self.predicate.to_nquads(),
                self.object.to_nquads(),
                self.graph.to_nquads()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_blank_nodes_are_distinct() {
        let a = Term::fresh_blank();
        let b = Term::fresh_blank();
        assert!(a.is_blank());
        assert_ne!(a, b);
    }

    #[test]
    fn test_nquads_rendering() {
        let quad = Quad::new(
            Term::named("http://example.org/s"),
            Term::named("http://example.org/p"),
            Term::literal("say \"hi\""),
            Term::blank("g1"),
        );
        assert_eq!(
            quad.to_nquads(),
            "<http://example.org/s> <http://example.org/p> \"say \\\"hi\\\"\" _:g1 ."
        );
    }

    #[test]
    fn test_default_graph_line_has_three_terms() {
        let quad = Quad::triple(
            Term::blank("a"),
            Term::named("http://example.org/p"),
            Term::typed_literal("1", "http://www.w3.org/2001/XMLSchema#integer"),
        );
        assert_eq!(
            quad.to_nquads(),
            "_:a <http://example.org/p> \"1\"^^<http://www.w3.org/2001/XMLSchema#integer> ."
        );
    }

    #[test]
    fn test_term_ordering_is_total() {
        let mut terms = vec![
            Term::DefaultGraph,
            Term::literal("x"),
            Term::blank("b"),
            Term::named("http://a"),
        ];
        terms.sort();
        assert_eq!(terms[0], Term::named("http://a"));
        assert_eq!(terms[3], Term::DefaultGraph);
    }
}

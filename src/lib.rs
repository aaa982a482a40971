//! # containment-kernel
//!
//! Signed, provenance-tracked, policy-governed packaging of RDF named graphs.
//!
//! The kernel answers one question:
//!
//! > Given a merged store of packaged graphs, which of them may be **trusted**?
//!
//! ## Core Contract
//!
//! 1. Independently retrieved documents are isolated into fresh graph identifiers
//! 2. Graphs are grouped into datasets, which may nest
//! 3. Graphs and datasets carry signatures, provenance and usage policies
//! 4. Verification tags the graphs that pass each check and filters out the rest
//!
//! ## Architecture
//!
//! ```text
//! Builder:   load → isolate → sign / provenance / policy → dataset → sign → commit
//!                                      ↓
//!                               QuadStore (Memory)
//!                                      ↓
//! Evaluator: load → signatures → policies → provenance → trust filter → commit
//!
//! Stream:    member → contents / provenance / policy / sign → page of datasets
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same graph content → identical canonical bytes, whatever the blank node labels
//! - Provenance of a dataset applies to every graph it contains, transitively
//! - Constraint evaluation fails closed: malformed or unsupported means `false`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod store;
pub mod containment;
pub mod package;
pub mod canonical;
pub mod remote;
pub mod signature;
pub mod provenance;
pub mod policy;
pub mod trust;
pub mod session;
pub mod config;
pub mod telemetry;

// Re-exports
pub use types::{vocab, Literal, Quad, Term};
pub use store::{InMemoryQuadStore, QuadPattern, QuadStore, StoreError};
pub use containment::{classify, is_dataset, ContainmentType};
pub use package::{
    containing_datasets, import_document, isolate_graph, package_content_ids, rename_graph,
    wrap_as_dataset, ImportedDocument, PackageError, WrappedDataset,
};
pub use canonical::{canonical_hash_hex, canonicalize, canonicalize_triples};
pub use remote::{FetchError, ResourceFetcher, StaticFetcher};
pub use signature::{
    create_signature, verify_all_signatures, verify_signature, CachedKeyResolver, Ed25519Signer,
    HmacSha256Key, KeyResolver, SignatureError, SignatureOptions, SignatureProof,
    StaticKeyResolver, VerificationResult,
};
pub use provenance::{evaluate_provenance, tag_provenance, ProvenanceOptions, ProvenanceRequirements};
pub use policy::{create_simple_policy, evaluate_policies, Constraint, SimplePolicyOptions};
pub use trust::{TrustLedger, TrustTag};
pub use session::{
    Builder, EvaluationOutcome, Evaluator, EventStreamPage, PolicyOptions, SessionError,
    SessionState, StreamBuilder,
};
pub use config::{LogFormat, PipelineConfig};

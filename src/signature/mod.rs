//! Integrity proofs over graphs, datasets and remote resources.
//!
//! ## What gets signed
//!
//! | Target | Signed bytes |
//! |--------|--------------|
//! | Local graph | canonical triples of the graph (graph component dropped) |
//! | Local dataset | canonical quads of every member graph |
//! | Remote RDF resource | canonical quads of the target inside the fetched document |
//! | Remote opaque resource | raw response body |
//!
//! The SHA-512 digest of those bytes is what the key signs. Signing the graph's
//! triples rather than its quads keeps a graph proof valid after the graph is
//! renamed during import.
//!
//! ## Failure Model
//!
//! - A mismatching signature is `result: false`, never an error
//! - A literal, variable or unresolvable blank target is a [`SignatureError`]
//! - Signing wrapped in [`try_create_signature`] never fails: a timeout or
//!   error yields `None` and is logged

pub mod keys;
pub mod proof;
mod sign;
mod verify;

use std::sync::Arc;
use std::time::Duration;

use crate::package::PackageError;
use crate::remote::FetchError;
use crate::types::Term;

pub use keys::{
    CacheConfig, CacheStats, CachedKeyResolver, Ed25519Signer, Ed25519VerificationKey, HmacSha256Key,
    KeyError, KeyResolver, SigningKeyMaterial, StaticKeyResolver, VerificationKey,
};
pub use proof::{SignatureProof, VerificationResult};
pub use sign::{
    create_dataset_signature, create_graph_signature, create_remote_bytes_signature,
    create_remote_rdf_signature, create_remote_signature, create_signature, try_create_signature,
};
pub use verify::{verify_all_signatures, verify_signature};

/// Digest algorithm recorded in every proof.
pub const HASH_METHOD: &str = "SHA-512";

/// Proof purpose recorded in every proof.
pub const PROOF_PURPOSE: &str = "assertionMethod";

/// Default bound on a single signing attempt.
pub const DEFAULT_SIGNATURE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Error type for signing and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Literals and variables cannot be signature targets.
    #[error("Signature targets must be blank nodes or named nodes, got {0}")]
    InvalidTarget(Term),
    /// The default graph must be isolated before it can be signed.
    #[error("Invalid signature target: cannot sign the default graph")]
    DefaultGraphTarget,
    /// A blank target that is neither a local graph nor a local dataset.
    #[error("Signature target {0} is neither a graph nor a dataset in this store")]
    UnresolvableTarget(Term),
    /// A named target with no local structure and no fetcher to retrieve it.
    #[error("No resource fetcher available to retrieve {0}")]
    NoFetcher(String),
    /// The proof quads are incomplete or ambiguous.
    #[error("Malformed proof {proof}: {reason}")]
    MalformedProof {
        /// Proof subject.
        proof: Term,
        /// What is wrong.
        reason: String,
    },
    /// Signing did not finish in time.
    #[error("Signature creation for {target} timed out after {timeout:?}")]
    Timeout {
        /// Target being signed.
        target: Term,
        /// Bound that expired.
        timeout: Duration,
    },
    /// Dataset membership could not be read.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// Remote retrieval failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Key handling failed.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Who signs, and with which key.
#[derive(Clone)]
pub struct SignatureOptions {
    /// Private key handle.
    pub key: Arc<dyn SigningKeyMaterial>,
    /// Issuer recorded in proofs.
    pub issuer: Term,
    /// URI under which the matching public key is published.
    pub verification_method: String,
}

impl SignatureOptions {
    /// Create options for `issuer` signing with `key`.
    pub fn new(
        key: impl SigningKeyMaterial + 'static,
        issuer: impl Into<String>,
        verification_method: impl Into<String>,
    ) -> Self {
        Self {
            key: Arc::new(key),
            issuer: Term::named(issuer),
            verification_method: verification_method.into(),
        }
    }
}

impl std::fmt::Debug for SignatureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureOptions")
            .field("cryptosuite", &self.key.cryptosuite())
            .field("issuer", &self.issuer)
            .field("verification_method", &self.verification_method)
            .finish()
    }
}

//! Proof creation.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha512};
use tracing::{debug, error};

use super::{SignatureError, SignatureOptions, SignatureProof, HASH_METHOD, PROOF_PURPOSE};
use crate::canonical::{canonicalize, canonicalize_triples, C14N};
use crate::containment::{classify, ContainmentType};
use crate::package::package_content_ids;
use crate::remote::{is_rdf_resource, target_resource_uri, ResourceFetcher};
use crate::store::{InMemoryQuadStore, QuadStore};
use crate::types::Term;

/// The exact bytes a proof covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SignedContent {
    /// Canonical RDF, plus the local graphs it was read from.
    Rdf { bytes: Vec<u8>, contents: Vec<Term> },
    /// Raw resource body.
    Opaque(Vec<u8>),
}

impl SignedContent {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            SignedContent::Rdf { bytes, .. } => bytes,
            SignedContent::Opaque(bytes) => bytes,
        }
    }

    pub(crate) fn canonicalization(&self) -> Option<&'static str> {
        match self {
            SignedContent::Rdf { .. } => Some(C14N),
            SignedContent::Opaque(_) => None,
        }
    }

    pub(crate) fn contents(&self) -> &[Term] {
        match self {
            SignedContent::Rdf { contents, .. } => contents,
            SignedContent::Opaque(_) => &[],
        }
    }

    pub(crate) fn digest(&self) -> Vec<u8> {
        Sha512::digest(self.bytes()).to_vec()
    }
}

pub(crate) fn check_target(target: &Term) -> Result<(), SignatureError> {
    match target {
        Term::NamedNode(_) | Term::BlankNode(_) => Ok(()),
        Term::DefaultGraph => Err(SignatureError::DefaultGraphTarget),
        other => Err(SignatureError::InvalidTarget(other.clone())),
    }
}

fn graph_content<S: QuadStore + ?Sized>(store: &S, graph: &Term) -> SignedContent {
    SignedContent::Rdf {
        bytes: canonicalize_triples(&store.graph_quads(graph)),
        contents: vec![graph.clone()],
    }
}

fn dataset_content<S: QuadStore + ?Sized>(
    store: &S,
    dataset: &Term,
) -> Result<SignedContent, SignatureError> {
    let members = package_content_ids(store, dataset)?;
    let quads: Vec<_> = members.iter().flat_map(|g| store.graph_quads(g)).collect();
    Ok(SignedContent::Rdf {
        bytes: canonicalize(&quads),
        contents: members,
    })
}

/// Content of a target that has local structure, or `None` for `Other`.
pub(crate) fn local_content<S: QuadStore + ?Sized>(
    store: &S,
    target: &Term,
) -> Result<Option<SignedContent>, SignatureError> {
    match classify(store, target) {
        ContainmentType::Graph => Ok(Some(graph_content(store, target))),
        ContainmentType::Dataset => dataset_content(store, target).map(Some),
        ContainmentType::Other => Ok(None),
    }
}

/// Fetch the document serving `target` and select the target inside it.
///
/// A target naming a graph or dataset of the document covers just that; any
/// other target covers the whole document.
pub(crate) async fn remote_rdf_content(
    fetcher: &dyn ResourceFetcher,
    target: &Term,
) -> Result<SignedContent, SignatureError> {
    let uri = target_resource_uri(target.value());
    let remote = InMemoryQuadStore::from_quads(fetcher.fetch_quads(uri).await?);

    let bytes = match local_content(&remote, target)? {
        Some(content) => content.bytes().to_vec(),
        None => canonicalize(&remote.all_quads()),
    };
    Ok(SignedContent::Rdf {
        bytes,
        contents: Vec::new(),
    })
}

pub(crate) async fn remote_bytes_content(
    fetcher: &dyn ResourceFetcher,
    target: &Term,
) -> Result<SignedContent, SignatureError> {
    let uri = target_resource_uri(target.value());
    Ok(SignedContent::Opaque(fetcher.fetch_bytes(uri).await?))
}

fn seal(
    content: &SignedContent,
    target: Term,
    options: &SignatureOptions,
) -> Result<SignatureProof, SignatureError> {
    let signature = options.key.sign(&content.digest())?;

    Ok(SignatureProof {
        created: Utc::now(),
        issuer: options.issuer.clone(),
        cryptosuite: options.key.cryptosuite().to_string(),
        verification_method: options.verification_method.clone(),
        proof_purpose: PROOF_PURPOSE.to_string(),
        proof_value: hex::encode(signature),
        target,
        hash_method: HASH_METHOD.to_string(),
        canonicalization_method: content.canonicalization().map(str::to_string),
    })
}

/// Sign the triples of a local graph.
pub fn create_graph_signature<S: QuadStore + ?Sized>(
    store: &S,
    target: &Term,
    options: &SignatureOptions,
) -> Result<SignatureProof, SignatureError> {
    check_target(target)?;
    seal(&graph_content(store, target), target.clone(), options)
}

/// Sign the union of a local dataset's member graphs.
pub fn create_dataset_signature<S: QuadStore + ?Sized>(
    store: &S,
    target: &Term,
    options: &SignatureOptions,
) -> Result<SignatureProof, SignatureError> {
    check_target(target)?;
    seal(&dataset_content(store, target)?, target.clone(), options)
}

/// Sign the canonical RDF served at `uri`.
pub async fn create_remote_rdf_signature(
    fetcher: &dyn ResourceFetcher,
    uri: &str,
    options: &SignatureOptions,
) -> Result<SignatureProof, SignatureError> {
    let target = Term::named(uri);
    let content = remote_rdf_content(fetcher, &target).await?;
    seal(&content, target, options)
}

/// Sign the raw bytes served at `uri`.
pub async fn create_remote_bytes_signature(
    fetcher: &dyn ResourceFetcher,
    uri: &str,
    options: &SignatureOptions,
) -> Result<SignatureProof, SignatureError> {
    let target = Term::named(uri);
    let content = remote_bytes_content(fetcher, &target).await?;
    seal(&content, target, options)
}

/// Sign a remote resource, canonically if asked and the resource is RDF.
pub async fn create_remote_signature(
    fetcher: &dyn ResourceFetcher,
    uri: &str,
    options: &SignatureOptions,
    canonicalize: bool,
) -> Result<SignatureProof, SignatureError> {
    if canonicalize && is_rdf_resource(fetcher, uri).await? {
        create_remote_rdf_signature(fetcher, uri, options).await
    } else {
        create_remote_bytes_signature(fetcher, uri, options).await
    }
}

/// Sign `target`, dispatching on its containment type.
///
/// Named nodes with no local structure are treated as remote resources and
/// signed canonically when they serve RDF.
pub async fn create_signature<S: QuadStore + ?Sized>(
    store: &S,
    target: &Term,
    options: &SignatureOptions,
    fetcher: Option<&dyn ResourceFetcher>,
) -> Result<SignatureProof, SignatureError> {
    check_target(target)?;
    match classify(store, target) {
        ContainmentType::Graph => create_graph_signature(store, target, options),
        ContainmentType::Dataset => create_dataset_signature(store, target, options),
        ContainmentType::Other => match (target, fetcher) {
            (Term::NamedNode(iri), Some(fetcher)) => {
                create_remote_signature(fetcher, iri, options, true).await
            }
            (Term::NamedNode(iri), None) => Err(SignatureError::NoFetcher(iri.clone())),
            _ => Err(SignatureError::UnresolvableTarget(target.clone())),
        },
    }
}

/// Run a signing attempt under `timeout`.
///
/// Timeouts and failures are logged and yield `None`; the caller carries on
/// without a proof.
pub async fn try_create_signature<F>(attempt: F, timeout: Duration, target: &Term) -> Option<SignatureProof>
where
    F: Future<Output = Result<SignatureProof, SignatureError>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(proof)) => {
            debug!(
                signature_target = %target,
                cryptosuite = %proof.cryptosuite,
                "Created signature proof"
            );
            Some(proof)
        }
        Ok(Err(e)) => {
            error!(signature_target = %target, error = %e, "Signature creation failed");
            None
        }
        Err(_) => {
            let e = SignatureError::Timeout {
                target: target.clone(),
                timeout,
            };
            error!(signature_target = %target, error = %e, "Signature creation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::wrap_as_dataset;
    use crate::remote::StaticFetcher;
    use crate::signature::HmacSha256Key;
    use crate::types::Quad;

    fn options() -> SignatureOptions {
        SignatureOptions::new(
            HmacSha256Key::new(b"test_kernel_secret_32_bytes_min!".to_vec()),
            "https://pod.example.org/profile/card#me",
            "https://pod.example.org/keys/shared",
        )
    }

    fn graph_store(graph: &Term) -> InMemoryQuadStore {
        InMemoryQuadStore::from_quads(vec![Quad::new(
            Term::named("https://example.org/alice"),
            Term::named("http://xmlns.com/foaf/0.1/name"),
            Term::literal("Alice"),
            graph.clone(),
        )])
    }

    #[test]
    fn test_graph_signature_fields() {
        let g = Term::blank("g");
        let proof = create_graph_signature(&graph_store(&g), &g, &options()).unwrap();

        assert_eq!(proof.target, g);
        assert_eq!(proof.hash_method, HASH_METHOD);
        assert_eq!(proof.canonicalization_method.as_deref(), Some(C14N));
        assert_eq!(proof.proof_purpose, PROOF_PURPOSE);
        assert_eq!(proof.cryptosuite, "HMAC-SHA-256");
        assert!(hex::decode(&proof.proof_value).is_ok());
    }

    #[test]
    fn test_default_graph_and_literal_targets_rejected() {
        let store = graph_store(&Term::DefaultGraph);
        assert_eq!(
            create_graph_signature(&store, &Term::DefaultGraph, &options()),
            Err(SignatureError::DefaultGraphTarget)
        );
        assert!(matches!(
            create_graph_signature(&store, &Term::literal("x"), &options()),
            Err(SignatureError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_dataset_signature_covers_members() {
        let g = Term::blank("g");
        let mut store = graph_store(&g);
        let wrapped = wrap_as_dataset(&mut store, &[g.clone()], None).unwrap();

        let content = local_content(&store, &wrapped.dataset_id).unwrap().unwrap();
        assert_eq!(content.contents(), &[g]);
        assert!(create_dataset_signature(&store, &wrapped.dataset_id, &options()).is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_blank_target() {
        let store = InMemoryQuadStore::new();
        assert!(matches!(
            create_signature(&store, &Term::blank("ghost"), &options(), None).await,
            Err(SignatureError::UnresolvableTarget(_))
        ));
        assert!(matches!(
            create_signature(&store, &Term::named("https://example.org/doc"), &options(), None).await,
            Err(SignatureError::NoFetcher(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_bytes_have_no_canonicalization() {
        let fetcher = StaticFetcher::new().with_bytes("https://example.org/img.png", "image/png", vec![1, 2, 3]);

        let proof = create_remote_signature(&fetcher, "https://example.org/img.png", &options(), true)
            .await
            .unwrap();
        assert_eq!(proof.canonicalization_method, None);
        assert_eq!(proof.target, Term::named("https://example.org/img.png"));
    }

    #[tokio::test]
    async fn test_timeout_yields_no_proof() {
        let fetcher = StaticFetcher::new()
            .with_bytes("https://slow.example.org/file", "text/plain", b"hello".to_vec())
            .with_latency(Duration::from_millis(500));
        let options = options();
        let target = Term::named("https://slow.example.org/file");

        let proof = try_create_signature(
            create_remote_bytes_signature(&fetcher, "https://slow.example.org/file", &options),
            Duration::from_millis(10),
            &target,
        )
        .await;

        assert!(proof.is_none());
    }

    #[tokio::test]
    async fn test_failure_yields_no_proof() {
        let store = InMemoryQuadStore::new();
        let options = options();
        let target = Term::blank("ghost");

        let proof = try_create_signature(
            create_signature(&store, &target, &options, None),
            Duration::from_secs(1),
            &target,
        )
        .await;

        assert!(proof.is_none());
    }
}

//! Proof verification.

use futures::future::join_all;
use tracing::{debug, warn};

use super::sign::{check_target, local_content, remote_bytes_content, remote_rdf_content, SignedContent};
use super::{KeyResolver, SignatureError, SignatureProof, VerificationResult, HASH_METHOD};
use crate::canonical::C14N;
use crate::remote::{is_rdf_resource, target_resource_uri, ResourceFetcher};
use crate::store::QuadStore;
use crate::types::{vocab, Term};

/// Re-derive the content `proof` claims to cover.
///
/// `Ok(Err(message))` is a retrieval failure that makes the result `false`
/// without being a structural error.
async fn derive_content<S: QuadStore + ?Sized>(
    store: &S,
    proof: &SignatureProof,
    fetcher: Option<&dyn ResourceFetcher>,
) -> Result<Result<SignedContent, String>, SignatureError> {
    check_target(&proof.target)?;

    if let Some(content) = local_content(store, &proof.target)? {
        return Ok(Ok(content));
    }
    if proof.target.is_blank() {
        return Err(SignatureError::UnresolvableTarget(proof.target.clone()));
    }

    let Some(fetcher) = fetcher else {
        return Ok(Err(SignatureError::NoFetcher(proof.target.value().to_string()).to_string()));
    };

    let uri = target_resource_uri(proof.target.value());
    let remote = match is_rdf_resource(fetcher, uri).await {
        Ok(true) if proof.canonicalization_method.is_some() => {
            remote_rdf_content(fetcher, &proof.target).await
        }
        Ok(_) => remote_bytes_content(fetcher, &proof.target).await,
        Err(e) => Err(e.into()),
    };
    Ok(remote.map_err(|e| e.to_string()))
}

/// Verify one proof against the current store.
///
/// Errors are reserved for structurally invalid targets; every other failure
/// (mismatch, unknown key, unreachable resource, unsupported method) is a
/// `false` result.
pub async fn verify_signature<S: QuadStore + ?Sized>(
    store: &S,
    proof: &SignatureProof,
    resolver: &dyn KeyResolver,
    fetcher: Option<&dyn ResourceFetcher>,
) -> Result<VerificationResult, SignatureError> {
    let fail = |message: String| {
        Ok(VerificationResult::failed(
            proof.target.clone(),
            proof.issuer.clone(),
            message,
        ))
    };

    let content = match derive_content(store, proof, fetcher).await? {
        Ok(content) => content,
        Err(message) => return fail(message),
    };

    if proof.hash_method != HASH_METHOD {
        return fail(format!("Unsupported hash method {}", proof.hash_method));
    }
    if content.canonicalization() != proof.canonicalization_method.as_deref() {
        return fail(match &proof.canonicalization_method {
            Some(method) if method != C14N => {
                format!("Unsupported canonicalization method {}", method)
            }
            _ => "Canonicalization method does not match the target content".to_string(),
        });
    }

    let key = match resolver.resolve(&proof.verification_method).await {
        Ok(key) => key,
        Err(e) => return fail(e.to_string()),
    };
    if key.cryptosuite() != proof.cryptosuite {
        return fail(format!(
            "Key at {} is {}, proof uses {}",
            proof.verification_method,
            key.cryptosuite(),
            proof.cryptosuite
        ));
    }
    let signature = match hex::decode(&proof.proof_value) {
        Ok(bytes) => bytes,
        Err(e) => return fail(format!("Undecodable proof value: {}", e)),
    };

    let result = key.verify(&content.digest(), &signature);
    debug!(
        signature_target = %proof.target,
        issuer = %proof.issuer,
        result,
        "Verified signature proof"
    );

    Ok(VerificationResult {
        result,
        target: proof.target.clone(),
        issuer: proof.issuer.clone(),
        error_message: None,
        verified_contents: if result {
            content.contents().to_vec()
        } else {
            Vec::new()
        },
    })
}

fn first_object<S: QuadStore + ?Sized>(store: &S, subject: &Term, predicate: &str) -> Term {
    store
        .objects(subject, predicate)
        .into_iter()
        .next()
        .unwrap_or_else(|| subject.clone())
}

/// Verify every proof in the store.
///
/// One result per proof subject; structural errors become `false` results
/// carrying the error message.
pub async fn verify_all_signatures<S: QuadStore + ?Sized>(
    store: &S,
    resolver: &dyn KeyResolver,
    fetcher: Option<&dyn ResourceFetcher>,
) -> Vec<VerificationResult> {
    let attempts = SignatureProof::subjects(store).into_iter().map(|subject| async move {
        let outcome = match SignatureProof::read(store, &subject) {
            Ok(proof) => verify_signature(store, &proof, resolver, fetcher).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            warn!(proof = %subject, error = %e, "Proof could not be verified");
            VerificationResult::failed(
                first_object(store, &subject, vocab::sign::TARGET),
                first_object(store, &subject, vocab::sign::ISSUER),
                e.to_string(),
            )
        })
    });

    join_all(attempts).await
}

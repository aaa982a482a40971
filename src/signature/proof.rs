//! Proof records and their quad encoding.
//!
//! A proof is a fresh blank subject typed `sign:DataIntegrityProof`. Its
//! hashing details hang off a separate `sign:contentManipulation` node:
//!
//! ```text
//! _:p a sign:DataIntegrityProof ;
//!     sign:created "2026-01-01T00:00:00Z"^^xsd:dateTime ;
//!     sign:issuer <https://pod.example.org/profile/card#me> ;
//!     sign:cryptosuite "Ed25519" ;
//!     sign:verificationMethod <https://pod.example.org/keys/public> ;
//!     sign:proofPurpose "assertionMethod" ;
//!     sign:proofValue "9f2c..." ;
//!     sign:target _:g ;
//!     sign:contentManipulation [ sign:hashMethod "SHA-512" ; sign:canonicalizationMethod "c14n" ] .
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::SignatureError;
use crate::store::QuadStore;
use crate::types::{vocab, Quad, Term};

/// A signature proof over one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureProof {
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Signing agent.
    pub issuer: Term,
    /// Cryptosuite that produced `proof_value`.
    pub cryptosuite: String,
    /// URI of the verification key.
    pub verification_method: String,
    /// Proof purpose (`assertionMethod`).
    pub proof_purpose: String,
    /// Hex-encoded signature bytes.
    pub proof_value: String,
    /// Local graph, local dataset or remote resource.
    pub target: Term,
    /// Digest algorithm.
    pub hash_method: String,
    /// Canonicalization algorithm; absent for opaque byte content.
    pub canonicalization_method: Option<String>,
}

impl SignatureProof {
    /// Encode this proof into `graph` under a fresh proof subject.
    pub fn to_quads(&self, graph: &Term) -> Vec<Quad> {
        let subject = Term::fresh_blank();
        let manipulation = Term::fresh_blank();
        let q = |s: &Term, p: &str, o: Term| Quad::new(s.clone(), Term::named(p), o, graph.clone());

        let mut quads = vec![
            q(&subject, vocab::rdf::TYPE, Term::named(vocab::sign::DATA_INTEGRITY_PROOF)),
            q(
                &subject,
                vocab::sign::CREATED,
                Term::typed_literal(
                    self.created.to_rfc3339_opts(SecondsFormat::Millis, true),
                    vocab::xsd::DATE_TIME,
                ),
            ),
            q(&subject, vocab::sign::ISSUER, self.issuer.clone()),
            q(&subject, vocab::sign::CRYPTOSUITE, Term::literal(self.cryptosuite.clone())),
            q(
                &subject,
                vocab::sign::VERIFICATION_METHOD,
                Term::named(self.verification_method.clone()),
            ),
            q(&subject, vocab::sign::PROOF_PURPOSE, Term::literal(self.proof_purpose.clone())),
            q(&subject, vocab::sign::PROOF_VALUE, Term::literal(self.proof_value.clone())),
            q(&subject, vocab::sign::TARGET, self.target.clone()),
            q(&subject, vocab::sign::CONTENT_MANIPULATION, manipulation.clone()),
            q(&manipulation, vocab::sign::HASH_METHOD, Term::literal(self.hash_method.clone())),
        ];
        if let Some(method) = &self.canonicalization_method {
            quads.push(q(
                &manipulation,
                vocab::sign::CANONICALIZATION_METHOD,
                Term::literal(method.clone()),
            ));
        }
        quads
    }

    /// Decode the proof described by `subject`.
    pub fn read<S: QuadStore + ?Sized>(store: &S, subject: &Term) -> Result<Self, SignatureError> {
        let manipulation = single(store, subject, vocab::sign::CONTENT_MANIPULATION)?;
        let created_term = single(store, subject, vocab::sign::CREATED)?;
        let created = DateTime::parse_from_rfc3339(created_term.value())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| SignatureError::MalformedProof {
                proof: subject.clone(),
                reason: format!("unparseable creation time {}", created_term),
            })?;

        let canonicalization_method = optional(store, &manipulation, vocab::sign::CANONICALIZATION_METHOD)?
            .map(|t| t.value().to_string());

        Ok(Self {
            created,
            issuer: single(store, subject, vocab::sign::ISSUER)?,
            cryptosuite: single(store, subject, vocab::sign::CRYPTOSUITE)?.value().to_string(),
            verification_method: single(store, subject, vocab::sign::VERIFICATION_METHOD)?
                .value()
                .to_string(),
            proof_purpose: single(store, subject, vocab::sign::PROOF_PURPOSE)?.value().to_string(),
            proof_value: single(store, subject, vocab::sign::PROOF_VALUE)?.value().to_string(),
            target: single(store, subject, vocab::sign::TARGET)?,
            hash_method: single(store, &manipulation, vocab::sign::HASH_METHOD)?.value().to_string(),
            canonicalization_method,
        })
    }

    /// Subjects of every proof in the store.
    pub fn subjects<S: QuadStore + ?Sized>(store: &S) -> Vec<Term> {
        let mut subjects = store.subjects(
            vocab::rdf::TYPE,
            &Term::named(vocab::sign::DATA_INTEGRITY_PROOF),
        );
        subjects.sort();
        subjects.dedup();
        subjects
    }

    /// Decode every proof in the store, one result per proof subject.
    pub fn read_all<S: QuadStore + ?Sized>(store: &S) -> Vec<Result<Self, SignatureError>> {
        Self::subjects(store)
            .iter()
            .map(|subject| Self::read(store, subject))
            .collect()
    }
}

fn optional<S: QuadStore + ?Sized>(
    store: &S,
    subject: &Term,
    predicate: &'static str,
) -> Result<Option<Term>, SignatureError> {
    let mut values = store.objects(subject, predicate);
    values.sort();
    values.dedup();
    match values.len() {
        0 => Ok(None),
        1 => Ok(values.pop()),
        n => Err(SignatureError::MalformedProof {
            proof: subject.clone(),
            reason: format!("{} values for {}", n, predicate),
        }),
    }
}

fn single<S: QuadStore + ?Sized>(
    store: &S,
    subject: &Term,
    predicate: &'static str,
) -> Result<Term, SignatureError> {
    optional(store, subject, predicate)?.ok_or_else(|| SignatureError::MalformedProof {
        proof: subject.clone(),
        reason: format!("missing {}", predicate),
    })
}

/// Outcome of verifying one proof.
///
/// A signature mismatch is `result: false`, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the signature matched.
    pub result: bool,
    /// Proof target.
    pub target: Term,
    /// Proof issuer.
    pub issuer: Term,
    /// Why verification failed, if it did for a reason other than mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Local graphs whose content was covered by the proof.
    pub verified_contents: Vec<Term>,
}

impl VerificationResult {
    /// A failed result carrying a reason.
    pub fn failed(target: Term, issuer: Term, message: impl Into<String>) -> Self {
        Self {
            result: false,
            target,
            issuer,
            error_message: Some(message.into()),
            verified_contents: Vec::new(),
        }
    }
}

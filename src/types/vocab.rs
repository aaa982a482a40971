//! Vocabulary IRIs of the package wire format.
//!
//! These strings are the compatibility contract with other producers and
//! consumers of packages and must not change.

/// RDF syntax namespace.
pub mod rdf {
    /// Namespace IRI.
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    /// `rdf:type`.
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    /// `rdf:first`.
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    /// `rdf:rest`.
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    /// `rdf:nil`.
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
}

/// XML Schema datatypes.
pub mod xsd {
    /// `xsd:dateTime`.
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    /// `xsd:duration`.
    pub const DURATION: &str = "http://www.w3.org/2001/XMLSchema#duration";
}

/// Packaging vocabulary (datasets and provenance).
pub mod pack {
    /// Namespace IRI.
    pub const NAMESPACE: &str = "https://example.org/ns/pack/";
    /// Dataset class.
    pub const DATASET: &str = "https://example.org/ns/pack/Dataset";
    /// Dataset → contains-list.
    pub const CONTAINS: &str = "https://example.org/ns/pack/contains";
    /// Provenance origin.
    pub const ORIGIN: &str = "https://example.org/ns/pack/origin";
    /// Provenance issuer.
    pub const ISSUER: &str = "https://example.org/ns/pack/issuer";
    /// Provenance timestamp.
    pub const TIMESTAMP: &str = "https://example.org/ns/pack/timestamp";
}

/// Signature vocabulary.
pub mod sign {
    /// Namespace IRI.
    pub const NAMESPACE: &str = "https://example.org/ns/sign/";
    /// Proof class.
    pub const DATA_INTEGRITY_PROOF: &str = "https://example.org/ns/sign/DataIntegrityProof";
    /// Creation timestamp.
    pub const CREATED: &str = "https://example.org/ns/sign/created";
    /// Proof issuer.
    pub const ISSUER: &str = "https://example.org/ns/sign/issuer";
    /// Cryptosuite name.
    pub const CRYPTOSUITE: &str = "https://example.org/ns/sign/cryptosuite";
    /// Key reference.
    pub const VERIFICATION_METHOD: &str = "https://example.org/ns/sign/verificationMethod";
    /// Proof purpose.
    pub const PROOF_PURPOSE: &str = "https://example.org/ns/sign/proofPurpose";
    /// Encoded signature bytes.
    pub const PROOF_VALUE: &str = "https://example.org/ns/sign/proofValue";
    /// Signed target.
    pub const TARGET: &str = "https://example.org/ns/sign/target";
    /// Content manipulation description node.
    pub const CONTENT_MANIPULATION: &str = "https://example.org/ns/sign/contentManipulation";
    /// Hash algorithm.
    pub const HASH_METHOD: &str = "https://example.org/ns/sign/hashMethod";
    /// Canonicalization algorithm.
    pub const CANONICALIZATION_METHOD: &str = "https://example.org/ns/sign/canonicalizationMethod";
}

/// ODRL usage-control vocabulary.
pub mod odrl {
    #![allow(missing_docs)]

    /// Namespace IRI.
    pub const NAMESPACE: &str = "http://www.w3.org/ns/odrl/2/";
    pub const AGREEMENT: &str = "http://www.w3.org/ns/odrl/2/Agreement";
    pub const PERMISSION: &str = "http://www.w3.org/ns/odrl/2/permission";
    pub const CONSTRAINT_CLASS: &str = "http://www.w3.org/ns/odrl/2/Constraint";
    pub const CONSTRAINT: &str = "http://www.w3.org/ns/odrl/2/constraint";
    pub const TARGET: &str = "http://www.w3.org/ns/odrl/2/target";
    pub const ACTION: &str = "http://www.w3.org/ns/odrl/2/action";
    pub const ASSIGNER: &str = "http://www.w3.org/ns/odrl/2/assigner";
    pub const ASSIGNEE: &str = "http://www.w3.org/ns/odrl/2/assignee";
    pub const AND: &str = "http://www.w3.org/ns/odrl/2/and";
    pub const OR: &str = "http://www.w3.org/ns/odrl/2/or";
    pub const LEFT_OPERAND: &str = "http://www.w3.org/ns/odrl/2/leftOperand";
    pub const OPERATOR: &str = "http://www.w3.org/ns/odrl/2/operator";
    pub const RIGHT_OPERAND: &str = "http://www.w3.org/ns/odrl/2/rightOperand";
    pub const UID: &str = "http://www.w3.org/ns/odrl/2/uid";
    pub const USE: &str = "http://www.w3.org/ns/odrl/2/use";
    pub const READ: &str = "http://www.w3.org/ns/odrl/2/read";
    pub const EQ: &str = "http://www.w3.org/ns/odrl/2/eq";
    pub const GT: &str = "http://www.w3.org/ns/odrl/2/gt";
    pub const LT: &str = "http://www.w3.org/ns/odrl/2/lt";
    pub const DATE_TIME: &str = "http://www.w3.org/ns/odrl/2/dateTime";
}

/// Linked Data Event Streams vocabulary.
pub mod ldes {
    /// Namespace IRI.
    pub const NAMESPACE: &str = "https://w3id.org/ldes#";
    /// Event stream class.
    pub const EVENT_STREAM: &str = "https://w3id.org/ldes#EventStream";
}

/// TREE hypermedia vocabulary.
pub mod tree {
    #![allow(missing_docs)]

    /// Namespace IRI.
    pub const NAMESPACE: &str = "https://w3id.org/tree#";
    pub const VIEW: &str = "https://w3id.org/tree#view";
    pub const NODE: &str = "https://w3id.org/tree#Node";
    pub const RELATION_CLASS: &str = "https://w3id.org/tree#Relation";
    pub const RELATION: &str = "https://w3id.org/tree#relation";
    pub const MEMBER: &str = "https://w3id.org/tree#member";
    pub const PATH: &str = "https://w3id.org/tree#path";
}

/// Purpose left operand.
pub const OAC_PURPOSE: &str = "https://w3id.org/oac#Purpose";

/// Trust tag vocabulary used for marker triples.
pub mod verify {
    #![allow(missing_docs)]

    /// Namespace IRI.
    pub const NAMESPACE: &str = "https://example/org/ns/verify/";
    /// Graph → tag marker predicate.
    pub const HAS_TAG: &str = "https://example/org/ns/verify/hasTag";
    pub const SIGNATURE_VALIDATED: &str = "https://example/org/ns/verify/SignatureValidated";
    pub const PROVENANCE_VALIDATED: &str = "https://example/org/ns/verify/ProvenanceValidated";
    pub const POLICY_VALIDATED: &str = "https://example/org/ns/verify/PolicyValidated";
}

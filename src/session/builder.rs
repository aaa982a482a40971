//! Package construction pipeline.
//!
//! ```ignore
//! let store = Builder::new(options)
//!     .start_session(None)?
//!     .load_rdf("https://example.org/doc.ttl")
//!     .sign()
//!     .provenance(Some(Term::named("https://example.org/doc.ttl")))
//!     .policy(PolicyOptions::default().purpose("https://w3id.org/dpv#ResearchAndDevelopment"))
//!     .dataset()
//!     .sign()
//!     .commit()
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{boxed_task, FocusStore, Session, SessionError, SessionState, Task};
use crate::config::PipelineConfig;
use crate::containment::{classify, ContainmentType};
use crate::package::{dataset_quads, import_document};
use crate::policy::{create_simple_policy, SimplePolicyOptions, DEFAULT_POLICY_DURATION};
use crate::provenance::{provenance_quads, ProvenanceError, ProvenanceOptions};
use crate::remote::{is_rdf_resource, target_resource_uri, FetchError, ResourceFetcher};
use crate::signature::{
    create_remote_signature, create_signature, try_create_signature, SignatureOptions,
    SignatureProof,
};
use crate::store::{validate_quad, QuadPattern, QuadStore};
use crate::types::{Quad, Term};

/// Usage policy for the current focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOptions {
    /// Validity period, ISO 8601. Defaults to seven days.
    pub duration: Option<String>,
    /// Accepted purposes.
    pub purposes: Vec<String>,
    /// Party granting the permission.
    pub assigner: Option<String>,
    /// Party receiving the permission.
    pub assignee: Option<String>,
}

impl PolicyOptions {
    /// Set the validity period.
    pub fn duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Accept `purpose`.
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purposes.push(purpose.into());
        self
    }

    /// Set the assigner.
    pub fn assigner(mut self, assigner: impl Into<String>) -> Self {
        self.assigner = Some(assigner.into());
        self
    }

    /// Set the assignee.
    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }
}

/// Collects packaging operations and runs them at commit.
///
/// Any failing task aborts the whole commit: a half-built package is never
/// returned. The store the session started from is kept and can be taken
/// back with [`Builder::recover_store`].
pub struct Builder<S> {
    options: SignatureOptions,
    config: PipelineConfig,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    state: SessionState,
    session: Option<Session<S>>,
    recovered: Option<S>,
}

impl<S> Builder<S>
where
    S: QuadStore + Clone + Default + Send + Sync + 'static,
{
    /// Create a builder signing with `options`.
    pub fn new(options: SignatureOptions) -> Self {
        Self {
            options,
            config: PipelineConfig::default(),
            fetcher: None,
            state: SessionState::Idle,
            session: None,
            recovered: None,
        }
    }

    /// Use `config` for timeouts.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Retrieve remote resources through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Take back the starting store of the last aborted commit.
    pub fn recover_store(&mut self) -> Option<S> {
        self.recovered.take()
    }

    /// Open a session over `store`, or over an empty store.
    pub fn start_session(&mut self, store: Option<S>) -> Result<&mut Self, SessionError> {
        if self.state == SessionState::Open {
            return Err(SessionError::AlreadyOpen);
        }
        self.session = Some(Session::new(store.unwrap_or_default()));
        self.state = SessionState::Open;
        debug!("Builder session started");
        Ok(self)
    }

    fn ensure_session(&mut self) {
        if self.state != SessionState::Open {
            self.session = Some(Session::new(S::default()));
            self.state = SessionState::Open;
            debug!("Builder session started implicitly");
        }
    }

    fn push(&mut self, name: &'static str, task: Task<S>) -> &mut Self {
        match (&self.state, self.session.as_mut()) {
            (SessionState::Open, Some(session)) => session.tasks.push((name, task)),
            _ => warn!(operation = name, "No open session; operation ignored"),
        }
        self
    }

    /// Load the RDF document at `uri`, isolating its graphs, and focus its
    /// default graph. Opens a session if none is open.
    pub fn load_rdf(&mut self, uri: impl Into<String>) -> &mut Self {
        self.ensure_session();
        let uri = uri.into();
        let fetcher = self.fetcher.clone();
        self.push(
            "load_rdf",
            boxed_task(move |state| load_rdf_task(state, fetcher, uri)),
        )
    }

    /// Load in-memory quads, isolating their graphs, and focus their default
    /// graph. Opens a session if none is open.
    pub fn load_quads(&mut self, quads: Vec<Quad>) -> &mut Self {
        self.ensure_session();
        self.push(
            "load_quads",
            boxed_task(move |state| load_quads_task(state, quads)),
        )
    }

    /// Sign the focus.
    pub fn sign(&mut self) -> &mut Self {
        let options = self.options.clone();
        let fetcher = self.fetcher.clone();
        let timeout = self.config.signature_timeout;
        self.push(
            "sign",
            boxed_task(move |state| sign_task(state, options, fetcher, timeout)),
        )
    }

    /// Sign every resource referenced through one of `predicates`.
    ///
    /// Signing runs concurrently; each attempt is bounded by the configured
    /// timeout and a failed attempt is skipped.
    pub fn sign_predicates<I, P>(&mut self, predicates: I, canonicalize: bool) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let predicates: Vec<String> = predicates.into_iter().map(Into::into).collect();
        let options = self.options.clone();
        let fetcher = self.fetcher.clone();
        let timeout = self.config.signature_timeout;
        self.push(
            "sign_predicates",
            boxed_task(move |state| {
                sign_predicates_task(state, predicates, canonicalize, options, fetcher, timeout)
            }),
        )
    }

    /// Sign the resource at `uri` without loading it. Opens a session if none
    /// is open.
    pub fn sign_external(&mut self, uri: impl Into<String>, canonicalize: bool) -> &mut Self {
        self.ensure_session();
        let uri = uri.into();
        let options = self.options.clone();
        let fetcher = self.fetcher.clone();
        let timeout = self.config.signature_timeout;
        self.push(
            "sign_external",
            boxed_task(move |state| {
                sign_external_task(state, uri, canonicalize, options, fetcher, timeout)
            }),
        )
    }

    /// Attach a usage policy to the focus.
    pub fn policy(&mut self, policy: PolicyOptions) -> &mut Self {
        self.push(
            "policy",
            boxed_task(move |state| async move { policy_task(state, policy) }),
        )
    }

    /// Record provenance for the focus, issued by the signing identity.
    pub fn provenance(&mut self, origin: Option<Term>) -> &mut Self {
        let issuer = self.options.issuer.clone();
        self.push(
            "provenance",
            boxed_task(move |state| async move { provenance_task(state, origin, issuer) }),
        )
    }

    /// Wrap every graph added so far in this session into a dataset and
    /// focus it. Fails when nothing has been added yet.
    pub fn dataset(&mut self) -> &mut Self {
        self.push(
            "dataset",
            boxed_task(move |state| async move { dataset_task(state) }),
        )
    }

    /// Run the collected operations and return the resulting store.
    pub async fn commit(&mut self) -> Result<S, SessionError> {
        self.commit_to_focus_store().await.map(|state| state.store)
    }

    /// Run the collected operations and return the store with its focus.
    pub async fn commit_to_focus_store(&mut self) -> Result<FocusStore<S>, SessionError> {
        let session = match (self.state, self.session.take()) {
            (SessionState::Open, Some(session)) => session,
            _ => return Err(SessionError::NoOpenSession),
        };

        let initial = session.initial.clone();
        let state = match session.run_to_completion().await {
            Ok(state) => state,
            Err((name, e)) => {
                self.state = SessionState::Idle;
                self.recovered = Some(initial);
                warn!(operation = name, error = %e, "Builder task failed; session aborted");
                return Err(e);
            }
        };

        self.state = SessionState::Committed;
        info!(quads = state.store.len(), "Builder session committed");
        Ok(state)
    }
}

fn import_into<S: QuadStore>(state: &mut FocusStore<S>, quads: Vec<Quad>) -> Result<(), SessionError> {
    let imported = import_document(quads)?;
    debug!(
        graphs = imported.graphs.len(),
        quads = imported.quads.len(),
        "Imported document"
    );
    state.add_quads(imported.quads, imported.default_graph);
    Ok(())
}

fn add_proof<S: QuadStore>(state: &mut FocusStore<S>, proof: &SignatureProof) {
    state.add_quads(proof.to_quads(&Term::fresh_blank()), None);
}

pub(super) async fn load_quads_task<S: QuadStore>(
    mut state: FocusStore<S>,
    quads: Vec<Quad>,
) -> Result<FocusStore<S>, SessionError> {
    for quad in &quads {
        validate_quad(quad)?;
    }
    import_into(&mut state, quads)?;
    Ok(state)
}

pub(super) fn policy_task<S: QuadStore>(
    mut state: FocusStore<S>,
    policy: PolicyOptions,
) -> Result<FocusStore<S>, SessionError> {
    let target = state
        .focus()
        .cloned()
        .ok_or(SessionError::MissingFocus("policy"))?;
    let options = SimplePolicyOptions {
        target,
        duration: Some(
            policy
                .duration
                .unwrap_or_else(|| DEFAULT_POLICY_DURATION.to_string()),
        ),
        purposes: policy.purposes,
        assigner: policy.assigner,
        assignee: policy.assignee,
    };
    let built = create_simple_policy(&options, &Term::fresh_blank())?;
    debug!(policy_target = %options.target, uid = %built.uid, "Added policy");
    state.add_quads(built.quads, None);
    Ok(state)
}

pub(super) fn provenance_task<S: QuadStore>(
    mut state: FocusStore<S>,
    origin: Option<Term>,
    issuer: Term,
) -> Result<FocusStore<S>, SessionError> {
    let target = state
        .focus()
        .cloned()
        .ok_or(SessionError::MissingFocus("provenance"))?;
    if !(target.is_named() || target.is_blank()) {
        return Err(ProvenanceError::InvalidTarget(target).into());
    }
    let options = ProvenanceOptions {
        origin,
        issuer: Some(issuer),
    };
    let quads = provenance_quads(&target, &options, Utc::now(), &Term::fresh_blank());
    state.add_quads(quads, None);
    Ok(state)
}

pub(super) fn dataset_task<S: QuadStore>(mut state: FocusStore<S>) -> Result<FocusStore<S>, SessionError> {
    let graphs = state.added_graphs().to_vec();
    if graphs.is_empty() {
        return Err(SessionError::MissingFocus("dataset"));
    }
    let (dataset_id, containing_graph, quads) = dataset_quads(&graphs, Some(&Term::fresh_blank()))?;
    debug!(dataset = %dataset_id, members = graphs.len(), "Wrapped dataset");
    state.add_quads(quads, None);
    state.scope_out_dataset_focus(dataset_id, Some(containing_graph));
    Ok(state)
}

async fn load_rdf_task<S: QuadStore>(
    mut state: FocusStore<S>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    uri: String,
) -> Result<FocusStore<S>, SessionError> {
    let fetcher = fetcher.ok_or(SessionError::NoFetcher("load_rdf"))?;
    if !is_rdf_resource(fetcher.as_ref(), &uri).await? {
        return Err(FetchError::NotRdf(uri).into());
    }
    let quads = fetcher.fetch_quads(&uri).await?;
    import_into(&mut state, quads)?;
    Ok(state)
}

pub(super) async fn sign_task<S: QuadStore + Sync>(
    mut state: FocusStore<S>,
    options: SignatureOptions,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    timeout: Duration,
) -> Result<FocusStore<S>, SessionError> {
    let target = state
        .focus()
        .cloned()
        .ok_or(SessionError::MissingFocus("sign"))?;

    if classify(&state.store, &target) == ContainmentType::Other {
        warn!(signature_target = %target, "Focus is neither a graph nor a dataset; not signed");
        return Ok(state);
    }

    let attempt = create_signature(&state.store, &target, &options, fetcher.as_deref());
    if let Some(proof) = try_create_signature(attempt, timeout, &target).await {
        add_proof(&mut state, &proof);
    }
    Ok(state)
}

async fn sign_external_task<S: QuadStore>(
    mut state: FocusStore<S>,
    uri: String,
    canonicalize: bool,
    options: SignatureOptions,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    timeout: Duration,
) -> Result<FocusStore<S>, SessionError> {
    let fetcher = fetcher.ok_or(SessionError::NoFetcher("sign_external"))?;
    let target = Term::named(uri.as_str());
    let attempt = create_remote_signature(fetcher.as_ref(), &uri, &options, canonicalize);
    if let Some(proof) = try_create_signature(attempt, timeout, &target).await {
        add_proof(&mut state, &proof);
    }
    Ok(state)
}

async fn sign_predicates_task<S: QuadStore + Sync>(
    mut state: FocusStore<S>,
    predicates: Vec<String>,
    canonicalize: bool,
    options: SignatureOptions,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    timeout: Duration,
) -> Result<FocusStore<S>, SessionError> {
    let fetcher = fetcher.ok_or(SessionError::NoFetcher("sign_predicates"))?;

    let mut targets: Vec<String> = Vec::new();
    for predicate in &predicates {
        for quad in state.store.quads_matching(&QuadPattern::any().predicate(predicate)) {
            if let Term::NamedNode(iri) = &quad.object {
                let uri = target_resource_uri(iri).to_string();
                if !targets.contains(&uri) {
                    targets.push(uri);
                }
            }
        }
    }

    let attempts = targets.iter().map(|uri| {
        let fetcher = fetcher.as_ref();
        let options = &options;
        async move {
            let target = Term::named(uri.as_str());
            let attempt = create_remote_signature(fetcher, uri, options, canonicalize);
            try_create_signature(attempt, timeout, &target).await
        }
    });
    let proofs: Vec<SignatureProof> = join_all(attempts).await.into_iter().flatten().collect();

    debug!(
        referenced = targets.len(),
        signed = proofs.len(),
        "Signed referenced resources"
    );
    for proof in &proofs {
        add_proof(&mut state, proof);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containment::is_dataset;
    use crate::package::package_content_ids;
    use crate::remote::StaticFetcher;
    use crate::signature::{HmacSha256Key, SignatureProof};
    use crate::store::InMemoryQuadStore;
    use crate::types::vocab;

    fn options() -> SignatureOptions {
        SignatureOptions::new(
            Arc::new(HmacSha256Key::new(b"builder-secret".to_vec())),
            "https://example.org/alice",
            "https://example.org/alice#key",
        )
    }

    fn document() -> Vec<Quad> {
        vec![
            Quad::triple(
                Term::named("https://example.org/book"),
                Term::named("https://example.org/title"),
                Term::literal("Dune"),
            ),
            Quad::triple(
                Term::blank("b0"),
                Term::named("https://example.org/seeAlso"),
                Term::named("https://example.org/other.ttl#it"),
            ),
        ]
    }

    fn builder() -> Builder<InMemoryQuadStore> {
        Builder::new(options())
    }

    #[tokio::test]
    async fn test_load_sign_dataset_sign() {
        let mut builder = builder();
        let state = builder
            .start_session(None)
            .unwrap()
            .load_quads(document())
            .sign()
            .dataset()
            .sign()
            .commit_to_focus_store()
            .await
            .unwrap();

        let dataset = state.focus().cloned().unwrap();
        assert!(is_dataset(&state.store, &dataset));

        // Content graph plus the first proof graph.
        let members = package_content_ids(&state.store, &dataset).unwrap();
        assert_eq!(members.len(), 2);

        let proofs = SignatureProof::read_all(&state.store);
        assert_eq!(proofs.len(), 2);
        assert!(proofs.iter().any(|p| p.as_ref().unwrap().target == dataset));
        assert!(state
            .store
            .graph_quads(&Term::DefaultGraph)
            .is_empty());
        assert_eq!(builder.state(), SessionState::Committed);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut builder = builder();
        builder.start_session(None).unwrap();
        assert_eq!(
            builder.start_session(None).err(),
            Some(SessionError::AlreadyOpen)
        );
    }

    #[tokio::test]
    async fn test_sign_without_focus_aborts() {
        let mut builder = builder();
        let result = builder.start_session(None).unwrap().sign().commit().await;

        assert_eq!(result.err(), Some(SessionError::MissingFocus("sign")));
        assert_eq!(builder.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_aborted_commit_keeps_starting_store() {
        let existing = InMemoryQuadStore::from_quads(document());
        let mut builder = builder();
        let result = builder
            .start_session(Some(existing.clone()))
            .unwrap()
            .dataset()
            .commit()
            .await;

        assert_eq!(result.err(), Some(SessionError::MissingFocus("dataset")));
        assert_eq!(builder.state(), SessionState::Idle);
        assert_eq!(builder.recover_store(), Some(existing));
        assert_eq!(builder.recover_store(), None);
    }

    #[tokio::test]
    async fn test_operations_without_session_are_ignored() {
        let mut builder = builder();
        builder.sign().dataset();
        assert_eq!(builder.state(), SessionState::Idle);
        assert_eq!(builder.commit().await.err(), Some(SessionError::NoOpenSession));
    }

    #[tokio::test]
    async fn test_invalid_quads_abort() {
        let bad = Quad::triple(
            Term::literal("not a subject"),
            Term::named("https://example.org/p"),
            Term::literal("o"),
        );
        let result = builder().load_quads(vec![bad]).commit().await;
        assert!(matches!(result, Err(SessionError::Store(_))));
    }

    #[tokio::test]
    async fn test_policy_and_provenance_target_focus() {
        let origin = Term::named("https://example.org/source.ttl");
        let state = builder()
            .load_quads(document())
            .provenance(Some(origin.clone()))
            .policy(PolicyOptions::default().purpose("https://example.org/purpose/research"))
            .commit_to_focus_store()
            .await
            .unwrap();

        let focus = state.focus().cloned().unwrap();
        assert_eq!(state.store.objects(&focus, vocab::pack::ORIGIN), vec![origin]);
        assert_eq!(
            state.store.objects(&focus, vocab::pack::ISSUER),
            vec![Term::named("https://example.org/alice")]
        );
        assert_eq!(
            state
                .store
                .subjects(vocab::odrl::TARGET, &focus)
                .len(),
            1
        );
        // Content, provenance and policy graphs.
        assert_eq!(state.added_graphs().len(), 3);
    }

    #[tokio::test]
    async fn test_load_rdf_and_sign_predicates() {
        let other = vec![Quad::triple(
            Term::named("https://example.org/other.ttl#it"),
            Term::named("https://example.org/label"),
            Term::literal("other"),
        )];
        let fetcher = StaticFetcher::new()
            .with_rdf("https://example.org/doc.ttl", document())
            .with_rdf("https://example.org/other.ttl", other);

        let state = builder()
            .with_fetcher(Arc::new(fetcher))
            .load_rdf("https://example.org/doc.ttl")
            .sign_predicates(["https://example.org/seeAlso"], true)
            .commit_to_focus_store()
            .await
            .unwrap();

        let proofs: Vec<SignatureProof> = SignatureProof::read_all(&state.store)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].target, Term::named("https://example.org/other.ttl"));
        assert_eq!(proofs[0].canonicalization_method.as_deref(), Some("c14n"));
    }

    #[tokio::test]
    async fn test_load_rdf_without_fetcher_aborts() {
        let result = builder().load_rdf("https://example.org/doc.ttl").commit().await;
        assert_eq!(result.err(), Some(SessionError::NoFetcher("load_rdf")));
    }

    #[tokio::test]
    async fn test_sign_external_opaque() {
        let fetcher = StaticFetcher::new().with_bytes(
            "https://example.org/report.pdf",
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        );
        let state = builder()
            .with_fetcher(Arc::new(fetcher))
            .sign_external("https://example.org/report.pdf", true)
            .commit_to_focus_store()
            .await
            .unwrap();

        let proof = SignatureProof::read_all(&state.store).remove(0).unwrap();
        assert_eq!(proof.target, Term::named("https://example.org/report.pdf"));
        assert_eq!(proof.canonicalization_method, None);
    }
}

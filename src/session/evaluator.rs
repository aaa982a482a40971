//! Package verification pipeline.
//!
//! Each check grants trust tags to the graphs that pass it and declares its
//! tag as required. At commit the store is narrowed to the graphs holding
//! every required tag.
//!
//! Tasks are fault-isolated: a task that fails leaves the store as it was
//! before that task, the failure is logged, and the next task runs. A failed
//! check still requires its tag, so content it would have vouched for is
//! filtered out.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{boxed_task, FocusStore, Session, SessionError, SessionState, Task};
use crate::config::PipelineConfig;
use crate::package::relabel_blank_nodes;
use crate::policy::evaluate_policies;
use crate::provenance::{evaluate_provenance, ProvenanceRequirements};
use crate::remote::{is_rdf_resource, FetchError, ResourceFetcher};
use crate::signature::{verify_all_signatures, CachedKeyResolver, KeyResolver, VerificationResult};
use crate::store::{validate_quad, QuadStore};
use crate::trust::{TrustLedger, TrustTag};
use crate::types::{Quad, Term};

/// What a committed evaluation produced.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome<S> {
    /// The store, narrowed to trusted graphs and default-graph package metadata.
    pub store: S,
    /// Every signature verification result, in evaluation order.
    pub results: Vec<VerificationResult>,
    /// Granted and required tags.
    pub ledger: TrustLedger,
    /// Graphs removed by the trust filter.
    pub removed_graphs: Vec<Term>,
}

/// Collects verification checks and runs them at commit.
pub struct Evaluator<S> {
    resolver: Arc<CachedKeyResolver<Arc<dyn KeyResolver>>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    state: SessionState,
    session: Option<Session<S>>,
}

impl<S> Evaluator<S>
where
    S: QuadStore + Clone + Default + Send + Sync + 'static,
{
    /// Create an evaluator resolving keys through `resolver`, cached per
    /// `config`.
    pub fn new(resolver: Arc<dyn KeyResolver>, config: &PipelineConfig) -> Self {
        Self {
            resolver: Arc::new(CachedKeyResolver::with_config(
                resolver,
                config.key_cache.clone(),
            )),
            fetcher: None,
            state: SessionState::Idle,
            session: None,
        }
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

    /// Resolver cache, for inspection.
    pub fn key_cache(&self) -> &CachedKeyResolver<Arc<dyn KeyResolver>> {
        &self.resolver
    }

    /// Open a session over `store`, or over an empty store.
    pub fn start_session(&mut self, store: Option<S>) -> Result<&mut Self, SessionError> {
        if self.state == SessionState::Open {
            return Err(SessionError::AlreadyOpen);
        }
        self.session = Some(Session::new(store.unwrap_or_default()));
        self.state = SessionState::Open;
        debug!("Evaluator session started");
        Ok(self)
    }

    fn ensure_session(&mut self) {
        if self.state != SessionState::Open {
            self.session = Some(Session::new(S::default()));
            self.state = SessionState::Open;
            debug!("Evaluator session started implicitly");
        }
    }

    fn push(&mut self, name: &'static str, required: Option<TrustTag>, task: Task<S>) -> &mut Self {
        match (&self.state, self.session.as_mut()) {
            (SessionState::Open, Some(session)) => {
                session.required.extend(required);
                session.tasks.push((name, task));
            }
            _ => warn!(operation = name, "No open session; operation ignored"),
        }
        self
    }

    /// Load the package at `uri`. Opens a session if none is open.
    ///
    /// Graph identifiers are kept so proofs and contains-lists still resolve;
    /// only blank nodes are relabelled.
    pub fn load_rdf(&mut self, uri: impl Into<String>) -> &mut Self {
        self.ensure_session();
        let uri = uri.into();
        let fetcher = self.fetcher.clone();
        self.push(
            "load_rdf",
            None,
            boxed_task(move |state| load_rdf_task(state, fetcher, uri)),
        )
    }

    /// Load an in-memory package. Opens a session if none is open.
    pub fn load_quads(&mut self, quads: Vec<Quad>) -> &mut Self {
        self.ensure_session();
        self.push(
            "load_quads",
            None,
            boxed_task(move |state| async move { load_quads_task(state, quads) }),
        )
    }

    /// Verify every proof and trust the content of valid proofs issued by one
    /// of `trusted_issuers`. An empty list trusts no one.
    pub fn evaluate_signatures<I>(&mut self, trusted_issuers: I) -> &mut Self
    where
        I: IntoIterator<Item = Term>,
    {
        let trusted: BTreeSet<Term> = trusted_issuers.into_iter().collect();
        let resolver = Arc::clone(&self.resolver);
        let fetcher = self.fetcher.clone();
        self.push(
            "evaluate_signatures",
            Some(TrustTag::SignatureValidated),
            boxed_task(move |state| signatures_task(state, trusted, resolver, fetcher)),
        )
    }

    /// Trust graphs governed by a policy compliant with `purpose` now.
    ///
    /// With `require_trusted`, only policies stated in signature-validated
    /// graphs count.
    pub fn evaluate_policies(&mut self, purpose: impl Into<String>, require_trusted: bool) -> &mut Self {
        let purpose = purpose.into();
        self.push(
            "evaluate_policies",
            Some(TrustTag::PolicyValidated),
            boxed_task(move |state| async move {
                Ok::<_, SessionError>(policies_task(state, &purpose, require_trusted))
            }),
        )
    }

    /// Trust graphs whose provenance meets `requirements`.
    pub fn evaluate_provenance(&mut self, requirements: ProvenanceRequirements) -> &mut Self {
        self.push(
            "evaluate_provenance",
            Some(TrustTag::ProvenanceValidated),
            boxed_task(move |state| async move {
                Ok::<_, SessionError>(provenance_task(state, &requirements))
            }),
        )
    }

    /// Run the collected checks and filter the store.
    pub async fn commit(&mut self) -> Result<EvaluationOutcome<S>, SessionError> {
        let session = match (self.state, self.session.take()) {
            (SessionState::Open, Some(session)) => session,
            _ => return Err(SessionError::NoOpenSession),
        };

        let mut state = FocusStore::new(session.initial);
        for (name, task) in session.tasks {
            let snapshot = state.clone();
            state = match task(state).await {
                Ok(next) => next,
                Err(e) => {
                    warn!(operation = name, error = %e, "Evaluation task failed; store left unchanged");
                    snapshot
                }
            };
        }

        for tag in session.required {
            state.ledger.require(tag);
        }
        let removed_graphs = state.ledger.apply_filter(&mut state.store);
        self.state = SessionState::Committed;

        info!(
            required = ?state.ledger.required(),
            removed = removed_graphs.len(),
            remaining = state.store.len(),
            "Evaluator session committed"
        );

        Ok(EvaluationOutcome {
            store: state.store,
            results: state.results,
            ledger: state.ledger,
            removed_graphs,
        })
    }
}

fn load_quads_task<S: QuadStore>(
    mut state: FocusStore<S>,
    quads: Vec<Quad>,
) -> Result<FocusStore<S>, SessionError> {
    for quad in &quads {
        validate_quad(quad)?;
    }
    state.add_quads(relabel_blank_nodes(quads), None);
    Ok(state)
}

async fn load_rdf_task<S: QuadStore>(
    state: FocusStore<S>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    uri: String,
) -> Result<FocusStore<S>, SessionError> {
    let fetcher = fetcher.ok_or(SessionError::NoFetcher("load_rdf"))?;
    if !is_rdf_resource(fetcher.as_ref(), &uri).await? {
        return Err(FetchError::NotRdf(uri).into());
    }
    let quads = fetcher.fetch_quads(&uri).await?;
    load_quads_task(state, quads)
}

async fn signatures_task<S: QuadStore + Sync>(
    mut state: FocusStore<S>,
    trusted: BTreeSet<Term>,
    resolver: Arc<CachedKeyResolver<Arc<dyn KeyResolver>>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
) -> Result<FocusStore<S>, SessionError> {
    let results = verify_all_signatures(&state.store, resolver.as_ref(), fetcher.as_deref()).await;

    let mut tagged = 0;
    for result in &results {
        if !result.result {
            debug!(
                signature_target = %result.target,
                error = result.error_message.as_deref().unwrap_or_default(),
                "Signature did not verify"
            );
            continue;
        }
        if !trusted.contains(&result.issuer) {
            debug!(issuer = %result.issuer, "Valid signature from untrusted issuer");
            continue;
        }
        tagged += state
            .ledger
            .tag_all(&result.verified_contents, TrustTag::SignatureValidated);
    }

    info!(proofs = results.len(), tagged, "Evaluated signatures");
    state.results.extend(results);
    Ok(state)
}

fn policies_task<S: QuadStore>(
    mut state: FocusStore<S>,
    purpose: &str,
    require_trusted: bool,
) -> FocusStore<S> {
    let trusted = require_trusted.then(|| state.ledger.graphs_with(TrustTag::SignatureValidated));
    let evaluation = evaluate_policies(&state.store, purpose, Utc::now(), trusted.as_ref());
    let tagged = state
        .ledger
        .tag_all(&evaluation.compliant_graphs, TrustTag::PolicyValidated);
    info!(
        purpose,
        compliant_targets = evaluation.compliant_targets.len(),
        tagged,
        "Evaluated policies"
    );
    state
}

fn provenance_task<S: QuadStore>(
    mut state: FocusStore<S>,
    requirements: &ProvenanceRequirements,
) -> FocusStore<S> {
    let candidates: Vec<Term> = state
        .store
        .graphs()
        .into_iter()
        .filter(|g| !g.is_default_graph())
        .filter(|g| {
            !requirements.require_trusted || state.ledger.has(g, TrustTag::SignatureValidated)
        })
        .collect();

    let passing = evaluate_provenance(&state.store, &candidates, requirements);
    let tagged = state.ledger.tag_all(&passing, TrustTag::ProvenanceValidated);
    info!(
        candidates = candidates.len(),
        tagged,
        "Evaluated provenance"
    );
    state
}

//! Deferred pipelines over one evolving store.
//!
//! A session collects operations as boxed tasks and runs them in order at
//! commit. Each task receives the [`FocusStore`] left by its predecessor and
//! returns it updated, so the focus term is passed explicitly from task to
//! task rather than held in hidden state.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──start_session──► Open ──commit──► Committed
//!                          ▲                   │
//!                          └───start_session───┘
//! ```

pub mod builder;
pub mod evaluator;
pub mod stream;

use std::collections::BTreeSet;
use std::future::Future;

use futures::future::BoxFuture;

use crate::config::ConfigError;
use crate::package::PackageError;
use crate::policy::PolicyError;
use crate::provenance::ProvenanceError;
use crate::remote::FetchError;
use crate::signature::{SignatureError, VerificationResult};
use crate::store::{StoreError, QuadStore};
use crate::trust::{TrustLedger, TrustTag};
use crate::types::{Quad, Term};

pub use builder::{Builder, PolicyOptions};
pub use evaluator::{EvaluationOutcome, Evaluator};
pub use stream::{EventStreamPage, StreamBuilder};

/// Error type for sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `start_session` while a session is open.
    #[error("Commit the previous session before opening a new one")]
    AlreadyOpen,
    /// `commit` without an open session.
    #[error("Cannot commit: no open session")]
    NoOpenSession,
    /// An operation needs a focus and none has been set.
    #[error("Operation {0} requires a focus; load content or wrap a dataset first")]
    MissingFocus(&'static str),
    /// Remote content was requested but no fetcher is configured.
    #[error("Operation {0} needs a resource fetcher")]
    NoFetcher(&'static str),
    /// Invalid quads.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Graph isolation or dataset construction failed.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// Signing or verification failed structurally.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Policy construction failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Provenance construction failed.
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),
    /// Remote retrieval failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started.
    #[default]
    Idle,
    /// Operations are being collected.
    Open,
    /// The last session ran to completion.
    Committed,
}

/// Store plus the context threaded between tasks.
#[derive(Debug, Clone, Default)]
pub struct FocusStore<S> {
    /// Working store.
    pub store: S,
    focus: Option<Term>,
    added_graphs: Vec<Term>,
    /// Trust tags granted so far.
    pub ledger: TrustLedger,
    /// Verification results gathered so far.
    pub results: Vec<VerificationResult>,
}

impl<S: QuadStore> FocusStore<S> {
    /// Wrap `store` with no focus.
    pub fn new(store: S) -> Self {
        Self {
            store,
            focus: None,
            added_graphs: Vec::new(),
            ledger: TrustLedger::new(),
            results: Vec::new(),
        }
    }

    /// Add quads, remembering their graphs, and optionally move the focus.
    pub fn add_quads(&mut self, quads: Vec<Quad>, new_focus: Option<Term>) {
        for quad in quads {
            if !self.added_graphs.contains(&quad.graph) {
                self.added_graphs.push(quad.graph.clone());
            }
            self.store.insert(quad);
        }
        if let Some(focus) = new_focus {
            self.focus = Some(focus);
        }
    }

    /// Current focus.
    pub fn focus(&self) -> Option<&Term> {
        self.focus.as_ref()
    }

    /// Move the focus.
    pub fn set_focus(&mut self, focus: Term) {
        self.focus = Some(focus);
    }

    /// Graphs added during this session, in first-seen order.
    pub fn added_graphs(&self) -> &[Term] {
        &self.added_graphs
    }

    /// Focus a freshly built dataset; its description graph becomes the only
    /// added graph, so a later wrap nests this dataset.
    pub fn scope_out_dataset_focus(&mut self, dataset_id: Term, graph: Option<Term>) {
        self.focus = Some(dataset_id);
        self.added_graphs = graph.into_iter().collect();
    }
}

/// A deferred operation.
pub type Task<S> =
    Box<dyn FnOnce(FocusStore<S>) -> BoxFuture<'static, Result<FocusStore<S>, SessionError>> + Send>;

pub(crate) fn boxed_task<S, F, Fut>(run: F) -> Task<S>
where
    F: FnOnce(FocusStore<S>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<FocusStore<S>, SessionError>> + Send + 'static,
{
    Box::new(move |state| Box::pin(run(state)))
}

/// Collected tasks plus the store they start from.
pub(crate) struct Session<S> {
    pub(crate) initial: S,
    pub(crate) tasks: Vec<(&'static str, Task<S>)>,
    /// Tags required at commit, fixed when the task is declared.
    pub(crate) required: BTreeSet<TrustTag>,
}

impl<S> Session<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            initial,
            tasks: Vec::new(),
            required: BTreeSet::new(),
        }
    }
}

impl<S: QuadStore> Session<S> {
    /// Run the tasks in order, stopping at the first failure.
    pub(crate) async fn run_to_completion(self) -> Result<FocusStore<S>, (&'static str, SessionError)> {
        let mut state = FocusStore::new(self.initial);
        for (name, task) in self.tasks {
            state = task(state).await.map_err(|e| (name, e))?;
        }
        Ok(state)
    }
}

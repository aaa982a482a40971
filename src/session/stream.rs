//! Event stream publication.
//!
//! Members are packaged one at a time, each with its own contents,
//! provenance, policy and signature, then published together as a page of a
//! Linked Data Event Stream. Every member is wrapped into a dataset listed
//! with `tree:member`; each page's view links back to the previous one.
//!
//! ```ignore
//! let mut stream = StreamBuilder::new("https://example.org/stream/", "page", options);
//! stream
//!     .build_member(None)?
//!     .member_contents(quads, false)
//!     .member_provenance(Some(Term::named("https://example.org/card")))
//!     .member_policy(PolicyOptions::default().purpose(DPV_SERVICE_PROVISION))
//!     .member_signature(None)
//!     .commit_member()?;
//! let page = stream.commit_page(true).await?;
//! ```

use tracing::{debug, info, warn};

use super::builder::{
    dataset_task, load_quads_task, policy_task, provenance_task, sign_task, PolicyOptions,
};
use super::{boxed_task, FocusStore, Session, SessionError, Task};
use crate::config::PipelineConfig;
use crate::package::{dataset_quads, import_document};
use crate::signature::{create_signature, try_create_signature, SignatureOptions};
use crate::store::QuadStore;
use crate::types::{vocab, Quad, Term};

/// One published page of an event stream.
#[derive(Debug, Clone)]
pub struct EventStreamPage<S> {
    /// Where the page is meant to be published.
    pub url: String,
    /// View node of this page.
    pub view: Term,
    /// Dataset identifiers of the members, in commit order.
    pub members: Vec<Term>,
    /// Page contents.
    pub store: S,
}

impl<S: QuadStore> EventStreamPage<S> {
    /// The page as sorted N-Quads.
    pub fn to_nquads(&self) -> String {
        let mut out = String::new();
        for quad in self.store.all_quads() {
            out.push_str(&quad.to_nquads());
            out.push('\n');
        }
        out
    }
}

/// Packages stream members and publishes them page by page.
pub struct StreamBuilder<S> {
    base_uri: String,
    page_prefix: String,
    stream: Term,
    options: SignatureOptions,
    config: PipelineConfig,
    page_counter: usize,
    previous_view: Option<Term>,
    member: Option<Session<S>>,
    members: Vec<Session<S>>,
}

impl<S> StreamBuilder<S>
where
    S: QuadStore + Clone + Default + Send + Sync + 'static,
{
    /// Create a stream published under `base_uri`, pages named
    /// `{base_uri}{page_prefix}{n}.trig`, maintained by the holder of `options`.
    pub fn new(
        base_uri: impl Into<String>,
        page_prefix: impl Into<String>,
        options: SignatureOptions,
    ) -> Self {
        let base_uri = base_uri.into();
        Self {
            stream: Term::named(format!("{}#stream", base_uri)),
            base_uri,
            page_prefix: page_prefix.into(),
            options,
            config: PipelineConfig::default(),
            page_counter: 0,
            previous_view: None,
            member: None,
            members: Vec::new(),
        }
    }

    /// Use `config` for timeouts.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The stream node.
    pub fn stream(&self) -> &Term {
        &self.stream
    }

    /// Members committed but not yet published.
    pub fn pending_members(&self) -> usize {
        self.members.len()
    }

    /// Start a new member over `store`, or over an empty store.
    pub fn build_member(&mut self, store: Option<S>) -> Result<&mut Self, SessionError> {
        if self.member.is_some() {
            return Err(SessionError::AlreadyOpen);
        }
        self.member = Some(Session::new(store.unwrap_or_default()));
        debug!(stream = %self.stream, "Member started");
        Ok(self)
    }

    fn push(&mut self, name: &'static str, task: Task<S>) -> &mut Self {
        match self.member.as_mut() {
            Some(member) => member.tasks.push((name, task)),
            None => warn!(operation = name, "No member in progress; operation ignored"),
        }
        self
    }

    /// Set the member's contents. Starts a member if none is in progress.
    ///
    /// With `content_dataset`, the contents are wrapped into a dataset that
    /// becomes the focus for later metadata. Otherwise the focus is the
    /// contents' default graph, or their first graph if they had none.
    pub fn member_contents(&mut self, quads: Vec<Quad>, content_dataset: bool) -> &mut Self {
        if self.member.is_none() {
            warn!("No member in progress; starting one");
            self.member = Some(Session::new(S::default()));
        }
        self.push(
            "member_contents",
            boxed_task(move |state| member_contents_task(state, quads, content_dataset)),
        )
    }

    /// Attach a usage policy to the member focus.
    pub fn member_policy(&mut self, policy: PolicyOptions) -> &mut Self {
        self.push(
            "member_policy",
            boxed_task(move |state| async move { policy_task(state, policy) }),
        )
    }

    /// Record provenance for the member focus, issued by the stream maintainer.
    pub fn member_provenance(&mut self, origin: Option<Term>) -> &mut Self {
        let issuer = self.options.issuer.clone();
        self.push(
            "member_provenance",
            boxed_task(move |state| async move { provenance_task(state, origin, issuer) }),
        )
    }

    /// Sign the member focus, as the maintainer or as `signer`.
    pub fn member_signature(&mut self, signer: Option<SignatureOptions>) -> &mut Self {
        let options = signer.unwrap_or_else(|| self.options.clone());
        let timeout = self.config.signature_timeout;
        self.push(
            "member_signature",
            boxed_task(move |state| sign_task(state, options, None, timeout)),
        )
    }

    /// Queue the member in progress for the next page.
    pub fn commit_member(&mut self) -> Result<&mut Self, SessionError> {
        let member = self.member.take().ok_or(SessionError::NoOpenSession)?;
        self.members.push(member);
        Ok(self)
    }

    /// Build every queued member and publish them as the next page.
    ///
    /// With `create_signatures`, the maintainer signs each member dataset.
    /// A failing member aborts the page and drops the queue.
    pub async fn commit_page(&mut self, create_signatures: bool) -> Result<EventStreamPage<S>, SessionError> {
        let queued = std::mem::take(&mut self.members);
        let mut built = Vec::with_capacity(queued.len());
        for member in queued {
            match member.run_to_completion().await {
                Ok(state) => built.push(state.store),
                Err((name, e)) => {
                    warn!(operation = name, error = %e, "Member task failed; page aborted");
                    return Err(e);
                }
            }
        }

        let url = format!("{}{}{}.trig", self.base_uri, self.page_prefix, self.page_counter);
        let view = Term::named(format!("{}#view", url));
        let mut page = S::default();
        page.extend(self.page_header(&view));

        let mut members = Vec::with_capacity(built.len());
        for store in built {
            let (dataset_id, packaged) = self.package_member(store, create_signatures).await?;
            page.extend(packaged.all_quads());
            page.insert(Quad::triple(
                self.stream.clone(),
                Term::named(vocab::tree::MEMBER),
                dataset_id.clone(),
            ));
            members.push(dataset_id);
        }

        self.page_counter += 1;
        self.previous_view = Some(view.clone());
        info!(url = %url, members = members.len(), "Published stream page");

        Ok(EventStreamPage {
            url,
            view,
            members,
            store: page,
        })
    }

    fn page_header(&self, view: &Term) -> Vec<Quad> {
        let rdf_type = Term::named(vocab::rdf::TYPE);
        let mut quads = vec![
            Quad::triple(
                self.stream.clone(),
                rdf_type.clone(),
                Term::named(vocab::ldes::EVENT_STREAM),
            ),
            Quad::triple(self.stream.clone(), Term::named(vocab::tree::VIEW), view.clone()),
            Quad::triple(view.clone(), rdf_type.clone(), Term::named(vocab::tree::NODE)),
        ];
        if let Some(previous) = &self.previous_view {
            let relation = Term::fresh_blank();
            quads.extend([
                Quad::triple(view.clone(), Term::named(vocab::tree::RELATION), relation.clone()),
                Quad::triple(
                    relation.clone(),
                    rdf_type,
                    Term::named(vocab::tree::RELATION_CLASS),
                ),
                Quad::triple(relation, Term::named(vocab::tree::PATH), previous.clone()),
            ]);
        }
        quads
    }

    /// Isolate every graph of a built member, including its default graph,
    /// and wrap them into one dataset.
    async fn package_member(&self, store: S, sign: bool) -> Result<(Term, S), SessionError> {
        let imported = import_document(store.all_quads())?;
        let (dataset_id, _, dataset) = dataset_quads(&imported.graphs, None)?;

        let mut packaged = S::default();
        packaged.extend(imported.quads);
        packaged.extend(dataset);

        if sign {
            let attempt = create_signature(&packaged, &dataset_id, &self.options, None);
            let proof = try_create_signature(attempt, self.config.signature_timeout, &dataset_id).await;
            match proof {
                Some(proof) => packaged.extend(proof.to_quads(&Term::fresh_blank())),
                None => warn!(member = %dataset_id, "Member left without maintainer signature"),
            }
        }
        Ok((dataset_id, packaged))
    }
}

async fn member_contents_task<S: QuadStore + Clone>(
    state: FocusStore<S>,
    quads: Vec<Quad>,
    content_dataset: bool,
) -> Result<FocusStore<S>, SessionError> {
    let mut state = load_quads_task(state, quads).await?;
    if content_dataset {
        return dataset_task(state);
    }
    if state.focus().is_none() {
        if let Some(first) = state.added_graphs().first().cloned() {
            state.set_focus(first);
        }
    }
    Ok(state)
}

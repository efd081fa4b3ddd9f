//! The scheduling loop that drives a run to completion
//!
//! The engine is the single writer of [`RunState`]. Each loop iteration:
//!
//! 1. dispatches every `Pending`/`PendingRevision` branch as a worker task
//! 2. checks the join barrier
//! 3. waits for the next worker completion (or cancellation, or the run
//!    deadline) and applies it
//!
//! Workers are analysis executions and gatekeeper reviews. Each returns a
//! value to the loop; none of them touch the run state.

use crate::barrier::{BarrierStatus, JoinBarrier};
use crate::branch::BranchState;
use crate::config::WorkflowConfig;
use crate::error::{Result, RunAbort};
use crate::gatekeeper::{Gatekeeper, RuleGatekeeper};
use crate::node::{AnalysisNode, AnalysisRequest};
use crate::report::{ReportSink, RunReport};
use crate::retry::RetryController;
use crate::run_state::RunState;
use crate::synthesis::{DecisionDocument, DigestSynthesizer, Synthesizer};
use chrono::Utc;
use equity_core::verdict::reasons;
use equity_core::{AgentId, Artifact, CapabilityError, Subject, Verdict};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

/// Completion reported by a worker task
enum WorkerEvent {
    Produced(std::result::Result<Artifact, CapabilityError>),
    Reviewed(std::result::Result<Verdict, CapabilityError>),
}

type Workers = JoinSet<(AgentId, WorkerEvent)>;

/// Runs the fan-out / review / revise / join / synthesize cycle
///
/// An engine holds no per-run state and can execute any number of runs,
/// concurrently or in sequence.
pub struct GraphEngine {
    config: WorkflowConfig,
    nodes: HashMap<AgentId, Arc<dyn AnalysisNode>>,
    gatekeeper: Arc<dyn Gatekeeper>,
    synthesizer: Arc<dyn Synthesizer>,
    sink: Option<Arc<dyn ReportSink>>,
    retry: RetryController,
}

impl GraphEngine {
    /// Create a new engine builder
    pub fn builder(config: WorkflowConfig) -> GraphEngineBuilder {
        GraphEngineBuilder::new(config)
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Execute one run for `subject`
    pub async fn run(&self, subject: Subject) -> Result<RunReport> {
        self.run_with_cancellation(subject, CancellationToken::new())
            .await
    }

    /// Execute one run, aborting with [`RunAbort::Cancelled`] when `cancel`
    /// fires
    pub async fn run_with_cancellation(
        &self,
        subject: Subject,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, subject = %subject);
        self.execute(run_id, subject, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        subject: Subject,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        // A timeout too large to schedule means no deadline
        let deadline = self
            .config
            .run_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = RunState::new(run_id, subject, &self.config.roster)?;

        info!(
            agents = state.branches().len(),
            max_retries = self.retry.max_retries(),
            "Starting run"
        );

        let token = cancel.child_token();
        let mut workers = Workers::new();
        let joined = self
            .drive(&mut state, &mut workers, &token, deadline)
            .await;

        // Abandon whatever is still in flight; nothing is retried.
        token.cancel();
        workers.shutdown().await;

        if let Err(abort) = joined {
            warn!(error = %abort, "Run aborted");
            return Err(abort);
        }

        let input = state.synthesis_input();
        debug!(
            approved = input.approved.len(),
            unavailable = input.unavailable.len(),
            "Synthesizing"
        );

        let composed = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RunAbort::Cancelled),
            () = wait_until(deadline) => Err(self.timed_out()),
            body = guarded(
                self.synthesizer.compose(&input),
                self.config.synthesis_timeout,
                "synthesis",
            ) => body.map_err(RunAbort::SynthesisFailed),
        };
        let body = composed.inspect_err(|abort| warn!(error = %abort, "Run aborted"))?;

        state.set_final_document(DecisionDocument::assemble(&input, body))?;
        let report = RunReport::from_state(&state, started_at)
            .ok_or_else(|| RunAbort::Internal("final document missing after synthesis".to_string()))?;

        info!(
            approved = state.count_in(BranchState::Approved),
            exhausted = state.count_in(BranchState::FailedExhausted),
            analysis_invocations = report.analysis_invocations,
            review_invocations = report.review_invocations,
            "Run completed"
        );

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.publish(&report).await {
                warn!(error = %err, "Report sink failed; run outcome unchanged");
            }
        }

        Ok(report)
    }

    /// Schedule branches until the join barrier releases or the run aborts
    async fn drive(
        &self,
        state: &mut RunState,
        workers: &mut Workers,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let mut barrier = JoinBarrier::new();
        let mut in_flight: HashSet<AgentId> = HashSet::new();

        loop {
            for agent in state.dispatchable() {
                if !in_flight.insert(agent) {
                    return Err(RunAbort::Internal(format!(
                        "branch '{agent}' dispatched while an execution is in flight"
                    )));
                }
                let request = state.dispatch(agent)?;
                self.spawn_analysis(workers, agent, request, token.clone())?;
            }

            match barrier.check(state) {
                BarrierStatus::Released { .. } => return Ok(()),
                BarrierStatus::AllExhausted => {
                    return Err(RunAbort::AllBranchesExhausted {
                        audit: state.audit(),
                    });
                }
                BarrierStatus::Waiting { .. } => {}
            }

            if workers.is_empty() {
                return Err(RunAbort::Internal(
                    "branches are live but no worker is in flight".to_string(),
                ));
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(RunAbort::Cancelled),
                () = wait_until(deadline) => return Err(self.timed_out()),
                joined = workers.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (agent, event) = joined.map_err(|err| {
                        RunAbort::Internal(format!("worker task failed: {err}"))
                    })?;
                    self.handle(state, workers, &mut in_flight, agent, event, token)?;
                }
            }
        }
    }

    fn handle(
        &self,
        state: &mut RunState,
        workers: &mut Workers,
        in_flight: &mut HashSet<AgentId>,
        agent: AgentId,
        event: WorkerEvent,
        token: &CancellationToken,
    ) -> Result<()> {
        match event {
            WorkerEvent::Produced(produced) => {
                let produced =
                    produced.and_then(|artifact| check_provenance(state.subject(), agent, artifact));
                match produced {
                    Ok(artifact) => {
                        debug!(agent = %agent, sources = artifact.sources.len(), "Artifact produced");
                        state.record_artifact(agent, artifact.clone())?;
                        state.record_review();
                        self.spawn_review(workers, agent, artifact, token.clone());
                        Ok(())
                    }
                    Err(err) => {
                        warn!(agent = %agent, error = %err, "Analysis node failed");
                        state.record_producer_failure(agent)?;
                        let verdict = Verdict::reject([reasons::PRODUCER_FAILED.to_string(), err.to_string()]);
                        self.apply_verdict(state, in_flight, agent, verdict)
                    }
                }
            }
            WorkerEvent::Reviewed(reviewed) => {
                let verdict = reviewed.unwrap_or_else(|err| {
                    warn!(agent = %agent, error = %err, "Gatekeeper failed");
                    Verdict::reject([reasons::GATEKEEPER_FAILED.to_string(), err.to_string()])
                });
                self.apply_verdict(state, in_flight, agent, verdict)
            }
        }
    }

    fn apply_verdict(
        &self,
        state: &mut RunState,
        in_flight: &mut HashSet<AgentId>,
        agent: AgentId,
        verdict: Verdict,
    ) -> Result<()> {
        let branch = state
            .branch(agent)
            .ok_or_else(|| RunAbort::Internal(format!("no branch for agent '{agent}'")))?;
        let trigger = self.retry.decide(branch, &verdict);
        let reasons = verdict.reasons().join("; ");

        let next = state.apply_verdict(agent, verdict, trigger)?;
        in_flight.remove(&agent);

        let revision = state.branch(agent).map_or(0, |branch| branch.revision_count());
        match next {
            BranchState::Approved => info!(agent = %agent, revision, "Artifact approved"),
            BranchState::PendingRevision => {
                info!(agent = %agent, revision, %reasons, "Artifact rejected, revision scheduled");
            }
            BranchState::FailedExhausted => {
                warn!(agent = %agent, revision, %reasons, "Revision budget exhausted");
            }
            other => debug!(agent = %agent, state = %other, "Verdict applied"),
        }
        Ok(())
    }

    fn spawn_analysis(
        &self,
        workers: &mut Workers,
        agent: AgentId,
        request: AnalysisRequest,
        token: CancellationToken,
    ) -> Result<()> {
        let node = self
            .nodes
            .get(&agent)
            .cloned()
            .ok_or_else(|| RunAbort::Internal(format!("no analysis node for '{agent}'")))?;
        let timeout = self.config.node_timeout;

        debug!(agent = %agent, revision = request.revision, "Dispatching analysis");
        workers.spawn(
            async move {
                let produced = tokio::select! {
                    () = token.cancelled() => Err(CapabilityError::internal("analysis cancelled")),
                    produced = guarded(node.analyze(request), timeout, "analysis") => produced,
                };
                (agent, WorkerEvent::Produced(produced))
            }
            .in_current_span(),
        );
        Ok(())
    }

    fn spawn_review(
        &self,
        workers: &mut Workers,
        agent: AgentId,
        artifact: Artifact,
        token: CancellationToken,
    ) {
        let gatekeeper = Arc::clone(&self.gatekeeper);
        let timeout = self.config.review_timeout;

        workers.spawn(
            async move {
                let reviewed = tokio::select! {
                    () = token.cancelled() => Err(CapabilityError::internal("review cancelled")),
                    reviewed = guarded(gatekeeper.review(&artifact), timeout, "review") => reviewed,
                };
                (agent, WorkerEvent::Reviewed(reviewed))
            }
            .in_current_span(),
        );
    }

    fn timed_out(&self) -> RunAbort {
        RunAbort::TimedOut(self.config.run_timeout.unwrap_or_default())
    }
}

/// Builder for GraphEngine
pub struct GraphEngineBuilder {
    config: WorkflowConfig,
    nodes: Vec<Arc<dyn AnalysisNode>>,
    gatekeeper: Option<Arc<dyn Gatekeeper>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    sink: Option<Arc<dyn ReportSink>>,
}

impl GraphEngineBuilder {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            gatekeeper: None,
            synthesizer: None,
            sink: None,
        }
    }

    /// Add the analysis node for one roster member
    pub fn node(mut self, node: Arc<dyn AnalysisNode>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = Arc<dyn AnalysisNode>>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    /// Set the gatekeeper (defaults to [`RuleGatekeeper`])
    pub fn gatekeeper(mut self, gatekeeper: Arc<dyn Gatekeeper>) -> Self {
        self.gatekeeper = Some(gatekeeper);
        self
    }

    /// Set the synthesizer (defaults to [`DigestSynthesizer`])
    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the sink that receives each successful run's report
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the engine; every roster member needs exactly one node
    pub fn build(self) -> Result<GraphEngine> {
        self.config.validate()?;

        let mut nodes: HashMap<AgentId, Arc<dyn AnalysisNode>> = HashMap::new();
        for node in self.nodes {
            let agent = node.agent();
            if !self.config.roster.contains(&agent) {
                debug!(agent = %agent, "Ignoring analysis node outside the roster");
                continue;
            }
            if nodes.insert(agent, node).is_some() {
                return Err(RunAbort::Configuration(format!(
                    "more than one analysis node for '{agent}'"
                )));
            }
        }

        if let Some(missing) = self.config.roster.iter().find(|agent| !nodes.contains_key(agent)) {
            return Err(RunAbort::Configuration(format!(
                "no analysis node configured for '{missing}'"
            )));
        }

        Ok(GraphEngine {
            retry: RetryController::new(self.config.max_retries),
            config: self.config,
            nodes,
            gatekeeper: self
                .gatekeeper
                .unwrap_or_else(|| Arc::new(RuleGatekeeper::new())),
            synthesizer: self
                .synthesizer
                .unwrap_or_else(|| Arc::new(DigestSynthesizer::new())),
            sink: self.sink,
        })
    }
}

/// Reject artifacts produced for another agent or subject
fn check_provenance(
    subject: &Subject,
    agent: AgentId,
    artifact: Artifact,
) -> std::result::Result<Artifact, CapabilityError> {
    if artifact.agent != agent || artifact.subject != *subject {
        return Err(CapabilityError::malformed(format!(
            "{}: expected {agent} on {subject}, got {} on {}",
            reasons::SUBJECT_MISMATCH,
            artifact.agent,
            artifact.subject
        )));
    }
    Ok(artifact)
}

/// Bound a node call by a deadline and turn a panic into an `Internal` error
async fn guarded<T, F>(
    future: F,
    limit: Duration,
    stage: &str,
) -> std::result::Result<T, CapabilityError>
where
    F: Future<Output = std::result::Result<T, CapabilityError>>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(future).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CapabilityError::internal(format!(
            "{stage} panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(CapabilityError::timeout(format!(
            "{stage} exceeded {limit:?}"
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

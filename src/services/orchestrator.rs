//! Execution orchestrator.
//!
//! Owns the registry of live executions keyed by workflow id. Submitting a
//! run resolves its agents, obtains a workflow id, subscribes to updates
//! and spawns the run loop:
//!
//! ```text
//! submit ─▶ registry.insert ─▶ run loop ─┬─ message ─▶ session.dispatch ─▶ snapshot + event
//!                                        ├─ cancel  ─▶ session.cancel ─▶ retire
//!                                        ├─ live stream ends ─▶ resubscribe on simulation
//!                                        └─ workflow_completed ─▶ history.append ─▶ retire
//! ```
//!
//! Each run loop is the only writer of its session; readers get snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::event_bus::{EventBus, EventPayload};
use super::execution_session::{
    DispatchOutcome, ExecutionSession, ExecutionSnapshot, SessionSpec,
};
use super::history_store::HistoryStore;
use crate::domain::errors::{FlowError, OrchestratorError};
use crate::domain::models::{AgentCatalog, AgentDefinition, ExecutionMode, Graph, StreamMessage, WorkflowExecution};
use crate::domain::ports::{ExecutionRequest, ExecutionSubmitter, RunPlan, UpdateSource};

/// Name given to runs assembled from a graph.
pub const CUSTOM_PIPELINE_NAME: &str = "Custom Pipeline";

/// What to execute.
#[derive(Debug, Clone)]
pub enum RunSelection {
    Template(String),
    Graph(Graph),
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub selection: RunSelection,
    pub execution_date: NaiveDate,
    pub parameters: serde_json::Value,
    /// Skip the backend entirely and simulate locally.
    pub simulate: bool,
}

/// How a run loop ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// `workflow_completed` arrived. `recorded` is false when the history
    /// append failed.
    Finished {
        record: Box<WorkflowExecution>,
        recorded: bool,
    },
    Cancelled(Box<ExecutionSnapshot>),
}

/// Caller's view of a submitted run.
#[derive(Debug)]
pub struct ExecutionHandle {
    pub workflow_id: String,
    /// Mode at submission. Snapshots carry the current one.
    pub mode: ExecutionMode,
    pub snapshots: watch::Receiver<ExecutionSnapshot>,
    task: JoinHandle<RunOutcome>,
}

impl ExecutionHandle {
    /// Wait for the run loop to end.
    pub async fn wait(self) -> Result<RunOutcome, OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::Aborted(e.to_string()))
    }
}

struct LiveExecution {
    cancel: watch::Sender<bool>,
    snapshots: watch::Receiver<ExecutionSnapshot>,
}

type Registry = Arc<RwLock<HashMap<String, LiveExecution>>>;

/// Update sources used by the orchestrator.
pub struct UpdateSources {
    /// Used for runs the backend accepted.
    pub live: Arc<dyn UpdateSource>,
    /// Used for local runs.
    pub simulated: Arc<dyn UpdateSource>,
}

pub struct Orchestrator {
    catalog: Arc<AgentCatalog>,
    submitter: Arc<dyn ExecutionSubmitter>,
    sources: UpdateSources,
    history: Arc<HistoryStore>,
    events: Arc<EventBus>,
    registry: Registry,
    simulate_on_submission_failure: bool,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<AgentCatalog>,
        submitter: Arc<dyn ExecutionSubmitter>,
        sources: UpdateSources,
        history: Arc<HistoryStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            catalog,
            submitter,
            sources,
            history,
            events,
            registry: Arc::new(RwLock::new(HashMap::new())),
            simulate_on_submission_failure: false,
        }
    }

    /// Mint a local workflow id and simulate when the backend rejects a
    /// submission.
    pub fn with_submission_fallback(mut self, enabled: bool) -> Self {
        self.simulate_on_submission_failure = enabled;
        self
    }

    pub fn catalog(&self) -> &Arc<AgentCatalog> {
        &self.catalog
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Resolve the selection into agents in execution order, with the
    /// template id and run name.
    fn resolve(&self, selection: &RunSelection) -> Result<(Vec<AgentDefinition>, Option<String>, String), OrchestratorError> {
        let (agent_ids, template_id, name) = match selection {
            RunSelection::Template(id) => {
                let template = self
                    .catalog
                    .template(id)
                    .ok_or_else(|| OrchestratorError::TemplateNotFound(id.clone()))?;
                (template.agent_ids.clone(), Some(template.id.clone()), template.name.clone())
            }
            RunSelection::Graph(graph) => (graph.agent_sequence(), None, CUSTOM_PIPELINE_NAME.to_string()),
        };

        if agent_ids.is_empty() {
            return Err(OrchestratorError::EmptySelection);
        }

        let mut agents: Vec<AgentDefinition> = Vec::with_capacity(agent_ids.len());
        for id in &agent_ids {
            let agent = self
                .catalog
                .agent(id)
                .ok_or_else(|| OrchestratorError::AgentNotFound(id.clone()))?;
            if agents.iter().any(|a| a.id == agent.id) {
                return Err(FlowError::DuplicateAgent(id.clone()).into());
            }
            agents.push(agent.clone());
        }
        Ok((agents, template_id, name))
    }

    /// Obtain a workflow id and pick the update source for it.
    async fn obtain_workflow_id(
        &self,
        request: &RunRequest,
        execution_request: &ExecutionRequest,
    ) -> Result<(String, Arc<dyn UpdateSource>), OrchestratorError> {
        if request.simulate {
            return Ok((local_workflow_id(), Arc::clone(&self.sources.simulated)));
        }
        match self.submitter.submit(execution_request).await {
            Ok(id) => Ok((id, Arc::clone(&self.sources.live))),
            Err(e) if self.simulate_on_submission_failure => {
                let id = local_workflow_id();
                tracing::warn!(error = %e, workflow_id = %id, "submission failed, simulating locally");
                Ok((id, Arc::clone(&self.sources.simulated)))
            }
            Err(e) => {
                tracing::error!(error = %e, "execution submission failed");
                Err(OrchestratorError::Submission(e))
            }
        }
    }

    /// Submit a run and start driving it.
    pub async fn submit(&self, request: RunRequest) -> Result<ExecutionHandle, OrchestratorError> {
        let (agents, template_id, name) = self.resolve(&request.selection)?;
        let execution_request = ExecutionRequest {
            template_id: template_id.clone(),
            agent_ids: agents.iter().map(|a| a.id.clone()).collect(),
            execution_date: request.execution_date,
            parameters: request.parameters.clone(),
        };

        let (workflow_id, source) = self.obtain_workflow_id(&request, &execution_request).await?;
        let plan = RunPlan {
            workflow_id: workflow_id.clone(),
            agents: agents.clone(),
        };
        let subscription = source.subscribe(&plan).await?;

        let session = ExecutionSession::new(SessionSpec {
            workflow_id: workflow_id.clone(),
            name: name.clone(),
            template_id,
            execution_date: request.execution_date,
            agents,
            mode: subscription.mode,
        })?;

        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut registry = self.registry.write().await;
            if registry.contains_key(&workflow_id) {
                return Err(OrchestratorError::AlreadyActive(workflow_id));
            }
            registry.insert(
                workflow_id.clone(),
                LiveExecution {
                    cancel: cancel_tx,
                    snapshots: snapshot_rx.clone(),
                },
            );
        }

        self.events.publish(
            &workflow_id,
            EventPayload::ExecutionSubmitted {
                name,
                mode: subscription.mode,
                agent_count: plan.agents.len(),
            },
        );
        tracing::info!(workflow_id = %workflow_id, mode = %subscription.mode, "execution started");

        let task = tokio::spawn(drive(RunLoop {
            session,
            receiver: subscription.receiver,
            cancel: cancel_rx,
            snapshots: snapshot_tx,
            events: Arc::clone(&self.events),
            history: Arc::clone(&self.history),
            registry: Arc::clone(&self.registry),
            fallback: (subscription.mode == ExecutionMode::Live)
                .then(|| Arc::clone(&self.sources.simulated)),
            plan,
        }));

        Ok(ExecutionHandle {
            workflow_id,
            mode: subscription.mode,
            snapshots: snapshot_rx,
            task,
        })
    }

    /// Request cancellation of a live run.
    pub async fn cancel(&self, workflow_id: &str) -> Result<(), OrchestratorError> {
        let registry = self.registry.read().await;
        let live = registry
            .get(workflow_id)
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(workflow_id.to_string()))?;
        // the run loop may already be retiring
        let _ = live.cancel.send(true);
        Ok(())
    }

    /// Latest snapshot of a live run.
    pub async fn snapshot(&self, workflow_id: &str) -> Option<ExecutionSnapshot> {
        self.registry
            .read()
            .await
            .get(workflow_id)
            .map(|live| live.snapshots.borrow().clone())
    }

    pub async fn active_executions(&self) -> Vec<String> {
        self.registry.read().await.keys().cloned().collect()
    }
}

fn local_workflow_id() -> String {
    format!("local-{}", Uuid::new_v4())
}

struct RunLoop {
    session: ExecutionSession,
    receiver: mpsc::Receiver<StreamMessage>,
    cancel: watch::Receiver<bool>,
    snapshots: watch::Sender<ExecutionSnapshot>,
    events: Arc<EventBus>,
    history: Arc<HistoryStore>,
    registry: Registry,
    /// Takes over once if a live stream ends early.
    fallback: Option<Arc<dyn UpdateSource>>,
    plan: RunPlan,
}

impl RunLoop {
    fn publish_state(&self) {
        let flow = self.session.flow();
        let _ = self.snapshots.send(self.session.snapshot());
        self.events.publish(
            self.session.workflow_id(),
            EventPayload::StateChanged {
                status: self.session.status(),
                completed_steps: flow.completed_steps,
                total_steps: flow.total_steps,
                overall_progress: flow.overall_progress,
            },
        );
    }

    /// Resubscribe through the fallback source. Returns false when there is
    /// none left or it cannot be opened.
    async fn switch_to_fallback(&mut self) -> bool {
        let Some(fallback) = self.fallback.take() else {
            return false;
        };
        match fallback.subscribe(&self.plan).await {
            Ok(subscription) => {
                tracing::warn!(
                    workflow_id = %self.plan.workflow_id,
                    mode = %subscription.mode,
                    "update stream lost mid-run, continuing on fallback source"
                );
                self.receiver = subscription.receiver;
                self.session.switch_mode(subscription.mode);
                self.events.publish(
                    &self.plan.workflow_id,
                    EventPayload::SourceSwitched {
                        mode: subscription.mode,
                    },
                );
                self.publish_state();
                true
            }
            Err(e) => {
                tracing::error!(workflow_id = %self.plan.workflow_id, error = %e, "fallback source unavailable");
                false
            }
        }
    }

    async fn retire(&self) {
        self.registry.write().await.remove(self.session.workflow_id());
    }
}

/// Drain the update stream one message at a time until the run finishes or
/// is cancelled.
async fn drive(mut run: RunLoop) -> RunOutcome {
    let workflow_id = run.session.workflow_id().to_string();
    let mut stream_open = true;
    let mut cancel_open = true;

    loop {
        tokio::select! {
            biased;

            changed = run.cancel.changed(), if cancel_open => {
                if changed.is_err() {
                    cancel_open = false;
                    continue;
                }
                if !*run.cancel.borrow_and_update() {
                    continue;
                }
                if let Err(e) = run.session.cancel() {
                    tracing::warn!(workflow_id = %workflow_id, error = %e, "cancel ignored");
                    continue;
                }
                run.publish_state();
                run.events.publish(
                    &workflow_id,
                    EventPayload::ExecutionCancelled {
                        overall_progress: run.session.flow().overall_progress,
                    },
                );
                run.retire().await;
                return RunOutcome::Cancelled(Box::new(run.session.snapshot()));
            }

            message = run.receiver.recv(), if stream_open => {
                let Some(message) = message else {
                    run.events.publish(&workflow_id, EventPayload::StreamEnded);
                    if run.switch_to_fallback().await {
                        continue;
                    }
                    stream_open = false;
                    tracing::warn!(workflow_id = %workflow_id, "update stream ended before workflow_completed, execution parked");
                    continue;
                };

                match run.session.dispatch(&message) {
                    Ok(DispatchOutcome::Continue) => run.publish_state(),
                    Ok(DispatchOutcome::Finished) => {
                        run.publish_state();
                        return finalize(&run).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            workflow_id = %workflow_id,
                            message_type = %message.message_type,
                            agent = message.agent_name.as_deref().unwrap_or("-"),
                            error = %e,
                            "dropping stream message"
                        );
                        run.events.publish(
                            &workflow_id,
                            EventPayload::MessageRejected {
                                message_type: message.message_type,
                                reason: e.to_string(),
                            },
                        );
                    }
                }
            }

            else => {
                // nothing can reach this run any more
                tracing::warn!(workflow_id = %workflow_id, "execution abandoned while parked");
                let _ = run.session.cancel();
                run.retire().await;
                return RunOutcome::Cancelled(Box::new(run.session.snapshot()));
            }
        }
    }
}

async fn finalize(run: &RunLoop) -> RunOutcome {
    let record = run.session.to_record();
    let recorded = match run.history.append(record.clone()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(workflow_id = %record.workflow_id, error = %e, "failed to record execution history");
            false
        }
    };
    run.events.publish(
        &record.workflow_id,
        EventPayload::ExecutionFinalized {
            status: record.status,
            recorded,
        },
    );
    run.retire().await;
    RunOutcome::Finished {
        record: Box::new(record),
        recorded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::BackendError;
    use crate::domain::ports::NullHistoryRepository;
    use async_trait::async_trait;

    struct RejectingSubmitter;

    #[async_trait]
    impl ExecutionSubmitter for RejectingSubmitter {
        async fn submit(&self, _request: &ExecutionRequest) -> Result<String, BackendError> {
            Err(BackendError::Status {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    struct FixedSubmitter;

    #[async_trait]
    impl ExecutionSubmitter for FixedSubmitter {
        async fn submit(&self, _request: &ExecutionRequest) -> Result<String, BackendError> {
            Ok("wf-fixed".into())
        }
    }

    /// Never sends anything; keeps the run parked.
    struct SilentSource;

    #[async_trait]
    impl UpdateSource for SilentSource {
        async fn subscribe(
            &self,
            _plan: &RunPlan,
        ) -> Result<crate::domain::ports::UpdateSubscription, crate::domain::errors::ChannelError> {
            let (tx, rx) = mpsc::channel(1);
            // keep the sender alive so the stream never ends
            std::mem::forget(tx);
            Ok(crate::domain::ports::UpdateSubscription {
                receiver: rx,
                mode: ExecutionMode::Simulated,
            })
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(AgentCatalog::builtin()),
            Arc::new(RejectingSubmitter),
            UpdateSources {
                live: Arc::new(SilentSource),
                simulated: Arc::new(SilentSource),
            },
            Arc::new(HistoryStore::new(Arc::new(NullHistoryRepository::new()))),
            Arc::new(EventBus::default()),
        )
    }

    fn request(selection: RunSelection, simulate: bool) -> RunRequest {
        RunRequest {
            selection,
            execution_date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            parameters: serde_json::Value::Null,
            simulate,
        }
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let err = orchestrator()
            .submit(request(RunSelection::Template("nope".into()), true))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_graph_rejected() {
        let orchestrator = orchestrator();
        let graph = Graph::new(Arc::clone(orchestrator.catalog()));
        let err = orchestrator
            .submit(request(RunSelection::Graph(graph), true))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::EmptySelection));
    }

    #[tokio::test]
    async fn test_submission_failure_surfaces_without_fallback() {
        let err = orchestrator()
            .submit(request(RunSelection::Template("risk-sweep".into()), false))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Submission(BackendError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_submission_failure_falls_back_to_local_id() {
        let orchestrator = orchestrator().with_submission_fallback(true);
        let handle = orchestrator
            .submit(request(RunSelection::Template("risk-sweep".into()), false))
            .await
            .unwrap();
        assert!(handle.workflow_id.starts_with("local-"));
        assert_eq!(orchestrator.active_executions().await, vec![handle.workflow_id.clone()]);
    }

    #[tokio::test]
    async fn test_cancel_retires_parked_execution() {
        let orchestrator = orchestrator();
        let handle = orchestrator
            .submit(request(RunSelection::Template("daily-performance-review".into()), true))
            .await
            .unwrap();
        let id = handle.workflow_id.clone();
        assert!(orchestrator.snapshot(&id).await.is_some());

        orchestrator.cancel(&id).await.unwrap();
        let outcome = handle.wait().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled(_)));
        assert!(orchestrator.active_executions().await.is_empty());
        assert!(matches!(
            orchestrator.cancel(&id).await,
            Err(OrchestratorError::ExecutionNotFound(_))
        ));
        assert!(orchestrator.history().is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_workflow_id_rejected_while_active() {
        let orchestrator = Orchestrator::new(
            Arc::new(AgentCatalog::builtin()),
            Arc::new(FixedSubmitter),
            UpdateSources {
                live: Arc::new(SilentSource),
                simulated: Arc::new(SilentSource),
            },
            Arc::new(HistoryStore::new(Arc::new(NullHistoryRepository::new()))),
            Arc::new(EventBus::default()),
        );
        let first = orchestrator
            .submit(request(RunSelection::Template("risk-sweep".into()), false))
            .await
            .unwrap();
        assert_eq!(first.workflow_id, "wf-fixed");

        let err = orchestrator
            .submit(request(RunSelection::Template("risk-sweep".into()), false))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyActive(ref id) if id == "wf-fixed"));
        assert_eq!(orchestrator.active_executions().await.len(), 1);
    }
}

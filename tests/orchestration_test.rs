//! End-to-end orchestration: submission, streaming dispatch, cancellation
//! and history recording.

mod common;

use std::sync::Arc;
use std::time::Duration;

use agentflow::domain::errors::OrchestratorError;
use agentflow::domain::models::{
    AgentStatus, ExecutionMode, ExecutionStatus, StepStatus, StreamMessage,
};
use agentflow::services::{EventPayload, RunOutcome, RunRequest, RunSelection, SessionStatus};
use common::*;

const TEMPLATE: &str = "daily-performance-review";

fn template_request(simulate: bool) -> RunRequest {
    RunRequest {
        selection: RunSelection::Template(TEMPLATE.to_string()),
        execution_date: date(15),
        parameters: serde_json::Value::Null,
        simulate,
    }
}

async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

#[tokio::test]
async fn test_simulated_run_completes_and_is_recorded() {
    let history = memory_history();
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        instant_simulation(&[]),
        Arc::clone(&history),
    );

    let handle = orchestrator.submit(template_request(true)).await.unwrap();
    assert!(handle.workflow_id.starts_with("local-"));
    assert_eq!(handle.mode, ExecutionMode::Simulated);
    let snapshots = handle.snapshots.clone();

    let RunOutcome::Finished { record, recorded } = within(handle.wait()).await.unwrap() else {
        panic!("expected a finished run");
    };
    assert!(recorded);
    assert_eq!(record.status, ExecutionStatus::Completed);
    // two initialization steps, five per agent, three completion steps
    assert_eq!(record.steps.len(), 20);
    assert!(record.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(record.performance_metrics.success_rate, 100);
    assert_eq!(record.performance_metrics.error_count, 0);
    assert!(record.performance_metrics.total_insights > 0);

    let last = snapshots.borrow().clone();
    assert_eq!(last.status, SessionStatus::Completed);
    assert_eq!(last.flow.overall_progress, 100);
    assert_eq!(last.flow.completed_steps, last.flow.total_steps);

    assert_eq!(history.len().await, 1);
    assert!(history.get(&record.workflow_id).await.is_some());
    assert!(orchestrator.active_executions().await.is_empty());
}

#[tokio::test]
async fn test_agent_error_fails_the_run() {
    let history = memory_history();
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        instant_simulation(&["Routing Optimizer"]),
        Arc::clone(&history),
    );

    let handle = orchestrator.submit(template_request(true)).await.unwrap();
    let RunOutcome::Finished { record, .. } = within(handle.wait()).await.unwrap() else {
        panic!("expected a finished run");
    };

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.performance_metrics.error_count, 1);
    let failed: Vec<_> = record
        .agent_details
        .iter()
        .filter(|d| d.status == AgentStatus::Error)
        .map(|d| d.agent_name.as_str())
        .collect();
    assert_eq!(failed, vec!["Routing Optimizer"]);
    // failed runs are recorded too
    assert_eq!(history.len().await, 1);
}

#[tokio::test]
async fn test_cancel_freezes_progress_and_records_nothing() {
    let history = memory_history();
    let live = Arc::new(ScriptedSource::live());
    let orchestrator = orchestrator(
        Arc::new(StaticSubmitter("wf-live-1".into())),
        Arc::clone(&live) as _,
        instant_simulation(&[]),
        Arc::clone(&history),
    );

    let handle = orchestrator.submit(template_request(false)).await.unwrap();
    assert_eq!(handle.workflow_id, "wf-live-1");
    assert_eq!(handle.mode, ExecutionMode::Live);

    let tx = live.take_sender();
    let mut snapshots = handle.snapshots.clone();
    tx.send(StreamMessage::workflow_started("wf-live-1")).await.unwrap();
    tx.send(StreamMessage::agent_started("wf-live-1", "Performance Analyzer")).await.unwrap();
    tx.send(StreamMessage::agent_progress("wf-live-1", "Performance Analyzer", 50, Some("crunching")))
        .await
        .unwrap();

    let before = within(snapshots.wait_for(|s| {
        s.agents
            .iter()
            .any(|a| a.agent_name == "Performance Analyzer" && a.current_step_label.as_deref() == Some("crunching"))
    }))
    .await
    .unwrap()
    .clone();
    assert!(before.flow.overall_progress > 0);
    assert!(before.flow.overall_progress < 100);

    orchestrator.cancel("wf-live-1").await.unwrap();
    let RunOutcome::Cancelled(snapshot) = within(handle.wait()).await.unwrap() else {
        panic!("expected a cancelled run");
    };

    assert_eq!(snapshot.status, SessionStatus::Cancelled);
    assert_eq!(snapshot.flow.overall_progress, before.flow.overall_progress);
    assert_eq!(snapshot.flow.completed_steps, before.flow.completed_steps);
    assert!(snapshot.flow.running_steps().next().is_none());
    let analyzer = snapshot
        .agents
        .iter()
        .find(|a| a.agent_name == "Performance Analyzer")
        .unwrap();
    assert_eq!(analyzer.status, AgentStatus::Error);

    // later messages have nowhere to go
    let _ = tx.send(StreamMessage::workflow_completed("wf-live-1")).await;
    assert!(history.is_empty().await);
    assert!(matches!(
        orchestrator.cancel("wf-live-1").await,
        Err(OrchestratorError::ExecutionNotFound(_))
    ));
}

#[tokio::test]
async fn test_rejected_messages_are_published_and_skipped() {
    let live = Arc::new(ScriptedSource::live());
    let orchestrator = orchestrator(
        Arc::new(StaticSubmitter("wf-live-2".into())),
        Arc::clone(&live) as _,
        instant_simulation(&[]),
        memory_history(),
    );
    let mut events = orchestrator.events().subscribe();

    let handle = orchestrator.submit(template_request(false)).await.unwrap();
    let tx = live.take_sender();

    tx.send(StreamMessage::workflow_started("wf-other")).await.unwrap();
    tx.send(StreamMessage::agent_started("wf-live-2", "Ghost Agent")).await.unwrap();

    let mut rejected = Vec::new();
    while rejected.len() < 2 {
        let event = within(events.recv()).await.unwrap();
        assert_eq!(event.workflow_id, "wf-live-2");
        if let EventPayload::MessageRejected { reason, .. } = event.payload {
            rejected.push(reason);
        }
    }
    assert!(rejected[0].contains("wf-other"));
    assert!(rejected[1].contains("Ghost Agent"));

    // the run is untouched and still live
    let snapshot = orchestrator.snapshot("wf-live-2").await.unwrap();
    assert_eq!(snapshot.flow.completed_steps, 0);
    assert!(snapshot.agents.iter().all(|a| a.status == AgentStatus::Idle));

    orchestrator.cancel("wf-live-2").await.unwrap();
    within(handle.wait()).await.unwrap();
}

#[tokio::test]
async fn test_live_stream_lost_mid_run_continues_on_simulation() {
    let history = memory_history();
    let live = Arc::new(ScriptedSource::live());
    let orchestrator = orchestrator(
        Arc::new(StaticSubmitter("wf-live-3".into())),
        Arc::clone(&live) as _,
        instant_simulation(&[]),
        Arc::clone(&history),
    );
    let mut events = orchestrator.events().subscribe();

    let handle = orchestrator.submit(template_request(false)).await.unwrap();
    assert_eq!(handle.mode, ExecutionMode::Live);
    let mut snapshots = handle.snapshots.clone();

    let tx = live.take_sender();
    tx.send(StreamMessage::workflow_started("wf-live-3")).await.unwrap();
    tx.send(StreamMessage::agent_started("wf-live-3", "Performance Analyzer")).await.unwrap();
    within(snapshots.wait_for(|s| {
        s.agents
            .iter()
            .any(|a| a.agent_name == "Performance Analyzer" && a.status == AgentStatus::Running)
    }))
    .await
    .unwrap();
    drop(tx);

    let RunOutcome::Finished { record, recorded } = within(handle.wait()).await.unwrap() else {
        panic!("expected a finished run");
    };
    assert!(recorded);
    assert_eq!(record.workflow_id, "wf-live-3");
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.execution_environment.mode, ExecutionMode::Simulated);
    assert!(record.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert!(record.agent_details.iter().all(|d| d.status == AgentStatus::Completed));
    assert_eq!(snapshots.borrow().mode, ExecutionMode::Simulated);
    assert!(history.get("wf-live-3").await.is_some());

    let mut ended = false;
    let mut switched = false;
    while let Ok(event) = events.try_recv() {
        match event.payload {
            EventPayload::StreamEnded => ended = true,
            EventPayload::SourceSwitched { mode } => {
                assert!(ended);
                assert_eq!(mode, ExecutionMode::Simulated);
                switched = true;
            }
            _ => {}
        }
    }
    assert!(switched);
}

#[tokio::test]
async fn test_simulated_stream_ending_early_parks_the_run() {
    let scripted = Arc::new(ScriptedSource::default());
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        Arc::clone(&scripted) as _,
        memory_history(),
    );
    let mut events = orchestrator.events().subscribe();

    let handle = orchestrator.submit(template_request(true)).await.unwrap();
    let workflow_id = handle.workflow_id.clone();
    let tx = scripted.take_sender();
    tx.send(StreamMessage::workflow_started(&workflow_id)).await.unwrap();
    drop(tx);

    loop {
        let event = within(events.recv()).await.unwrap();
        assert!(!matches!(event.payload, EventPayload::SourceSwitched { .. }));
        if event.payload == EventPayload::StreamEnded {
            break;
        }
    }
    // parked, not finished: still registered and cancellable
    let snapshot = orchestrator.snapshot(&workflow_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Running);
    orchestrator.cancel(&workflow_id).await.unwrap();
    assert!(matches!(within(handle.wait()).await.unwrap(), RunOutcome::Cancelled(_)));
}

#[tokio::test]
async fn test_out_of_order_agent_start_is_rejected() {
    let live = Arc::new(ScriptedSource::live());
    let orchestrator = orchestrator(
        Arc::new(StaticSubmitter("wf-live-4".into())),
        Arc::clone(&live) as _,
        instant_simulation(&[]),
        memory_history(),
    );
    let mut events = orchestrator.events().subscribe();

    let handle = orchestrator.submit(template_request(false)).await.unwrap();
    let tx = live.take_sender();
    tx.send(StreamMessage::workflow_started("wf-live-4")).await.unwrap();
    tx.send(StreamMessage::agent_started("wf-live-4", "Report Generator")).await.unwrap();

    let reason = loop {
        let event = within(events.recv()).await.unwrap();
        if let EventPayload::MessageRejected { reason, .. } = event.payload {
            break reason;
        }
    };
    assert!(reason.contains("Report Generator"));
    assert!(reason.contains("Performance Analyzer"));

    let snapshot = orchestrator.snapshot("wf-live-4").await.unwrap();
    assert!(snapshot.agents.iter().all(|a| a.status == AgentStatus::Idle));

    orchestrator.cancel("wf-live-4").await.unwrap();
    within(handle.wait()).await.unwrap();
}

#[tokio::test]
async fn test_event_sequence_is_monotonic() {
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        instant_simulation(&[]),
        memory_history(),
    );
    let mut events = orchestrator.events().subscribe();

    let handle = orchestrator.submit(template_request(true)).await.unwrap();
    within(handle.wait()).await.unwrap();

    let mut last = None;
    let mut finalized = false;
    while let Ok(event) = events.try_recv() {
        if let Some(previous) = last {
            assert!(event.sequence > previous);
        }
        last = Some(event.sequence);
        if let EventPayload::ExecutionFinalized { status, recorded } = event.payload {
            assert_eq!(status, ExecutionStatus::Completed);
            assert!(recorded);
            finalized = true;
        }
    }
    assert!(finalized);
}

#[tokio::test]
async fn test_submission_failure_without_fallback() {
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        instant_simulation(&[]),
        memory_history(),
    );

    let err = orchestrator.submit(template_request(false)).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Submission(_)));
    assert!(orchestrator.active_executions().await.is_empty());
}

#[tokio::test]
async fn test_submission_failure_with_fallback_simulates() {
    let history = memory_history();
    let orchestrator = orchestrator(
        Arc::new(OfflineSubmitter),
        Arc::new(ScriptedSource::default()),
        instant_simulation(&[]),
        Arc::clone(&history),
    )
    .with_submission_fallback(true);

    let handle = orchestrator.submit(template_request(false)).await.unwrap();
    assert_eq!(handle.mode, ExecutionMode::Simulated);
    assert!(matches!(within(handle.wait()).await.unwrap(), RunOutcome::Finished { .. }));
    assert_eq!(history.len().await, 1);
}

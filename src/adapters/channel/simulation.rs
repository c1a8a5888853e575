//! Local simulation of a run's lifecycle messages.
//!
//! Used whenever the live channel is unavailable. The schedule mirrors what
//! the backend emits:
//!
//! ```text
//! workflow_started
//! per agent: agent_started, agent_progress x N, agent_completed | agent_error
//! workflow_completed
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::ChannelError;
use crate::domain::models::{AgentDefinition, ExecutionMode, SimulationConfig, StreamMessage};
use crate::domain::ports::{RunPlan, UpdateSource, UpdateSubscription};

#[derive(Debug, Clone)]
pub struct SimulatedUpdateSource {
    tick: Duration,
    progress_updates: u8,
    fail_agents: Vec<String>,
}

impl SimulatedUpdateSource {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.tick_ms),
            progress_updates: config.progress_updates,
            fail_agents: config.fail_agents.clone(),
        }
    }

    fn should_fail(&self, agent: &AgentDefinition) -> bool {
        self.fail_agents.iter().any(|name| agent.matches_name(name))
    }

    /// Full message schedule for a plan, in emission order.
    pub fn schedule(&self, plan: &RunPlan) -> Vec<StreamMessage> {
        let wf = plan.workflow_id.as_str();
        let steps = u16::from(self.progress_updates) + 1;
        let mut messages = vec![StreamMessage::workflow_started(wf)];

        for (index, agent) in plan.agents.iter().enumerate() {
            messages.push(StreamMessage::agent_started(wf, &agent.name));
            for i in 1..steps {
                let progress = u8::try_from(i * 100 / steps).unwrap_or(100);
                messages.push(StreamMessage::agent_progress(
                    wf,
                    &agent.name,
                    progress,
                    Some(&format!("{}: {progress}%", agent.name)),
                ));
            }
            if self.should_fail(agent) {
                messages.push(StreamMessage::agent_error(
                    wf,
                    &agent.name,
                    &format!("{} failed during simulated execution", agent.name),
                ));
            } else {
                messages.push(StreamMessage::agent_completed(wf, &agent.name, Some(simulated_result(agent, index))));
            }
        }

        messages.push(StreamMessage::workflow_completed(wf));
        messages
    }
}

fn simulated_result(agent: &AgentDefinition, index: usize) -> serde_json::Value {
    let insights: Vec<String> = agent
        .outputs
        .iter()
        .map(|output| format!("{} produced {}", agent.name, output.replace('_', " ")))
        .collect();
    serde_json::json!({
        "summary": format!("{} finished", agent.name),
        "insights": insights,
        "performanceScore": 90 - (index % 5) * 2,
    })
}

#[async_trait]
impl UpdateSource for SimulatedUpdateSource {
    async fn subscribe(&self, plan: &RunPlan) -> Result<UpdateSubscription, ChannelError> {
        let messages = self.schedule(plan);
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        let tick = self.tick;
        let workflow_id = plan.workflow_id.clone();

        tracing::info!(workflow_id = %workflow_id, messages = messages.len(), "starting simulated run");

        tokio::spawn(async move {
            for message in messages {
                tokio::time::sleep(tick).await;
                if tx.send(message).await.is_err() {
                    tracing::debug!(workflow_id = %workflow_id, "simulation receiver dropped");
                    return;
                }
            }
        });

        Ok(UpdateSubscription {
            receiver: rx,
            mode: ExecutionMode::Simulated,
        })
    }
}

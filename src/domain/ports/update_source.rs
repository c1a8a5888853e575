//! Streaming update source port.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::ChannelError;
use crate::domain::models::{AgentDefinition, ExecutionMode, StreamMessage};

/// What a source needs to know about the run it reports on.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub workflow_id: String,
    /// Agents in execution order.
    pub agents: Vec<AgentDefinition>,
}

/// An open stream of lifecycle messages for one run.
#[derive(Debug)]
pub struct UpdateSubscription {
    pub receiver: mpsc::Receiver<StreamMessage>,
    pub mode: ExecutionMode,
}

/// Delivers lifecycle messages for a workflow.
///
/// The stream ends when the receiver yields `None`; a source that stalls
/// simply stops sending.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn subscribe(&self, plan: &RunPlan) -> Result<UpdateSubscription, ChannelError>;
}

//! Streaming update protocol.
//!
//! Every frame is a flat JSON object:
//!
//! ```json
//! {"type": "agent_progress", "workflowId": "wf-1", "agentName": "Fraud Detector", "progress": 40}
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    WorkflowStarted,
    AgentStarted,
    AgentProgress,
    AgentCompleted,
    AgentError,
    WorkflowCompleted,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStarted => "workflow_started",
            Self::AgentStarted => "agent_started",
            Self::AgentProgress => "agent_progress",
            Self::AgentCompleted => "agent_completed",
            Self::AgentError => "agent_error",
            Self::WorkflowCompleted => "workflow_completed",
        }
    }

    /// Whether messages of this type must name an agent.
    pub fn targets_agent(&self) -> bool {
        matches!(
            self,
            Self::AgentStarted | Self::AgentProgress | Self::AgentCompleted | Self::AgentError
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event on the update channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamMessage {
    fn new(message_type: MessageType, workflow_id: &str) -> Self {
        Self {
            message_type,
            workflow_id: workflow_id.to_string(),
            agent_name: None,
            progress: None,
            message: None,
            result: None,
            error: None,
        }
    }

    pub fn workflow_started(workflow_id: &str) -> Self {
        Self::new(MessageType::WorkflowStarted, workflow_id)
    }

    pub fn agent_started(workflow_id: &str, agent_name: &str) -> Self {
        Self {
            agent_name: Some(agent_name.to_string()),
            ..Self::new(MessageType::AgentStarted, workflow_id)
        }
    }

    pub fn agent_progress(workflow_id: &str, agent_name: &str, progress: u8, message: Option<&str>) -> Self {
        Self {
            agent_name: Some(agent_name.to_string()),
            progress: Some(progress),
            message: message.map(str::to_string),
            ..Self::new(MessageType::AgentProgress, workflow_id)
        }
    }

    pub fn agent_completed(workflow_id: &str, agent_name: &str, result: Option<serde_json::Value>) -> Self {
        Self {
            agent_name: Some(agent_name.to_string()),
            result,
            ..Self::new(MessageType::AgentCompleted, workflow_id)
        }
    }

    pub fn agent_error(workflow_id: &str, agent_name: &str, error: &str) -> Self {
        Self {
            agent_name: Some(agent_name.to_string()),
            error: Some(error.to_string()),
            ..Self::new(MessageType::AgentError, workflow_id)
        }
    }

    pub fn workflow_completed(workflow_id: &str) -> Self {
        Self::new(MessageType::WorkflowCompleted, workflow_id)
    }
}

//! Live update source backed by a WebSocket connection.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::domain::errors::ChannelError;
use crate::domain::models::{ChannelConfig, ExecutionMode, StreamMessage};
use crate::domain::ports::{RunPlan, UpdateSource, UpdateSubscription};

const CHANNEL_CAPACITY: usize = 256;

/// Subscribes to `ws_url_template` with `{workflow_id}` substituted.
#[derive(Debug, Clone)]
pub struct WebSocketUpdateSource {
    url_template: String,
    connect_timeout: Duration,
}

impl WebSocketUpdateSource {
    pub fn new(url_template: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url_template: url_template.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(
            config.ws_url_template.clone(),
            Duration::from_millis(config.connect_timeout_ms),
        )
    }

    /// Resolve the channel URL for a workflow.
    pub fn url_for(&self, workflow_id: &str) -> Result<String, ChannelError> {
        let url = self.url_template.replace("{workflow_id}", workflow_id);
        if url.starts_with("ws://") || url.starts_with("wss://") {
            Ok(url)
        } else {
            Err(ChannelError::InvalidUrl(url))
        }
    }
}

#[async_trait]
impl UpdateSource for WebSocketUpdateSource {
    async fn subscribe(&self, plan: &RunPlan) -> Result<UpdateSubscription, ChannelError> {
        let url = self.url_for(&plan.workflow_id)?;

        let connect = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()));
        let (ws_stream, _) = connect
            .await
            .map_err(|_| {
                ChannelError::Timeout(u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX))
            })?
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        tracing::info!(workflow_id = %plan.workflow_id, url = %url, "update channel connected");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(forward_frames(ws_stream, tx, plan.workflow_id.clone()));

        Ok(UpdateSubscription {
            receiver: rx,
            mode: ExecutionMode::Live,
        })
    }
}

/// Decode frames into messages until the socket closes or the receiver
/// goes away. Malformed frames are skipped.
async fn forward_frames<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    tx: mpsc::Sender<StreamMessage>,
    workflow_id: String,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<StreamMessage>(text.as_str()) {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        tracing::debug!(workflow_id = %workflow_id, "update receiver dropped, closing channel");
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(workflow_id = %workflow_id, error = %e, frame = %text.as_str(), "skipping malformed frame");
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = sink.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                tracing::info!(workflow_id = %workflow_id, "update channel closed by server");
                return;
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!(workflow_id = %workflow_id, "ignoring binary frame");
            }
            Ok(Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(workflow_id = %workflow_id, error = %e, "update channel error");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessageType;
    use tokio::net::TcpListener;

    fn plan(workflow_id: &str) -> RunPlan {
        RunPlan {
            workflow_id: workflow_id.to_string(),
            agents: vec![],
        }
    }

    #[test]
    fn test_url_for_substitutes_workflow_id() {
        let source = WebSocketUpdateSource::new("ws://host:9000/ws/{workflow_id}", Duration::from_secs(1));
        assert_eq!(source.url_for("wf-7").unwrap(), "ws://host:9000/ws/wf-7");

        let source = WebSocketUpdateSource::new("http://host/{workflow_id}", Duration::from_secs(1));
        assert!(matches!(source.url_for("wf-7"), Err(ChannelError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = WebSocketUpdateSource::new(format!("ws://127.0.0.1:{port}/{{workflow_id}}"), Duration::from_secs(2));
        let err = source.subscribe(&plan("wf-1")).await.unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_forwards_valid_frames_and_skips_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text("not json".into())).await.unwrap();
            let started = serde_json::to_string(&StreamMessage::workflow_started("wf-1")).unwrap();
            ws.send(Message::Text(started.into())).await.unwrap();
            ws.send(Message::Close(None)).await.unwrap();
        });

        let source = WebSocketUpdateSource::new(format!("ws://{addr}/ws/{{workflow_id}}"), Duration::from_secs(2));
        let mut subscription = source.subscribe(&plan("wf-1")).await.unwrap();
        assert_eq!(subscription.mode, ExecutionMode::Live);

        let first = subscription.receiver.recv().await.unwrap();
        assert_eq!(first.message_type, MessageType::WorkflowStarted);
        assert!(subscription.receiver.recv().await.is_none());
    }
}

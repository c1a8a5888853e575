//! Live-first update source that degrades to simulation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::ChannelError;
use crate::domain::ports::{RunPlan, UpdateSource, UpdateSubscription};

/// Tries `primary`; when it cannot be established, subscribes to
/// `fallback` instead.
#[derive(Clone)]
pub struct FallbackUpdateSource {
    primary: Arc<dyn UpdateSource>,
    fallback: Arc<dyn UpdateSource>,
}

impl FallbackUpdateSource {
    pub fn new(primary: Arc<dyn UpdateSource>, fallback: Arc<dyn UpdateSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl UpdateSource for FallbackUpdateSource {
    async fn subscribe(&self, plan: &RunPlan) -> Result<UpdateSubscription, ChannelError> {
        match self.primary.subscribe(plan).await {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                tracing::warn!(
                    workflow_id = %plan.workflow_id,
                    error = %e,
                    "live update channel unavailable, falling back to simulation"
                );
                self.fallback.subscribe(plan).await
            }
        }
    }
}

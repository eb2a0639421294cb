use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    models::{InteractionType, ProductId, UserId},
    services::sources::InteractionSink,
};

/// What happened to a tracking request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TrackOutcome {
    Recorded,
    Skipped(String),
}

/// Best-effort recording of user interactions
///
/// Failures are logged and reported as [`TrackOutcome::Skipped`]; they never
/// abort the caller's own workflow. Recording does not touch cached
/// recommendations.
#[derive(Clone)]
pub struct InteractionTracker {
    sink: Arc<dyn InteractionSink>,
}

impl InteractionTracker {
    pub fn new(sink: Arc<dyn InteractionSink>) -> Self {
        Self { sink }
    }

    pub async fn track(
        &self,
        user_id: UserId,
        product_id: ProductId,
        interaction_type: InteractionType,
    ) -> TrackOutcome {
        match self.sink.record(user_id, product_id, interaction_type).await {
            Ok(_) => {
                debug!(user_id, product_id, %interaction_type, "Interaction recorded");
                TrackOutcome::Recorded
            }
            Err(e) => {
                warn!(
                    user_id,
                    product_id,
                    %interaction_type,
                    error = %e,
                    "Failed to track interaction"
                );
                TrackOutcome::Skipped(e.to_string())
            }
        }
    }
}

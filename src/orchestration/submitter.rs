use crate::connectors::StepSubmitter;
use crate::constants::events;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestration::types::{ClusterId, StepDefinition, StepId};
use crate::partition::PartitionKey;
use std::sync::Arc;
use tracing::{info, warn};

/// Submits rendered steps to the fixed cluster
pub struct JobSubmitter {
    cluster_id: ClusterId,
    submitter: Arc<dyn StepSubmitter>,
}

impl JobSubmitter {
    pub fn new(cluster_id: ClusterId, submitter: Arc<dyn StepSubmitter>) -> Self {
        Self {
            cluster_id,
            submitter,
        }
    }

    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    /// Returns the step ids in submission order; never empty on success
    pub async fn submit(
        &self,
        partition: &PartitionKey,
        steps: &[StepDefinition],
    ) -> PipelineResult<Vec<StepId>> {
        if steps.is_empty() {
            return Err(self.error("no steps to submit"));
        }

        let ids = self
            .submitter
            .add_steps(&self.cluster_id, steps)
            .await
            .map_err(|e| self.error(e.to_string()))?;

        if ids.is_empty() {
            return Err(self.error("cluster returned no step ids"));
        }
        if ids.len() != steps.len() {
            warn!(
                partition = %partition,
                cluster_id = %self.cluster_id,
                submitted = steps.len(),
                returned = ids.len(),
                "Cluster returned a different number of step ids than steps submitted"
            );
        }

        // Logged so a cancelled run can be reconciled against the cluster by hand
        info!(
            event = events::STEPS_SUBMITTED,
            partition = %partition,
            cluster_id = %self.cluster_id,
            step_ids = ?ids,
            "Submitted batch steps"
        );
        Ok(ids)
    }

    fn error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::Submission {
            cluster_id: self.cluster_id.to_string(),
            reason: reason.into(),
        }
    }
}

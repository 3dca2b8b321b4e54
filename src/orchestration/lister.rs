use crate::connectors::ObjectLister;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestration::types::ListingResult;
use crate::partition::RunContext;
use std::sync::Arc;
use tracing::info;

/// Lists the partition's `YYYY/MM/DD` prefix in the configured bucket
pub struct InventoryLister {
    lister: Arc<dyn ObjectLister>,
}

impl InventoryLister {
    pub fn new(lister: Arc<dyn ObjectLister>) -> Self {
        Self { lister }
    }

    pub async fn list(&self, ctx: &RunContext) -> PipelineResult<ListingResult> {
        let bucket = ctx.bucket();
        let prefix = ctx.partition().storage_prefix();
        let delimiter = ctx
            .config()
            .storage
            .delimiter
            .as_deref()
            .filter(|d| !d.is_empty());

        let keys = self
            .lister
            .list_keys(bucket, &prefix, delimiter)
            .await
            .map_err(|e| PipelineError::Listing {
                bucket: bucket.to_string(),
                prefix: prefix.clone(),
                reason: e.to_string(),
            })?;

        info!(
            partition = %ctx.partition(),
            bucket = %bucket,
            prefix = %prefix,
            count = keys.len(),
            "Listed partition inventory"
        );
        Ok(ListingResult::new(keys))
    }
}

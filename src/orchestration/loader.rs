use crate::connectors::WarehouseExecutor;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestration::types::WarehouseTarget;
use crate::partition::RunContext;
use std::sync::Arc;
use tracing::info;

/// Executes the parameterized load statement once per successful run
pub struct WarehouseLoader {
    executor: Arc<dyn WarehouseExecutor>,
}

impl WarehouseLoader {
    pub fn new(executor: Arc<dyn WarehouseExecutor>) -> Self {
        Self { executor }
    }

    /// Read and render the load statement for the run's partition
    pub async fn prepare(&self, ctx: &RunContext) -> PipelineResult<String> {
        render_statement(ctx).await
    }

    pub async fn load(&self, ctx: &RunContext) -> PipelineResult<WarehouseTarget> {
        let target = ctx.warehouse_target();
        let statement = self.prepare(ctx).await?;

        self.executor
            .execute(&target, &statement)
            .await
            .map_err(|e| load_error(&target, e.to_string()))?;

        info!(
            partition = %ctx.partition(),
            target = %target,
            "Loaded partition into warehouse"
        );
        Ok(target)
    }
}

/// Render the configured SQL file without executing it
pub async fn render_statement(ctx: &RunContext) -> PipelineResult<String> {
    let target = ctx.warehouse_target();
    let path = ctx.config().warehouse.resolved_sql_path();

    let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
        load_error(&target, format!("cannot read {}: {e}", path.display()))
    })?;

    ctx.template_vars()
        .with_warehouse(&target)
        .render(&path.display().to_string(), &source)
        .map_err(|e| load_error(&target, e.to_string()))
}

fn load_error(target: &WarehouseTarget, reason: String) -> PipelineError {
    PipelineError::Load {
        database: target.database.clone(),
        schema: target.schema.clone(),
        reason,
    }
}

use crate::config::{PipelineConfig, StepTemplate};
use crate::error::PipelineResult;
use crate::orchestration::types::StepDefinition;
use crate::partition::RunContext;
use tracing::debug;

/// Renders the configured step templates for one partition
#[derive(Debug, Clone)]
pub struct BatchTrigger {
    templates: Vec<StepTemplate>,
}

impl BatchTrigger {
    pub fn new(templates: Vec<StepTemplate>) -> Self {
        Self { templates }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cluster.steps.clone())
    }

    pub fn templates(&self) -> &[StepTemplate] {
        &self.templates
    }

    /// Concrete steps in configured order. Any unknown placeholder fails the
    /// whole render so nothing is submitted.
    pub fn render(&self, ctx: &RunContext) -> PipelineResult<Vec<StepDefinition>> {
        let vars = ctx.template_vars();

        self.templates
            .iter()
            .map(|template| {
                let source = format!("step '{}'", template.name);
                let args = template
                    .args
                    .iter()
                    .map(|arg| vars.render(&source, arg))
                    .collect::<PipelineResult<Vec<_>>>()?;

                debug!(
                    partition = %ctx.partition(),
                    step = %template.name,
                    args = ?args,
                    "Rendered batch step"
                );

                Ok(StepDefinition {
                    name: vars.render(&source, &template.name)?,
                    action_on_failure: template.action_on_failure,
                    jar: template.jar.clone(),
                    args,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::orchestration::types::ActionOnFailure;
    use crate::partition::PartitionKey;
    use std::sync::Arc;

    fn context() -> RunContext {
        RunContext::new(
            PartitionKey::parse("2024-01-05").unwrap(),
            Arc::new(PipelineConfig::default()),
        )
    }

    #[test]
    fn test_default_step_carries_path_and_job_date() {
        let ctx = context();
        let steps = BatchTrigger::from_config(ctx.config()).render(&ctx).unwrap();

        assert_eq!(steps.len(), 1);
        let step = &steps[0];
        assert_eq!(step.name, "sales_processing");
        assert_eq!(step.jar, "command-runner.jar");
        assert_eq!(step.action_on_failure, ActionOnFailure::Continue);
        assert_eq!(
            step.args,
            vec![
                "/usr/bin/spark-submit",
                "--master",
                "yarn",
                "s3://sales-landing/pyspark_sales.py",
                "20240105",
                "s3://sales-landing/2024/01/05/",
            ]
        );
    }

    #[test]
    fn test_unknown_placeholder_fails_render() {
        let trigger = BatchTrigger::new(vec![StepTemplate {
            name: "broken".to_string(),
            action_on_failure: ActionOnFailure::TerminateCluster,
            jar: "command-runner.jar".to_string(),
            args: vec!["{{ run_id }}".to_string()],
        }]);

        let err = trigger.render(&context()).unwrap_err();
        assert!(matches!(err, PipelineError::Template { .. }));
        assert!(err.to_string().contains("step 'broken'"));
    }

    #[test]
    fn test_no_templates_renders_nothing() {
        assert!(BatchTrigger::new(vec![])
            .render(&context())
            .unwrap()
            .is_empty());
    }
}

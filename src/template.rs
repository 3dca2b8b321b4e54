//! Placeholder rendering for step arguments and warehouse statements.
//!
//! Only `{{ name }}` substitution is supported. Unknown names and unclosed
//! braces are errors so a half-rendered command never reaches the cluster.

use crate::error::{PipelineError, PipelineResult};
use crate::orchestration::types::WarehouseTarget;
use crate::partition::PartitionKey;
use std::collections::BTreeMap;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ds`, `ds_nodash`, `prefix` and `bucket` for one partition
    pub fn for_partition(partition: &PartitionKey, bucket: &str) -> Self {
        Self::new()
            .with("ds", partition.ds())
            .with("ds_nodash", partition.job_date())
            .with("prefix", partition.storage_prefix())
            .with("bucket", bucket)
    }

    pub fn with_warehouse(self, target: &WarehouseTarget) -> Self {
        self.with("database", &target.database)
            .with("schema", &target.schema)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Render `input`; `source` names the template in error messages
    pub fn render(&self, source: &str, input: &str) -> PipelineResult<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| PipelineError::Template {
                template: source.to_string(),
                reason: format!("unclosed '{OPEN}'"),
            })?;

            let name = after[..end].trim();
            let value = self.get(name).ok_or_else(|| PipelineError::Template {
                template: source.to_string(),
                reason: format!("unknown placeholder '{name}'"),
            })?;
            out.push_str(value);
            rest = &after[end + CLOSE.len()..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars::for_partition(&PartitionKey::parse("2024-01-05").unwrap(), "landing")
    }

    #[test]
    fn test_partition_placeholders() {
        let rendered = vars()
            .render("args", "s3://{{ bucket }}/{{prefix}}/ {{ ds_nodash }} {{ ds }}")
            .unwrap();
        assert_eq!(rendered, "s3://landing/2024/01/05/ 20240105 2024-01-05");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(vars().render("args", "--master").unwrap(), "--master");
        assert_eq!(vars().render("args", "").unwrap(), "");
    }

    #[test]
    fn test_unknown_and_unclosed_placeholders_fail() {
        let err = vars().render("sql", "select {{ missing }}").unwrap_err();
        assert!(err.to_string().contains("unknown placeholder 'missing'"));

        let err = vars().render("sql", "select {{ ds").unwrap_err();
        assert!(matches!(err, PipelineError::Template { .. }));
    }

    #[test]
    fn test_warehouse_placeholders() {
        let target = WarehouseTarget {
            database: "sales_db".to_string(),
            schema: "sales_schema".to_string(),
        };
        let rendered = vars()
            .with_warehouse(&target)
            .render("sql", "use {{ database }}.{{ schema }}")
            .unwrap();
        assert_eq!(rendered, "use sales_db.sales_schema");
    }
}

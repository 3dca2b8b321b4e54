//! Postgres-protocol warehouse connector.

use super::{ConnectorError, ConnectorResult, WarehouseExecutor};
use crate::orchestration::types::WarehouseTarget;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    /// Build a lazily connecting pool; nothing touches the network until the first load
    pub fn connect_lazy(url: &str) -> ConnectorResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WarehouseExecutor for PgWarehouse {
    async fn execute(&self, target: &WarehouseTarget, statement: &str) -> ConnectorResult<()> {
        let mut tx = self.pool.begin().await?;

        let (database,): (String,) = sqlx::query_as("SELECT current_database()")
            .fetch_one(&mut *tx)
            .await?;
        if database != target.database {
            return Err(ConnectorError::DatabaseMismatch {
                expected: target.database.clone(),
                actual: database,
            });
        }

        let search_path = format!("SET LOCAL search_path TO {}", quote_identifier(&target.schema));
        sqlx::query(&search_path).execute(&mut *tx).await?;
        debug!(target = %target, "Executing load statement");

        let result = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(statement)).await?;
        tx.commit().await?;

        info!(target = %target, rows_affected = result.rows_affected(), "Load statement committed");
        Ok(())
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

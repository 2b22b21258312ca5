use std::future::Future;
use std::pin::Pin;

use keel_core::config::MigrationConfig;
use keel_core::{KeelError, Result};
use sqlx::postgres::PgConnection;
use tracing::debug;

use super::ddl::PostgresDdl;
use crate::executor::{OperationGroup, SchemaApplier};

/// Applies groups by executing their rendered DDL on the transaction's connection.
#[derive(Debug, Clone)]
pub struct PostgresApplier {
    ddl: PostgresDdl,
}

impl PostgresApplier {
    pub fn new(ddl: PostgresDdl) -> Self {
        Self { ddl }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(
            PostgresDdl::new(config.schema.clone())
                .with_prefixes(config.table_prefix.clone(), config.column_prefix.clone()),
        )
    }

    pub fn ddl(&self) -> &PostgresDdl {
        &self.ddl
    }
}

impl SchemaApplier<PgConnection> for PostgresApplier {
    fn apply<'a>(
        &'a self,
        conn: &'a mut PgConnection,
        group: &'a OperationGroup,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for sql in self.ddl.render(group)? {
                debug!(table = %group.table, sql = %sql, "Executing");
                sqlx::query(&sql)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| KeelError::Apply {
                        operation: group.parent.kind().to_string(),
                        message: format!("{} ({})", e, sql),
                    })?;
            }
            Ok(())
        })
    }
}

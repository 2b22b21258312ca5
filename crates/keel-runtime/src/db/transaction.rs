use std::future::Future;
use std::pin::Pin;

use sqlx::postgres::{PgConnection, Postgres};

use keel_core::{KeelError, Result};

use crate::executor::MigrationTransaction;

/// Transaction type migration runs execute in.
pub type PgTransaction = sqlx::Transaction<'static, Postgres>;

impl MigrationTransaction for PgTransaction {
    type Connection = PgConnection;

    fn connection(&mut self) -> &mut PgConnection {
        &mut **self
    }

    fn commit(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async move {
            sqlx::Transaction::commit(self)
                .await
                .map_err(|e| KeelError::Database(format!("Failed to commit: {}", e)))
        })
    }

    fn rollback(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async move {
            sqlx::Transaction::rollback(self)
                .await
                .map_err(|e| KeelError::Database(format!("Failed to roll back: {}", e)))
        })
    }
}

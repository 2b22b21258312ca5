//! In-memory doubles for exercising migrations without a database.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use keel_core::{AbstractDatabase, KeelError, Result};
use tokio::sync::RwLock;

use crate::executor::{MigrationTransaction, OperationGroup, SchemaApplier};
use crate::introspect::Introspector;

/// Connection that records what happened on it.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    pub events: Vec<String>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }
}

/// Applier that records every group it is handed.
#[derive(Clone, Default)]
pub struct MockApplier {
    groups: Arc<RwLock<Vec<OperationGroup>>>,
    fail_on: Option<String>,
}

impl MockApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to apply a group for `table`.
    pub fn failing_on(table: impl Into<String>) -> Self {
        Self {
            groups: Arc::new(RwLock::new(Vec::new())),
            fail_on: Some(table.into()),
        }
    }

    /// Get applied groups.
    pub async fn groups(&self) -> Vec<OperationGroup> {
        self.groups.read().await.clone()
    }
}

impl SchemaApplier<MockConnection> for MockApplier {
    fn apply<'a>(
        &'a self,
        conn: &'a mut MockConnection,
        group: &'a OperationGroup,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_on.as_deref() == Some(group.table.as_str()) {
                return Err(KeelError::Apply {
                    operation: group.parent.kind().to_string(),
                    message: format!("refused to apply {}", group.table),
                });
            }
            conn.record(format!("apply {}", group.table));
            self.groups.write().await.push(group.clone());
            Ok(())
        })
    }
}

/// How a mock transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

/// State shared between a [`MockTransaction`] and the test inspecting it.
#[derive(Debug, Clone, Default)]
pub struct TransactionRecord {
    pub outcome: Option<TransactionOutcome>,
    pub events: Vec<String>,
}

/// Transaction over a [`MockConnection`] that records how it was settled.
pub struct MockTransaction {
    conn: MockConnection,
    record: Arc<RwLock<TransactionRecord>>,
}

impl MockTransaction {
    pub fn new() -> Self {
        Self {
            conn: MockConnection::new(),
            record: Arc::new(RwLock::new(TransactionRecord::default())),
        }
    }

    /// Handle that stays readable after the transaction is consumed.
    pub fn record(&self) -> Arc<RwLock<TransactionRecord>> {
        self.record.clone()
    }

    fn settle(self, outcome: TransactionOutcome) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        let Self { conn, record } = self;
        Box::pin(async move {
            let mut record = record.write().await;
            record.outcome = Some(outcome);
            record.events = conn.events;
            Ok(())
        })
    }
}

impl Default for MockTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationTransaction for MockTransaction {
    type Connection = MockConnection;

    fn connection(&mut self) -> &mut MockConnection {
        &mut self.conn
    }

    fn commit(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        self.settle(TransactionOutcome::Committed)
    }

    fn rollback(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        self.settle(TransactionOutcome::RolledBack)
    }
}

/// Introspector returning a fixed model.
#[derive(Clone, Default)]
pub struct MockIntrospector {
    database: AbstractDatabase,
    namespaces: Arc<RwLock<Vec<String>>>,
}

impl MockIntrospector {
    pub fn new(database: AbstractDatabase) -> Self {
        Self {
            database,
            namespaces: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the namespaces that were introspected.
    pub async fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().await.clone()
    }
}

impl Introspector for MockIntrospector {
    fn introspect<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AbstractDatabase>> + Send + 'a>> {
        Box::pin(async move {
            self.namespaces.write().await.push(namespace.to_string());
            Ok(self.database.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Operation;

    #[tokio::test]
    async fn test_mock_transaction_records_commit() {
        let mut tx = MockTransaction::new();
        let record = tx.record();
        tx.connection().record("hello");
        tx.commit().await.unwrap();

        let record = record.read().await;
        assert_eq!(record.outcome, Some(TransactionOutcome::Committed));
        assert_eq!(record.events, vec!["hello"]);
    }

    #[tokio::test]
    async fn test_mock_applier_failure() {
        let applier = MockApplier::failing_on("users");
        let group = OperationGroup {
            kind: crate::executor::GroupKind::Drop,
            table: "users".into(),
            parent: Operation::TableDrop {
                table: "users".into(),
            },
            children: vec![],
        };
        let mut conn = MockConnection::new();
        assert!(applier.apply(&mut conn, &group).await.is_err());
        assert!(applier.groups().await.is_empty());
        assert!(conn.events.is_empty());
    }

    #[tokio::test]
    async fn test_mock_introspector_records_namespace() {
        let introspector = MockIntrospector::new(AbstractDatabase::new());
        let db = introspector.introspect("public").await.unwrap();
        assert!(db.is_empty());
        assert_eq!(introspector.namespaces().await, vec!["public"]);
    }
}

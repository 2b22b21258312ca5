//! End-to-end migration runs: build, introspect, diff, sort, apply.

use std::sync::Arc;

use keel_core::config::MigrationConfig;
use keel_core::{AbstractDatabase, Operation, Result, ScalarTypeMapper, TypeSchema};
use serde::Serialize;
use sqlx::postgres::PgConnection;
use tracing::{debug, info, warn};

use crate::applier::PostgresApplier;
use crate::builder::{BuildOptions, Diagnostic, SchemaModelBuilder};
use crate::db::Database;
use crate::diff::{DiffEngine, DiffOptions};
use crate::executor::{MigrationExecutor, MigrationTransaction};
use crate::introspect::{Introspector, PostgresIntrospector};
use crate::plugin::PluginCatalog;
use crate::sort::OperationSorter;

/// Outcome of planning a run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    pub current: AbstractDatabase,
    pub target: AbstractDatabase,
    /// Sorted operations turning `current` into `target`.
    pub operations: Vec<Operation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Drives a migration run against one schema namespace.
pub struct Migrator<C> {
    config: MigrationConfig,
    introspector: Arc<dyn Introspector>,
    executor: MigrationExecutor<C>,
}

impl Migrator<PgConnection> {
    /// Migrator reading and writing through `db`, with the configured plugins enabled.
    pub fn postgres(db: &Database, config: MigrationConfig) -> Result<Self> {
        let hooks = PluginCatalog::with_builtins().resolve(&config.plugins)?;
        let introspector = PostgresIntrospector::new(
            db.pool().clone(),
            config.table_prefix.clone(),
            config.column_prefix.clone(),
        );
        let executor = MigrationExecutor::new(PostgresApplier::from_config(&config)).with_hooks(hooks);
        Ok(Self::new(config, introspector, executor))
    }
}

impl<C: Send> Migrator<C> {
    pub fn new<I: Introspector + 'static>(
        config: MigrationConfig,
        introspector: I,
        executor: MigrationExecutor<C>,
    ) -> Self {
        Self {
            config,
            introspector: Arc::new(introspector),
            executor,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn build(&self, schema: &TypeSchema) -> (AbstractDatabase, Vec<Diagnostic>) {
        let output = SchemaModelBuilder::new(schema)
            .with_scalars(ScalarTypeMapper::with_overrides(self.config.scalars.clone()))
            .with_options(BuildOptions {
                lowercase_names: self.config.lowercase_names,
                list_as_json: self.config.list_as_json,
            })
            .build();
        (output.database, output.diagnostics)
    }

    /// Compute the sorted operations without touching the database schema.
    pub async fn plan(&self, schema: &TypeSchema) -> Result<MigrationPlan> {
        let ((target, diagnostics), current) = tokio::join!(
            async { self.build(schema) },
            self.introspector.introspect(&self.config.schema)
        );
        let current = current?;

        for diagnostic in &diagnostics {
            warn!(%diagnostic, "Omitted from target model");
        }

        let mut operations = DiffEngine::with_options(DiffOptions {
            update_comments: self.config.update_comments,
        })
        .diff(&current, &target);
        OperationSorter::sort(&mut operations);

        if self.config.debug {
            debug!(model = %serde_json::to_string(&current)?, "Current model");
            debug!(model = %serde_json::to_string(&target)?, "Target model");
            debug!(operations = %serde_json::to_string(&operations)?, "Planned operations");
        }

        info!(
            schema = %self.config.schema,
            operations = operations.len(),
            "Migration planned"
        );

        Ok(MigrationPlan {
            current,
            target,
            operations,
            diagnostics,
        })
    }

    /// Plan and apply inside `tx`. Returns the applied operations; on failure nothing
    /// is kept.
    pub async fn run<T>(&self, schema: &TypeSchema, tx: T) -> Result<Vec<Operation>>
    where
        T: MigrationTransaction<Connection = C>,
    {
        let plan = self.plan(schema).await?;
        if plan.is_empty() {
            info!("Database is up to date");
        }
        self.executor.execute(tx, plan.operations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockApplier, MockConnection, MockIntrospector, MockTransaction, TransactionOutcome,
    };
    use keel_core::{FieldDefinition, OperationKind, Table, TableColumn, TypeDefinition, TypeRef};
    use keel_core::ColumnType;

    fn schema() -> TypeSchema {
        TypeSchema::new().with_type(
            TypeDefinition::object("User")
                .field(FieldDefinition::new("id", TypeRef::named("ID").non_null()))
                .field(FieldDefinition::new("name", TypeRef::named("String").non_null())),
        )
    }

    fn migrator(current: AbstractDatabase, applier: MockApplier) -> Migrator<MockConnection> {
        Migrator::new(
            MigrationConfig::default(),
            MockIntrospector::new(current),
            MigrationExecutor::new(applier),
        )
    }

    #[tokio::test]
    async fn test_plan_against_empty_database() {
        let introspector = MockIntrospector::new(AbstractDatabase::new());
        let migrator = Migrator::new(
            MigrationConfig::default(),
            introspector.clone(),
            MigrationExecutor::<MockConnection>::new(MockApplier::new()),
        );

        let plan = migrator.plan(&schema()).await.unwrap();
        assert_eq!(plan.operations[0].kind(), OperationKind::TableCreate);
        assert_eq!(plan.target.len(), 1);
        assert!(plan.diagnostics.is_empty());
        assert_eq!(introspector.namespaces().await, vec!["public"]);
    }

    #[tokio::test]
    async fn test_run_commits_and_applies() {
        let applier = MockApplier::new();
        let migrator = migrator(AbstractDatabase::new(), applier.clone());

        let tx = MockTransaction::new();
        let record = tx.record();
        let applied = migrator.run(&schema(), tx).await.unwrap();

        assert_eq!(applied[0], Operation::TableCreate { table: "User".into() });
        assert_eq!(applier.groups().await.len(), 1);
        assert_eq!(record.read().await.outcome, Some(TransactionOutcome::Committed));
    }

    #[tokio::test]
    async fn test_up_to_date_database_plans_nothing() {
        let current = migrator(AbstractDatabase::new(), MockApplier::new())
            .plan(&schema())
            .await
            .unwrap()
            .target;

        let plan = migrator(current, MockApplier::new())
            .plan(&schema())
            .await
            .unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_columns_run_first() {
        let mut table: Table = Table::new("User");
        table.push_column(TableColumn::new("id", ColumnType::Uuid).not_null()).unwrap();
        table.push_column(TableColumn::new("legacy", ColumnType::Text)).unwrap();
        table.add_primary(None, "id");
        let current = AbstractDatabase::from_tables([table]);

        let plan = migrator(current, MockApplier::new())
            .plan(&schema())
            .await
            .unwrap();
        assert_eq!(
            plan.operations[0],
            Operation::ColumnDrop {
                table: "User".into(),
                column: "legacy".into(),
            }
        );
    }

    #[test]
    fn test_unknown_plugin_is_rejected() {
        let config = MigrationConfig {
            plugins: vec!["audit".to_string()],
            ..Default::default()
        };
        let catalog: PluginCatalog<MockConnection> = PluginCatalog::with_builtins();
        assert!(catalog.resolve(&config.plugins).is_err());
    }
}

pub mod applier;
pub mod builder;
pub mod db;
pub mod diff;
pub mod executor;
pub mod introspect;
pub mod migrator;
pub mod plugin;
pub mod sort;
pub mod testing;

pub use applier::{PostgresApplier, PostgresDdl};
pub use builder::{BuildOptions, BuildOutput, Diagnostic, SchemaModelBuilder};
pub use db::{Database, PgTransaction};
pub use diff::{DiffEngine, DiffOptions};
pub use executor::{GroupKind, MigrationExecutor, MigrationTransaction, OperationGroup, SchemaApplier};
pub use introspect::{Introspector, PostgresIntrospector};
pub use migrator::{MigrationPlan, Migrator};
pub use plugin::{HookPhase, HookRegistry, OperationLogPlugin, Plugin, PluginCatalog};
pub use sort::OperationSorter;

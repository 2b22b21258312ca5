//! keel - keeps a Postgres schema in sync with a declarative type schema.
//!
//! The target model is derived from the type schema, the current model is read from the
//! database, and the difference is applied as sorted, grouped operations inside a single
//! transaction.

#[doc(hidden)]
pub use keel_core;
#[doc(hidden)]
pub use keel_runtime;

pub use keel_core::{KeelConfig, KeelError, Operation, Result, TypeSchema};
pub use keel_runtime::{Database, MigrationPlan, Migrator};

pub mod prelude {
    pub use keel_core::config::{DatabaseConfig, MigrationConfig};
    pub use keel_core::{
        AbstractDatabase, ColumnType, KeelConfig, KeelError, Operation, OperationKind, Result,
        Table, TableColumn, TypeSchema,
    };
    pub use keel_runtime::{
        Database, DiffEngine, HookPhase, HookRegistry, MigrationExecutor, MigrationPlan,
        Migrator, OperationSorter, Plugin, PluginCatalog, SchemaModelBuilder,
    };
}

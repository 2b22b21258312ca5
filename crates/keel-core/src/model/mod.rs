//! Abstract relational model shared by the builder, the introspector and the diff engine.

mod column;
mod database;
mod table;

pub use column::{ColumnType, ForeignKey, TableColumn, UnresolvedForeignKey};
pub use database::AbstractDatabase;
pub use table::{Index, Primary, Table, Unique};

/// Key/value directives parsed from a description.
pub type Annotations = serde_json::Map<String, serde_json::Value>;

pub mod annotations;
pub mod config;
pub mod error;
pub mod model;
pub mod operation;
pub mod scalar;
pub mod type_schema;

pub use annotations::AnnotationParser;
pub use config::KeelConfig;
pub use error::{KeelError, Result};
pub use model::{AbstractDatabase, Annotations, ColumnType, ForeignKey, Table, TableColumn};
pub use operation::{Operation, OperationKind};
pub use scalar::{ColumnSpec, ScalarTypeMapper};
pub use type_schema::{FieldDefinition, TypeDefinition, TypeRef, TypeSchema};

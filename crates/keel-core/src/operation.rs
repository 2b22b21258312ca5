use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ColumnType, ForeignKey};

/// One schema mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    #[serde(rename = "table.create")]
    TableCreate { table: String },

    #[serde(rename = "table.rename", rename_all = "camelCase")]
    TableRename { from_name: String, to_name: String },

    #[serde(rename = "table.comment.set")]
    TableCommentSet {
        table: String,
        comment: Option<String>,
    },

    #[serde(rename = "table.drop")]
    TableDrop { table: String },

    #[serde(rename = "table.index.create", rename_all = "camelCase")]
    TableIndexCreate {
        table: String,
        columns: Vec<String>,
        index_name: Option<String>,
        index_type: Option<String>,
    },

    #[serde(rename = "table.index.drop", rename_all = "camelCase")]
    TableIndexDrop {
        table: String,
        columns: Vec<String>,
        index_name: Option<String>,
    },

    #[serde(rename = "table.unique.create", rename_all = "camelCase")]
    TableUniqueCreate {
        table: String,
        columns: Vec<String>,
        index_name: Option<String>,
    },

    #[serde(rename = "table.unique.drop", rename_all = "camelCase")]
    TableUniqueDrop {
        table: String,
        columns: Vec<String>,
        index_name: Option<String>,
    },

    /// `columns: None` removes the primary key. `previous_name` is the name of the
    /// primary being replaced when it does not carry the default name.
    #[serde(rename = "table.primary.set", rename_all = "camelCase")]
    TablePrimarySet {
        table: String,
        columns: Option<Vec<String>>,
        index_name: Option<String>,
        #[serde(default)]
        previous_name: Option<String>,
    },

    #[serde(rename = "table.foreign.create")]
    TableForeignCreate {
        table: String,
        column: String,
        reference: ForeignKey,
    },

    #[serde(rename = "table.foreign.drop")]
    TableForeignDrop { table: String, column: String },

    #[serde(rename = "column.create", rename_all = "camelCase")]
    ColumnCreate {
        table: String,
        column: String,
        column_type: ColumnType,
        args: Vec<Value>,
    },

    #[serde(rename = "column.rename", rename_all = "camelCase")]
    ColumnRename {
        table: String,
        from_name: String,
        to_name: String,
    },

    #[serde(rename = "column.type.set", rename_all = "camelCase")]
    ColumnTypeSet {
        table: String,
        column: String,
        column_type: ColumnType,
        args: Vec<Value>,
    },

    #[serde(rename = "column.comment.set")]
    ColumnCommentSet {
        table: String,
        column: String,
        comment: Option<String>,
    },

    #[serde(rename = "column.nullable.set")]
    ColumnNullableSet {
        table: String,
        column: String,
        nullable: bool,
    },

    /// `value: None` removes the default.
    #[serde(rename = "column.default.set")]
    ColumnDefaultSet {
        table: String,
        column: String,
        value: Option<Value>,
    },

    #[serde(rename = "column.drop")]
    ColumnDrop { table: String, column: String },
}

/// Discriminant of [`Operation`], used to key hooks and sort priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    TableCreate,
    TableRename,
    TableCommentSet,
    TableDrop,
    TableIndexCreate,
    TableIndexDrop,
    TableUniqueCreate,
    TableUniqueDrop,
    TablePrimarySet,
    TableForeignCreate,
    TableForeignDrop,
    ColumnCreate,
    ColumnRename,
    ColumnTypeSet,
    ColumnCommentSet,
    ColumnNullableSet,
    ColumnDefaultSet,
    ColumnDrop,
}

impl OperationKind {
    pub const ALL: [OperationKind; 18] = [
        OperationKind::TableCreate,
        OperationKind::TableRename,
        OperationKind::TableCommentSet,
        OperationKind::TableDrop,
        OperationKind::TableIndexCreate,
        OperationKind::TableIndexDrop,
        OperationKind::TableUniqueCreate,
        OperationKind::TableUniqueDrop,
        OperationKind::TablePrimarySet,
        OperationKind::TableForeignCreate,
        OperationKind::TableForeignDrop,
        OperationKind::ColumnCreate,
        OperationKind::ColumnRename,
        OperationKind::ColumnTypeSet,
        OperationKind::ColumnCommentSet,
        OperationKind::ColumnNullableSet,
        OperationKind::ColumnDefaultSet,
        OperationKind::ColumnDrop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::TableCreate => "table.create",
            OperationKind::TableRename => "table.rename",
            OperationKind::TableCommentSet => "table.comment.set",
            OperationKind::TableDrop => "table.drop",
            OperationKind::TableIndexCreate => "table.index.create",
            OperationKind::TableIndexDrop => "table.index.drop",
            OperationKind::TableUniqueCreate => "table.unique.create",
            OperationKind::TableUniqueDrop => "table.unique.drop",
            OperationKind::TablePrimarySet => "table.primary.set",
            OperationKind::TableForeignCreate => "table.foreign.create",
            OperationKind::TableForeignDrop => "table.foreign.drop",
            OperationKind::ColumnCreate => "column.create",
            OperationKind::ColumnRename => "column.rename",
            OperationKind::ColumnTypeSet => "column.type.set",
            OperationKind::ColumnCommentSet => "column.comment.set",
            OperationKind::ColumnNullableSet => "column.nullable.set",
            OperationKind::ColumnDefaultSet => "column.default.set",
            OperationKind::ColumnDrop => "column.drop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::TableCreate { .. } => OperationKind::TableCreate,
            Operation::TableRename { .. } => OperationKind::TableRename,
            Operation::TableCommentSet { .. } => OperationKind::TableCommentSet,
            Operation::TableDrop { .. } => OperationKind::TableDrop,
            Operation::TableIndexCreate { .. } => OperationKind::TableIndexCreate,
            Operation::TableIndexDrop { .. } => OperationKind::TableIndexDrop,
            Operation::TableUniqueCreate { .. } => OperationKind::TableUniqueCreate,
            Operation::TableUniqueDrop { .. } => OperationKind::TableUniqueDrop,
            Operation::TablePrimarySet { .. } => OperationKind::TablePrimarySet,
            Operation::TableForeignCreate { .. } => OperationKind::TableForeignCreate,
            Operation::TableForeignDrop { .. } => OperationKind::TableForeignDrop,
            Operation::ColumnCreate { .. } => OperationKind::ColumnCreate,
            Operation::ColumnRename { .. } => OperationKind::ColumnRename,
            Operation::ColumnTypeSet { .. } => OperationKind::ColumnTypeSet,
            Operation::ColumnCommentSet { .. } => OperationKind::ColumnCommentSet,
            Operation::ColumnNullableSet { .. } => OperationKind::ColumnNullableSet,
            Operation::ColumnDefaultSet { .. } => OperationKind::ColumnDefaultSet,
            Operation::ColumnDrop { .. } => OperationKind::ColumnDrop,
        }
    }

    /// Name of the table the operation acts on. For a table rename this is the old name.
    pub fn table(&self) -> &str {
        match self {
            Operation::TableRename { from_name, .. } => from_name,
            Operation::TableCreate { table }
            | Operation::TableCommentSet { table, .. }
            | Operation::TableDrop { table }
            | Operation::TableIndexCreate { table, .. }
            | Operation::TableIndexDrop { table, .. }
            | Operation::TableUniqueCreate { table, .. }
            | Operation::TableUniqueDrop { table, .. }
            | Operation::TablePrimarySet { table, .. }
            | Operation::TableForeignCreate { table, .. }
            | Operation::TableForeignDrop { table, .. }
            | Operation::ColumnCreate { table, .. }
            | Operation::ColumnRename { table, .. }
            | Operation::ColumnTypeSet { table, .. }
            | Operation::ColumnCommentSet { table, .. }
            | Operation::ColumnNullableSet { table, .. }
            | Operation::ColumnDefaultSet { table, .. }
            | Operation::ColumnDrop { table, .. } => table,
        }
    }

    /// Column the operation acts on, for column-scoped operations and foreign keys.
    pub fn column(&self) -> Option<&str> {
        match self {
            Operation::TableForeignCreate { column, .. }
            | Operation::TableForeignDrop { column, .. }
            | Operation::ColumnCreate { column, .. }
            | Operation::ColumnTypeSet { column, .. }
            | Operation::ColumnCommentSet { column, .. }
            | Operation::ColumnNullableSet { column, .. }
            | Operation::ColumnDefaultSet { column, .. }
            | Operation::ColumnDrop { column, .. } => Some(column),
            Operation::ColumnRename { to_name, .. } => Some(to_name),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::TableRename { from_name, to_name } => {
                write!(f, "{} {} -> {}", self.kind(), from_name, to_name)
            }
            Operation::ColumnRename {
                table,
                from_name,
                to_name,
            } => write!(f, "{} {}.{} -> {}", self.kind(), table, from_name, to_name),
            _ => match self.column() {
                Some(column) => write!(f, "{} {}.{}", self.kind(), self.table(), column),
                None => write!(f, "{} {}", self.kind(), self.table()),
            },
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Annotations;

/// Closed set of column types understood by every collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    Integer,
    BigInteger,
    Text,
    String,
    Float,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Time,
    Timestamp,
    Binary,
    Enum,
    Json,
    Jsonb,
    Uuid,
}

impl ColumnType {
    pub const ALL: [ColumnType; 16] = [
        ColumnType::Integer,
        ColumnType::BigInteger,
        ColumnType::Text,
        ColumnType::String,
        ColumnType::Float,
        ColumnType::Decimal,
        ColumnType::Boolean,
        ColumnType::Date,
        ColumnType::Datetime,
        ColumnType::Time,
        ColumnType::Timestamp,
        ColumnType::Binary,
        ColumnType::Enum,
        ColumnType::Json,
        ColumnType::Jsonb,
        ColumnType::Uuid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::BigInteger => "bigInteger",
            ColumnType::Text => "text",
            ColumnType::String => "string",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Datetime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Binary => "binary",
            ColumnType::Enum => "enum",
            ColumnType::Json => "json",
            ColumnType::Jsonb => "jsonb",
            ColumnType::Uuid => "uuid",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown column type '{}'", s))
    }
}

/// Foreign key as recorded during model construction: the type and field it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedForeignKey {
    pub source_type: String,
    pub source_field: String,
}

/// Foreign key pointing at a concrete table and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A column of a table.
///
/// `K` is the foreign key representation, unresolved while the builder runs and
/// [`ForeignKey`] everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn<K = ForeignKey> {
    pub name: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
    pub column_type: ColumnType,
    #[serde(default)]
    pub args: Vec<Value>,
    pub not_null: bool,
    pub default_value: Option<Value>,
    pub foreign_key: Option<K>,
}

impl<K> TableColumn<K> {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            comment: None,
            annotations: Annotations::new(),
            column_type,
            args: Vec::new(),
            not_null: false,
            default_value: None,
            foreign_key: None,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_foreign_key(mut self, key: K) -> Self {
        self.foreign_key = Some(key);
        self
    }

    /// Prior names recorded with the `oldNames` annotation.
    pub fn old_names(&self) -> Vec<&str> {
        old_names(&self.annotations)
    }

    /// Swap the foreign key representation, dropping keys the mapper rejects.
    pub fn map_foreign_key<L>(self, f: impl FnOnce(K) -> Option<L>) -> TableColumn<L> {
        TableColumn {
            name: self.name,
            comment: self.comment,
            annotations: self.annotations,
            column_type: self.column_type,
            args: self.args,
            not_null: self.not_null,
            default_value: self.default_value,
            foreign_key: self.foreign_key.and_then(f),
        }
    }
}

pub(crate) fn old_names(annotations: &Annotations) -> Vec<&str> {
    match annotations.get("oldNames") {
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(name)) => vec![name.as_str()],
        _ => Vec::new(),
    }
}

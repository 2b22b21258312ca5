use std::collections::HashMap;

use keel_core::model::ForeignKey;
use keel_core::{ColumnType, KeelError, Operation, Result};
use serde_json::Value;

use crate::executor::{GroupKind, OperationGroup};

/// Renders operation groups to Postgres statements.
#[derive(Debug, Clone)]
pub struct PostgresDdl {
    schema: String,
    table_prefix: String,
    column_prefix: String,
}

/// Column definition assembled from a create and the operations refining it.
struct ColumnDef<'o> {
    name: &'o str,
    column_type: ColumnType,
    args: &'o [Value],
    not_null: bool,
    default: Option<&'o Value>,
}

/// Statements of one group, emitted in this order.
#[derive(Default)]
struct Statements {
    before: Vec<String>,
    actions: Vec<String>,
    after: Vec<String>,
    comments: Vec<String>,
}

impl PostgresDdl {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table_prefix: String::new(),
            column_prefix: String::new(),
        }
    }

    pub fn with_prefixes(mut self, table_prefix: impl Into<String>, column_prefix: impl Into<String>) -> Self {
        self.table_prefix = table_prefix.into();
        self.column_prefix = column_prefix.into();
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn column_prefix(&self) -> &str {
        &self.column_prefix
    }

    /// Statements applying `group`, in execution order.
    pub fn render(&self, group: &OperationGroup) -> Result<Vec<String>> {
        match &group.parent {
            Operation::TableRename { from_name, to_name } => Ok(vec![
                format!(
                    "ALTER TABLE {} RENAME TO {}",
                    self.table(from_name),
                    quote(&self.table_name(to_name))
                ),
                self.rename_default_names(from_name, to_name),
            ]),
            Operation::TableDrop { table } => Ok(vec![format!("DROP TABLE {}", self.table(table))]),
            Operation::TableCreate { table } => self.render_create(table, &group.children),
            _ => self.render_alter(&group.table, group.operations()),
        }
    }

    fn render_create(&self, table: &str, children: &[Operation]) -> Result<Vec<String>> {
        let (columns, rest) = collect_columns(children.iter());
        let mut definitions = Vec::with_capacity(columns.len());
        let mut out = Statements::default();

        for column in &columns {
            definitions.push(self.column_definition(table, column)?);
        }
        for op in rest {
            match self.constraint(table, op) {
                Some((name, body)) => definitions.push(format!("CONSTRAINT {} {}", quote(&name), body)),
                None => self.render_child(table, op, &mut out)?,
            }
        }

        let mut statements = out.before;
        statements.push(format!(
            "CREATE TABLE {} ({})",
            self.table(table),
            definitions.join(", ")
        ));
        if !out.actions.is_empty() {
            statements.push(format!(
                "ALTER TABLE {} {}",
                self.table(table),
                out.actions.join(", ")
            ));
        }
        statements.extend(out.after);
        statements.extend(out.comments);
        Ok(statements)
    }

    fn render_alter<'o>(&self, table: &str, operations: impl Iterator<Item = &'o Operation>) -> Result<Vec<String>> {
        let (columns, rest) = collect_columns(operations);
        let mut out = Statements::default();

        for column in &columns {
            let definition = self.column_definition(table, column)?;
            out.actions.push(format!("ADD COLUMN {}", definition));
        }
        for op in rest {
            self.render_child(table, op, &mut out)?;
        }

        let mut statements = out.before;
        if !out.actions.is_empty() {
            statements.push(format!(
                "ALTER TABLE {} {}",
                self.table(table),
                out.actions.join(", ")
            ));
        }
        statements.extend(out.after);
        statements.extend(out.comments);
        Ok(statements)
    }

    fn render_child(&self, table: &str, op: &Operation, out: &mut Statements) -> Result<()> {
        match op {
            Operation::TableCommentSet { comment, .. } => {
                out.comments.push(format!(
                    "COMMENT ON TABLE {} IS {}",
                    self.table(table),
                    comment_literal(comment.as_deref())
                ));
            }
            Operation::ColumnCommentSet { column, comment, .. } => {
                out.comments.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    self.table(table),
                    self.column(column),
                    comment_literal(comment.as_deref())
                ));
            }
            Operation::TablePrimarySet { previous_name, .. } => {
                let previous = previous_name
                    .clone()
                    .unwrap_or_else(|| self.primary_name(table));
                out.actions.push(format!("DROP CONSTRAINT IF EXISTS {}", quote(&previous)));
                if let Some((name, body)) = self.constraint(table, op) {
                    out.actions.push(format!("ADD CONSTRAINT {} {}", quote(&name), body));
                }
            }
            Operation::TableIndexCreate {
                columns,
                index_name,
                index_type,
                ..
            } => {
                let name = index_name
                    .clone()
                    .unwrap_or_else(|| self.constraint_name(table, columns, "index"));
                let using = index_type
                    .as_deref()
                    .map(|t| format!(" USING {}", t))
                    .unwrap_or_default();
                out.after.push(format!(
                    "CREATE INDEX {} ON {}{} ({})",
                    quote(&name),
                    self.table(table),
                    using,
                    self.columns(columns)
                ));
            }
            Operation::TableIndexDrop {
                columns, index_name, ..
            } => {
                let name = index_name
                    .clone()
                    .unwrap_or_else(|| self.constraint_name(table, columns, "index"));
                out.before.push(format!(
                    "DROP INDEX {}.{}",
                    quote(&self.schema),
                    quote(&name)
                ));
            }
            Operation::TableUniqueCreate { .. } | Operation::TableForeignCreate { .. } => {
                if let Some((name, body)) = self.constraint(table, op) {
                    out.actions.push(format!("ADD CONSTRAINT {} {}", quote(&name), body));
                }
            }
            Operation::TableUniqueDrop {
                columns, index_name, ..
            } => {
                let name = index_name
                    .clone()
                    .unwrap_or_else(|| self.constraint_name(table, columns, "unique"));
                out.actions.push(format!("DROP CONSTRAINT {}", quote(&name)));
            }
            Operation::TableForeignDrop { column, .. } => {
                out.actions.push(format!(
                    "DROP CONSTRAINT {}",
                    quote(&self.foreign_name(table, column))
                ));
            }
            Operation::ColumnRename {
                from_name, to_name, ..
            } => {
                out.before.push(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    self.table(table),
                    self.column(from_name),
                    self.column(to_name)
                ));
            }
            Operation::ColumnTypeSet {
                column,
                column_type,
                args,
                ..
            } => {
                let rendered = self.column_type(table, column, *column_type, args)?;
                let check = self.check_name(table, column);
                out.actions.push(format!("DROP CONSTRAINT IF EXISTS {}", quote(&check)));
                out.actions.push(format!(
                    "ALTER COLUMN {} TYPE {} USING {}::{}",
                    self.column(column),
                    rendered.sql_type,
                    self.column(column),
                    rendered.sql_type
                ));
                if let Some(values) = rendered.check {
                    out.actions.push(format!(
                        "ADD CONSTRAINT {} CHECK ({} IN ({}))",
                        quote(&check),
                        self.column(column),
                        values
                    ));
                }
            }
            Operation::ColumnNullableSet {
                column, nullable, ..
            } => {
                let action = if *nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                out.actions.push(format!("ALTER COLUMN {} {}", self.column(column), action));
            }
            Operation::ColumnDefaultSet { column, value, .. } => {
                let action = match value {
                    Some(value) => format!("SET DEFAULT {}", literal(value)),
                    None => "DROP DEFAULT".to_string(),
                };
                out.actions.push(format!("ALTER COLUMN {} {}", self.column(column), action));
            }
            Operation::ColumnDrop { column, .. } => {
                out.actions.push(format!("DROP COLUMN {}", self.column(column)));
            }
            Operation::ColumnCreate { .. }
            | Operation::TableCreate { .. }
            | Operation::TableRename { .. }
            | Operation::TableDrop { .. } => {}
        }
        Ok(())
    }

    /// Name and body of the table constraint `op` adds, if it adds one.
    fn constraint(&self, table: &str, op: &Operation) -> Option<(String, String)> {
        match op {
            Operation::TablePrimarySet {
                columns: Some(columns),
                index_name,
                ..
            } => Some((
                index_name.clone().unwrap_or_else(|| self.primary_name(table)),
                format!("PRIMARY KEY ({})", self.columns(columns)),
            )),
            Operation::TableUniqueCreate {
                columns, index_name, ..
            } => Some((
                index_name
                    .clone()
                    .unwrap_or_else(|| self.constraint_name(table, columns, "unique")),
                format!("UNIQUE ({})", self.columns(columns)),
            )),
            Operation::TableForeignCreate {
                column, reference, ..
            } => Some((
                self.foreign_name(table, column),
                format!("FOREIGN KEY ({}) REFERENCES {}", self.column(column), self.reference(reference)),
            )),
            _ => None,
        }
    }

    /// Renames the constraints and plain indexes of a renamed table whose names start
    /// with the old table's name stem, so they keep matching the default names.
    fn rename_default_names(&self, from: &str, to: &str) -> String {
        let table = string_literal(&self.table(to));
        let from_stem = format!("{}_", self.name_stem(from));
        let to_stem = string_literal(&format!("{}_", self.name_stem(to)));
        let len = from_stem.chars().count();
        let from_stem = string_literal(&from_stem);
        format!(
            "DO $keel$ DECLARE r record; BEGIN \
             FOR r IN SELECT conname AS name FROM pg_constraint \
             WHERE conrelid = {table}::regclass AND left(conname, {len}) = {from_stem} LOOP \
             EXECUTE format('ALTER TABLE %s RENAME CONSTRAINT %I TO %I', {table}, r.name, {to_stem} || substr(r.name, {rest})); \
             END LOOP; \
             FOR r IN SELECT i.relname AS name FROM pg_index x JOIN pg_class i ON i.oid = x.indexrelid \
             WHERE x.indrelid = {table}::regclass AND left(i.relname, {len}) = {from_stem} \
             AND NOT EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conindid = x.indexrelid AND c.conrelid = x.indrelid) LOOP \
             EXECUTE format('ALTER INDEX %I.%I RENAME TO %I', {schema}, r.name, {to_stem} || substr(r.name, {rest})); \
             END LOOP; END $keel$",
            table = table,
            len = len,
            rest = len + 1,
            from_stem = from_stem,
            to_stem = to_stem,
            schema = string_literal(&self.schema),
        )
    }

    fn column_definition(&self, table: &str, column: &ColumnDef<'_>) -> Result<String> {
        let rendered = self.column_type(table, column.name, column.column_type, column.args)?;
        let mut definition = format!("{} {}", self.column(column.name), rendered.sql_type);
        if column.not_null {
            definition.push_str(" NOT NULL");
        }
        if let Some(value) = column.default {
            definition.push_str(&format!(" DEFAULT {}", literal(value)));
        }
        if let Some(values) = rendered.check {
            definition.push_str(&format!(
                " CONSTRAINT {} CHECK ({} IN ({}))",
                quote(&self.check_name(table, column.name)),
                self.column(column.name),
                values
            ));
        }
        Ok(definition)
    }

    fn column_type(&self, table: &str, column: &str, column_type: ColumnType, args: &[Value]) -> Result<RenderedType> {
        let unsupported = || KeelError::UnsupportedColumnType {
            table: table.to_string(),
            column: column.to_string(),
            column_type: column_type.to_string(),
        };
        let int_arg = |idx: usize| -> Result<Option<u64>> {
            match args.get(idx) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => value.as_u64().map(Some).ok_or_else(unsupported),
            }
        };

        let sql_type = match column_type {
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::String => match int_arg(0)? {
                Some(length) => format!("varchar({})", length),
                None => "varchar".to_string(),
            },
            ColumnType::Float => match (int_arg(0)?, int_arg(1)?) {
                (Some(p), _) if p > 24 => "double precision".to_string(),
                _ => "real".to_string(),
            },
            ColumnType::Decimal => match (int_arg(0)?, int_arg(1)?) {
                (Some(p), Some(s)) => format!("numeric({}, {})", p, s),
                (Some(p), None) => format!("numeric({})", p),
                (None, _) => "numeric".to_string(),
            },
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Datetime => "timestamptz".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Binary => "bytea".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Enum => {
                let values = match args.first() {
                    Some(Value::Array(values)) if !values.is_empty() => values,
                    _ => return Err(unsupported()),
                };
                let values = values
                    .iter()
                    .map(|v| v.as_str().map(string_literal).ok_or_else(unsupported))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(RenderedType {
                    sql_type: "text".to_string(),
                    check: Some(values.join(", ")),
                });
            }
        };

        Ok(RenderedType {
            sql_type,
            check: None,
        })
    }

    fn table_name(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", quote(&self.schema), quote(&self.table_name(name)))
    }

    fn column(&self, name: &str) -> String {
        quote(&format!("{}{}", self.column_prefix, name))
    }

    fn columns(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.column(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn reference(&self, reference: &ForeignKey) -> String {
        format!("{} ({})", self.table(&reference.table), self.column(&reference.column))
    }

    /// Prefixed table name as it starts every default constraint and index name.
    fn name_stem(&self, table: &str) -> String {
        sanitize(&self.table_name(table))
    }

    pub(crate) fn constraint_name(&self, table: &str, columns: &[String], suffix: &str) -> String {
        let columns: Vec<String> = columns
            .iter()
            .map(|c| sanitize(&format!("{}{}", self.column_prefix, c)))
            .collect();
        format!("{}_{}_{}", self.name_stem(table), columns.join("_"), suffix)
    }

    pub(crate) fn primary_name(&self, table: &str) -> String {
        format!("{}_pkey", self.name_stem(table))
    }

    fn foreign_name(&self, table: &str, column: &str) -> String {
        self.constraint_name(table, &[column.to_string()], "foreign")
    }

    pub(crate) fn check_name(&self, table: &str, column: &str) -> String {
        self.constraint_name(table, &[column.to_string()], "check")
    }
}

struct RenderedType {
    sql_type: String,
    /// Allowed values, already rendered as literals.
    check: Option<String>,
}

/// Split column creates out of `operations`, folding the nullable and default changes
/// of the created columns into their definitions.
fn collect_columns<'o>(operations: impl Iterator<Item = &'o Operation>) -> (Vec<ColumnDef<'o>>, Vec<&'o Operation>) {
    let mut columns: Vec<ColumnDef<'o>> = Vec::new();
    let mut positions: HashMap<&'o str, usize> = HashMap::new();
    let mut rest = Vec::new();

    for op in operations {
        match op {
            Operation::ColumnCreate {
                column,
                column_type,
                args,
                ..
            } => {
                positions.insert(column.as_str(), columns.len());
                columns.push(ColumnDef {
                    name: column,
                    column_type: *column_type,
                    args,
                    not_null: false,
                    default: None,
                });
            }
            Operation::ColumnNullableSet {
                column, nullable, ..
            } if positions.contains_key(column.as_str()) => {
                columns[positions[column.as_str()]].not_null = !*nullable;
            }
            Operation::ColumnDefaultSet {
                column,
                value: Some(value),
                ..
            } if positions.contains_key(column.as_str()) => {
                columns[positions[column.as_str()]].default = Some(value);
            }
            other => rest.push(other),
        }
    }

    (columns, rest)
}

fn sanitize(name: &str) -> String {
    name.replace(['-', '.'], "_").to_lowercase()
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn comment_literal(comment: Option<&str>) -> String {
    comment.map(string_literal).unwrap_or_else(|| "NULL".to_string())
}

/// SQL literal for a default value. Arrays and objects are stored as JSON text.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        other => string_literal(&other.to_string()),
    }
}

use std::future::Future;
use std::pin::Pin;

use keel_core::model::{Index, Primary, Unique};
use keel_core::{AbstractDatabase, ColumnType, ForeignKey, Result, Table, TableColumn};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, warn};

use super::Introspector;
use crate::applier::PostgresDdl;

const TABLES_QUERY: &str = r#"
    SELECT c.relname::text AS name, obj_description(c.oid, 'pg_class') AS comment
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
    ORDER BY c.relname
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT a.attname::text AS name,
           format_type(a.atttypid, a.atttypmod) AS data_type,
           a.attnotnull AS not_null,
           pg_get_expr(d.adbin, d.adrelid) AS default_value,
           col_description(a.attrelid, a.attnum) AS comment
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

const CONSTRAINTS_QUERY: &str = r#"
    SELECT con.conname::text AS name,
           con.contype::text AS kind,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS columns,
           ref.relname::text AS ref_table,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_attribute att ON att.attrelid = con.confrelid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS ref_columns,
           pg_get_constraintdef(con.oid) AS definition
    FROM pg_constraint con
    JOIN pg_class c ON c.oid = con.conrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_class ref ON ref.oid = con.confrelid
    WHERE n.nspname = $1 AND c.relname = $2
    ORDER BY con.conname
"#;

const INDEXES_QUERY: &str = r#"
    SELECT i.relname::text AS name,
           am.amname::text AS index_type,
           ARRAY(
               SELECT att.attname::text
               FROM unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
               JOIN pg_attribute att ON att.attrelid = ix.indrelid AND att.attnum = k.attnum
               ORDER BY k.ord
           ) AS columns
    FROM pg_index ix
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN pg_class c ON c.oid = ix.indrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_am am ON am.oid = i.relam
    WHERE n.nspname = $1 AND c.relname = $2 AND NOT ix.indisunique AND NOT ix.indisprimary
    ORDER BY i.relname
"#;

/// Reads the current model from the Postgres catalogs.
///
/// Constraint and index names that match the ones [`PostgresDdl`] generates are read back
/// as unnamed, so a model applied without explicit names diffs clean against itself.
pub struct PostgresIntrospector {
    pool: PgPool,
    names: PostgresDdl,
}

/// One row of the constraints query.
struct ConstraintRow {
    name: String,
    kind: String,
    columns: Vec<String>,
    ref_table: Option<String>,
    ref_columns: Vec<String>,
    definition: String,
}

impl PostgresIntrospector {
    pub fn new(pool: PgPool, table_prefix: impl Into<String>, column_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            names: PostgresDdl::new(String::new()).with_prefixes(table_prefix, column_prefix),
        }
    }

    async fn read(&self, namespace: &str) -> Result<AbstractDatabase> {
        let rows = sqlx::query(TABLES_QUERY)
            .bind(namespace)
            .fetch_all(&self.pool)
            .await?;

        let mut database = AbstractDatabase::new();
        for row in rows {
            let raw_name: String = row.try_get("name")?;
            let Some(name) = self.strip_table(&raw_name) else {
                debug!(table = %raw_name, "Skipping table without prefix");
                continue;
            };

            let mut table = Table::new(name);
            table.comment = row.try_get("comment")?;
            self.read_table(namespace, &raw_name, &mut table).await?;

            if database.push(table).is_err() {
                warn!(table = %raw_name, "Duplicate table after prefix stripping");
            }
        }

        debug!(namespace, tables = database.len(), "Introspected database");
        Ok(database)
    }

    async fn read_table(&self, namespace: &str, raw_name: &str, table: &mut Table) -> Result<()> {
        // Columns
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(namespace)
            .bind(raw_name)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            if let Some(column) = self.column(&table.name, row)? {
                let _ = table.push_column(column);
            }
        }

        let constraints: Vec<ConstraintRow> = sqlx::query(CONSTRAINTS_QUERY)
            .bind(namespace)
            .bind(raw_name)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(ConstraintRow::from_row)
            .collect::<std::result::Result<_, _>>()?;

        // Primary
        if let Some(primary) = constraints.iter().find(|c| c.kind == "p") {
            let name = Some(primary.name.clone()).filter(|n| *n != self.names.primary_name(&table.name));
            table.primary = Some(Primary {
                name,
                columns: self.strip_columns(&primary.columns),
            });
        }

        // Indexes
        let rows = sqlx::query(INDEXES_QUERY)
            .bind(namespace)
            .bind(raw_name)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let columns = self.strip_columns(&row.try_get::<Vec<String>, _>("columns")?);
            if is_primary_form(table.primary.as_ref(), &columns) {
                continue;
            }
            let name: String = row.try_get("name")?;
            let index_type: String = row.try_get("index_type")?;
            table.indexes.push(Index {
                name: Some(name).filter(|n| *n != self.names.constraint_name(&table.name, &columns, "index")),
                index_type: Some(index_type).filter(|t| t != "btree"),
                columns,
            });
        }

        // Uniques
        for constraint in constraints.iter().filter(|c| c.kind == "u") {
            let columns = self.strip_columns(&constraint.columns);
            let default_name = self.names.constraint_name(&table.name, &columns, "unique");
            table.uniques.push(Unique {
                name: Some(constraint.name.clone()).filter(|n| *n != default_name),
                columns,
            });
        }

        // Foreign keys
        for constraint in constraints.iter().filter(|c| c.kind == "f") {
            let (Some(ref_table), [column], [ref_column]) = (
                constraint.ref_table.as_deref(),
                constraint.columns.as_slice(),
                constraint.ref_columns.as_slice(),
            ) else {
                debug!(table = %table.name, constraint = %constraint.name, "Skipping composite foreign key");
                continue;
            };
            let Some(ref_table) = self.strip_table(ref_table) else {
                continue;
            };
            let column = self.strip_column(column);
            if let Some(target) = table.column_mut(&column) {
                target.foreign_key = Some(ForeignKey::new(ref_table, self.strip_column(ref_column)));
            }
        }

        // Enum checks
        for constraint in constraints.iter().filter(|c| c.kind == "c") {
            let [column] = constraint.columns.as_slice() else {
                continue;
            };
            let column = self.strip_column(column);
            if constraint.name != self.names.check_name(&table.name, &column) {
                continue;
            }
            let Some(values) = parse_check_values(&constraint.definition) else {
                continue;
            };
            if let Some(target) = table.column_mut(&column) {
                if target.column_type == ColumnType::Text {
                    target.column_type = ColumnType::Enum;
                    target.args = vec![Value::Array(values.into_iter().map(Value::String).collect())];
                }
            }
        }

        Ok(())
    }

    fn column(&self, table: &str, row: &PgRow) -> Result<Option<TableColumn>> {
        let raw_name: String = row.try_get("name")?;
        let data_type: String = row.try_get("data_type")?;
        let Some((column_type, args)) = parse_type(&data_type) else {
            warn!(table, column = %raw_name, data_type = %data_type, "Skipping column of unmapped type");
            return Ok(None);
        };

        let mut column = TableColumn::new(self.strip_column(&raw_name), column_type).with_args(args);
        column.not_null = row.try_get("not_null")?;
        column.comment = row.try_get("comment")?;
        column.default_value = row
            .try_get::<Option<String>, _>("default_value")?
            .and_then(|expr| parse_default(&expr, column_type));
        Ok(Some(column))
    }

    fn strip_table(&self, name: &str) -> Option<String> {
        name.strip_prefix(self.names.table_prefix()).map(String::from)
    }

    fn strip_column(&self, name: &str) -> String {
        name.strip_prefix(self.names.column_prefix())
            .unwrap_or(name)
            .to_string()
    }

    fn strip_columns(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| self.strip_column(n)).collect()
    }
}

impl Introspector for PostgresIntrospector {
    fn introspect<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AbstractDatabase>> + Send + 'a>> {
        Box::pin(self.read(namespace))
    }
}

impl ConstraintRow {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            columns: row.try_get("columns")?,
            ref_table: row.try_get("ref_table")?,
            ref_columns: row.try_get("ref_columns")?,
            definition: row.try_get("definition")?,
        })
    }
}

/// An index that only restates a single-column primary key.
fn is_primary_form(primary: Option<&Primary>, columns: &[String]) -> bool {
    matches!(primary, Some(p) if p.columns.len() == 1 && p.columns == columns)
}

/// Column type and arguments from a `format_type` string.
fn parse_type(data_type: &str) -> Option<(ColumnType, Vec<Value>)> {
    let (base, modifiers) = match data_type.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.trim_end_matches(')')),
        None => (data_type.trim(), ""),
    };
    let args: Vec<Value> = modifiers
        .split(',')
        .filter_map(|m| m.trim().parse::<u64>().ok())
        .map(Value::from)
        .collect();

    let mapped = match base {
        "integer" | "smallint" => (ColumnType::Integer, vec![]),
        "bigint" => (ColumnType::BigInteger, vec![]),
        "text" => (ColumnType::Text, vec![]),
        "character varying" => (ColumnType::String, args),
        "real" => (ColumnType::Float, vec![]),
        "double precision" => (ColumnType::Float, vec![Value::from(53)]),
        "numeric" => (ColumnType::Decimal, args),
        "boolean" => (ColumnType::Boolean, vec![]),
        "date" => (ColumnType::Date, vec![]),
        "timestamp with time zone" => (ColumnType::Datetime, vec![]),
        "timestamp without time zone" => (ColumnType::Timestamp, vec![]),
        "time without time zone" => (ColumnType::Time, vec![]),
        "bytea" => (ColumnType::Binary, vec![]),
        "json" => (ColumnType::Json, vec![]),
        "jsonb" => (ColumnType::Jsonb, vec![]),
        "uuid" => (ColumnType::Uuid, vec![]),
        _ => return None,
    };
    Some(mapped)
}

/// Literal value of a column default expression. Expressions that are not literals
/// are kept as their source text.
fn parse_default(expr: &str, column_type: ColumnType) -> Option<Value> {
    let expr = expr.trim();
    if expr.eq_ignore_ascii_case("null") || expr.starts_with("NULL::") {
        return None;
    }

    let (text, quoted) = match quoted_literal(expr) {
        Some((text, rest)) if rest.is_empty() || rest.starts_with("::") => (text, true),
        _ => (expr.trim_matches(|c| c == '(' || c == ')').to_string(), false),
    };

    let value = match column_type {
        ColumnType::Json | ColumnType::Jsonb => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        ColumnType::Boolean => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        ColumnType::Integer | ColumnType::BigInteger | ColumnType::Float | ColumnType::Decimal => {
            parse_number(&text).unwrap_or(Value::String(text))
        }
        _ if quoted => Value::String(text),
        _ => Value::String(expr.to_string()),
    };
    Some(value)
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Split a leading `'...'` literal (with `''` escapes) from the rest of `input`.
fn quoted_literal(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('\'')?;
    let mut text = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                text.push('\'');
                continue;
            }
            return Some((text, &body[idx + 1..]));
        }
        text.push(c);
    }
    None
}

/// Allowed values of a `CHECK (col IN (...))` constraint definition.
fn parse_check_values(definition: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut rest = definition;
    while let Some(start) = rest.find('\'') {
        let (value, tail) = quoted_literal(&rest[start..])?;
        values.push(value);
        rest = tail;
    }
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("integer"), Some((ColumnType::Integer, vec![])));
        assert_eq!(
            parse_type("character varying(120)"),
            Some((ColumnType::String, vec![json!(120)]))
        );
        assert_eq!(parse_type("character varying"), Some((ColumnType::String, vec![])));
        assert_eq!(
            parse_type("numeric(10,4)"),
            Some((ColumnType::Decimal, vec![json!(10), json!(4)]))
        );
        assert_eq!(
            parse_type("timestamp with time zone"),
            Some((ColumnType::Datetime, vec![]))
        );
        assert_eq!(parse_type("inet"), None);
    }

    #[test]
    fn test_parse_default() {
        assert_eq!(
            parse_default("'anon'::character varying", ColumnType::String),
            Some(json!("anon"))
        );
        assert_eq!(parse_default("'it''s'::text", ColumnType::Text), Some(json!("it's")));
        assert_eq!(parse_default("42", ColumnType::Integer), Some(json!(42)));
        assert_eq!(parse_default("'-1'::integer", ColumnType::Integer), Some(json!(-1)));
        assert_eq!(parse_default("1.5", ColumnType::Float), Some(json!(1.5)));
        assert_eq!(parse_default("true", ColumnType::Boolean), Some(json!(true)));
        assert_eq!(
            parse_default("'[1, 2]'::json", ColumnType::Json),
            Some(json!([1, 2]))
        );
        assert_eq!(parse_default("now()", ColumnType::Datetime), Some(json!("now()")));
        assert_eq!(parse_default("NULL::text", ColumnType::Text), None);
    }

    #[test]
    fn test_parse_check_values() {
        let definition = "CHECK ((state = ANY (ARRAY['draft'::text, 'live'::text])))";
        assert_eq!(
            parse_check_values(definition),
            Some(vec!["draft".to_string(), "live".to_string()])
        );
        assert_eq!(parse_check_values("CHECK ((age > 0))"), None);
    }

    #[test]
    fn test_primary_form_is_excluded() {
        let primary = Primary::new(vec!["id".into()]);
        assert!(is_primary_form(Some(&primary), &["id".to_string()]));
        assert!(!is_primary_form(Some(&primary), &["id".to_string(), "name".to_string()]));
        assert!(!is_primary_form(None, &["id".to_string()]));
    }
}

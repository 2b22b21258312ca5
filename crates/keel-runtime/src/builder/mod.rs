//! Derives the target [`AbstractDatabase`] from a [`TypeSchema`].

mod field;
mod relation;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use keel_core::model::{
    AbstractDatabase, Annotations, ColumnType, ForeignKey, Table, TableColumn,
    UnresolvedForeignKey,
};
use keel_core::scalar::{ColumnSpec, ScalarTypeMapper};
use keel_core::type_schema::{FieldDefinition, TypeDefinition, TypeKind, TypeSchema, ROOT_TYPES};
use keel_core::AnnotationParser;

use field::{classify, named_type, FieldShape};

/// Options affecting how names and lists are derived.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Lower-case table and column names derived from type and field names.
    pub lowercase_names: bool,
    /// Store lists of scalars and enums as `json` columns.
    pub list_as_json: bool,
}

/// A recoverable problem found while building. The affected element was omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub subject: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Result of a build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub database: AbstractDatabase,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the target model from a type schema.
pub struct SchemaModelBuilder<'s> {
    schema: &'s TypeSchema,
    parser: AnnotationParser,
    scalars: ScalarTypeMapper,
    options: BuildOptions,
}

type PendingTable = Table<UnresolvedForeignKey>;
type PendingColumn = TableColumn<UnresolvedForeignKey>;

/// Mutable state of one build.
struct BuildState {
    database: AbstractDatabase<UnresolvedForeignKey>,
    /// Type name to table name.
    type_tables: HashMap<String, String>,
    /// (type name, field name) to column name.
    field_columns: HashMap<(String, String), String>,
    join_tables: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl BuildState {
    fn diagnose(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            subject: subject.into(),
            message: message.into(),
        };
        warn!(subject = %diagnostic.subject, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}

impl<'s> SchemaModelBuilder<'s> {
    pub fn new(schema: &'s TypeSchema) -> Self {
        Self {
            schema,
            parser: AnnotationParser::default(),
            scalars: ScalarTypeMapper::new(),
            options: BuildOptions::default(),
        }
    }

    pub fn with_scalars(mut self, scalars: ScalarTypeMapper) -> Self {
        self.scalars = scalars;
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the model. Problems never abort the build; they end up in the diagnostics.
    pub fn build(&self) -> BuildOutput {
        let mut state = BuildState {
            database: AbstractDatabase::new(),
            type_tables: HashMap::new(),
            field_columns: HashMap::new(),
            join_tables: HashSet::new(),
            diagnostics: Vec::new(),
        };

        for def in self.schema.types() {
            if def.kind == TypeKind::Object
                && def.has_definition
                && !ROOT_TYPES.contains(&def.name.as_str())
            {
                self.build_table(&mut state, def);
            }
        }

        let database = resolve_foreign_keys(&mut state);
        debug!(tables = database.len(), "Built target model");

        BuildOutput {
            database,
            diagnostics: state.diagnostics,
        }
    }

    fn name(&self, derived: &str) -> String {
        if self.options.lowercase_names {
            derived.to_lowercase()
        } else {
            derived.to_string()
        }
    }

    fn build_table(&self, state: &mut BuildState, def: &'s TypeDefinition) {
        let annotations = self.parser.parse(def.description.as_deref());
        let name = match annotations.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => self.name(&def.name),
        };

        let mut table = PendingTable::new(name);
        table.comment = self.comment(def.description.as_deref());
        table.annotations = annotations;

        for field in &def.fields {
            self.build_field(state, def, &mut table, field);
        }

        let table_name = table.name.clone();
        if let Err(rejected) = state.database.push(table) {
            state.diagnose(
                &def.name,
                format!("table {} already exists, type skipped", rejected.name),
            );
            return;
        }
        state.type_tables.insert(def.name.clone(), table_name);
    }

    fn build_field(
        &self,
        state: &mut BuildState,
        owner: &'s TypeDefinition,
        table: &mut PendingTable,
        field: &'s FieldDefinition,
    ) {
        let annotations = self.parser.parse(field.description.as_deref());
        let subject = format!("{}.{}", owner.name, field.name);

        let shape = classify(self.schema, field, &annotations, self.options.list_as_json);
        let column = match shape {
            FieldShape::Scalar(scalar) => match self.scalars.map(scalar, &annotations) {
                Some(spec) => Some(self.column(field, &annotations, &field.name, spec)),
                None => {
                    state.diagnose(
                        &subject,
                        format!("unsupported type {}", named_type(&field.type_ref).unwrap_or("*unknown*")),
                    );
                    None
                }
            },
            FieldShape::Enum(def) => {
                let spec = enum_spec(def);
                Some(self.column(field, &annotations, &field.name, spec))
            }
            FieldShape::JsonList => Some(self.column(
                field,
                &annotations,
                &field.name,
                ColumnSpec::new(ColumnType::Json),
            )),
            FieldShape::ObjectRef(target) => {
                let key = annotations
                    .get("foreign")
                    .and_then(Value::as_str)
                    .unwrap_or("id");
                self.reference_column(state, &subject, field, &annotations, target, key)
            }
            FieldShape::ObjectList(target) => {
                self.build_relation(state, owner, field, &annotations, target);
                None
            }
            FieldShape::Unsupported(reason) => {
                state.diagnose(
                    &subject,
                    format!("{} is not supported, consider @db.type: 'text'", reason),
                );
                None
            }
        };

        let Some(column) = column else {
            return;
        };

        let column_name = column.name.clone();
        let implicit_primary = field.name == "id" && named_type(&field.type_ref) == Some("ID");
        if let Err(rejected) = table.push_column(column) {
            state.diagnose(subject, format!("column {} already exists", rejected.name));
            return;
        }
        apply_index_annotations(table, &annotations, &column_name, implicit_primary);
        state
            .field_columns
            .insert((owner.name.clone(), field.name.clone()), column_name);
    }

    fn column(
        &self,
        field: &FieldDefinition,
        annotations: &Annotations,
        derived_name: &str,
        spec: ColumnSpec,
    ) -> PendingColumn {
        let name = match annotations.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => self.name(derived_name),
        };
        let mut column = PendingColumn::new(name, spec.column_type).with_args(spec.args);
        column.comment = self.comment(field.description.as_deref());
        column.annotations = annotations.clone();
        column.not_null = field.type_ref.is_non_null();
        column.default_value = annotations
            .get("default")
            .filter(|value| !value.is_null())
            .cloned();
        column
    }

    /// Column on `field` holding a reference to `target.key`.
    fn reference_column(
        &self,
        state: &mut BuildState,
        subject: &str,
        field: &FieldDefinition,
        annotations: &Annotations,
        target: &'s TypeDefinition,
        key: &str,
    ) -> Option<PendingColumn> {
        let Some(key_field) = target.get_field(key) else {
            state.diagnose(subject, format!("foreign field {} not found on type {}", key, target.name));
            return None;
        };
        let Some(spec) = self.key_spec(key_field) else {
            state.diagnose(
                subject,
                format!("foreign field {}.{} cannot hold a key", target.name, key),
            );
            return None;
        };

        let derived = format!("{}_foreign", field.name);
        let column = self
            .column(field, annotations, &derived, spec)
            .with_foreign_key(UnresolvedForeignKey {
                source_type: target.name.clone(),
                source_field: key_field.name.clone(),
            });
        Some(column)
    }

    /// Column type of a field that another column points at.
    fn key_spec(&self, key_field: &FieldDefinition) -> Option<ColumnSpec> {
        let annotations = self.parser.parse(key_field.description.as_deref());
        match classify(self.schema, key_field, &annotations, false) {
            FieldShape::Scalar(scalar) => self.scalars.map(scalar, &annotations),
            FieldShape::Enum(def) => Some(enum_spec(def)),
            _ => None,
        }
    }

    /// Description text without annotation lines.
    fn comment(&self, description: Option<&str>) -> Option<String> {
        let text = description?
            .lines()
            .filter(|line| !line.trim_start().starts_with("@db."))
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn enum_spec(def: &TypeDefinition) -> ColumnSpec {
    ColumnSpec {
        column_type: ColumnType::Enum,
        args: vec![Value::Array(
            def.enum_values.iter().cloned().map(Value::String).collect(),
        )],
    }
}

/// Index name and type from an `index` annotation: `true`, a name, or `{ name, type }`.
/// `btree` is the default index type and is recorded as no type.
fn index_target(annotation: &Value) -> Option<(Option<String>, Option<String>)> {
    match annotation {
        Value::Bool(true) => Some((None, None)),
        Value::String(name) => Some((Some(name.clone()), None)),
        Value::Object(obj) => Some((
            obj.get("name").and_then(Value::as_str).map(String::from),
            obj.get("type")
                .and_then(Value::as_str)
                .filter(|t| !t.eq_ignore_ascii_case("btree"))
                .map(String::from),
        )),
        _ => None,
    }
}

fn apply_index_annotations(
    table: &mut PendingTable,
    annotations: &Annotations,
    column: &str,
    implicit_primary: bool,
) {
    if let Some((name, index_type)) = annotations.get("index").and_then(index_target) {
        table.add_index(name, index_type, column);
    }

    match annotations.get("primary") {
        Some(Value::Bool(false)) => {}
        Some(annotation) => {
            if let Some((name, _)) = index_target(annotation) {
                table.add_primary(name, column);
            }
        }
        None if implicit_primary => table.add_primary(None, column),
        None => {}
    }

    if let Some((name, _)) = annotations.get("unique").and_then(index_target) {
        table.add_unique(name, column);
    }
}

/// Turn every unresolved key into a concrete table and column, dropping the ones that
/// point nowhere.
fn resolve_foreign_keys(state: &mut BuildState) -> AbstractDatabase<ForeignKey> {
    let pending = std::mem::take(&mut state.database).into_tables();

    let known: HashMap<String, HashSet<String>> = pending
        .iter()
        .map(|t| {
            (
                t.name.clone(),
                t.columns().iter().map(|c| c.name.clone()).collect(),
            )
        })
        .collect();

    let mut diagnostics = Vec::new();
    let tables = pending.into_iter().map(|table| {
        table.map_foreign_keys(|table_name, column_name, key| {
            let resolved = state
                .type_tables
                .get(&key.source_type)
                .and_then(|target_table| {
                    let target_column = state
                        .field_columns
                        .get(&(key.source_type.clone(), key.source_field.clone()))?;
                    known
                        .get(target_table)?
                        .contains(target_column)
                        .then(|| ForeignKey::new(target_table, target_column))
                });
            if resolved.is_none() {
                diagnostics.push(Diagnostic {
                    subject: format!("{}.{}", table_name, column_name),
                    message: format!(
                        "foreign key to {}.{} could not be resolved",
                        key.source_type, key.source_field
                    ),
                });
            }
            resolved
        })
    });
    let database = AbstractDatabase::from_tables(tables.collect::<Vec<_>>());

    for diagnostic in diagnostics {
        warn!(subject = %diagnostic.subject, "{}", diagnostic.message);
        state.diagnostics.push(diagnostic);
    }
    database
}

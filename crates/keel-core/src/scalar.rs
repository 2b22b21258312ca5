use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::{Annotations, ColumnType};

/// Column type and arguments derived for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ColumnSpec {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            args: Vec::new(),
        }
    }
}

/// A configured scalar mapping, either a bare type name or a type with arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOverride {
    Type(ColumnType),
    Detailed(ColumnSpec),
}

impl ScalarOverride {
    fn into_spec(self) -> ColumnSpec {
        match self {
            ScalarOverride::Type(column_type) => ColumnSpec::new(column_type),
            ScalarOverride::Detailed(spec) => spec,
        }
    }
}

/// Maps source scalars to column types.
///
/// Precedence: a `type` annotation, then configured overrides, then the built-in table.
#[derive(Debug, Clone, Default)]
pub struct ScalarTypeMapper {
    overrides: HashMap<String, ColumnSpec>,
}

impl ScalarTypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, ScalarOverride>) -> Self {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(name, o)| (name, o.into_spec()))
                .collect(),
        }
    }

    pub fn insert(&mut self, scalar: impl Into<String>, spec: ColumnSpec) {
        self.overrides.insert(scalar.into(), spec);
    }

    /// Resolve the column type for `scalar` (absent when the type is forced by annotation).
    ///
    /// Returns `None` when nothing applies.
    pub fn map(&self, scalar: Option<&str>, annotations: &Annotations) -> Option<ColumnSpec> {
        if let Some(forced) = annotations.get("type") {
            let Some(name) = forced.as_str() else {
                warn!(annotation = %forced, "Column type annotation must be a string");
                return None;
            };
            let column_type = match name.parse::<ColumnType>() {
                Ok(t) => t,
                Err(e) => {
                    warn!("{}", e);
                    return None;
                }
            };
            return with_annotation_args(ColumnSpec::new(column_type), annotations);
        }

        let scalar = scalar?;
        let base = self
            .overrides
            .get(scalar)
            .cloned()
            .or_else(|| builtin(scalar))?;
        with_annotation_args(base, annotations)
    }
}

fn builtin(scalar: &str) -> Option<ColumnSpec> {
    let column_type = match scalar {
        "ID" => ColumnType::Uuid,
        "String" => ColumnType::String,
        "Int" => ColumnType::Integer,
        "Float" => ColumnType::Float,
        "Boolean" => ColumnType::Boolean,
        _ => return None,
    };
    Some(ColumnSpec::new(column_type))
}

fn with_annotation_args(mut spec: ColumnSpec, annotations: &Annotations) -> Option<ColumnSpec> {
    match spec.column_type {
        ColumnType::String => {
            if let Some(length) = annotations.get("length") {
                spec.args = vec![length.clone()];
            }
        }
        ColumnType::Decimal => {
            if let Some(precision) = annotations.get("precision") {
                spec.args = vec![precision.clone()];
                if let Some(scale) = annotations.get("scale") {
                    spec.args.push(scale.clone());
                }
            }
        }
        ColumnType::Float => {
            if let Some(precision) = annotations.get("precision") {
                spec.args = vec![precision.clone()];
            }
            spec.args = float_args(spec.args);
        }
        ColumnType::Enum => match annotations.get("values") {
            Some(values @ Value::Array(_)) => spec.args = vec![values.clone()],
            _ if !spec.args.is_empty() => {}
            _ => {
                warn!("Enum column type requires a 'values' annotation");
                return None;
            }
        },
        _ => {}
    }
    Some(spec)
}

/// Floats are stored as `real` or `double precision`, so a precision above 24 reads
/// back as 53 and anything lower as no precision at all.
fn float_args(args: Vec<Value>) -> Vec<Value> {
    match args.first() {
        None | Some(Value::Null) => Vec::new(),
        Some(precision) => match precision.as_u64() {
            Some(p) if p > 24 => vec![Value::from(53)],
            Some(_) => Vec::new(),
            None => args,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotations(value: Value) -> Annotations {
        match value {
            Value::Object(map) => map,
            _ => Annotations::new(),
        }
    }

    #[test]
    fn test_builtin_scalars() {
        let mapper = ScalarTypeMapper::new();
        let none = Annotations::new();
        assert_eq!(mapper.map(Some("ID"), &none).unwrap().column_type, ColumnType::Uuid);
        assert_eq!(mapper.map(Some("String"), &none).unwrap().column_type, ColumnType::String);
        assert_eq!(mapper.map(Some("Int"), &none).unwrap().column_type, ColumnType::Integer);
        assert_eq!(mapper.map(Some("Float"), &none).unwrap().column_type, ColumnType::Float);
        assert_eq!(mapper.map(Some("Boolean"), &none).unwrap().column_type, ColumnType::Boolean);
        assert!(mapper.map(Some("Date"), &none).is_none());
        assert!(mapper.map(None, &none).is_none());
    }

    #[test]
    fn test_forced_type_with_length() {
        let mapper = ScalarTypeMapper::new();
        let spec = mapper
            .map(Some("ID"), &annotations(json!({ "type": "string", "length": 36 })))
            .unwrap();
        assert_eq!(spec.column_type, ColumnType::String);
        assert_eq!(spec.args, vec![json!(36)]);
    }

    #[test]
    fn test_forced_type_without_scalar() {
        let mapper = ScalarTypeMapper::new();
        let spec = mapper.map(None, &annotations(json!({ "type": "json" }))).unwrap();
        assert_eq!(spec.column_type, ColumnType::Json);
        assert!(mapper.map(None, &annotations(json!({ "type": "varchar" }))).is_none());
    }

    #[test]
    fn test_override_wins_over_builtin() {
        let mut overrides = HashMap::new();
        overrides.insert("ID".to_string(), ScalarOverride::Type(ColumnType::BigInteger));
        overrides.insert(
            "Money".to_string(),
            ScalarOverride::Detailed(ColumnSpec {
                column_type: ColumnType::Decimal,
                args: vec![json!(12), json!(2)],
            }),
        );
        let mapper = ScalarTypeMapper::with_overrides(overrides);
        let none = Annotations::new();

        assert_eq!(mapper.map(Some("ID"), &none).unwrap().column_type, ColumnType::BigInteger);
        let money = mapper.map(Some("Money"), &none).unwrap();
        assert_eq!(money.args, vec![json!(12), json!(2)]);

        let precise = mapper
            .map(Some("Money"), &annotations(json!({ "precision": 20, "scale": 4 })))
            .unwrap();
        assert_eq!(precise.args, vec![json!(20), json!(4)]);
    }

    #[test]
    fn test_float_precision_matches_storage() {
        let mapper = ScalarTypeMapper::new();
        let single = mapper
            .map(Some("Float"), &annotations(json!({ "precision": 10, "scale": 2 })))
            .unwrap();
        assert!(single.args.is_empty());

        let double = mapper
            .map(Some("Float"), &annotations(json!({ "precision": 40 })))
            .unwrap();
        assert_eq!(double.args, vec![json!(53)]);

        let mut overrides = HashMap::new();
        overrides.insert(
            "Ratio".to_string(),
            ScalarOverride::Detailed(ColumnSpec {
                column_type: ColumnType::Float,
                args: vec![json!(53)],
            }),
        );
        let mapper = ScalarTypeMapper::with_overrides(overrides);
        let ratio = mapper.map(Some("Ratio"), &Annotations::new()).unwrap();
        assert_eq!(ratio.args, vec![json!(53)]);
    }

    #[test]
    fn test_forced_enum_needs_values() {
        let mapper = ScalarTypeMapper::new();
        assert!(mapper.map(None, &annotations(json!({ "type": "enum" }))).is_none());
        let spec = mapper
            .map(None, &annotations(json!({ "type": "enum", "values": ["a", "b"] })))
            .unwrap();
        assert_eq!(spec.args, vec![json!(["a", "b"])]);
    }
}

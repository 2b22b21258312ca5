//! Declarative type schema consumed by the model builder.
//!
//! The JSON form follows the shape of a GraphQL introspection result:
//!
//! ```json
//! { "types": [
//!   { "kind": "OBJECT", "name": "User", "description": "A user.",
//!     "fields": [
//!       { "name": "id", "type": { "kind": "NON_NULL", "ofType": { "kind": "NAMED", "name": "ID" } } }
//!     ] }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeelError, Result};

/// Scalars every schema knows about without declaring them.
pub const BUILTIN_SCALARS: [&str; 5] = ["ID", "String", "Int", "Float", "Boolean"];

/// Operation root types, never turned into tables.
pub const ROOT_TYPES: [&str; 3] = ["Query", "Mutation", "Subscription"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Object,
    Enum,
    Scalar,
    Interface,
    Union,
    InputObject,
}

/// Reference to a type from a field, possibly wrapped in list / non-null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeRef {
    Named {
        name: String,
    },
    List {
        #[serde(rename = "ofType")]
        of_type: Box<TypeRef>,
    },
    NonNull {
        #[serde(rename = "ofType")]
        of_type: Box<TypeRef>,
    },
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named { name: name.into() }
    }

    pub fn list(of: TypeRef) -> Self {
        TypeRef::List {
            of_type: Box::new(of),
        }
    }

    pub fn non_null(self) -> Self {
        TypeRef::NonNull {
            of_type: Box::new(self),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull { .. })
    }

    /// The reference without its outer non-null wrapper.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull { of_type } => of_type,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_ref,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub enum_values: Vec<String>,
    /// False for types that exist only implicitly (built-ins, generated types).
    #[serde(default = "default_has_definition")]
    pub has_definition: bool,
}

fn default_has_definition() -> bool {
    true
}

impl TypeDefinition {
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Object, name)
    }

    pub fn enumeration(name: impl Into<String>, values: &[&str]) -> Self {
        let mut def = Self::new(TypeKind::Enum, name);
        def.enum_values = values.iter().map(|v| v.to_string()).collect();
        def
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Scalar, name)
    }

    fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            fields: Vec::new(),
            enum_values: Vec::new(),
            has_definition: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A whole type schema with lookup by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeSchema {
    types: Vec<TypeDefinition>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct RawSchema {
    types: Vec<TypeDefinition>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. A type with the same name replaces the earlier one in place.
    pub fn with_type(mut self, def: TypeDefinition) -> Self {
        self.insert(def);
        self
    }

    pub fn insert(&mut self, def: TypeDefinition) {
        match self.index.get(&def.name) {
            Some(&idx) => self.types[idx] = def,
            None => {
                self.index.insert(def.name.clone(), self.types.len());
                self.types.push(def);
            }
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSchema = serde_json::from_str(content)
            .map_err(|e| KeelError::Schema(format!("Failed to parse type schema: {}", e)))?;
        let mut schema = Self::new();
        for def in raw.types {
            schema.insert(def);
        }
        Ok(schema)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| KeelError::Schema(format!("Failed to read type schema: {}", e)))?;
        Self::from_json(&content)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.index.get(name).map(|&idx| &self.types[idx])
    }

    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// Kind of the named type; undeclared built-in scalars count as scalars.
    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.get(name)
            .map(|def| def.kind)
            .or_else(|| BUILTIN_SCALARS.contains(&name).then_some(TypeKind::Scalar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let schema = TypeSchema::from_json(
            r#"{ "types": [
                { "kind": "OBJECT", "name": "User", "description": "A user.",
                  "fields": [
                    { "name": "id", "type": { "kind": "NON_NULL", "ofType": { "kind": "NAMED", "name": "ID" } } },
                    { "name": "tags", "type": { "kind": "LIST", "ofType": { "kind": "NAMED", "name": "String" } } }
                  ] },
                { "kind": "ENUM", "name": "Role", "enumValues": ["ADMIN", "USER"] },
                { "kind": "SCALAR", "name": "Date", "hasDefinition": false }
            ] }"#,
        )
        .unwrap();

        let user = schema.get("User").unwrap();
        assert_eq!(user.kind, TypeKind::Object);
        assert!(user.has_definition);
        assert_eq!(
            user.get_field("id").unwrap().type_ref,
            TypeRef::named("ID").non_null()
        );
        assert_eq!(
            user.get_field("tags").unwrap().type_ref,
            TypeRef::list(TypeRef::named("String"))
        );
        assert_eq!(schema.get("Role").unwrap().enum_values, vec!["ADMIN", "USER"]);
        assert!(!schema.get("Date").unwrap().has_definition);
    }

    #[test]
    fn test_builtin_scalars_are_known() {
        let schema = TypeSchema::new();
        assert_eq!(schema.kind_of("ID"), Some(TypeKind::Scalar));
        assert_eq!(schema.kind_of("Date"), None);
    }

    #[test]
    fn test_invalid_json_is_a_schema_error() {
        let err = TypeSchema::from_json("{ \"types\": 3 }").unwrap_err();
        assert!(matches!(err, KeelError::Schema(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{ "types": [ { "kind": "OBJECT", "name": "Post" } ] }"#).unwrap();
        let schema = TypeSchema::from_file(&path).unwrap();
        assert_eq!(schema.types().len(), 1);
    }
}

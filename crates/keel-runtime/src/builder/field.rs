use keel_core::model::Annotations;
use keel_core::type_schema::{FieldDefinition, TypeDefinition, TypeKind, TypeRef, TypeSchema};

/// What a field turns into.
#[derive(Debug)]
pub(crate) enum FieldShape<'s> {
    /// A scalar column. The scalar name is absent when a `type` annotation forces a
    /// type on a field that is not a plain scalar.
    Scalar(Option<&'s str>),
    Enum(&'s TypeDefinition),
    ObjectRef(&'s TypeDefinition),
    ObjectList(&'s TypeDefinition),
    /// List of scalars or enums stored as a `json` column.
    JsonList,
    Unsupported(String),
}

pub(crate) fn classify<'s>(
    schema: &'s TypeSchema,
    field: &'s FieldDefinition,
    annotations: &Annotations,
    list_as_json: bool,
) -> FieldShape<'s> {
    let inner = field.type_ref.nullable();

    if annotations.contains_key("type") {
        let scalar = match inner {
            TypeRef::Named { name } if schema.kind_of(name) == Some(TypeKind::Scalar) => {
                Some(name.as_str())
            }
            _ => None,
        };
        return FieldShape::Scalar(scalar);
    }

    match inner {
        TypeRef::Named { name } => match (schema.kind_of(name), schema.get(name)) {
            (Some(TypeKind::Scalar), _) => FieldShape::Scalar(Some(name.as_str())),
            (Some(TypeKind::Enum), Some(def)) => FieldShape::Enum(def),
            (Some(TypeKind::Object), Some(def)) => FieldShape::ObjectRef(def),
            (None, _) => FieldShape::Unsupported(format!("type {} not found", name)),
            (Some(kind), _) => FieldShape::Unsupported(format!("{:?} type {}", kind, name)),
        },
        TypeRef::List { of_type } => match of_type.nullable() {
            TypeRef::Named { name } => match (schema.kind_of(name), schema.get(name)) {
                (Some(TypeKind::Object), Some(def)) => FieldShape::ObjectList(def),
                (Some(TypeKind::Scalar | TypeKind::Enum), _) if list_as_json => FieldShape::JsonList,
                (Some(TypeKind::Scalar | TypeKind::Enum), _) => FieldShape::Unsupported(format!(
                    "list of {}, use @db.type: 'json' to store it",
                    name
                )),
                _ => FieldShape::Unsupported(format!("list of {}", name)),
            },
            _ => FieldShape::Unsupported("nested list".to_string()),
        },
        TypeRef::NonNull { .. } => FieldShape::Unsupported("doubly non-null type".to_string()),
    }
}

/// The named type of a field once list and non-null wrappers are ignored at the top level.
pub(crate) fn named_type(type_ref: &TypeRef) -> Option<&str> {
    match type_ref.nullable() {
        TypeRef::Named { name } => Some(name),
        _ => None,
    }
}

pub(crate) fn is_list(type_ref: &TypeRef) -> bool {
    matches!(type_ref.nullable(), TypeRef::List { .. })
}

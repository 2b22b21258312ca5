//! Many-to-many relationships and their join tables.

use serde_json::Value;
use tracing::debug;

use keel_core::model::{Annotations, Index};
use keel_core::type_schema::{FieldDefinition, TypeDefinition};

use super::field::is_list;
use super::{BuildState, PendingColumn, PendingTable, SchemaModelBuilder};

const JOIN_SEPARATOR: &str = "_JOIN_";
const COLLISION_SUFFIX: &str = "_other";

/// Deterministic join table name for the pair `(owner.field, target.inverse)`.
pub(crate) fn join_table_name(owner: &str, field: &str, target: &str, inverse: &str) -> String {
    let mut sides = [format!("{}_{}", owner, field), format!("{}_{}", target, inverse)];
    sides.sort();
    sides.join(JOIN_SEPARATOR)
}

impl<'s> SchemaModelBuilder<'s> {
    /// Handle a list field pointing at another object type.
    ///
    /// A relationship exists only when the target declares a matching inverse list field;
    /// otherwise the field is ignored. The list field itself never produces a column.
    pub(super) fn build_relation(
        &self,
        state: &mut BuildState,
        owner: &'s TypeDefinition,
        field: &'s FieldDefinition,
        annotations: &Annotations,
        target: &'s TypeDefinition,
    ) {
        let self_reference = owner.name == target.name;
        let subject = format!("{}.{}", owner.name, field.name);

        let inverse_name = if self_reference {
            field.name.clone()
        } else {
            annotations
                .get("manyToMany")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| owner.name.to_lowercase())
        };

        let Some(inverse) = target.get_field(&inverse_name) else {
            debug!(subject = %subject, inverse = %inverse_name, "No inverse field, relationship skipped");
            return;
        };
        let inverse_annotations = self.parser.parse(inverse.description.as_deref());
        if let Some(paired) = inverse_annotations.get("foreign").and_then(Value::as_str) {
            if paired != field.name {
                debug!(subject = %subject, paired, "Inverse field pairs with another field");
                return;
            }
        }
        if !is_list(&inverse.type_ref) {
            debug!(subject = %subject, "Inverse field is not a list, relationship skipped");
            return;
        }

        let join_name = match annotations.get("table").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => self.name(&join_table_name(
                &owner.name,
                &field.name,
                &target.name,
                &inverse.name,
            )),
        };

        let columns = if self_reference {
            let key = annotations
                .get("manyToMany")
                .and_then(Value::as_str)
                .unwrap_or("id");
            let Some(key_field) = target.get_field(key) else {
                state.diagnose(&subject, format!("foreign field {} not found on type {}", key, target.name));
                return;
            };
            let key_annotations = self.parser.parse(key_field.description.as_deref());
            let Some(column) =
                self.reference_column(state, &subject, key_field, &key_annotations, target, key)
            else {
                return;
            };
            vec![column.clone(), column]
        } else {
            let Some(column) =
                self.reference_column(state, &subject, inverse, &inverse_annotations, target, "id")
            else {
                return;
            };
            vec![column]
        };

        if !state.database.contains(&join_name) {
            let comment = format!(
                "Join table between {}.{} and {}.{}",
                owner.name, field.name, target.name, inverse.name
            );
            let _ = state
                .database
                .push(PendingTable::new(join_name.clone()).with_comment(comment));
            state.join_tables.insert(join_name.clone());
        } else if !state.join_tables.contains(&join_name) {
            state.diagnose(
                &subject,
                format!("join table {} clashes with an existing table", join_name),
            );
            return;
        }

        let Some(join_table) = state.database.get_mut(&join_name) else {
            return;
        };
        let names = add_join_columns(join_table, columns);
        if names.is_empty() {
            state.diagnose(&subject, format!("join table {} already holds this relationship", join_name));
            return;
        }
        join_table.indexes.push(Index::new(names));
    }
}

/// Append the columns, renaming on collision. Returns the names actually added.
fn add_join_columns(table: &mut PendingTable, columns: Vec<PendingColumn>) -> Vec<String> {
    let mut names = Vec::with_capacity(columns.len());
    for mut column in columns {
        if table.has_column(&column.name) {
            column.name.push_str(COLLISION_SUFFIX);
        }
        let name = column.name.clone();
        if table.push_column(column).is_ok() {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_table_name_is_order_independent() {
        assert_eq!(
            join_table_name("User", "messages", "Message", "users"),
            "Message_users_JOIN_User_messages"
        );
        assert_eq!(
            join_table_name("Message", "users", "User", "messages"),
            "Message_users_JOIN_User_messages"
        );
    }

    #[test]
    fn test_collision_suffix() {
        let mut table = PendingTable::new("User_contacts_JOIN_User_contacts");
        let column = PendingColumn::new("id_foreign", keel_core::ColumnType::Uuid);
        let names = add_join_columns(&mut table, vec![column.clone(), column]);
        assert_eq!(names, vec!["id_foreign", "id_foreign_other"]);
    }
}

use std::collections::{HashSet, VecDeque};

use keel_core::Operation;

/// How a group reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A new table with everything defined on it.
    Create,
    /// Changes to an existing table applied as one alteration.
    Alter,
    Rename,
    Drop,
}

/// Operations applied together through one table-definition callback.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationGroup {
    pub kind: GroupKind,
    pub table: String,
    /// The operation that opened the group.
    pub parent: Operation,
    /// Other queued operations on the same table, in queue order.
    pub children: Vec<Operation>,
}

impl OperationGroup {
    /// Parent first, then children.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        std::iter::once(&self.parent).chain(self.children.iter())
    }

    pub fn into_operations(self) -> Vec<Operation> {
        let mut operations = Vec::with_capacity(self.children.len() + 1);
        operations.push(self.parent);
        operations.extend(self.children);
        operations
    }

    pub fn len(&self) -> usize {
        self.children.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

fn joins_create(op: &Operation) -> bool {
    !matches!(
        op,
        Operation::TableCreate { .. }
            | Operation::TableRename { .. }
            | Operation::TableDrop { .. }
            | Operation::TableForeignDrop { .. }
            | Operation::TableIndexDrop { .. }
            | Operation::TableUniqueDrop { .. }
            | Operation::ColumnRename { .. }
            | Operation::ColumnDrop { .. }
    )
}

fn joins_alter(op: &Operation) -> bool {
    !matches!(
        op,
        Operation::TableCreate { .. } | Operation::TableRename { .. } | Operation::TableDrop { .. }
    )
}

/// A foreign key whose referenced table is still waiting to be created.
fn waits_for_create(op: &Operation, pending_creates: &HashSet<String>) -> Option<String> {
    match op {
        Operation::TableForeignCreate {
            table, reference, ..
        } if reference.table != *table && pending_creates.contains(&reference.table) => {
            Some(reference.table.clone())
        }
        _ => None,
    }
}

fn pending_creates(queue: &VecDeque<Operation>) -> HashSet<String> {
    queue
        .iter()
        .filter_map(|op| match op {
            Operation::TableCreate { table } => Some(table.clone()),
            _ => None,
        })
        .collect()
}

/// Remove the next group from the head of `queue`.
///
/// Table creates pull every queued operation defining the new table; renames and drops
/// stand alone; anything else opens an alteration that pulls every other queued
/// operation on the same table. Foreign keys to tables not yet created are left behind
/// and moved after the pending create.
pub fn next_group(queue: &mut VecDeque<Operation>) -> Option<OperationGroup> {
    loop {
        let head = queue.pop_front()?;
        let pending = pending_creates(queue);

        if let Some(referenced) = waits_for_create(&head, &pending) {
            let position = queue
                .iter()
                .position(|op| matches!(op, Operation::TableCreate { table } if *table == referenced))
                .map_or(queue.len(), |p| p + 1);
            queue.insert(position, head);
            continue;
        }

        let (kind, table) = match &head {
            Operation::TableCreate { table } => (GroupKind::Create, table.clone()),
            Operation::TableRename { from_name, .. } => (GroupKind::Rename, from_name.clone()),
            Operation::TableDrop { table } => (GroupKind::Drop, table.clone()),
            other => (GroupKind::Alter, other.table().to_string()),
        };

        let children = match kind {
            GroupKind::Create => take_matching(queue, |op| {
                op.table() == table && joins_create(op) && waits_for_create(op, &pending).is_none()
            }),
            GroupKind::Alter => take_matching(queue, |op| {
                op.table() == table && joins_alter(op) && waits_for_create(op, &pending).is_none()
            }),
            GroupKind::Rename | GroupKind::Drop => Vec::new(),
        };

        return Some(OperationGroup {
            kind,
            table,
            parent: head,
            children,
        });
    }
}

fn take_matching(queue: &mut VecDeque<Operation>, take: impl Fn(&Operation) -> bool) -> Vec<Operation> {
    let mut taken = Vec::new();
    let mut rest = VecDeque::with_capacity(queue.len());
    for op in queue.drain(..) {
        if take(&op) {
            taken.push(op);
        } else {
            rest.push_back(op);
        }
    }
    *queue = rest;
    taken
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::model::ForeignKey;
    use keel_core::{ColumnType, OperationKind};

    fn create(table: &str) -> Operation {
        Operation::TableCreate { table: table.into() }
    }

    fn column(table: &str, name: &str) -> Operation {
        Operation::ColumnCreate {
            table: table.into(),
            column: name.into(),
            column_type: ColumnType::Uuid,
            args: vec![],
        }
    }

    fn foreign(table: &str, column: &str, target: &str) -> Operation {
        Operation::TableForeignCreate {
            table: table.into(),
            column: column.into(),
            reference: ForeignKey::new(target, "id"),
        }
    }

    fn drain(ops: Vec<Operation>) -> Vec<OperationGroup> {
        let mut queue: VecDeque<Operation> = ops.into();
        let mut groups = Vec::new();
        while let Some(group) = next_group(&mut queue) {
            groups.push(group);
        }
        groups
    }

    #[test]
    fn test_create_pulls_table_operations() {
        let groups = drain(vec![
            create("users"),
            column("users", "id"),
            create("teams"),
            column("teams", "id"),
            Operation::TablePrimarySet {
                table: "users".into(),
                columns: Some(vec!["id".into()]),
                index_name: None,
                previous_name: None,
            },
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Create);
        assert_eq!(groups[0].table, "users");
        let kinds: Vec<OperationKind> = groups[0].children.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec![OperationKind::ColumnCreate, OperationKind::TablePrimarySet]);
        assert_eq!(groups[1].table, "teams");
        assert_eq!(groups[1].len(), 2);
    }

    #[test]
    fn test_rename_and_drop_stand_alone() {
        let groups = drain(vec![
            Operation::TableDrop { table: "old".into() },
            Operation::TableRename {
                from_name: "users".into(),
                to_name: "people".into(),
            },
            column("people", "email"),
        ]);
        let kinds: Vec<GroupKind> = groups.iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![GroupKind::Drop, GroupKind::Rename, GroupKind::Alter]);
        assert!(groups[0].children.is_empty());
    }

    #[test]
    fn test_alter_pulls_later_operations() {
        let groups = drain(vec![
            Operation::ColumnDrop {
                table: "users".into(),
                column: "legacy".into(),
            },
            column("teams", "id"),
            column("users", "email"),
            Operation::ColumnNullableSet {
                table: "users".into(),
                column: "email".into(),
                nullable: false,
            },
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Alter);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].table, "teams");
    }

    #[test]
    fn test_foreign_key_waits_for_referenced_table() {
        let groups = drain(vec![
            create("messages"),
            column("messages", "user_foreign"),
            foreign("messages", "user_foreign", "users"),
            create("users"),
            column("users", "id"),
        ]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].table, "messages");
        assert!(groups[0]
            .children
            .iter()
            .all(|op| op.kind() != OperationKind::TableForeignCreate));
        assert_eq!(groups[1].table, "users");
        assert_eq!(groups[2].kind, GroupKind::Alter);
        assert_eq!(groups[2].parent, foreign("messages", "user_foreign", "users"));
    }

    #[test]
    fn test_self_reference_is_not_deferred() {
        let groups = drain(vec![
            create("users"),
            column("users", "manager_foreign"),
            foreign("users", "manager_foreign", "users"),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_mutual_references() {
        let groups = drain(vec![
            create("a"),
            foreign("a", "b_foreign", "b"),
            create("b"),
            foreign("b", "a_foreign", "a"),
        ]);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].table, "b");
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[2].parent, foreign("a", "b_foreign", "b"));
    }

    #[test]
    fn test_into_operations_keeps_parent_first() {
        let group = drain(vec![create("t"), column("t", "id")]).remove(0);
        let ops = group.into_operations();
        assert_eq!(ops[0], create("t"));
        assert_eq!(ops.len(), 2);
    }
}

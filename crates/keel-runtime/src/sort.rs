use keel_core::{Operation, OperationKind};

/// Kinds that must run before everything else, in this order.
const PRIORITY: [OperationKind; 5] = [
    OperationKind::TableForeignDrop,
    OperationKind::TableUniqueDrop,
    OperationKind::TableIndexDrop,
    OperationKind::ColumnDrop,
    OperationKind::TableDrop,
];

/// Orders operations so detaching and destructive ones come first.
pub struct OperationSorter;

impl OperationSorter {
    fn rank(kind: OperationKind) -> usize {
        PRIORITY
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(PRIORITY.len())
    }

    /// Stable sort: operations of equal rank keep their relative order.
    pub fn sort(operations: &mut [Operation]) {
        operations.sort_by_key(|op| Self::rank(op.kind()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ColumnType;

    #[test]
    fn test_destructive_first() {
        let mut ops = vec![
            Operation::TableIndexDrop {
                table: "a".into(),
                columns: vec!["x".into()],
                index_name: None,
            },
            Operation::ColumnCreate {
                table: "b".into(),
                column: "y".into(),
                column_type: ColumnType::Text,
                args: vec![],
            },
            Operation::TableUniqueDrop {
                table: "a".into(),
                columns: vec!["z".into()],
                index_name: None,
            },
            Operation::TableCreate { table: "c".into() },
            Operation::TableDrop { table: "d".into() },
        ];
        OperationSorter::sort(&mut ops);

        let kinds: Vec<&str> = ops.iter().map(|op| op.kind().as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "table.unique.drop",
                "table.index.drop",
                "table.drop",
                "column.create",
                "table.create",
            ]
        );
    }

    #[test]
    fn test_stable_within_rank() {
        let mut ops: Vec<Operation> = ["c", "a", "b"]
            .iter()
            .map(|t| Operation::TableCreate { table: t.to_string() })
            .chain(std::iter::once(Operation::ColumnDrop {
                table: "a".into(),
                column: "old".into(),
            }))
            .collect();
        OperationSorter::sort(&mut ops);

        let tables: Vec<&str> = ops.iter().map(|op| op.table()).collect();
        assert_eq!(tables, vec!["a", "c", "a", "b"]);
        assert_eq!(ops[0].kind(), OperationKind::ColumnDrop);
    }

    #[test]
    fn test_foreign_drop_before_column_drop() {
        let mut ops = vec![
            Operation::ColumnDrop {
                table: "m".into(),
                column: "user_foreign".into(),
            },
            Operation::TableForeignDrop {
                table: "m".into(),
                column: "user_foreign".into(),
            },
        ];
        OperationSorter::sort(&mut ops);
        assert_eq!(ops[0].kind(), OperationKind::TableForeignDrop);
    }
}

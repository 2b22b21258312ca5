//! Structural comparison of two [`AbstractDatabase`] snapshots.

use keel_core::model::{AbstractDatabase, Index, Table, TableColumn, Unique};
use keel_core::Operation;

/// Options for [`DiffEngine`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Emit comment changes for tables and columns that exist on both sides.
    pub update_comments: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            update_comments: true,
        }
    }
}

/// Computes the operations that turn one model into another.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Operations transforming `from` into `to`.
    pub fn diff(&self, from: &AbstractDatabase, to: &AbstractDatabase) -> Vec<Operation> {
        let mut differ = Differ {
            options: &self.options,
            operations: Vec::new(),
        };
        differ.diff(from, to);
        differ.operations
    }
}

struct Differ<'a> {
    options: &'a DiffOptions,
    operations: Vec<Operation>,
}

/// How an item of the `from` side relates to the `to` side.
enum Correlation<'t, T> {
    Same(&'t T, &'t T),
    Renamed(&'t T, &'t T),
    Removed(&'t T),
}

/// Pair items of `from` with items of `to` by name or by a prior name of the `to` item.
/// A `to` item is consumed by its first match.
///
/// Returns one entry per `from` item, in `from` order, and the unmatched `to` items.
fn correlate<'t, T>(
    from: &'t [T],
    to: &'t [T],
    name: impl Fn(&T) -> &str,
    old_names: impl Fn(&T) -> Vec<&str>,
) -> (Vec<Correlation<'t, T>>, Vec<&'t T>) {
    let mut remaining: Vec<&T> = to.iter().collect();
    let mut correlations = Vec::with_capacity(from.len());

    for from_item in from {
        let from_name = name(from_item);
        let found = remaining.iter().position(|candidate| {
            name(candidate) == from_name || old_names(candidate).contains(&from_name)
        });
        correlations.push(match found {
            Some(idx) => {
                let to_item = remaining.remove(idx);
                if name(to_item) == from_name {
                    Correlation::Same(from_item, to_item)
                } else {
                    Correlation::Renamed(from_item, to_item)
                }
            }
            None => Correlation::Removed(from_item),
        });
    }

    (correlations, remaining)
}

impl Differ<'_> {
    fn diff(&mut self, from: &AbstractDatabase, to: &AbstractDatabase) {
        let (correlations, added) = correlate(
            from.tables(),
            to.tables(),
            |t| t.name.as_str(),
            |t| t.old_names(),
        );

        let mut matched = Vec::new();
        for correlation in correlations {
            match correlation {
                Correlation::Same(from_table, to_table) => matched.push((from_table, to_table)),
                Correlation::Renamed(from_table, to_table) => {
                    self.operations.push(Operation::TableRename {
                        from_name: from_table.name.clone(),
                        to_name: to_table.name.clone(),
                    });
                    matched.push((from_table, to_table));
                }
                Correlation::Removed(from_table) => self.operations.push(Operation::TableDrop {
                    table: from_table.name.clone(),
                }),
            }
        }

        for table in added {
            self.create_table(table);
        }

        for (from_table, to_table) in matched {
            self.compare_table(from_table, to_table);
        }
    }

    fn compare_table(&mut self, from: &Table, to: &Table) {
        if self.options.update_comments && from.comment != to.comment {
            self.set_table_comment(to);
        }

        let (correlations, added) = correlate(
            from.columns(),
            to.columns(),
            |c| c.name.as_str(),
            |c| c.old_names(),
        );

        let mut matched = Vec::new();
        for correlation in correlations {
            match correlation {
                Correlation::Same(from_col, to_col) => matched.push((from_col, to_col)),
                Correlation::Renamed(from_col, to_col) => {
                    self.operations.push(Operation::ColumnRename {
                        table: to.name.clone(),
                        from_name: from_col.name.clone(),
                        to_name: to_col.name.clone(),
                    });
                    matched.push((from_col, to_col));
                }
                Correlation::Removed(from_col) => self.operations.push(Operation::ColumnDrop {
                    table: from.name.clone(),
                    column: from_col.name.clone(),
                }),
            }
        }

        for column in added {
            self.create_column(to, column);
        }

        for (from_col, to_col) in matched {
            self.compare_column(from, to, from_col, to_col);
        }

        if from.primary != to.primary {
            self.operations.push(Operation::TablePrimarySet {
                table: to.name.clone(),
                columns: to.primary.as_ref().map(|p| p.columns.clone()),
                index_name: to.primary.as_ref().and_then(|p| p.name.clone()),
                previous_name: from.primary.as_ref().and_then(|p| p.name.clone()),
            });
        }

        let (dropped, created) = unmatched(&from.indexes, &to.indexes, Index::same_as);
        for index in dropped {
            self.operations.push(Operation::TableIndexDrop {
                table: from.name.clone(),
                columns: index.columns.clone(),
                index_name: index.name.clone(),
            });
        }
        for index in created {
            self.create_index(to, index);
        }

        let (dropped, created) = unmatched(&from.uniques, &to.uniques, Unique::same_as);
        for unique in dropped {
            self.operations.push(Operation::TableUniqueDrop {
                table: from.name.clone(),
                columns: unique.columns.clone(),
                index_name: unique.name.clone(),
            });
        }
        for unique in created {
            self.create_unique(to, unique);
        }
    }

    /// Destructive operations are sorted ahead of renames, so they name the `from` table.
    fn compare_column(
        &mut self,
        from_table: &Table,
        table: &Table,
        from: &TableColumn,
        to: &TableColumn,
    ) {
        if self.options.update_comments && from.comment != to.comment {
            self.set_column_comment(table, to);
        }

        if from.column_type != to.column_type || from.args != to.args {
            self.operations.push(Operation::ColumnTypeSet {
                table: table.name.clone(),
                column: to.name.clone(),
                column_type: to.column_type,
                args: to.args.clone(),
            });
        }

        if from.not_null != to.not_null {
            self.set_nullable(table, to);
        }

        // serde_json::Value equality is structural for arrays and objects.
        if from.default_value != to.default_value {
            self.set_default(table, to);
        }

        if from.foreign_key != to.foreign_key {
            if from.foreign_key.is_some() {
                self.operations.push(Operation::TableForeignDrop {
                    table: from_table.name.clone(),
                    column: from.name.clone(),
                });
            }
            self.create_foreign_key(table, to);
        }
    }

    fn create_table(&mut self, table: &Table) {
        self.operations.push(Operation::TableCreate {
            table: table.name.clone(),
        });

        if table.comment.is_some() {
            self.set_table_comment(table);
        }

        for column in table.columns() {
            self.create_column(table, column);
        }

        if let Some(primary) = &table.primary {
            self.operations.push(Operation::TablePrimarySet {
                table: table.name.clone(),
                columns: Some(primary.columns.clone()),
                index_name: primary.name.clone(),
                previous_name: None,
            });
        }

        for index in &table.indexes {
            self.create_index(table, index);
        }

        for unique in &table.uniques {
            self.create_unique(table, unique);
        }
    }

    fn create_column(&mut self, table: &Table, column: &TableColumn) {
        self.operations.push(Operation::ColumnCreate {
            table: table.name.clone(),
            column: column.name.clone(),
            column_type: column.column_type,
            args: column.args.clone(),
        });

        if column.comment.is_some() {
            self.set_column_comment(table, column);
        }

        if column.not_null {
            self.set_nullable(table, column);
        }

        if column.default_value.is_some() {
            self.set_default(table, column);
        }

        self.create_foreign_key(table, column);
    }

    fn set_table_comment(&mut self, table: &Table) {
        self.operations.push(Operation::TableCommentSet {
            table: table.name.clone(),
            comment: table.comment.clone(),
        });
    }

    fn set_column_comment(&mut self, table: &Table, column: &TableColumn) {
        self.operations.push(Operation::ColumnCommentSet {
            table: table.name.clone(),
            column: column.name.clone(),
            comment: column.comment.clone(),
        });
    }

    fn set_nullable(&mut self, table: &Table, column: &TableColumn) {
        self.operations.push(Operation::ColumnNullableSet {
            table: table.name.clone(),
            column: column.name.clone(),
            nullable: !column.not_null,
        });
    }

    fn set_default(&mut self, table: &Table, column: &TableColumn) {
        self.operations.push(Operation::ColumnDefaultSet {
            table: table.name.clone(),
            column: column.name.clone(),
            value: column.default_value.clone(),
        });
    }

    fn create_foreign_key(&mut self, table: &Table, column: &TableColumn) {
        if let Some(reference) = &column.foreign_key {
            self.operations.push(Operation::TableForeignCreate {
                table: table.name.clone(),
                column: column.name.clone(),
                reference: reference.clone(),
            });
        }
    }

    fn create_index(&mut self, table: &Table, index: &Index) {
        self.operations.push(Operation::TableIndexCreate {
            table: table.name.clone(),
            columns: index.columns.clone(),
            index_name: index.name.clone(),
            index_type: index.index_type.clone(),
        });
    }

    fn create_unique(&mut self, table: &Table, unique: &Unique) {
        self.operations.push(Operation::TableUniqueCreate {
            table: table.name.clone(),
            columns: unique.columns.clone(),
            index_name: unique.name.clone(),
        });
    }
}

/// Set difference in both directions under `same`. Each `to` item matches at most once.
fn unmatched<'t, T>(
    from: &'t [T],
    to: &'t [T],
    same: impl Fn(&T, &T) -> bool,
) -> (Vec<&'t T>, Vec<&'t T>) {
    let mut remaining: Vec<&T> = to.iter().collect();
    let mut dropped = Vec::new();
    for item in from {
        match remaining.iter().position(|candidate| same(item, candidate)) {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => dropped.push(item),
        }
    }
    (dropped, remaining)
}

#[cfg(test)]
mod tests;

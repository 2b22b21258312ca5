use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::column::{old_names, ForeignKey, TableColumn};
use super::Annotations;

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub index_type: Option<String>,
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Unique {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// The primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Primary {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            index_type: None,
        }
    }

    /// Name, type and column set match; column order is ignored.
    pub fn same_as(&self, other: &Index) -> bool {
        self.name == other.name
            && self.index_type == other.index_type
            && same_columns(&self.columns, &other.columns)
    }
}

impl Unique {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
        }
    }

    pub fn same_as(&self, other: &Unique) -> bool {
        self.name == other.name && same_columns(&self.columns, &other.columns)
    }
}

impl Primary {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
        }
    }
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

/// A table of the abstract model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table<K = ForeignKey> {
    pub name: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
    columns: Vec<TableColumn<K>>,
    #[serde(skip)]
    column_index: HashMap<String, usize>,
    pub primary: Option<Primary>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub uniques: Vec<Unique>,
}

impl<K> Table<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            annotations: Annotations::new(),
            columns: Vec::new(),
            column_index: HashMap::new(),
            primary: None,
            indexes: Vec::new(),
            uniques: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Append a column and return it. Fails with the rejected column when the name is taken.
    pub fn push_column(&mut self, column: TableColumn<K>) -> Result<&mut TableColumn<K>, TableColumn<K>> {
        if self.column_index.contains_key(&column.name) {
            return Err(column);
        }
        let idx = self.columns.len();
        self.column_index.insert(column.name.clone(), idx);
        self.columns.push(column);
        Ok(&mut self.columns[idx])
    }

    pub fn with_column(mut self, column: TableColumn<K>) -> Self {
        let _ = self.push_column(column);
        self
    }

    pub fn columns(&self) -> &[TableColumn<K>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn<K>> {
        self.column_index.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut TableColumn<K>> {
        let idx = *self.column_index.get(name)?;
        self.columns.get_mut(idx)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Record a primary designation for `column`.
    ///
    /// A named primary that matches the current one gains the column. Anything else
    /// replaces the current primary; a table never holds more than one.
    pub fn add_primary(&mut self, name: Option<String>, column: impl Into<String>) {
        match &mut self.primary {
            Some(primary) if name.is_some() && primary.name == name => {
                primary.columns.push(column.into());
            }
            slot => {
                *slot = Some(Primary {
                    name,
                    columns: vec![column.into()],
                });
            }
        }
    }

    /// Add `column` to the index called `name`, or start a new index.
    pub fn add_index(&mut self, name: Option<String>, index_type: Option<String>, column: impl Into<String>) {
        if let Some(existing) = name
            .as_ref()
            .and_then(|n| self.indexes.iter_mut().find(|i| i.name.as_ref() == Some(n)))
        {
            existing.columns.push(column.into());
            return;
        }
        self.indexes.push(Index {
            name,
            columns: vec![column.into()],
            index_type,
        });
    }

    /// Add `column` to the unique constraint called `name`, or start a new one.
    pub fn add_unique(&mut self, name: Option<String>, column: impl Into<String>) {
        if let Some(existing) = name
            .as_ref()
            .and_then(|n| self.uniques.iter_mut().find(|u| u.name.as_ref() == Some(n)))
        {
            existing.columns.push(column.into());
            return;
        }
        self.uniques.push(Unique {
            name,
            columns: vec![column.into()],
        });
    }

    pub fn old_names(&self) -> Vec<&str> {
        old_names(&self.annotations)
    }

    /// Swap the foreign key representation of every column.
    pub fn map_foreign_keys<L>(self, mut f: impl FnMut(&str, &str, K) -> Option<L>) -> Table<L> {
        let table_name = self.name;
        let columns: Vec<TableColumn<L>> = self
            .columns
            .into_iter()
            .map(|column| {
                let column_name = column.name.clone();
                column.map_foreign_key(|key| f(&table_name, &column_name, key))
            })
            .collect();

        Table {
            name: table_name,
            comment: self.comment,
            annotations: self.annotations,
            columns,
            column_index: self.column_index,
            primary: self.primary,
            indexes: self.indexes,
            uniques: self.uniques,
        }
    }

    /// Rebuild the name index after deserialization.
    pub fn reindex(&mut self) {
        self.column_index = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
    }
}

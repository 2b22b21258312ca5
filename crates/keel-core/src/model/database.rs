use std::collections::HashMap;

use serde::{Serialize, Serializer};

use super::column::ForeignKey;
use super::table::Table;

/// Ordered collection of tables with lookup by name.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractDatabase<K = ForeignKey> {
    tables: Vec<Table<K>>,
    index: HashMap<String, usize>,
}

impl<K> Default for AbstractDatabase<K> {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K> AbstractDatabase<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of tables. Later tables with a duplicate name are discarded.
    pub fn from_tables(tables: impl IntoIterator<Item = Table<K>>) -> Self {
        let mut db = Self::new();
        for mut table in tables {
            table.reindex();
            let _ = db.push(table);
        }
        db
    }

    /// Append a table. Fails with the rejected table when the name is taken.
    pub fn push(&mut self, table: Table<K>) -> Result<&mut Table<K>, Table<K>> {
        if self.index.contains_key(&table.name) {
            return Err(table);
        }
        let idx = self.tables.len();
        self.index.insert(table.name.clone(), idx);
        self.tables.push(table);
        Ok(&mut self.tables[idx])
    }

    pub fn get(&self, name: &str) -> Option<&Table<K>> {
        self.index.get(name).map(|&idx| &self.tables[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table<K>> {
        self.index.get(name).map(|&idx| &mut self.tables[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tables(&self) -> &[Table<K>] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_tables(self) -> Vec<Table<K>> {
        self.tables
    }
}

impl<K: Serialize> Serialize for AbstractDatabase<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tables.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order_and_lookup() {
        let mut db: AbstractDatabase = AbstractDatabase::new();
        db.push(Table::new("users")).unwrap();
        db.push(Table::new("messages")).unwrap();
        assert!(db.push(Table::new("users")).is_err());

        let names: Vec<&str> = db.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "messages"]);
        assert!(db.get("messages").is_some());
        assert!(db.get("posts").is_none());
    }

    #[test]
    fn test_from_tables_skips_duplicates() {
        let db: AbstractDatabase = AbstractDatabase::from_tables(vec![
            Table::new("a").with_comment("first"),
            Table::new("a").with_comment("second"),
        ]);
        assert_eq!(db.len(), 1);
        assert_eq!(db.get("a").unwrap().comment.as_deref(), Some("first"));
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::scalar::ScalarOverride;

/// Options controlling how a migration run derives and applies the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Database namespace holding the managed tables.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Prefix added to every table name in the database.
    #[serde(default)]
    pub table_prefix: String,

    /// Prefix added to every column name in the database.
    #[serde(default)]
    pub column_prefix: String,

    /// Overwrite comments of existing tables and columns.
    #[serde(default)]
    pub update_comments: bool,

    /// Lower-case table and column names derived from type and field names.
    ///
    /// Off unless enabled, so a type `User` maps to table `User`. Set it to get the
    /// all-lowercase naming (`user`) of tools that lower-case by default.
    #[serde(default)]
    pub lowercase_names: bool,

    /// Scalar name to column type overrides.
    #[serde(default)]
    pub scalars: HashMap<String, ScalarOverride>,

    /// Store lists of scalars and enums as `json` columns.
    #[serde(default)]
    pub list_as_json: bool,

    /// Plugins to enable, by name.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Log both models and the planned operations.
    #[serde(default)]
    pub debug: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            table_prefix: String::new(),
            column_prefix: String::new(),
            update_comments: false,
            lowercase_names: false,
            scalars: HashMap::new(),
            list_as_json: false,
            plugins: Vec::new(),
            debug: false,
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

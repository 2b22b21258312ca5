use super::*;
use keel_core::model::{ColumnType, ForeignKey, Primary};
use serde_json::json;

fn db(tables: Vec<Table>) -> AbstractDatabase {
    AbstractDatabase::from_tables(tables)
}

fn user_table() -> Table {
    let mut table = Table::new("User")
        .with_comment("A user.")
        .with_column(TableColumn::new("id", ColumnType::Uuid).not_null())
        .with_column(TableColumn::new("name", ColumnType::String));
    table.primary = Some(Primary::new(vec!["id".into()]));
    table
}

fn kinds(ops: &[Operation]) -> Vec<&'static str> {
    ops.iter().map(|op| op.kind().as_str()).collect()
}

#[test]
fn test_create_simple_table() {
    let ops = DiffEngine::new().diff(&db(vec![]), &db(vec![user_table()]));
    assert_eq!(ops.len(), 6);
    assert_eq!(
        ops,
        vec![
            Operation::TableCreate { table: "User".into() },
            Operation::TableCommentSet {
                table: "User".into(),
                comment: Some("A user.".into()),
            },
            Operation::ColumnCreate {
                table: "User".into(),
                column: "id".into(),
                column_type: ColumnType::Uuid,
                args: vec![],
            },
            Operation::ColumnNullableSet {
                table: "User".into(),
                column: "id".into(),
                nullable: false,
            },
            Operation::ColumnCreate {
                table: "User".into(),
                column: "name".into(),
                column_type: ColumnType::String,
                args: vec![],
            },
            Operation::TablePrimarySet {
                table: "User".into(),
                columns: Some(vec!["id".into()]),
                index_name: None,
                previous_name: None,
            },
        ]
    );
}

#[test]
fn test_created_column_expands_fully() {
    let mut table = Table::new("Message").with_column(
        TableColumn::new("user_foreign", ColumnType::Uuid)
            .with_comment("Author")
            .not_null()
            .with_default(json!("00000000-0000-0000-0000-000000000000"))
            .with_foreign_key(ForeignKey::new("User", "id")),
    );
    table.indexes.push(Index::new(vec!["user_foreign".into()]));
    table.uniques.push(Unique::new(vec!["user_foreign".into()]));

    let ops = DiffEngine::new().diff(&db(vec![]), &db(vec![table]));
    assert_eq!(
        kinds(&ops),
        vec![
            "table.create",
            "column.create",
            "column.comment.set",
            "column.nullable.set",
            "column.default.set",
            "table.foreign.create",
            "table.index.create",
            "table.unique.create",
        ]
    );
}

#[test]
fn test_identical_models_have_no_diff() {
    let mut messages = Table::new("Message")
        .with_column(TableColumn::new("id", ColumnType::Uuid).not_null())
        .with_column(
            TableColumn::new("user_foreign", ColumnType::Uuid)
                .with_foreign_key(ForeignKey::new("User", "id")),
        )
        .with_column(
            TableColumn::new("tags", ColumnType::Json).with_default(json!({ "a": [1, 2] })),
        );
    messages.indexes.push(Index {
        name: Some("by_user".into()),
        columns: vec!["user_foreign".into(), "id".into()],
        index_type: Some("btree".into()),
    });
    messages.uniques.push(Unique::new(vec!["id".into()]));
    let model = db(vec![user_table(), messages]);

    assert!(DiffEngine::new().diff(&model, &model.clone()).is_empty());
}

#[test]
fn test_drop_and_create_tables() {
    let from = db(vec![Table::new("Legacy")]);
    let to = db(vec![Table::new("Fresh")]);
    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![
            Operation::TableDrop { table: "Legacy".into() },
            Operation::TableCreate { table: "Fresh".into() },
        ]
    );
}

#[test]
fn test_rename_table() {
    let from = db(vec![Table::new("User")]);
    let mut renamed = Table::new("Person");
    renamed.annotations.insert("oldNames".into(), json!(["User"]));
    let to = db(vec![renamed]);

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![Operation::TableRename {
            from_name: "User".into(),
            to_name: "Person".into(),
        }]
    );
}

#[test]
fn test_renamed_table_changes_use_new_name() {
    let from = db(vec![Table::new("User")
        .with_column(TableColumn::new("id", ColumnType::Uuid))
        .with_column(TableColumn::new("legacy", ColumnType::Text))]);
    let mut renamed = Table::new("Person")
        .with_column(TableColumn::new("id", ColumnType::Uuid))
        .with_column(TableColumn::new("email", ColumnType::String));
    renamed.annotations.insert("oldNames".into(), json!(["User"]));
    let to = db(vec![renamed]);

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![
            Operation::TableRename {
                from_name: "User".into(),
                to_name: "Person".into(),
            },
            Operation::ColumnDrop {
                table: "User".into(),
                column: "legacy".into(),
            },
            Operation::ColumnCreate {
                table: "Person".into(),
                column: "email".into(),
                column_type: ColumnType::String,
                args: vec![],
            },
        ]
    );
}

#[test]
fn test_rename_candidate_is_consumed_once() {
    let from = db(vec![Table::new("A"), Table::new("B")]);
    let mut merged = Table::new("C");
    merged.annotations.insert("oldNames".into(), json!(["A", "B"]));
    let ops = DiffEngine::new().diff(&from, &db(vec![merged]));
    assert_eq!(kinds(&ops), vec!["table.rename", "table.drop"]);
}

#[test]
fn test_column_rename_drop_create() {
    let from = db(vec![Table::new("User")
        .with_column(TableColumn::new("mail", ColumnType::String))
        .with_column(TableColumn::new("age", ColumnType::Integer))]);
    let mut email = TableColumn::new("email", ColumnType::String);
    email.annotations.insert("oldNames".into(), json!(["mail"]));
    let to = db(vec![Table::new("User")
        .with_column(email)
        .with_column(TableColumn::new("nickname", ColumnType::String))]);

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![
            Operation::ColumnRename {
                table: "User".into(),
                from_name: "mail".into(),
                to_name: "email".into(),
            },
            Operation::ColumnDrop {
                table: "User".into(),
                column: "age".into(),
            },
            Operation::ColumnCreate {
                table: "User".into(),
                column: "nickname".into(),
                column_type: ColumnType::String,
                args: vec![],
            },
        ]
    );
}

#[test]
fn test_column_changes() {
    let from = db(vec![Table::new("User")
        .with_column(TableColumn::new("name", ColumnType::String).with_args(vec![json!(100)]))
        .with_column(TableColumn::new("score", ColumnType::Integer))
        .with_column(TableColumn::new("tags", ColumnType::Json).with_default(json!(["a", "b"])))]);
    let to = db(vec![Table::new("User")
        .with_column(TableColumn::new("name", ColumnType::String).with_args(vec![json!(200)]))
        .with_column(TableColumn::new("score", ColumnType::Integer).not_null())
        .with_column(TableColumn::new("tags", ColumnType::Json).with_default(json!(["a", "b"])))]);

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![
            Operation::ColumnTypeSet {
                table: "User".into(),
                column: "name".into(),
                column_type: ColumnType::String,
                args: vec![json!(200)],
            },
            Operation::ColumnNullableSet {
                table: "User".into(),
                column: "score".into(),
                nullable: false,
            },
        ]
    );
}

#[test]
fn test_default_compared_structurally() {
    let from = db(vec![Table::new("T").with_column(
        TableColumn::new("config", ColumnType::Json).with_default(json!({ "a": 1 })),
    )]);
    let to = db(vec![Table::new("T").with_column(
        TableColumn::new("config", ColumnType::Json).with_default(json!({ "a": 2 })),
    )]);
    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![Operation::ColumnDefaultSet {
            table: "T".into(),
            column: "config".into(),
            value: Some(json!({ "a": 2 })),
        }]
    );

    let cleared = db(vec![Table::new("T").with_column(TableColumn::new("config", ColumnType::Json))]);
    let ops = DiffEngine::new().diff(&from, &cleared);
    assert_eq!(kinds(&ops), vec!["column.default.set"]);
}

#[test]
fn test_foreign_key_change_drops_then_creates() {
    let column = |target: &str| {
        TableColumn::new("owner_foreign", ColumnType::Uuid)
            .with_foreign_key(ForeignKey::new(target, "id"))
    };
    let from = db(vec![Table::new("Message").with_column(column("User"))]);
    let to = db(vec![Table::new("Message").with_column(column("Team"))]);

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        ops,
        vec![
            Operation::TableForeignDrop {
                table: "Message".into(),
                column: "owner_foreign".into(),
            },
            Operation::TableForeignCreate {
                table: "Message".into(),
                column: "owner_foreign".into(),
                reference: ForeignKey::new("Team", "id"),
            },
        ]
    );

    let plain = db(vec![Table::new("Message")
        .with_column(TableColumn::new("owner_foreign", ColumnType::Uuid))]);
    assert_eq!(kinds(&DiffEngine::new().diff(&from, &plain)), vec!["table.foreign.drop"]);
    assert_eq!(kinds(&DiffEngine::new().diff(&plain, &to)), vec!["table.foreign.create"]);
}

#[test]
fn test_primary_removed() {
    let from = db(vec![user_table()]);
    let mut to_table = user_table();
    to_table.primary = None;
    let ops = DiffEngine::new().diff(&from, &db(vec![to_table]));
    assert_eq!(
        ops,
        vec![Operation::TablePrimarySet {
            table: "User".into(),
            columns: None,
            index_name: None,
            previous_name: None,
        }]
    );
}

#[test]
fn test_indexes_compared_as_sets() {
    let mut from_table = Table::new("User");
    from_table.indexes = vec![
        Index::new(vec!["a".into(), "b".into()]),
        Index::new(vec!["c".into()]),
    ];
    let mut to_table = Table::new("User");
    to_table.indexes = vec![
        Index::new(vec!["c".into()]),
        Index::new(vec!["b".into(), "a".into()]),
    ];
    assert!(DiffEngine::new()
        .diff(&db(vec![from_table.clone()]), &db(vec![to_table.clone()]))
        .is_empty());

    to_table.indexes[0].name = Some("by_c".into());
    let ops = DiffEngine::new().diff(&db(vec![from_table]), &db(vec![to_table]));
    assert_eq!(
        ops,
        vec![
            Operation::TableIndexDrop {
                table: "User".into(),
                columns: vec!["c".into()],
                index_name: None,
            },
            Operation::TableIndexCreate {
                table: "User".into(),
                columns: vec!["c".into()],
                index_name: Some("by_c".into()),
                index_type: None,
            },
        ]
    );
}

#[test]
fn test_uniques_compared_as_sets() {
    let mut from_table = Table::new("User");
    from_table.uniques = vec![Unique::new(vec!["email".into()])];
    let mut to_table = Table::new("User");
    to_table.uniques = vec![Unique::new(vec!["login".into()])];
    let ops = DiffEngine::new().diff(&db(vec![from_table]), &db(vec![to_table]));
    assert_eq!(kinds(&ops), vec!["table.unique.drop", "table.unique.create"]);
}

#[test]
fn test_comment_updates_can_be_disabled() {
    let from = db(vec![Table::new("User")
        .with_comment("Old")
        .with_column(TableColumn::new("id", ColumnType::Uuid).with_comment("old id"))]);
    let to = db(
        vec![
            Table::new("User")
                .with_comment("New")
                .with_column(TableColumn::new("id", ColumnType::Uuid).with_comment("new id")),
            Table::new("Team").with_comment("Teams"),
        ],
    );

    let ops = DiffEngine::new().diff(&from, &to);
    assert_eq!(
        kinds(&ops),
        vec!["table.create", "table.comment.set", "table.comment.set", "column.comment.set"]
    );

    let engine = DiffEngine::with_options(DiffOptions {
        update_comments: false,
    });
    let ops = engine.diff(&from, &to);
    assert_eq!(kinds(&ops), vec!["table.create", "table.comment.set"]);
    assert_eq!(ops[1].table(), "Team");
}

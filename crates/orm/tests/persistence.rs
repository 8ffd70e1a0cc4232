mod common;

use lucid_orm::{InstanceState, ModelError};
use serde_json::json;

#[tokio::test]
async fn test_save_twice_issues_one_insert() {
    let (db, log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();

    let mut user = users.new_instance();
    user.set("email", "virk@adonisjs.com").unwrap();
    user.set("username", "virk").unwrap();
    assert!(user.is_new());

    user.save().await.unwrap();
    user.save().await.unwrap();

    let statements = log.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("INSERT INTO \"users\""));
    assert_eq!(user.state(), InstanceState::Persisted);
    assert_eq!(user.primary_key(), &json!(1));
    assert!(!user.is_dirty());
}

#[tokio::test]
async fn test_insert_stamps_timestamps() {
    let (db, _log) = common::setup().await.unwrap();
    let user = db
        .model("User")
        .unwrap()
        .create(json!({ "email": "a@b.c" }))
        .await
        .unwrap();

    assert!(user.date("created_at").unwrap().is_some());
    assert_eq!(user.get("created_at"), user.get("updated_at"));
}

#[tokio::test]
async fn test_update_writes_only_dirty_fields() {
    let (db, log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    users
        .create(json!({ "email": "a@b.c", "username": "old", "age": 20 }))
        .await
        .unwrap();

    let mut user = users.find_or_fail(1).await.unwrap();
    user.set("username", "new").unwrap();
    assert_eq!(user.dirty_fields(), vec!["username".to_string()]);

    log.clear();
    user.save().await.unwrap();

    let statements = log.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("UPDATE \"users\" SET \"username\" = ?"));
    assert!(statements[0].ends_with("WHERE \"id\" = ?"));
    assert!(!user.is_dirty());

    let reloaded = users.find_or_fail(1).await.unwrap();
    assert_eq!(reloaded.get("username"), &json!("new"));
    assert_eq!(reloaded.get("age"), &json!(20));
}

#[tokio::test]
async fn test_fill_replaces_and_merge_patches() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();

    let mut user = users.new_instance();
    user.fill(json!({ "email": "a@b.c", "username": "virk" })).unwrap();
    user.fill(json!({ "email": "x@y.z" })).unwrap();
    assert_eq!(user.get("email"), &json!("x@y.z"));
    assert!(user.get("username").is_null());

    user.merge(json!({ "username": "romain" })).unwrap();
    assert_eq!(user.get("email"), &json!("x@y.z"));
    assert_eq!(user.get("username"), &json!("romain"));
}

#[tokio::test]
async fn test_fill_keeps_persisted_primary_key() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    let mut user = users.create(json!({ "email": "a@b.c" })).await.unwrap();

    user.fill(json!({ "email": "new@b.c" })).unwrap();
    assert_eq!(user.primary_key(), &json!(1));

    let err = user.set("id", 99).unwrap_err();
    assert!(matches!(err, ModelError::ImmutablePrimaryKey { .. }));
}

#[tokio::test]
async fn test_deleted_instance_is_frozen() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    let mut user = users.create(json!({ "email": "a@b.c" })).await.unwrap();

    user.delete().await.unwrap();
    assert!(user.is_deleted());
    assert_eq!(user.get("email"), &json!("a@b.c"));

    assert!(user.set("email", "b@c.d").unwrap_err().is_frozen());
    assert!(user.save().await.unwrap_err().is_frozen());
    assert!(user.delete().await.unwrap_err().is_frozen());
    assert!(users.find(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_of_new_instance_fails() {
    let (db, log) = common::setup().await.unwrap();
    let mut user = db.model("User").unwrap().new_instance();

    let err = user.delete().await.unwrap_err();
    assert!(matches!(err, ModelError::MissingPrimaryKey(_)));
    assert_eq!(log.count(), 0);
}

#[tokio::test]
async fn test_refresh_discards_local_changes() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    let mut user = users.create(json!({ "email": "a@b.c", "username": "virk" })).await.unwrap();

    user.set("username", "changed").unwrap();
    user.refresh().await.unwrap();
    assert_eq!(user.get("username"), &json!("virk"));
    assert!(!user.is_dirty());
}

#[tokio::test]
async fn test_database_errors_surface_verbatim() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    users.create(json!({ "email": "a@b.c" })).await.unwrap();

    let err = users.create(json!({ "email": "a@b.c" })).await.unwrap_err();
    match err {
        ModelError::Database(message) => assert!(message.contains("UNIQUE"), "{}", message),
        other => panic!("expected database error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_first_or_create_and_update_or_create() {
    let (db, log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();

    let created = users
        .first_or_create(json!({ "email": "a@b.c" }), json!({ "username": "virk" }))
        .await
        .unwrap();
    assert!(created.is_persisted());
    assert_eq!(created.get("username"), &json!("virk"));

    log.clear();
    let found = users
        .first_or_create(json!({ "email": "a@b.c" }), json!({ "username": "ignored" }))
        .await
        .unwrap();
    assert_eq!(found.primary_key(), created.primary_key());
    assert_eq!(found.get("username"), &json!("virk"));
    assert_eq!(log.count(), 1);

    let updated = users
        .update_or_create(json!({ "email": "a@b.c" }), json!({ "username": "romain" }))
        .await
        .unwrap();
    assert_eq!(updated.primary_key(), created.primary_key());
    assert_eq!(updated.get("username"), &json!("romain"));

    let fresh = users.first_or_new(json!({ "email": "new@b.c" }), json!({})).await.unwrap();
    assert!(fresh.is_new());
    assert_eq!(fresh.get("email"), &json!("new@b.c"));
}

#[tokio::test]
async fn test_create_many_saves_each_row() {
    let (db, log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();

    let created = users
        .create_many(vec![json!({ "email": "a@b.c" }), json!({ "email": "b@c.d" })])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(log.count(), 2);
    assert_eq!(users.query().count().await.unwrap(), 2);
}

#[derive(Debug, serde::Deserialize, serde::Serialize, PartialEq)]
struct UserRow {
    id: Option<i64>,
    email: String,
    age: Option<i64>,
}

#[tokio::test]
async fn test_typed_round_trip() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();

    let mut user = users.new_instance();
    user.fill_from(&UserRow { id: None, email: "a@b.c".into(), age: Some(30) }).unwrap();
    user.save().await.unwrap();

    let row: UserRow = users.find_or_fail(1).await.unwrap().to_typed().unwrap();
    assert_eq!(row, UserRow { id: Some(1), email: "a@b.c".into(), age: Some(30) });
}

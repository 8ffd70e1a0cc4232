mod common;

use std::sync::{Arc, Mutex};

use lucid_orm::{Database, ModelError, QueryEvent};
use serde_json::json;
use tempfile::TempDir;

/// File-backed database; transactions need a second pool connection
async fn file_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("blog.sqlite").display());
    let db = Database::connect_url(&url).await.unwrap();
    common::create_schema(&db).await.unwrap();
    for definition in common::definitions() {
        db.register(definition);
    }
    (dir, db)
}

#[tokio::test]
async fn test_commit_makes_writes_visible() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();

    let trx = db.transaction().await.unwrap();
    users.using(&trx).create(json!({ "email": "a@b.c" })).await.unwrap();
    assert_eq!(users.using(&trx).query().count().await.unwrap(), 1);
    assert_eq!(users.query().count().await.unwrap(), 0);

    trx.commit().await.unwrap();
    assert!(trx.is_completed());
    assert_eq!(users.query().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();
    let mut existing = users.create(json!({ "email": "a@b.c", "username": "virk" })).await.unwrap();

    let trx = db.transaction().await.unwrap();
    existing.use_transaction(&trx);
    existing.set("username", "romain").unwrap();
    existing.save().await.unwrap();
    users.using(&trx).create(json!({ "email": "b@c.d" })).await.unwrap();
    trx.rollback().await.unwrap();

    assert_eq!(users.query().count().await.unwrap(), 1);
    let reloaded = users.find_or_fail(1).await.unwrap();
    assert_eq!(reloaded.get("username"), &json!("virk"));
}

#[tokio::test]
async fn test_completed_transaction_rejects_work() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();

    let trx = db.transaction().await.unwrap();
    trx.commit().await.unwrap();

    let err = users.using(&trx).query().count().await.unwrap_err();
    assert!(matches!(err, ModelError::Transaction(_)));
    assert!(matches!(trx.rollback().await.unwrap_err(), ModelError::Transaction(_)));
}

#[tokio::test]
async fn test_instance_falls_back_after_commit() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();

    let trx = db.transaction().await.unwrap();
    let mut user = users.using(&trx).create(json!({ "email": "a@b.c" })).await.unwrap();
    assert!(user.transaction().is_some());
    trx.commit().await.unwrap();
    assert!(user.transaction().is_none());

    user.set("username", "virk").unwrap();
    user.save().await.unwrap();
    let reloaded = users.find_or_fail(1).await.unwrap();
    assert_eq!(reloaded.get("username"), &json!("virk"));
}

#[tokio::test]
async fn test_instance_falls_back_after_rollback() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();
    let mut user = users.create(json!({ "email": "a@b.c" })).await.unwrap();

    let trx = db.transaction().await.unwrap();
    user.use_transaction(&trx);
    trx.rollback().await.unwrap();

    user.set("username", "romain").unwrap();
    user.save().await.unwrap();
    assert_eq!(users.find_or_fail(1).await.unwrap().get("username"), &json!("romain"));

    let trx = db.transaction().await.unwrap();
    user.use_transaction(&trx).release_transaction();
    assert!(user.transaction().is_none());
    user.set("username", "nikk").unwrap();
    user.save().await.unwrap();
    trx.rollback().await.unwrap();
    assert_eq!(users.find_or_fail(1).await.unwrap().get("username"), &json!("nikk"));
}

#[tokio::test]
async fn test_transaction_scope() {
    let (_dir, db) = file_database().await;
    let users = db.model("User").unwrap();

    let created = db
        .transaction_scope(|trx| {
            let users = users.using(&trx);
            async move {
                users.create(json!({ "email": "a@b.c" })).await?;
                users.create(json!({ "email": "b@c.d" })).await?;
                users.query().count().await
            }
        })
        .await
        .unwrap();
    assert_eq!(created, 2);

    let err = db
        .transaction_scope(|trx| {
            let users = users.using(&trx);
            async move {
                users.create(json!({ "email": "c@d.e" })).await?;
                users.create(json!({ "email": "a@b.c" })).await
            }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
    assert_eq!(users.query().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_query_events_flag_transactional_statements() {
    let (_dir, db) = file_database().await;
    let flags: Arc<Mutex<Vec<bool>>> = Arc::default();
    let sink = flags.clone();
    db.on_query(Arc::new(move |event: &QueryEvent| {
        sink.lock().unwrap().push(event.in_transaction);
    }));
    let users = db.model("User").unwrap();

    users.query().count().await.unwrap();
    let trx = db.transaction().await.unwrap();
    users.using(&trx).query().count().await.unwrap();
    trx.commit().await.unwrap();

    assert_eq!(*flags.lock().unwrap(), vec![false, true]);
}

mod common;

use chrono::{TimeZone, Utc};
use lucid_orm::{ModelDefinition, Visibility};
use serde_json::{json, Value};

#[tokio::test]
async fn test_hidden_fields_and_date_casting() {
    let (db, _log) = common::setup().await.unwrap();
    let users = db.model("User").unwrap();
    let mut user = users
        .create(json!({ "email": "a@b.c", "password": "secret" }))
        .await
        .unwrap();
    user.set_date("created_at", Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap())
        .unwrap();
    user.save().await.unwrap();

    let json = users.find_or_fail(1).await.unwrap().to_json();
    assert!(json.get("password").is_none());
    assert_eq!(json["email"], json!("a@b.c"));
    assert_eq!(json["created_at"], json!("2024-05-17T09:30:00.000Z"));
    assert!(json.get("__meta__").is_none());
}

#[tokio::test]
async fn test_hidden_applies_to_nested_relations() {
    let (db, _log) = common::setup().await.unwrap();
    common::seed_blog(&db).await.unwrap();

    let posts = db
        .model("Post")
        .unwrap()
        .query()
        .where_eq("id", 1)
        .preload("author")
        .preload("comments")
        .fetch()
        .await
        .unwrap();
    let json = serde_json::to_value(&posts).unwrap();

    let author = &json[0]["author"];
    assert_eq!(author["email"], json!("user1@example.com"));
    assert!(author.get("password").is_none());
    assert_eq!(json[0]["comments"].as_array().unwrap().len(), 1);
    assert_eq!(json, posts.to_json());
}

#[tokio::test]
async fn test_visible_list_and_computed_fields() {
    let user = common::user_definition()
        .visible(["id", "email", "initials"])
        .computed("initials", |user| {
            let email = user.get("email").as_str().unwrap_or_default();
            Value::from(email.chars().next().map(|c| c.to_ascii_uppercase().to_string()))
        })
        .computed("secret_score", |_| json!(42));
    let definitions = common::definitions()
        .into_iter()
        .map(|definition| if definition.name() == "User" { user.clone() } else { definition })
        .collect();
    let (db, _log) = common::setup_with(definitions).await.unwrap();

    let created = db
        .model("User")
        .unwrap()
        .create(json!({ "email": "virk@adonisjs.com", "username": "virk" }))
        .await
        .unwrap();
    assert!(matches!(created.definition().visibility(), Visibility::Visible(_)));
    assert_eq!(
        created.to_json(),
        json!({ "id": 1, "email": "virk@adonisjs.com", "initials": "V" })
    );
}

#[tokio::test]
async fn test_pivot_extras_serialize_under_meta() {
    let (db, _log) = common::setup().await.unwrap();
    let mut user = db
        .model("User")
        .unwrap()
        .create(json!({ "email": "a@b.c" }))
        .await
        .unwrap();
    let skill = db.model("Skill").unwrap().create(json!({ "name": "rust" })).await.unwrap();
    user.attach_with("skills", vec![(skill.primary_key().clone(), json!({ "proficiency": "beginner" }))])
        .await
        .unwrap();

    let rows = db
        .model("User")
        .unwrap()
        .query()
        .preload("skills")
        .fetch()
        .await
        .unwrap();
    let json = rows.to_json();
    assert_eq!(
        json[0]["skills"][0],
        json!({
            "id": 1,
            "name": "rust",
            "__meta__": { "pivot_user_id": 1, "pivot_skill_id": 1, "pivot_proficiency": "beginner" }
        })
    );
}

#[test]
fn test_definition_defaults() {
    let definition = ModelDefinition::new("BlogPost");
    assert_eq!(definition.table_name(), "blog_posts");
    assert_eq!(definition.primary_key_name(), "id");
    assert!(!definition.has_timestamps());
}

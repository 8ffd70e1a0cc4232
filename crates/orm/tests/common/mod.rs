#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use lucid_orm::{Database, ModelDefinition, ModelResult, QueryEvent, RelationDescriptor};
use serde_json::{json, Value};

const SCHEMA: &[&str] = &[
    "CREATE TABLE countries (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT,
        password TEXT,
        country TEXT,
        country_id INTEGER,
        age INTEGER,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE profiles (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, display_name TEXT)",
    "CREATE TABLE posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        votes INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER, body TEXT)",
    "CREATE TABLE skills (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
    "CREATE TABLE skill_user (user_id INTEGER NOT NULL, skill_id INTEGER NOT NULL, proficiency TEXT)",
];

/// Statements seen by the database, in execution order
#[derive(Clone, Default)]
pub struct QueryLog(Arc<Mutex<Vec<String>>>);

impl QueryLog {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn statements(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

pub fn user_definition() -> ModelDefinition {
    ModelDefinition::new("User")
        .timestamps(true)
        .hidden(["password"])
        .has_one("profile", "Profile")
        .has_many("posts", "Post")
        .belongs_to("homeCountry", "Country")
        .relation(
            RelationDescriptor::many_to_many("skills", "Skill").pivot_columns(["proficiency"]),
        )
        .scope("adults", |query, _args| query.where_gte("age", 18))
        .scope("fromCountry", |query, args| {
            query.where_eq("country", args.first().cloned().unwrap_or(Value::Null))
        })
}

pub fn definitions() -> Vec<ModelDefinition> {
    vec![
        user_definition(),
        ModelDefinition::new("Profile").belongs_to("user", "User"),
        ModelDefinition::new("Post")
            .relation(RelationDescriptor::belongs_to("author", "User").foreign_key("user_id"))
            .has_many("comments", "Comment")
            .scope("published", |query, _args| query.where_eq("status", "published")),
        ModelDefinition::new("Comment").belongs_to("post", "Post"),
        ModelDefinition::new("Skill").many_to_many("users", "User"),
        ModelDefinition::new("Country").has_many_through("posts", "Post", "User"),
    ]
}

/// In-memory database with the blog schema and models registered
pub async fn setup() -> ModelResult<(Database, QueryLog)> {
    setup_with(definitions()).await
}

pub async fn setup_with(definitions: Vec<ModelDefinition>) -> ModelResult<(Database, QueryLog)> {
    let db = Database::connect_url("sqlite::memory:").await?;
    create_schema(&db).await?;
    for definition in definitions {
        db.register(definition);
    }
    let log = attach_log(&db);
    Ok((db, log))
}

pub async fn create_schema(db: &Database) -> ModelResult<()> {
    for statement in SCHEMA {
        db.raw_execute(statement, vec![]).await?;
    }
    Ok(())
}

pub fn attach_log(db: &Database) -> QueryLog {
    let log = QueryLog::default();
    let sink = log.0.clone();
    db.on_query(Arc::new(move |event: &QueryEvent| {
        sink.lock().unwrap().push(event.sql.clone());
    }));
    log
}

/// Three users, two posts each, one comment per post
pub async fn seed_blog(db: &Database) -> ModelResult<()> {
    let users = db.model("User")?;
    let comments = db.model("Comment")?;

    for (index, country) in ["ind", "uk", "ind"].iter().enumerate() {
        let mut user = users
            .create(json!({
                "email": format!("user{}@example.com", index + 1),
                "username": format!("user{}", index + 1),
                "password": "secret",
                "country": country,
                "age": 15 + (index as i64) * 10,
            }))
            .await?;

        for n in 1..=2 {
            let post = user
                .create_related(
                    "posts",
                    json!({ "title": format!("Post {} of user {}", n, index + 1), "votes": n * 10 }),
                )
                .await?;
            comments
                .create(json!({ "post_id": post.primary_key().clone(), "body": "nice" }))
                .await?;
        }
    }
    Ok(())
}

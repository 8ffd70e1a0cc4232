//! Blog walkthrough
//!
//! Registers a few models against an in-memory SQLite database, then
//! creates, queries, preloads and serializes them. Run with
//! `RUST_LOG=lucid_orm=debug` to see every statement.

use std::sync::Arc;

use lucid_orm::{Database, HookError, ModelDefinition, ModelResult, OrderDirection, QueryEvent};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL UNIQUE, password TEXT, created_at TEXT, updated_at TEXT)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, title TEXT NOT NULL, status TEXT NOT NULL DEFAULT 'draft')",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
    "CREATE TABLE post_tag (post_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
];

fn models() -> Vec<ModelDefinition> {
    vec![
        ModelDefinition::new("User")
            .timestamps(true)
            .hidden(["password"])
            .has_many("posts", "Post")
            .before_save(|user| {
                if user.dirty_fields().iter().any(|f| f == "password") {
                    let plain = user.get("password").as_str().unwrap_or_default().to_string();
                    user.set("password", format!("hashed:{}", plain.len()))
                        .map_err(|err| HookError::failed(&err.to_string()))?;
                }
                Ok(())
            }),
        ModelDefinition::new("Post")
            .belongs_to("user", "User")
            .many_to_many("tags", "Tag")
            .scope("published", |query, _| query.where_eq("status", "published")),
        ModelDefinition::new("Tag").many_to_many("posts", "Post"),
    ]
}

#[tokio::main]
async fn main() -> ModelResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db = Database::connect_url("sqlite::memory:").await?;
    for statement in SCHEMA {
        db.raw_execute(statement, vec![]).await?;
    }
    for definition in models() {
        db.register(definition);
    }
    db.on_query(Arc::new(|event: &QueryEvent| {
        println!("  sql> {} ({:?})", event.sql, event.duration);
    }));

    let users = db.model("User")?;
    let tags = db.model("Tag")?;

    let mut virk = users
        .create(json!({ "email": "virk@adonisjs.com", "password": "secret" }))
        .await?;
    let rust = tags.create(json!({ "name": "rust" })).await?;

    for (title, status) in [("Hello", "published"), ("Drafting", "draft")] {
        let mut post = virk
            .create_related("posts", json!({ "title": title, "status": status }))
            .await?;
        post.attach("tags", vec![rust.primary_key().clone()]).await?;
    }

    let authors = users
        .query()
        .where_has("posts", |q| q.apply("published"))
        .preload("posts.tags")
        .order_by("id", OrderDirection::Asc)
        .fetch()
        .await?;
    println!("{}", serde_json::to_string_pretty(&authors.to_json()).unwrap_or_default());

    let page = db.model("Post")?.query().order_by("id", OrderDirection::Asc).paginate(1, 1).await?;
    println!("{}", page.to_json());

    db.close().await
}

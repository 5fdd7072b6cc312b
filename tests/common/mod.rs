#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use std::cell::RefCell;

use ::rusqlite::Connection;
use hydrate::query::{Operator, QuerySpec};
use hydrate::sql::render;
use hydrate::types::{Dialect, FieldType};
use hydrate::{EntityType, ExecutionError, Executor, Pivot, Registry, RelationDescriptor, Row};

pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE posts (
             id INTEGER PRIMARY KEY,
             user_id INTEGER NOT NULL,
             title TEXT NOT NULL,
             published INTEGER NOT NULL,
             created_at TEXT NOT NULL
         );
         CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE post_tag (post_id INTEGER, tag_id INTEGER, role TEXT);

         INSERT INTO users VALUES (1, 'ada'), (2, 'bob'), (3, 'cy');
         INSERT INTO posts VALUES
             (10, 1, 'intro', 1, '2024-03-01T10:00:00Z'),
             (11, 1, 'draft', 0, '2024-03-02T10:00:00Z'),
             (12, 2, 'hello', 1, '2024-03-03 10:00:00');
         INSERT INTO tags VALUES (1, 'rust'), (2, 'sql');
         INSERT INTO post_tag VALUES (10, 1, 'primary'), (10, 2, 'secondary'), (12, 2, 'primary');",
    )
    .expect("Failed to seed database");
    conn
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_all([
            EntityType::builder("User")
                .table("users")
                .field("id", FieldType::Int)
                .field("name", FieldType::String)
                .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
                .relation(
                    RelationDescriptor::has_many("published_posts", "Post", "id", "user_id")
                        .constrain("published", Operator::Eq, true),
                )
                .build()
                .unwrap(),
            EntityType::builder("Post")
                .table("posts")
                .field("id", FieldType::Int)
                .field("user_id", FieldType::Int)
                .field("title", FieldType::String)
                .field("published", FieldType::Bool)
                .field("created_at", FieldType::Timestamp)
                .relation(RelationDescriptor::belongs_to("author", "User", "user_id", "id"))
                .relation(RelationDescriptor::belongs_to_many(
                    "tags",
                    "Tag",
                    Pivot::new("post_tag", "post_id", "tag_id").columns(["role"]),
                    "id",
                    "id",
                ))
                .build()
                .unwrap(),
            EntityType::builder("Tag")
                .table("tags")
                .field("id", FieldType::Int)
                .field("name", FieldType::String)
                .build()
                .unwrap(),
        ])
        .unwrap();
    registry
}

/// Records the SQL of every statement before delegating.
#[derive(Debug)]
pub struct Recording<E> {
    inner: E,
    statements: RefCell<Vec<String>>,
}

impl<E> Recording<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            statements: RefCell::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }
}

impl<E: Executor> Executor for Recording<E> {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
        self.statements
            .borrow_mut()
            .push(render(spec, Dialect::SQLite).sql);
        self.inner.execute(spec)
    }
}

#![allow(dead_code)]

use hydrate_core::query::Operator;
use hydrate_core::{
    EntityType, MemoryExecutor, Morph, Pivot, Record, Registry, RelationDescriptor, Row, Through,
};
use hydrate_types::{FieldType, Value};

pub fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns.into_iter().collect()
}

/// Users, posts, comments, tags (pivot `post_tag`), countries (posts
/// through users), profiles and polymorphic images.
pub fn blog_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_all([
            EntityType::builder("User")
                .table("users")
                .field("id", FieldType::Int)
                .field("name", FieldType::String)
                .field("country_id", FieldType::Int)
                .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
                .relation(
                    RelationDescriptor::has_many("published_posts", "Post", "id", "user_id")
                        .constrain("published", Operator::Eq, true),
                )
                .relation(RelationDescriptor::has_one("profile", "Profile", "id", "user_id"))
                .relation(RelationDescriptor::belongs_to("country", "Country", "country_id", "id"))
                .relation(RelationDescriptor::morph_many(
                    "images",
                    "Image",
                    Morph::new("imageable_type", "User"),
                    "id",
                    "imageable_id",
                ))
                .build()
                .unwrap(),
            EntityType::builder("Post")
                .table("posts")
                .field("id", FieldType::Int)
                .field("user_id", FieldType::Int)
                .field("title", FieldType::String)
                .field("published", FieldType::Bool)
                .field("score", FieldType::Int)
                .relation(RelationDescriptor::belongs_to("author", "User", "user_id", "id"))
                .relation(RelationDescriptor::has_many("comments", "Comment", "id", "post_id"))
                .relation(RelationDescriptor::belongs_to_many(
                    "tags",
                    "Tag",
                    Pivot::new("post_tag", "post_id", "tag_id")
                        .columns(["role"])
                        .with_timestamps(),
                    "id",
                    "id",
                ))
                .relation(RelationDescriptor::morph_many(
                    "images",
                    "Image",
                    Morph::new("imageable_type", "Post"),
                    "id",
                    "imageable_id",
                ))
                .build()
                .unwrap(),
            EntityType::builder("Comment")
                .table("comments")
                .field("id", FieldType::Int)
                .field("post_id", FieldType::Int)
                .field("user_id", FieldType::Int)
                .field("body", FieldType::String)
                .relation(RelationDescriptor::belongs_to("author", "User", "user_id", "id"))
                .build()
                .unwrap(),
            EntityType::builder("Tag")
                .table("tags")
                .field("id", FieldType::Int)
                .field("name", FieldType::String)
                .build()
                .unwrap(),
            EntityType::builder("Country")
                .table("countries")
                .field("id", FieldType::Int)
                .field("name", FieldType::String)
                .relation(RelationDescriptor::has_many_through(
                    "posts",
                    "Post",
                    Through::new("User", "country_id", "id"),
                    "id",
                    "user_id",
                ))
                .build()
                .unwrap(),
            EntityType::builder("Profile")
                .table("profiles")
                .field("id", FieldType::Int)
                .field("user_id", FieldType::Int)
                .field("bio", FieldType::String)
                .build()
                .unwrap(),
            EntityType::builder("Image")
                .table("images")
                .field("id", FieldType::Int)
                .field("imageable_id", FieldType::Int)
                .field("imageable_type", FieldType::String)
                .build()
                .unwrap(),
        ])
        .unwrap();
    registry
}

/// Four users (the last without posts, country or profile), three posts,
/// three comments, three tags and a few images.
pub fn blog_store() -> MemoryExecutor {
    let store = MemoryExecutor::new();
    store.insert(
        "users",
        [
            row([("id", 1.into()), ("name", "ada".into()), ("country_id", 1.into())]),
            row([("id", 2.into()), ("name", "bob".into()), ("country_id", 1.into())]),
            row([("id", 3.into()), ("name", "cy".into()), ("country_id", 2.into())]),
            row([("id", 4.into()), ("name", "dee".into()), ("country_id", Value::Null)]),
        ],
    );
    store.insert(
        "posts",
        [
            post(10, 1, "intro", true, 5),
            post(11, 1, "draft", false, 3),
            post(12, 2, "hello", true, 7),
        ],
    );
    store.insert(
        "comments",
        [
            row([("id", 100.into()), ("post_id", 10.into()), ("user_id", 2.into()), ("body", "nice".into())]),
            row([("id", 101.into()), ("post_id", 10.into()), ("user_id", 3.into()), ("body", "+1".into())]),
            row([("id", 102.into()), ("post_id", 12.into()), ("user_id", 1.into()), ("body", "welcome".into())]),
        ],
    );
    store.insert(
        "tags",
        [
            row([("id", 1.into()), ("name", "rust".into())]),
            row([("id", 2.into()), ("name", "sql".into())]),
            row([("id", 3.into()), ("name", "orm".into())]),
        ],
    );
    store.insert(
        "post_tag",
        [
            pivot(10, 1, "primary"),
            pivot(10, 2, "secondary"),
            pivot(12, 1, "primary"),
        ],
    );
    store.insert(
        "countries",
        [
            row([("id", 1.into()), ("name", "NZ".into())]),
            row([("id", 2.into()), ("name", "IS".into())]),
            row([("id", 3.into()), ("name", "FI".into())]),
        ],
    );
    store.insert(
        "profiles",
        [row([("id", 50.into()), ("user_id", 1.into()), ("bio", "hi".into())])],
    );
    store.insert(
        "images",
        [
            image(200, 1, "User"),
            image(201, 10, "Post"),
            image(202, 1, "Post"),
        ],
    );
    store
}

fn post(id: i64, user_id: i64, title: &str, published: bool, score: i64) -> Row {
    row([
        ("id", id.into()),
        ("user_id", user_id.into()),
        ("title", title.into()),
        ("published", published.into()),
        ("score", score.into()),
    ])
}

fn pivot(post_id: i64, tag_id: i64, role: &str) -> Row {
    row([
        ("post_id", post_id.into()),
        ("tag_id", tag_id.into()),
        ("role", role.into()),
        ("created_at", "2024-01-01 00:00:00".into()),
        ("updated_at", "2024-01-02 00:00:00".into()),
    ])
}

fn image(id: i64, imageable_id: i64, imageable_type: &str) -> Row {
    row([
        ("id", id.into()),
        ("imageable_id", imageable_id.into()),
        ("imageable_type", imageable_type.into()),
    ])
}

pub fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect()
}

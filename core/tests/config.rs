#![cfg(feature = "config")]

use std::io::Write;

use hydrate_core::config::{ConfigError, SchemaConfig};
use hydrate_core::{MemoryExecutor, RelationKind, Resolver, Row};
use hydrate_types::Value;

const SCHEMA: &str = r#"
[[entity]]
name = "Country"
table = "countries"
fields = [{ name = "id", type = "integer" }, { name = "name", type = "text" }]

[[entity.relation]]
name = "posts"
kind = "has_many_through"
target = "Post"
local_key = "id"
foreign_key = "user_id"
through = "User"
first_key = "country_id"
second_key = "id"

[[entity]]
name = "User"
table = "users"
fields = [{ name = "id", type = "int" }, { name = "country_id", type = "int" }]

[[entity.relation]]
name = "images"
kind = "morph_many"
target = "Image"
local_key = "id"
foreign_key = "imageable_id"
type_column = "imageable_type"
type_value = "User"

[[entity]]
name = "Post"
table = "posts"
fields = [
    { name = "id", type = "int" },
    { name = "user_id", type = "int" },
    { name = "deleted_at", type = "datetime" },
]

[[entity.relation]]
name = "author"
kind = "belongs_to"
target = "User"
local_key = "user_id"
foreign_key = "id"

[[entity]]
name = "Image"
table = "images"
fields = [
    { name = "id", type = "int" },
    { name = "imageable_id", type = "int" },
    { name = "imageable_type", type = "string" },
]
"#;

#[test]
fn loads_schema_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCHEMA.as_bytes()).unwrap();

    let registry = SchemaConfig::load_from(file.path())
        .unwrap()
        .into_registry()
        .unwrap();

    assert_eq!(registry.len(), 4);
    let posts = registry.lookup("Country").unwrap().relation("posts").unwrap();
    assert!(matches!(posts.kind(), RelationKind::HasManyThrough(t) if t.entity == "User"));
    assert!(registry.lookup("Post").unwrap().has_field("deleted_at"));
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.toml");

    let err = SchemaConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(p) if p == path));
}

#[test]
fn parse_errors_name_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[[entity]]\nname = 3\n").unwrap();

    let err = SchemaConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn constraints_from_config_filter_loads() {
    let schema = SCHEMA.replace(
        "foreign_key = \"imageable_id\"",
        "foreign_key = \"imageable_id\"\nconstraints = [{ column = \"id\", op = \"not in\", values = [201] }]",
    );
    let registry = SchemaConfig::from_toml_str(&schema)
        .unwrap()
        .into_registry()
        .unwrap();

    let store = MemoryExecutor::new()
        .with_table("users", [Row::from_iter([("id", Value::from(1))])])
        .with_table(
            "images",
            [200, 201, 202].map(|id| {
                Row::from_iter([
                    ("id", Value::from(id)),
                    ("imageable_id", Value::from(1)),
                    ("imageable_type", Value::from("User")),
                ])
            }),
        );
    let resolver = Resolver::new(&registry, &store);
    let users = resolver
        .get(resolver.query("User").unwrap().with("images"))
        .unwrap();

    let images = users[0].many("images").unwrap();
    let ids: Vec<_> = images.iter().filter_map(|i| i.get("id")).collect();
    assert_eq!(ids, [&Value::from(200), &Value::from(202)]);
}

#[test]
fn round_trips_through_toml() {
    let config = SchemaConfig::from_toml_str(SCHEMA).unwrap();
    let again = SchemaConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
    assert_eq!(config, again);
}

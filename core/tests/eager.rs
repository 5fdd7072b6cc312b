mod common;

use common::{blog_registry, blog_store, ids, row};
use hydrate_core::query::{
    Aggregate, Column, Direction, EagerLoadDirective, LockMode, Operator, Query,
};
use hydrate_core::{HydrateError, MemoryExecutor, Related, Resolver};
use hydrate_types::{Dialect, Value};

#[test]
fn one_fetch_per_relation_whatever_the_parent_count() {
    let registry = blog_registry();

    for n in [0_i64, 1, 1000] {
        let store = MemoryExecutor::new();
        store.insert("users", (1..=n).map(|id| row([("id", id.into())])));
        store.insert(
            "posts",
            (1..=n).map(|id| row([("id", (id + 10_000).into()), ("user_id", id.into())])),
        );

        let resolver = Resolver::new(&registry, &store);
        let users = resolver
            .get(resolver.query("User").unwrap().with("posts"))
            .unwrap();

        assert_eq!(users.len() as i64, n);
        assert_eq!(store.call_count(), 2, "{n} parents");
        assert!(users.iter().all(|u| u.many("posts").map(<[_]>::len) == Some(1)));
    }
}

#[test]
fn posts_batch_for_three_users() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let query = resolver
        .query("User")
        .unwrap()
        .filter_in("id", [1, 2, 3])
        .with("posts");
    let users = resolver.get(query).unwrap();

    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].table, "posts");
    assert_eq!(
        calls[1].in_values(&Column::field("user_id")),
        Some(&[Value::from(1), Value::from(2), Value::from(3)][..])
    );

    assert_eq!(ids(&users), [1, 2, 3]);
    assert_eq!(ids(users[0].many("posts").unwrap()), [10, 11]);
    assert_eq!(ids(users[1].many("posts").unwrap()), [12]);
    assert_eq!(users[2].many("posts"), Some(&[][..]));
}

#[test]
fn count_is_pushed_into_the_root_query() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(resolver.query("User").unwrap().with_count("posts"))
        .unwrap();

    assert_eq!(store.call_count(), 1);
    let counts: Vec<_> = users.iter().map(|u| u.get("posts_count").cloned()).collect();
    assert_eq!(
        counts,
        [1, 2, 3, 4].map(|id| Some(Value::from(match id {
            1 => 2,
            2 => 1,
            _ => 0,
        })))
    );
    assert!(!users[0].is_loaded("posts"));
}

#[test]
fn aggregates_over_a_target_field() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(
            resolver
                .query("User")
                .unwrap()
                .with_sum("posts", "score")
                .with_max("posts", "score"),
        )
        .unwrap();

    assert_eq!(store.call_count(), 1);
    assert_eq!(users[0].get("posts_sum"), Some(&Value::Int(8)));
    assert_eq!(users[0].get("posts_max"), Some(&Value::Int(5)));
    assert_eq!(users[3].get("posts_sum"), Some(&Value::Null));
}

#[test]
fn existence_filters_stay_in_one_query() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let with_posts = resolver
        .get(resolver.query("User").unwrap().has("posts"))
        .unwrap();
    assert_eq!(ids(&with_posts), [1, 2]);

    let commented = resolver
        .get(resolver.query("User").unwrap().where_has("posts.comments", |d| {
            d.filter("body", Operator::Eq, "welcome")
        }))
        .unwrap();
    assert_eq!(ids(&commented), [2]);

    let without = resolver
        .get(resolver.query("User").unwrap().doesnt_have("posts"))
        .unwrap();
    assert_eq!(ids(&without), [3, 4]);

    assert_eq!(store.call_count(), 3);
}

#[test]
fn pushdown_through_a_pivot_table() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let posts = resolver
        .get(resolver.query("Post").unwrap().with_count("tags"))
        .unwrap();
    let counts: Vec<_> = posts.iter().map(|p| p.get("tags_count").cloned()).collect();
    assert_eq!(counts, [2, 0, 1].map(|n| Some(Value::from(n))));

    let tagged = resolver
        .get(resolver.query("Post").unwrap().has("tags"))
        .unwrap();
    assert_eq!(ids(&tagged), [10, 12]);

    let secondary = resolver
        .get(resolver.query("Post").unwrap().where_has("tags", |d| {
            d.filter("pivot.role", Operator::Eq, "secondary")
        }))
        .unwrap();
    assert_eq!(ids(&secondary), [10]);

    assert_eq!(store.call_count(), 3);
}

#[test]
fn pushdown_through_an_intermediate_entity() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let countries = resolver
        .get(
            resolver
                .query("Country")
                .unwrap()
                .with_count("posts")
                .with_sum("posts", "score"),
        )
        .unwrap();
    assert_eq!(countries[0].get("posts_count"), Some(&Value::Int(3)));
    assert_eq!(countries[0].get("posts_sum"), Some(&Value::Int(15)));
    assert_eq!(countries[1].get("posts_count"), Some(&Value::Int(0)));
    assert_eq!(countries[2].get("posts_sum"), Some(&Value::Null));

    let with_posts = resolver
        .get(resolver.query("Country").unwrap().has("posts"))
        .unwrap();
    assert_eq!(ids(&with_posts), [1]);

    let without = resolver
        .get(resolver.query("Country").unwrap().doesnt_have("posts"))
        .unwrap();
    assert_eq!(ids(&without), [2, 3]);

    assert_eq!(store.call_count(), 3);
}

#[test]
fn through_count_renders_a_joined_subquery() {
    let registry = blog_registry();

    let rendered = Query::new(&registry, "Country")
        .unwrap()
        .with_count("posts")
        .to_sql(Dialect::SQLite)
        .unwrap();
    assert_eq!(
        rendered.sql,
        r#"SELECT "t0".*, (SELECT COUNT(*) FROM "posts" AS "t1" INNER JOIN "users" AS "v1" ON "v1"."id" = "t1"."user_id" WHERE "v1"."country_id" = "t0"."id") AS "posts_count" FROM "countries" AS "t0""#
    );
    assert!(rendered.params.is_empty());
}

#[test]
fn count_over_a_column_skips_nulls() {
    let registry = blog_registry();
    let store = blog_store();
    store.insert(
        "posts",
        [row([("id", 13.into()), ("user_id", 1.into()), ("score", Value::Null)])],
    );
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(
            resolver
                .query("User")
                .unwrap()
                .with_count("posts")
                .with_directive(
                    "posts",
                    EagerLoadDirective::aggregate(Aggregate::Count, "score").alias("scored"),
                ),
        )
        .unwrap();
    assert_eq!(users[0].get("posts_count"), Some(&Value::Int(3)));
    assert_eq!(users[0].get("scored"), Some(&Value::Int(2)));
}

#[test]
fn lock_applies_to_the_root_query_only() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    resolver
        .get(resolver.query("User").unwrap().lock_for_update().with("posts"))
        .unwrap();

    let calls = store.calls();
    assert_eq!(calls[0].lock, LockMode::ForUpdate);
    assert_eq!(calls[1].lock, LockMode::None);
}

#[test]
fn nested_paths_fetch_each_level_once() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let posts = resolver
        .get(resolver.query("Post").unwrap().with("comments.author"))
        .unwrap();

    assert_eq!(store.call_count(), 3);
    let comments = posts[0].many("comments").unwrap();
    assert_eq!(ids(comments), [100, 101]);
    let author = comments[0].one("author").flatten().unwrap();
    assert_eq!(author.get("name"), Some(&Value::from("bob")));
    assert_eq!(posts[1].many("comments"), Some(&[][..]));
}

#[test]
fn unknown_relation_fails_before_any_fetch() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let err = resolver
        .get(resolver.query("User").unwrap().with("posts.nope"))
        .unwrap_err();

    assert!(matches!(
        err,
        HydrateError::UnknownRelation { ref entity, ref path } if entity == "User" && path == "posts.nope"
    ));
    assert_eq!(store.call_count(), 0);

    let err = resolver
        .get(resolver.query("User").unwrap().with("comments.author"))
        .unwrap_err();
    assert!(matches!(err, HydrateError::UnknownRelation { ref path, .. } if path == "comments.author"));
}

#[test]
fn belongs_to_many_exposes_pivot_values() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let posts = resolver
        .get(resolver.query("Post").unwrap().with("tags"))
        .unwrap();

    assert_eq!(store.call_count(), 2);
    let tags = posts[0].many("tags").unwrap();
    assert_eq!(ids(tags), [1, 2]);
    assert_eq!(tags[0].pivot_value("role"), Some(&Value::from("primary")));
    assert_eq!(tags[1].pivot_value("role"), Some(&Value::from("secondary")));
    assert!(tags[0].pivot_value("created_at").is_some());
    assert_eq!(tags[0].get("role"), None);

    assert_eq!(posts[1].many("tags"), Some(&[][..]));
    assert_eq!(ids(posts[2].many("tags").unwrap()), [1]);
}

#[test]
fn pivot_columns_can_be_filtered() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let posts = resolver
        .get(resolver.query("Post").unwrap().with_directive(
            "tags",
            EagerLoadDirective::load().filter("role", Operator::Eq, "primary"),
        ))
        .unwrap();

    assert_eq!(ids(posts[0].many("tags").unwrap()), [1]);
}

#[test]
fn morph_many_matches_the_type_column() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(resolver.query("User").unwrap().with("images"))
        .unwrap();
    assert_eq!(ids(users[0].many("images").unwrap()), [200]);

    let posts = resolver
        .get(resolver.query("Post").unwrap().with("images"))
        .unwrap();
    assert_eq!(ids(posts[0].many("images").unwrap()), [201]);
    assert_eq!(posts[1].many("images"), Some(&[][..]));
}

#[test]
fn has_many_through_takes_two_fetches() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let countries = resolver
        .get(resolver.query("Country").unwrap().with("posts"))
        .unwrap();

    let calls = store.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].table, "users");
    assert_eq!(calls[2].table, "posts");

    assert_eq!(ids(countries[0].many("posts").unwrap()), [10, 11, 12]);
    assert_eq!(countries[1].many("posts"), Some(&[][..]));
    assert_eq!(countries[2].many("posts"), Some(&[][..]));
}

#[test]
fn has_many_through_fetch_count_is_fixed() {
    let registry = blog_registry();

    for n in [0_i64, 1000] {
        let store = MemoryExecutor::new();
        store.insert("countries", (1..=n).map(|id| row([("id", id.into())])));
        store.insert(
            "users",
            (1..=n).map(|id| row([("id", id.into()), ("country_id", id.into())])),
        );
        store.insert(
            "posts",
            (1..=n).map(|id| row([("id", (id + 10_000).into()), ("user_id", id.into())])),
        );

        let resolver = Resolver::new(&registry, &store);
        let countries = resolver
            .get(resolver.query("Country").unwrap().with("posts"))
            .unwrap();

        assert_eq!(countries.len() as i64, n);
        assert_eq!(store.call_count(), 3, "{n} countries");
        assert!(countries
            .iter()
            .all(|c| c.many("posts").map(<[_]>::len) == Some(1)));
    }
}

#[test]
fn single_relations_attach_explicit_none() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(resolver.query("User").unwrap().with_all(["profile", "country"]))
        .unwrap();

    assert_eq!(store.call_count(), 3);
    let profile = users[0].one("profile").flatten().unwrap();
    assert_eq!(profile.get("bio"), Some(&Value::from("hi")));
    assert_eq!(users[1].one("profile"), Some(None));

    let country = users[2].one("country").flatten().unwrap();
    assert_eq!(country.get("name"), Some(&Value::from("IS")));
    assert!(matches!(users[3].relation("country"), Some(Related::One(None))));
}

#[test]
fn relation_constraints_and_directives_shape_the_load() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let users = resolver
        .get(
            resolver
                .query("User")
                .unwrap()
                .with("published_posts")
                .with_directive(
                    "posts",
                    EagerLoadDirective::load()
                        .columns(["id", "score"])
                        .order_by("score", Direction::Asc),
                ),
        )
        .unwrap();

    assert_eq!(ids(users[0].many("published_posts").unwrap()), [10]);

    let posts = users[0].many("posts").unwrap();
    assert_eq!(ids(posts), [11, 10]);
    assert_eq!(posts[0].get("title"), None);
    assert_eq!(posts[0].get("user_id"), Some(&Value::from(1)));
}

#[test]
fn failed_fetch_leaves_records_untouched() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let mut users = resolver.get(resolver.query("User").unwrap()).unwrap();
    store.fail_on("comments");

    let err = resolver
        .load(&mut users, &["posts", "posts.comments"])
        .unwrap_err();
    assert!(matches!(err, HydrateError::Execution(ref e) if e.detail().contains("comments")));
    assert!(users.iter().all(|u| !u.is_loaded("posts")));

    let err = resolver
        .get(resolver.query("Post").unwrap().with("comments"))
        .unwrap_err();
    assert!(matches!(err, HydrateError::Execution(_)));

    store.clear_failure();
    resolver.load(&mut users, &["posts.comments"]).unwrap();
    assert!(users[0].is_loaded("posts"));
}

#[test]
fn load_missing_skips_loaded_paths() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let mut users = resolver
        .get(resolver.query("User").unwrap().with("posts"))
        .unwrap();
    store.reset_calls();

    resolver.load_missing(&mut users, &["posts"]).unwrap();
    assert_eq!(store.call_count(), 0);

    resolver
        .load_missing(&mut users, &["posts", "profile"])
        .unwrap();
    assert_eq!(store.call_count(), 1);
    assert!(users[0].is_loaded("profile"));

    resolver.load(&mut [], &["posts"]).unwrap();
    assert_eq!(store.call_count(), 1);
}

#[test]
fn load_query_computes_counts_for_loaded_records() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let mut users = resolver.get(resolver.query("User").unwrap()).unwrap();
    store.reset_calls();

    resolver
        .load_query(
            &mut users,
            Query::new(&registry, "User").unwrap().with_count("posts"),
        )
        .unwrap();
    assert_eq!(store.call_count(), 1);
    assert_eq!(users[0].get("posts_count"), Some(&Value::Int(2)));
    assert_eq!(users[3].get("posts_count"), Some(&Value::Int(0)));

    let err = resolver
        .load_query(
            &mut users,
            Query::new(&registry, "User").unwrap().has("posts"),
        )
        .unwrap_err();
    assert!(matches!(err, HydrateError::InvalidDirective { .. }));

    let err = resolver
        .load_query(
            &mut users,
            Query::new(&registry, "Post").unwrap().with("comments"),
        )
        .unwrap_err();
    assert!(matches!(err, HydrateError::InvalidDirective { .. }));
}

#[test]
fn first_limits_the_root_query() {
    let registry = blog_registry();
    let store = blog_store();
    let resolver = Resolver::new(&registry, &store);

    let last = resolver
        .first(
            resolver
                .query("User")
                .unwrap()
                .order_by("id", Direction::Desc)
                .with("posts"),
        )
        .unwrap()
        .unwrap();

    assert_eq!(last.get("id"), Some(&Value::from(4)));
    assert_eq!(last.many("posts"), Some(&[][..]));
    assert_eq!(store.calls()[0].limit, Some(1));
}

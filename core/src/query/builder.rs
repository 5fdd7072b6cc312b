//! Fluent `Query` builder. Pure data accumulation, nothing executes here.

use compact_str::CompactString;
use hydrate_types::{Dialect, Value};

use crate::entity::EntityType;
use crate::error::{HydrateError, Result};
use crate::plan;
use crate::registry::{Hop, Registry};
use crate::sql::{self, RenderedQuery};

use super::directive::{DirectiveMode, EagerLoadDirective};
use super::predicate::{Column, Operand, Operator, Predicate, Scope};
use super::spec::{Aggregate, Direction, LockMode, OrderBy, QuerySpec};

/// Accumulates a [`QuerySpec`] for one root entity.
///
/// Every field name, relation path and aggregate is validated against the
/// registry as it is added. The first failure is kept and returned by
/// [`Query::build`]; later calls are ignored.
///
/// ```
/// # use hydrate_core::{EntityType, Registry, RelationDescriptor};
/// # use hydrate_core::query::{Direction, Operator, Query};
/// # use hydrate_types::FieldType;
/// # let mut registry = Registry::new();
/// # registry.register_all([
/// #     EntityType::builder("User").table("users")
/// #         .field("id", FieldType::Int).field("name", FieldType::String)
/// #         .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
/// #         .build()?,
/// #     EntityType::builder("Post").table("posts")
/// #         .field("id", FieldType::Int).field("user_id", FieldType::Int)
/// #         .build()?,
/// # ])?;
/// let spec = Query::new(&registry, "User")?
///     .filter("name", Operator::Like, "a%")
///     .order_by("name", Direction::Asc)
///     .with("posts")
///     .with_count("posts")
///     .build()?;
/// assert_eq!(spec.directives.len(), 2);
///
/// let err = Query::new(&registry, "User")?.with("posts.comments").build();
/// assert!(err.is_err());
/// # Ok::<(), hydrate_core::HydrateError>(())
/// ```
#[derive(Debug)]
pub struct Query<'r> {
    registry: &'r Registry,
    entity: &'r EntityType,
    spec: QuerySpec,
    error: Option<HydrateError>,
}

impl<'r> Query<'r> {
    pub fn new(registry: &'r Registry, entity: &str) -> Result<Self> {
        let entity = registry.lookup(entity)?;
        Ok(Self {
            registry,
            entity,
            spec: QuerySpec::new(entity.name(), entity.table()),
            error: None,
        })
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn entity(&self) -> &'r EntityType {
        self.entity
    }

    /// Runs `f` unless an earlier call already failed.
    fn apply(mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = f(&mut self) {
                self.error = Some(e);
            }
        }
        self
    }

    fn root_column(&self, name: &str) -> Result<Column> {
        if self.entity.has_field(name) {
            Ok(Column::field(name))
        } else {
            Err(HydrateError::unknown_field(self.entity.name(), name))
        }
    }

    /// Projects the root query onto `columns`. Keys needed by eager loads
    /// are added back by the planner.
    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<CompactString> = columns
            .into_iter()
            .map(|c| CompactString::from(c.as_ref()))
            .collect();
        self.apply(|q| {
            for column in &columns {
                q.root_column(column)?;
            }
            q.spec.columns = columns;
            Ok(())
        })
    }

    pub fn filter(self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec
                .filters
                .push(Predicate::compare(column, op, value).into());
            Ok(())
        })
    }

    /// Compares two fields of the same row.
    pub fn filter_column(self, field: &str, op: Operator, other: &str) -> Self {
        self.apply(|q| {
            let lhs = q.root_column(field)?;
            let rhs = q.root_column(other)?;
            q.spec.filters.push(Predicate::columns(lhs, op, rhs).into());
            Ok(())
        })
    }

    pub fn filter_null(self, field: &str) -> Self {
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec.filters.push(Predicate::null(column).into());
            Ok(())
        })
    }

    pub fn filter_not_null(self, field: &str) -> Self {
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec.filters.push(Predicate::not_null(column).into());
            Ok(())
        })
    }

    pub fn filter_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec.filters.push(Predicate::is_in(column, values).into());
            Ok(())
        })
    }

    pub fn filter_not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec.filters.push(Predicate::not_in(column, values).into());
            Ok(())
        })
    }

    pub fn order_by(self, field: &str, direction: Direction) -> Self {
        self.apply(|q| {
            let column = q.root_column(field)?;
            q.spec.order_by.push(OrderBy { column, direction });
            Ok(())
        })
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec.offset = Some(offset);
        self
    }

    /// Requests `FOR UPDATE` on the root query only.
    pub fn lock_for_update(mut self) -> Self {
        self.spec.lock = LockMode::ForUpdate;
        self
    }

    /// Requests a shared lock on the root query only.
    pub fn shared_lock(mut self) -> Self {
        self.spec.lock = LockMode::SharedLock;
        self
    }

    /// Eager-loads `path`, including every prefix of a nested path.
    pub fn with(self, path: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::load())
    }

    /// Eager-loads every path in `paths`.
    pub fn with_all<'p>(self, paths: impl IntoIterator<Item = &'p str>) -> Self {
        paths.into_iter().fold(self, Self::with)
    }

    /// Attaches a configured directive to `path`.
    ///
    /// A later `Load` directive on the same path replaces the earlier one;
    /// pushdown directives accumulate.
    pub fn with_directive(self, path: &str, directive: EagerLoadDirective) -> Self {
        self.apply(|q| {
            let hops = q.registry.relation(q.entity.name(), path)?;
            let mut directive = directive;
            directive.path = path.into();
            validate_directive(&hops, &mut directive)?;

            if let Some(alias) = directive.aggregate_alias() {
                let taken = q.entity.has_field(&alias)
                    || q.spec.directives.iter().any(|d| {
                        d.aggregate_alias().as_deref() == Some(alias.as_str())
                    });
                if taken {
                    return Err(HydrateError::invalid_directive(
                        path,
                        format!("column alias '{alias}' is already in use"),
                    ));
                }
            }

            if directive.mode == DirectiveMode::Load {
                if let Some(existing) = q
                    .spec
                    .directives
                    .iter_mut()
                    .find(|d| d.mode == DirectiveMode::Load && d.path == directive.path)
                {
                    *existing = directive;
                    return Ok(());
                }
            }
            q.spec.directives.push(directive);
            Ok(())
        })
    }

    /// Adds a `<path>_count` column computed by the root query.
    pub fn with_count(self, path: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::count())
    }

    /// Adds a `<path>_<function>` column computed by the root query.
    ///
    /// `function` must be one of `count`, `sum`, `avg`, `min` or `max`.
    pub fn with_aggregate(self, path: &str, function: &str, column: &str) -> Self {
        let parsed = function.parse::<Aggregate>();
        match parsed {
            Ok(function) => self.with_directive(path, EagerLoadDirective::aggregate(function, column)),
            Err(e) => self.apply(|_| Err(e)),
        }
    }

    pub fn with_sum(self, path: &str, column: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::aggregate(Aggregate::Sum, column))
    }

    pub fn with_avg(self, path: &str, column: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::aggregate(Aggregate::Avg, column))
    }

    pub fn with_min(self, path: &str, column: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::aggregate(Aggregate::Min, column))
    }

    pub fn with_max(self, path: &str, column: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::aggregate(Aggregate::Max, column))
    }

    /// Keeps root rows with at least one related row on `path`.
    pub fn has(self, path: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::exists())
    }

    /// Keeps root rows with at least one related row matching `constrain`.
    ///
    /// ```ignore
    /// query.where_has("posts", |d| d.filter("published", Operator::Eq, true))
    /// ```
    pub fn where_has(
        self,
        path: &str,
        constrain: impl FnOnce(EagerLoadDirective) -> EagerLoadDirective,
    ) -> Self {
        self.with_directive(path, constrain(EagerLoadDirective::exists()))
    }

    /// Keeps root rows without any related row on `path`.
    pub fn doesnt_have(self, path: &str) -> Self {
        self.with_directive(path, EagerLoadDirective::missing())
    }

    pub fn where_doesnt_have(
        self,
        path: &str,
        constrain: impl FnOnce(EagerLoadDirective) -> EagerLoadDirective,
    ) -> Self {
        self.with_directive(path, constrain(EagerLoadDirective::missing()))
    }

    /// Returns the accumulated spec, or the first validation error.
    pub fn build(self) -> Result<QuerySpec> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.spec),
        }
    }

    /// Renders the root query as SQL, with pushdown applied and without
    /// eager loads.
    pub fn to_sql(self, dialect: Dialect) -> Result<RenderedQuery> {
        let registry = self.registry;
        let spec = self.build()?;
        let root = plan::root_spec(registry, &spec)?;
        Ok(sql::render(&root, dialect))
    }
}

/// Validates a directive against the last hop of its path and moves bare
/// pivot column names into the pivot scope.
fn validate_directive(hops: &[Hop<'_>], directive: &mut EagerLoadDirective) -> Result<()> {
    let path = directive.path.clone();
    let Some(last) = hops.last() else {
        return Err(HydrateError::UnknownRelation {
            entity: String::new(),
            path: path.to_string(),
        });
    };
    let target = last.target;
    let pivot = last.relation.pivot();

    let rescope = |column: &mut Column| -> Result<()> {
        let known = match column.scope {
            Scope::Field if target.has_field(&column.name) => true,
            Scope::Field => match pivot {
                Some(pivot) if pivot.has_column(&column.name) => {
                    column.scope = Scope::Pivot;
                    true
                }
                _ => false,
            },
            Scope::Pivot => pivot.is_some_and(|p| p.has_column(&column.name)),
        };
        if known {
            Ok(())
        } else {
            Err(HydrateError::unknown_field(target.name(), &column.to_string()))
        }
    };

    for filter in &mut directive.filters {
        rescope(&mut filter.column)?;
        if let Operand::Column(other) = &mut filter.operand {
            rescope(other)?;
        }
    }
    for order in &mut directive.order_by {
        rescope(&mut order.column)?;
    }
    for column in &directive.columns {
        if !target.has_field(column) {
            return Err(HydrateError::unknown_field(target.name(), column));
        }
    }

    if directive.mode.is_pushdown() && !(directive.columns.is_empty() && directive.order_by.is_empty())
    {
        return Err(HydrateError::invalid_directive(
            &path,
            "column projection and ordering only apply to loaded relations",
        ));
    }

    if directive.mode.is_aggregate() && hops.len() > 1 {
        return Err(HydrateError::invalid_directive(
            &path,
            "aggregates are only supported on direct relations",
        ));
    }

    if let DirectiveMode::AggregateOnly { function, column } = &directive.mode {
        let field = target
            .field(column)
            .ok_or_else(|| HydrateError::unknown_field(target.name(), column))?;
        if matches!(function, Aggregate::Sum | Aggregate::Avg) && !field.ty.is_numeric() {
            return Err(HydrateError::invalid_directive(
                &path,
                format!("{function} requires a numeric column, '{column}' is {}", field.ty),
            ));
        }
    }

    if !directive.mode.is_pushdown() && directive.alias.is_some() {
        return Err(HydrateError::invalid_directive(
            &path,
            "aliases only apply to aggregate columns",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{Pivot, RelationDescriptor};
    use hydrate_types::FieldType;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_all([
                EntityType::builder("User")
                    .table("users")
                    .field("id", FieldType::Int)
                    .field("name", FieldType::String)
                    .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
                    .build()
                    .unwrap(),
                EntityType::builder("Post")
                    .table("posts")
                    .field("id", FieldType::Int)
                    .field("user_id", FieldType::Int)
                    .field("title", FieldType::String)
                    .field("votes", FieldType::Int)
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
                    .field("label", FieldType::String)
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn unknown_field_is_reported_at_build() {
        let registry = registry();
        let err = Query::new(&registry, "User")
            .unwrap()
            .filter("email", Operator::Eq, "x")
            .filter("name", Operator::Eq, "y")
            .build()
            .unwrap_err();
        assert!(matches!(err, HydrateError::UnknownField { field, .. } if field == "email"));
    }

    #[test]
    fn unknown_nested_segment() {
        let registry = registry();
        let err = Query::new(&registry, "User")
            .unwrap()
            .with("posts.comments")
            .build()
            .unwrap_err();
        assert!(matches!(err, HydrateError::UnknownRelation { path, .. } if path == "posts.comments"));
    }

    #[test]
    fn bare_pivot_columns_are_rescoped() {
        let registry = registry();
        let spec = Query::new(&registry, "Post")
            .unwrap()
            .with_directive(
                "tags",
                EagerLoadDirective::load()
                    .filter("role", Operator::Eq, "primary")
                    .filter("label", Operator::NotEq, "x"),
            )
            .build()
            .unwrap();
        let filters = &spec.directives[0].filters;
        assert_eq!(filters[0].column, Column::pivot("role"));
        assert_eq!(filters[1].column, Column::field("label"));

        let err = Query::new(&registry, "User")
            .unwrap()
            .where_has("posts", |d| d.filter("pivot.role", Operator::Eq, "x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, HydrateError::UnknownField { .. }));
    }

    #[test]
    fn aggregates_are_checked_when_added() {
        let registry = registry();
        let unsupported = Query::new(&registry, "User")
            .unwrap()
            .with_aggregate("posts", "median", "votes")
            .build()
            .unwrap_err();
        assert!(matches!(unsupported, HydrateError::UnsupportedAggregate(f) if f == "median"));

        let nested = Query::new(&registry, "User")
            .unwrap()
            .with_count("posts.tags")
            .build()
            .unwrap_err();
        assert!(matches!(nested, HydrateError::InvalidDirective { .. }));

        let text_sum = Query::new(&registry, "User")
            .unwrap()
            .with_sum("posts", "title")
            .build()
            .unwrap_err();
        assert!(matches!(text_sum, HydrateError::InvalidDirective { .. }));

        let twice = Query::new(&registry, "User")
            .unwrap()
            .with_count("posts")
            .with_count("posts")
            .build()
            .unwrap_err();
        assert!(matches!(twice, HydrateError::InvalidDirective { .. }));

        let spec = Query::new(&registry, "User")
            .unwrap()
            .with_count("posts")
            .with_directive("posts", EagerLoadDirective::count().alias("post_total"))
            .with_aggregate("posts", "MAX", "votes")
            .build()
            .unwrap();
        let aliases: Vec<_> = spec
            .directives
            .iter()
            .filter_map(EagerLoadDirective::aggregate_alias)
            .collect();
        assert_eq!(aliases, ["posts_count", "post_total", "posts_max"]);
    }

    #[test]
    fn later_load_replaces_earlier() {
        let registry = registry();
        let spec = Query::new(&registry, "User")
            .unwrap()
            .with("posts")
            .with_directive("posts", EagerLoadDirective::load().columns(["title"]))
            .has("posts")
            .build()
            .unwrap();
        assert_eq!(spec.directives.len(), 2);
        assert_eq!(spec.directives[0].columns, ["title"]);
    }

    #[test]
    fn pushdown_rejects_projection() {
        let registry = registry();
        let err = Query::new(&registry, "User")
            .unwrap()
            .where_has("posts", |d| d.columns(["title"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, HydrateError::InvalidDirective { .. }));
    }
}

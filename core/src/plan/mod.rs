//! Query resolution: root query, pushdown and batched eager loads.

mod eager;
mod pushdown;

pub(crate) use pushdown::root_spec;

use hashbrown::HashMap;
use hydrate_types::Value;

use crate::error::{HydrateError, Result};
use crate::executor::Executor;
use crate::query::{Column, DirectiveMode, Predicate, Query, QuerySpec};
use crate::record::Record;
use crate::registry::Registry;

/// Resolves queries against an [`Executor`] and hydrates the results.
///
/// A resolution issues one root query (pushdown included) and then one
/// fetch per distinct eager relation path, two for has-many-through.
///
/// ```
/// # use hydrate_core::{EntityType, MemoryExecutor, Registry, RelationDescriptor, Resolver, Row};
/// # use hydrate_core::query::Query;
/// # use hydrate_types::{FieldType, Value};
/// # let mut registry = Registry::new();
/// # registry.register_all([
/// #     EntityType::builder("User").table("users")
/// #         .field("id", FieldType::Int)
/// #         .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
/// #         .build()?,
/// #     EntityType::builder("Post").table("posts")
/// #         .field("id", FieldType::Int).field("user_id", FieldType::Int)
/// #         .build()?,
/// # ])?;
/// let store = MemoryExecutor::new();
/// store.insert("users", [Row::from_iter([("id", Value::from(1))])]);
/// store.insert("posts", [Row::from_iter([("id", 10), ("user_id", 1)])]);
///
/// let resolver = Resolver::new(&registry, &store);
/// let users = resolver.get(Query::new(&registry, "User")?.with("posts"))?;
/// assert_eq!(users[0].many("posts").map(<[_]>::len), Some(1));
/// assert_eq!(store.call_count(), 2);
/// # Ok::<(), hydrate_core::HydrateError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<'r, E> {
    registry: &'r Registry,
    executor: E,
}

impl<'r, E: Executor> Resolver<'r, E> {
    pub fn new(registry: &'r Registry, executor: E) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Starts a query on `entity`.
    pub fn query(&self, entity: &str) -> Result<Query<'r>> {
        Query::new(self.registry, entity)
    }

    /// Runs `query` and hydrates every eager relation.
    pub fn get(&self, query: Query<'_>) -> Result<Vec<Record>> {
        let spec = query.build()?;
        self.resolve(&spec)
    }

    /// Runs `query` with `LIMIT 1`.
    pub fn first(&self, query: Query<'_>) -> Result<Option<Record>> {
        Ok(self.get(query.limit(1))?.into_iter().next())
    }

    /// Resolves an already built spec.
    pub fn resolve(&self, spec: &QuerySpec) -> Result<Vec<Record>> {
        crate::hydrate_profile_function!();

        let entity = self.registry.lookup(&spec.entity)?;
        let tree = eager::build_tree(self.registry, entity.name(), &spec.directives)?;
        let root = root_spec(self.registry, spec)?;

        crate::hydrate_trace_root!(entity.name(), root.lock, root.aggregates.len());
        let rows = self.executor.execute(&root)?;
        let mut records: Vec<Record> = rows
            .into_iter()
            .map(|row| Record::from_row(entity, row))
            .collect();

        {
            crate::hydrate_profile_scope!("planner", "eager");
            eager::load_tree(&self.executor, &tree, &mut records)?;
        }
        Ok(records)
    }

    /// Eager-loads `paths` onto records that were already fetched.
    ///
    /// Relations already present are replaced. An empty slice is a no-op.
    pub fn load(&self, records: &mut [Record], paths: &[&str]) -> Result<()> {
        let Some(entity) = records.first().map(|r| r.entity().to_owned()) else {
            return Ok(());
        };
        let query = Query::new(self.registry, &entity)?.with_all(paths.iter().copied());
        self.load_query(records, query)
    }

    /// Like [`load`](Self::load), skipping paths that are already loaded on
    /// every record.
    pub fn load_missing(&self, records: &mut [Record], paths: &[&str]) -> Result<()> {
        let missing: Vec<&str> = paths
            .iter()
            .copied()
            .filter(|path| !path_loaded(records, path))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.load(records, &missing)
    }

    /// Applies the relation directives of `query` to already fetched
    /// records: loads are batched as in [`get`](Self::get) and counts or
    /// aggregates are computed by one query keyed on the primary key.
    ///
    /// Root filters, ordering and locking of `query` are not used.
    pub fn load_query(&self, records: &mut [Record], query: Query<'_>) -> Result<()> {
        let spec = query.build()?;
        let entity = self.registry.lookup(&spec.entity)?;
        if let Some(other) = records.iter().find(|r| r.entity() != entity.name()) {
            return Err(HydrateError::invalid_directive(
                &spec.entity,
                format!("cannot load onto a '{}' record", other.entity()),
            ));
        }
        if let Some(filter) = spec
            .directives
            .iter()
            .find(|d| matches!(d.mode, DirectiveMode::ExistsOnly | DirectiveMode::Missing))
        {
            return Err(HydrateError::invalid_directive(
                &filter.path,
                "existence filters cannot be applied to loaded records",
            ));
        }

        let tree = eager::build_tree(self.registry, entity.name(), &spec.directives)?;
        let batches = eager::fetch_tree(&self.executor, &tree, records)?;

        let mut aggregates = Vec::new();
        for directive in spec.directives.iter().filter(|d| d.mode.is_aggregate()) {
            let hops = self.registry.relation(entity.name(), &directive.path)?;
            aggregates.push(pushdown::aggregate_column(&hops, directive)?);
        }
        let computed = if aggregates.is_empty() {
            None
        } else {
            let pk = entity.primary_key();
            let mut agg = QuerySpec::new(entity.name(), entity.table());
            agg.columns = vec![pk.into()];
            agg.filters.push(
                Predicate::is_in(Column::field(pk), eager::distinct_keys(records, pk)).into(),
            );
            agg.aggregates = aggregates;
            crate::hydrate_trace_fetch!(spec.entity, agg.table, records.len());

            let mut by_key: HashMap<Value, Record> = HashMap::new();
            for row in self.executor.execute(&agg)? {
                let record = Record::from_row(entity, row);
                if let Some(key) = record.get(pk).cloned() {
                    by_key.insert(key, record);
                }
            }
            Some((agg.aggregates, by_key))
        };

        for batch in batches {
            batch.attach(records);
        }
        if let Some((columns, by_key)) = computed {
            let pk = entity.primary_key();
            for record in records.iter_mut() {
                let Some(row) = record.get(pk).and_then(|key| by_key.get(key)) else {
                    continue;
                };
                for column in &columns {
                    let value = row.get(&column.alias).cloned().unwrap_or_default();
                    record.set(column.alias.clone(), value);
                }
            }
        }
        Ok(())
    }
}

/// Whether every record already carries the whole dotted `path`.
fn path_loaded(records: &[Record], path: &str) -> bool {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    records.iter().all(|record| match record.relation(head) {
        None => false,
        Some(related) => rest.is_none_or(|rest| path_loaded(related.records(), rest)),
    })
}

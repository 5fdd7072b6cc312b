//! Batched eager loading.
//!
//! Load directives are merged into a tree of relation paths. Each node is
//! fetched with a single `IN` query over the distinct keys of its parents
//! (two for has-many-through), whatever the number of parents. The whole
//! tree is fetched before anything is attached, so a failed fetch leaves
//! the caller's records untouched.

use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use hydrate_types::Value;

use crate::entity::EntityType;
use crate::error::Result;
use crate::executor::Executor;
use crate::query::{
    Column, DirectiveMode, EagerLoadDirective, Filter, PivotJoin, Predicate, QuerySpec,
};
use crate::record::{Record, Related};
use crate::registry::{Hop, Registry};
use crate::relation::{Pivot, RelationKind, Through};

/// One relation path of the load tree.
#[derive(Debug)]
pub(crate) struct Node<'r> {
    hop: Hop<'r>,
    path: CompactString,
    directive: EagerLoadDirective,
    children: Vec<Node<'r>>,
}

impl Node<'_> {
    pub(crate) fn local_key(&self) -> &str {
        self.hop.relation.local_key()
    }
}

/// Merges the `Load` directives of `directives` into a path tree.
///
/// Prefixes of nested paths become plain loads unless declared themselves;
/// siblings keep declaration order.
pub(crate) fn build_tree<'r>(
    registry: &'r Registry,
    entity: &str,
    directives: &[EagerLoadDirective],
) -> Result<Vec<Node<'r>>> {
    let mut roots: Vec<Node<'r>> = Vec::new();

    for directive in directives.iter().filter(|d| d.mode == DirectiveMode::Load) {
        let hops = registry.relation(entity, &directive.path)?;
        let depth = hops.len();
        let mut level = &mut roots;
        let mut path = CompactString::default();

        for (i, hop) in hops.into_iter().enumerate() {
            if i > 0 {
                path.push('.');
            }
            path.push_str(hop.relation.name());

            let index = match level.iter().position(|n| n.path == path) {
                Some(index) => index,
                None => {
                    let mut implied = EagerLoadDirective::load();
                    implied.path = path.clone();
                    level.push(Node {
                        hop,
                        path: path.clone(),
                        directive: implied,
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            let node = &mut level[index];
            if i + 1 == depth {
                node.directive = directive.clone();
            }
            level = &mut node.children;
        }
    }
    Ok(roots)
}

/// Fetches every node of `tree` for `parents`, then attaches the results.
pub(crate) fn load_tree<E: Executor>(
    executor: &E,
    tree: &[Node<'_>],
    parents: &mut [Record],
) -> Result<()> {
    let batches = fetch_tree(executor, tree, parents)?;
    for batch in batches {
        batch.attach(parents);
    }
    Ok(())
}

pub(crate) fn fetch_tree<E: Executor>(
    executor: &E,
    tree: &[Node<'_>],
    parents: &[Record],
) -> Result<Vec<Batch>> {
    tree.iter()
        .map(|node| fetch_node(executor, node, parents))
        .collect()
}

/// Records of one node grouped by the parent key they belong to.
#[derive(Debug)]
pub(crate) struct Batch {
    relation: CompactString,
    local_key: CompactString,
    single: bool,
    groups: HashMap<Value, Vec<Record>>,
}

impl Batch {
    /// Sets the relation on every parent; parents without matches get an
    /// explicit empty result.
    pub(crate) fn attach(&self, parents: &mut [Record]) {
        for parent in parents {
            let matches = parent
                .get(&self.local_key)
                .and_then(|key| self.groups.get(key))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let related = if self.single {
                Related::One(matches.first().cloned().map(Box::new))
            } else {
                Related::Many(matches.to_vec())
            };
            parent.set_relation(self.relation.clone(), related);
        }
    }
}

fn fetch_node<E: Executor>(executor: &E, node: &Node<'_>, parents: &[Record]) -> Result<Batch> {
    crate::hydrate_profile_scope!("planner", "fetch_node");

    let relation = node.hop.relation;
    let keys = distinct_keys(parents, relation.local_key());
    let local_type = node.hop.source.field(relation.local_key()).map(|f| f.ty);

    let (mut records, owners): (Vec<Record>, Vec<Vec<Value>>) = match relation.kind() {
        RelationKind::BelongsTo
        | RelationKind::HasOne
        | RelationKind::HasMany
        | RelationKind::MorphMany(_) => {
            crate::hydrate_trace_fetch!(node.path, node.hop.target.table(), keys.len());
            let mut spec = target_spec(node);
            spec.filters.insert(
                0,
                Predicate::is_in(Column::field(relation.foreign_key()), keys).into(),
            );
            let records = run(executor, node.hop.target, &spec)?;
            let owners = records
                .iter()
                .map(|r| owner(r.get(relation.foreign_key())))
                .collect();
            (records, owners)
        }
        RelationKind::BelongsToMany(pivot) => {
            crate::hydrate_trace_fetch!(node.path, node.hop.target.table(), keys.len());
            let spec = pivot_spec(node, pivot, keys);
            let records = run(executor, node.hop.target, &spec)?;
            let owners = records
                .iter()
                .map(|r| {
                    let key = r.pivot_value(&pivot.source_key).cloned();
                    let key = match (key, local_type) {
                        (Some(key), Some(ty)) => Some(key.coerce(ty)),
                        (key, _) => key,
                    };
                    owner(key.as_ref())
                })
                .collect();
            (records, owners)
        }
        RelationKind::HasManyThrough(through) => fetch_through(executor, node, through, keys)?,
    };

    let children = fetch_tree(executor, &node.children, &records)?;
    for child in children {
        child.attach(&mut records);
    }

    let mut groups: HashMap<Value, Vec<Record>> = HashMap::new();
    for (record, keys) in records.into_iter().zip(owners) {
        let Some((last, rest)) = keys.split_last() else {
            continue;
        };
        for key in rest {
            groups.entry(key.clone()).or_default().push(record.clone());
        }
        groups.entry(last.clone()).or_default().push(record);
    }

    Ok(Batch {
        relation: relation.name().into(),
        local_key: relation.local_key().into(),
        single: relation.is_single(),
        groups,
    })
}

/// Two chained fetches: intermediate links by the parents' keys, then the
/// targets by the links' second keys.
fn fetch_through<E: Executor>(
    executor: &E,
    node: &Node<'_>,
    through: &Through,
    keys: Vec<Value>,
) -> Result<(Vec<Record>, Vec<Vec<Value>>)> {
    let relation = node.hop.relation;
    let Some(intermediate) = node.hop.through else {
        return Err(crate::error::HydrateError::UnknownRelation {
            entity: node.hop.source.name().to_string(),
            path: node.path.to_string(),
        });
    };

    crate::hydrate_trace_fetch!(node.path, intermediate.table(), keys.len());
    let mut links = QuerySpec::new(intermediate.name(), intermediate.table());
    links.columns = vec![through.first_key.clone(), through.second_key.clone()];
    links.filters.push(Predicate::is_in(Column::field(through.first_key.clone()), keys).into());
    let links = run(executor, intermediate, &links)?;

    // second key -> owning parent keys, in link order
    let mut owners_by_second: HashMap<Value, Vec<Value>> = HashMap::new();
    let mut seconds = Vec::new();
    for link in &links {
        let (Some(first), Some(second)) = (
            link.get(&through.first_key).filter(|v| !v.is_null()),
            link.get(&through.second_key).filter(|v| !v.is_null()),
        ) else {
            continue;
        };
        let owners = owners_by_second.entry(second.clone()).or_insert_with(|| {
            seconds.push(second.clone());
            Vec::new()
        });
        if !owners.contains(first) {
            owners.push(first.clone());
        }
    }

    crate::hydrate_trace_fetch!(node.path, node.hop.target.table(), seconds.len());
    let mut spec = target_spec(node);
    spec.filters.insert(
        0,
        Predicate::is_in(Column::field(relation.foreign_key()), seconds).into(),
    );
    let records = run(executor, node.hop.target, &spec)?;
    let owners = records
        .iter()
        .map(|r| {
            r.get(relation.foreign_key())
                .and_then(|key| owners_by_second.get(key))
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    Ok((records, owners))
}

/// Target query of a node without its key filter.
fn target_spec(node: &Node<'_>) -> QuerySpec {
    let target = node.hop.target;
    let relation = node.hop.relation;
    let directive = &node.directive;

    let mut spec = QuerySpec::new(target.name(), target.table());
    spec.columns = directive.columns.clone();
    spec.ensure_column(relation.foreign_key());
    for child in &node.children {
        spec.ensure_column(child.local_key());
    }
    spec.filters
        .extend(relation.implicit_filters().map(Filter::from));
    spec.filters
        .extend(directive.filters.iter().cloned().map(Filter::from));
    spec.order_by = directive.order_by.clone();
    spec
}

fn pivot_spec(node: &Node<'_>, pivot: &Pivot, keys: Vec<Value>) -> QuerySpec {
    let mut spec = target_spec(node);
    spec.filters.insert(
        0,
        Predicate::is_in(Column::pivot(pivot.source_key.clone()), keys).into(),
    );
    spec.pivot = Some(PivotJoin {
        table: pivot.table.clone(),
        target_key: pivot.target_key.clone(),
        foreign_key: node.hop.relation.foreign_key().into(),
        columns: pivot.exposed_columns().map(CompactString::from).collect(),
    });
    spec
}

fn run<E: Executor>(executor: &E, entity: &EntityType, spec: &QuerySpec) -> Result<Vec<Record>> {
    let rows = executor.execute(spec)?;
    Ok(rows
        .into_iter()
        .map(|row| Record::from_row(entity, row))
        .collect())
}

fn owner(key: Option<&Value>) -> Vec<Value> {
    match key {
        Some(key) if !key.is_null() => vec![key.clone()],
        _ => Vec::new(),
    }
}

/// Distinct non-null values of `field`, in first-seen order.
pub(crate) fn distinct_keys(records: &[Record], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.get(field))
        .filter(|v| !v.is_null() && seen.insert(*v))
        .cloned()
        .collect()
}

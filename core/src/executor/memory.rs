//! In-memory executor over named tables of rows.
//!
//! Evaluates every [`QuerySpec`] feature the planner emits: `IN` batches,
//! pivot joins, correlated `EXISTS` chains and aggregate columns. It keeps
//! a log of every spec it executed, which makes it the executor of choice
//! for asserting fetch counts, and can be told to fail on a table.

use core::cmp::Ordering;
use std::sync::{Mutex, PoisonError, RwLock};

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use hydrate_types::Value;

use crate::error::ExecutionError;
use crate::query::{
    Aggregate, AggregateColumn, Column, Direction, Filter, PIVOT_PREFIX, QuerySpec, Scope, Subquery,
};

use super::{Executor, Row};

type Tables = HashMap<CompactString, Vec<Row>>;

/// A target row and the pivot (or intermediate) row it was joined with.
type Joined<'a> = (&'a Row, Option<&'a Row>);

#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: RwLock<Tables>,
    calls: Mutex<Vec<QuerySpec>>,
    fail_on: Mutex<Option<CompactString>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows to `table`, creating it if needed.
    pub fn insert(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.entry(CompactString::from(table)).or_default().extend(rows);
    }

    pub fn with_table(self, table: &str, rows: impl IntoIterator<Item = Row>) -> Self {
        self.insert(table, rows);
        self
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(table).cloned().unwrap_or_default()
    }

    /// Every spec executed so far, in call order.
    pub fn calls(&self) -> Vec<QuerySpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Makes every later query against `table` fail.
    pub fn fail_on(&self, table: impl Into<CompactString>) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = Some(table.into());
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Executor for MemoryExecutor {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
        self.calls
            .lock()
            .map_err(|_| ExecutionError::new("memory executor call log poisoned"))?
            .push(spec.clone());

        let failing = self
            .fail_on
            .lock()
            .map_err(|_| ExecutionError::new("memory executor lock poisoned"))?
            .as_deref()
            == Some(spec.table.as_str());
        if failing {
            return Err(ExecutionError::new(format!(
                "table '{}' is unavailable",
                spec.table
            )));
        }

        let tables = self
            .tables
            .read()
            .map_err(|_| ExecutionError::new("memory executor lock poisoned"))?;
        select(&tables, spec)
    }
}

fn table<'a>(tables: &'a Tables, name: &str) -> &'a [Row] {
    tables.get(name).map(Vec::as_slice).unwrap_or_default()
}

fn lookup<'a>(row: &'a Row, pivot: Option<&'a Row>, column: &Column) -> Option<&'a Value> {
    match column.scope {
        Scope::Field => row.get(&column.name),
        Scope::Pivot => pivot?.get(&column.name),
    }
}

fn same(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b).is_some_and(Ordering::is_eq),
        _ => false,
    }
}

fn select(tables: &Tables, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
    let targets = table(tables, &spec.table);

    let mut joined: Vec<Joined<'_>> = match &spec.pivot {
        None => targets.iter().map(|row| (row, None)).collect(),
        Some(join) => {
            let pivots = table(tables, &join.table);
            targets
                .iter()
                .flat_map(|row| {
                    pivots
                        .iter()
                        .filter(|p| same(row.get(&join.foreign_key), p.get(&join.target_key)))
                        .map(move |p| (row, Some(p)))
                })
                .collect()
        }
    };

    joined.retain(|&(row, pivot)| {
        spec.filters
            .iter()
            .all(|filter| passes(tables, filter, row, pivot))
    });

    joined.sort_by(|a, b| {
        spec.order_by
            .iter()
            .map(|order| {
                let ord = compare_nullable(
                    lookup(a.0, a.1, &order.column),
                    lookup(b.0, b.1, &order.column),
                );
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let offset = spec.offset.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let limit = spec.limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    joined
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(row, pivot)| project(tables, spec, row, pivot))
        .collect()
}

fn project(
    tables: &Tables,
    spec: &QuerySpec,
    row: &Row,
    pivot: Option<&Row>,
) -> Result<Row, ExecutionError> {
    let mut out = if spec.columns.is_empty() {
        row.clone()
    } else {
        spec.columns
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or_default()))
            .collect()
    };
    if let Some(join) = &spec.pivot {
        for column in &join.columns {
            let value = pivot.and_then(|p| p.get(column)).cloned().unwrap_or_default();
            out.push(format_compact!("{PIVOT_PREFIX}{column}"), value);
        }
    }
    for aggregate in &spec.aggregates {
        out.push(aggregate.alias.clone(), aggregate_value(tables, aggregate, row)?);
    }
    Ok(out)
}

fn passes(tables: &Tables, filter: &Filter, row: &Row, pivot: Option<&Row>) -> bool {
    match filter {
        Filter::Predicate(predicate) => predicate.evaluate(|c| lookup(row, pivot, c)),
        Filter::Exists { subquery, negated } => {
            correlated(tables, subquery, row).is_empty() == *negated
        }
    }
}

/// Rows of `subquery` matching the outer row and the subquery's filters.
fn correlated<'a>(tables: &'a Tables, subquery: &Subquery, outer: &Row) -> Vec<Joined<'a>> {
    let Some(parent) = outer.get(&subquery.parent_key).filter(|v| !v.is_null()) else {
        return Vec::new();
    };
    let targets = table(tables, &subquery.table);

    let candidates: Vec<Joined<'a>> = match &subquery.via {
        None => targets
            .iter()
            .filter(|t| same(t.get(&subquery.key), Some(parent)))
            .map(|t| (t, None))
            .collect(),
        Some(via) => table(tables, &via.table)
            .iter()
            .filter(|v| same(v.get(&via.parent_key), Some(parent)))
            .flat_map(|v| {
                targets
                    .iter()
                    .filter(move |t| same(t.get(&subquery.key), v.get(&via.key)))
                    .map(move |t| (t, Some(v)))
            })
            .collect(),
    };

    candidates
        .into_iter()
        .filter(|&(row, pivot)| {
            subquery
                .filters
                .iter()
                .all(|filter| passes(tables, filter, row, pivot))
        })
        .collect()
}

fn aggregate_value(
    tables: &Tables,
    aggregate: &AggregateColumn,
    outer: &Row,
) -> Result<Value, ExecutionError> {
    let rows = correlated(tables, &aggregate.subquery, outer);
    let Some(column) = &aggregate.column else {
        return Ok(Value::Int(rows.len() as i64));
    };
    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|(row, _)| row.get(column))
        .filter(|v| !v.is_null())
        .collect();

    Ok(match aggregate.function {
        Aggregate::Count => Value::Int(values.len() as i64),
        Aggregate::Sum => sum(&values)?.unwrap_or_default(),
        Aggregate::Avg => match values.iter().filter_map(|v| v.as_f64()).collect::<Vec<_>>() {
            nums if nums.is_empty() => Value::Null,
            nums => Value::Real(nums.iter().sum::<f64>() / nums.len() as f64),
        },
        Aggregate::Min => extreme(&values, Ordering::Less),
        Aggregate::Max => extreme(&values, Ordering::Greater),
    })
}

/// Integer sum when every input is an integer, real otherwise. `None` for
/// an empty input, like SQL's `SUM`. Integer overflow is an error, as in
/// SQLite.
fn sum(values: &[&Value]) -> Result<Option<Value>, ExecutionError> {
    if values.is_empty() {
        return Ok(None);
    }
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        let total = values
            .iter()
            .filter_map(|v| v.as_i64())
            .try_fold(0_i64, i64::checked_add)
            .ok_or_else(|| ExecutionError::new("integer overflow"))?;
        return Ok(Some(Value::Int(total)));
    }
    Ok(Some(Value::Real(values.iter().filter_map(|v| v.as_f64()).sum())))
}

fn extreme(values: &[&Value], wanted: Ordering) -> Value {
    values
        .iter()
        .copied()
        .reduce(|best, v| if v.compare(best) == Some(wanted) { v } else { best })
        .cloned()
        .unwrap_or_default()
}

/// Nulls sort first, like SQLite.
fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b).unwrap_or_else(|| storage_order(a, b)),
    }
}

/// Total fallback for values `Value::compare` cannot order: numbers before
/// timestamps before text before blobs, NaN after every other real.
fn storage_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) | Value::Int(_) | Value::Real(_) => 1,
            Value::Timestamp(_) => 2,
            Value::Text(_) => 3,
            Value::Bytes(_) => 4,
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => Ordering::Equal,
    })
}

//! SQL rendering of executor-facing query specs.
//!
//! The root table is aliased `t0`, correlated subqueries `t1`, `t2`, ...
//! and their join tables `v1`, `v2`, ...; a batched many-to-many fetch joins
//! its pivot table as `p0`. Values are always bound, never inlined.

use core::fmt::Write;

use hydrate_types::{Dialect, Value};

use crate::query::{
    Aggregate, AggregateColumn, Column, Direction, Filter, LockMode, Operand, Operator,
    PIVOT_PREFIX, Predicate, QuerySpec, Scope, Subquery,
};

/// SQL text and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders `spec` for `dialect`.
///
/// Eager directives are ignored; plan them away first.
pub fn render(spec: &QuerySpec, dialect: Dialect) -> RenderedQuery {
    let mut w = Writer {
        sql: String::with_capacity(256),
        params: Vec::new(),
        dialect,
        next_alias: 1,
    };
    let scope = RowScope {
        alias: "t0".into(),
        pivot: spec.pivot.as_ref().map(|_| "p0".into()),
    };

    // SELECT
    w.sql.push_str("SELECT ");
    if spec.columns.is_empty() {
        w.ident(&scope.alias);
        w.sql.push_str(".*");
    } else {
        for (i, column) in spec.columns.iter().enumerate() {
            if i > 0 {
                w.sql.push_str(", ");
            }
            w.qualified(&scope.alias, column);
        }
    }
    if let (Some(join), Some(pivot)) = (&spec.pivot, &scope.pivot) {
        for column in &join.columns {
            w.sql.push_str(", ");
            w.qualified(pivot, column);
            w.sql.push_str(" AS ");
            w.ident(&format!("{PIVOT_PREFIX}{column}"));
        }
    }
    for aggregate in &spec.aggregates {
        w.sql.push_str(", ");
        w.aggregate(aggregate, &scope.alias);
        w.sql.push_str(" AS ");
        w.ident(&aggregate.alias);
    }

    // FROM
    w.sql.push_str(" FROM ");
    w.ident(&spec.table);
    w.sql.push_str(" AS ");
    w.ident(&scope.alias);
    if let (Some(join), Some(pivot)) = (&spec.pivot, &scope.pivot) {
        w.sql.push_str(" INNER JOIN ");
        w.ident(&join.table);
        w.sql.push_str(" AS ");
        w.ident(pivot);
        w.sql.push_str(" ON ");
        w.qualified(pivot, &join.target_key);
        w.sql.push_str(" = ");
        w.qualified(&scope.alias, &join.foreign_key);
    }

    // WHERE
    if !spec.filters.is_empty() {
        w.sql.push_str(" WHERE ");
        w.filters(&spec.filters, &scope);
    }

    // ORDER BY
    if !spec.order_by.is_empty() {
        w.sql.push_str(" ORDER BY ");
        for (i, order) in spec.order_by.iter().enumerate() {
            if i > 0 {
                w.sql.push_str(", ");
            }
            w.column(&order.column, &scope);
            w.sql.push_str(match order.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
    }

    // LIMIT / OFFSET
    match (spec.limit, spec.offset) {
        (Some(n), _) => {
            let _ = write!(w.sql, " LIMIT {n}");
        }
        (None, Some(_)) => {
            if let Some(all) = dialect.unbounded_limit() {
                let _ = write!(w.sql, " LIMIT {all}");
            }
        }
        (None, None) => {}
    }
    if let Some(n) = spec.offset {
        let _ = write!(w.sql, " OFFSET {n}");
    }

    // Row locks
    w.sql.push_str(lock_clause(spec.lock, dialect));

    RenderedQuery {
        sql: w.sql,
        params: w.params,
    }
}

/// Trailing lock clause, empty when the dialect has no row locks.
#[must_use]
pub const fn lock_clause(lock: LockMode, dialect: Dialect) -> &'static str {
    if !dialect.supports_row_locks() {
        return "";
    }
    match (lock, dialect) {
        (LockMode::None, _) => "",
        (LockMode::ForUpdate, _) => " FOR UPDATE",
        (LockMode::SharedLock, Dialect::MySQL) => " LOCK IN SHARE MODE",
        (LockMode::SharedLock, _) => " FOR SHARE",
    }
}

/// Aliases a filter's columns are resolved against.
struct RowScope {
    alias: String,
    pivot: Option<String>,
}

struct Writer {
    sql: String,
    params: Vec<Value>,
    dialect: Dialect,
    next_alias: usize,
}

impl Writer {
    /// Writes a quoted identifier, doubling embedded quote characters.
    fn ident(&mut self, name: &str) {
        let quote = self.dialect.quote_char();
        self.sql.push(quote);
        for c in name.chars() {
            if c == quote {
                self.sql.push(quote);
            }
            self.sql.push(c);
        }
        self.sql.push(quote);
    }

    /// Writes `"alias"."column"`.
    fn qualified(&mut self, alias: &str, column: &str) {
        self.ident(alias);
        self.sql.push('.');
        self.ident(column);
    }

    fn column(&mut self, column: &Column, scope: &RowScope) {
        let alias = match (column.scope, &scope.pivot) {
            (Scope::Pivot, Some(pivot)) => pivot.as_str(),
            _ => scope.alias.as_str(),
        };
        self.qualified(alias, &column.name);
    }

    fn param(&mut self, value: &Value) {
        self.params.push(value.clone());
        if self.dialect.uses_numbered_placeholders() {
            let _ = write!(self.sql, "${}", self.params.len());
        } else {
            self.sql.push('?');
        }
    }

    fn filters(&mut self, filters: &[Filter], scope: &RowScope) {
        for (i, filter) in filters.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(" AND ");
            }
            match filter {
                Filter::Predicate(predicate) => self.predicate(predicate, scope),
                Filter::Exists { subquery, negated } => {
                    if *negated {
                        self.sql.push_str("NOT ");
                    }
                    self.sql.push_str("EXISTS (SELECT 1");
                    self.subquery_body(subquery, &scope.alias);
                    self.sql.push(')');
                }
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate, scope: &RowScope) {
        match (&predicate.op, &predicate.operand) {
            (Operator::In, Operand::List(values)) if values.is_empty() => {
                self.sql.push_str("1 = 0");
                return;
            }
            (Operator::NotIn, Operand::List(values)) if values.is_empty() => {
                self.sql.push_str("1 = 1");
                return;
            }
            _ => {}
        }

        self.column(&predicate.column, scope);
        self.sql.push(' ');
        self.sql.push_str(predicate.op.as_sql());
        match &predicate.operand {
            Operand::None => {}
            Operand::Column(other) => {
                self.sql.push(' ');
                self.column(other, scope);
            }
            Operand::List(values) => {
                self.sql.push_str(" (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.param(value);
                }
                self.sql.push(')');
            }
            Operand::Value(value) if matches!(predicate.op, Operator::In | Operator::NotIn) => {
                self.sql.push_str(" (");
                self.param(value);
                self.sql.push(')');
            }
            Operand::Value(value) => {
                self.sql.push(' ');
                self.param(value);
            }
        }
    }

    /// `(SELECT fn(...) FROM ... WHERE ...)`
    fn aggregate(&mut self, aggregate: &AggregateColumn, outer: &str) {
        let alias = format!("t{}", self.next_alias);
        self.sql.push_str("(SELECT ");
        self.sql.push_str(aggregate.function.as_sql());
        self.sql.push('(');
        match (&aggregate.column, aggregate.function) {
            (Some(column), _) => self.qualified(&alias, column),
            (None, Aggregate::Count) => self.sql.push('*'),
            (None, _) => self.sql.push_str("NULL"),
        }
        self.sql.push(')');
        self.subquery_body(&aggregate.subquery, outer);
        self.sql.push(')');
    }

    /// ` FROM target [JOIN via] WHERE <correlation> [AND filters]`
    fn subquery_body(&mut self, subquery: &Subquery, outer: &str) {
        let n = self.next_alias;
        self.next_alias += 1;
        let scope = RowScope {
            alias: format!("t{n}"),
            pivot: subquery.via.as_ref().map(|_| format!("v{n}")),
        };

        self.sql.push_str(" FROM ");
        self.ident(&subquery.table);
        self.sql.push_str(" AS ");
        self.ident(&scope.alias);
        if let (Some(via), Some(pivot)) = (&subquery.via, &scope.pivot) {
            self.sql.push_str(" INNER JOIN ");
            self.ident(&via.table);
            self.sql.push_str(" AS ");
            self.ident(pivot);
            self.sql.push_str(" ON ");
            self.qualified(pivot, &via.key);
            self.sql.push_str(" = ");
            self.qualified(&scope.alias, &subquery.key);
        }

        self.sql.push_str(" WHERE ");
        match (&subquery.via, &scope.pivot) {
            (Some(via), Some(pivot)) => self.qualified(pivot, &via.parent_key),
            _ => self.qualified(&scope.alias, &subquery.key),
        }
        self.sql.push_str(" = ");
        self.qualified(outer, &subquery.parent_key);

        if !subquery.filters.is_empty() {
            self.sql.push_str(" AND ");
            self.filters(&subquery.filters, &scope);
        }
    }
}

use ::rusqlite::types::{Value as SqliteValue, ValueRef};
use ::rusqlite::{Connection, params_from_iter};
use hydrate_core::query::QuerySpec;
use hydrate_core::{ExecutionError, Executor, Row, sql};
use hydrate_types::{Dialect, Value};

/// [`Executor`] over a borrowed [`rusqlite::Connection`](Connection).
///
/// Locks render to nothing on SQLite; wrap the resolution in a
/// transaction on the same connection when isolation matters.
///
/// ```
/// # use hydrate::sqlite::SqliteExecutor;
/// # use hydrate::{EntityType, Registry, Resolver};
/// # use hydrate::types::FieldType;
/// let conn = rusqlite::Connection::open_in_memory()?;
/// conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY); INSERT INTO users VALUES (1);")?;
///
/// let mut registry = Registry::new();
/// registry.register(EntityType::builder("User").table("users").field("id", FieldType::Int).build()?)?;
///
/// let resolver = Resolver::new(&registry, SqliteExecutor::new(&conn));
/// let users = resolver.get(resolver.query("User")?)?;
/// assert_eq!(users.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SqliteExecutor<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteExecutor<'c> {
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Gets a reference to the underlying connection
    pub const fn conn(&self) -> &'c Connection {
        self.conn
    }
}

impl Executor for SqliteExecutor<'_> {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
        hydrate_core::hydrate_profile_scope!("sqlite.rusqlite", "execute");

        let rendered = sql::render(spec, Dialect::SQLite);
        hydrate_core::hydrate_trace_query!(&rendered.sql, rendered.params.len());

        let mut stmt = self
            .conn
            .prepare(&rendered.sql)
            .map_err(|e| ExecutionError::with_source(format!("prepare failed on '{}'", spec.table), e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let params = rendered.params.into_iter().map(bind);
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| ExecutionError::with_source(format!("query failed on '{}'", spec.table), e))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ExecutionError::with_source(format!("reading '{}' failed", spec.table), e))?
        {
            let mut values = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| ExecutionError::with_source(format!("column '{name}'"), e))?;
                values.push(name.as_str(), read(value)?);
            }
            out.push(values);
        }
        Ok(out)
    }
}

fn bind(value: Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(b as i64),
        Value::Int(i) => SqliteValue::Integer(i),
        Value::Real(r) => SqliteValue::Real(r),
        Value::Text(s) => SqliteValue::Text(s),
        Value::Timestamp(ts) => SqliteValue::Text(ts.to_rfc3339()),
        Value::Bytes(b) => SqliteValue::Blob(b),
    }
}

fn read(value: ValueRef<'_>) -> Result<Value, ExecutionError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(text) => match std::str::from_utf8(text) {
            Ok(s) => Value::Text(s.to_owned()),
            Err(e) => return Err(ExecutionError::with_source("invalid UTF-8 in text column", e)),
        },
        ValueRef::Blob(blob) => Value::Bytes(blob.to_vec()),
    })
}

//! Filter predicates over entity fields and pivot columns.

use compact_str::CompactString;
use hydrate_types::Value;

/// Comparison operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Parses the SQL spelling of an operator (case-insensitive).
    ///
    /// ```
    /// use hydrate_core::query::Operator;
    ///
    /// assert_eq!(Operator::parse(">="), Some(Operator::Gte));
    /// assert_eq!(Operator::parse("not like"), Some(Operator::NotLike));
    /// assert_eq!(Operator::parse("~"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let op = match s {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::NotEq,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            _ if s.eq_ignore_ascii_case("like") => Operator::Like,
            _ if s.eq_ignore_ascii_case("not like") => Operator::NotLike,
            _ if s.eq_ignore_ascii_case("in") => Operator::In,
            _ if s.eq_ignore_ascii_case("not in") => Operator::NotIn,
            _ if s.eq_ignore_ascii_case("is null") => Operator::IsNull,
            _ if s.eq_ignore_ascii_case("is not null") => Operator::IsNotNull,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Which row a [`Column`] is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A declared field of the queried entity.
    Field,
    /// A column of the pivot (or intermediate) table joined into the query.
    Pivot,
}

/// A column reference, optionally scoped to the pivot table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub scope: Scope,
    pub name: CompactString,
}

impl Column {
    pub fn field(name: impl Into<CompactString>) -> Self {
        Self {
            scope: Scope::Field,
            name: name.into(),
        }
    }

    pub fn pivot(name: impl Into<CompactString>) -> Self {
        Self {
            scope: Scope::Pivot,
            name: name.into(),
        }
    }

    /// `pivot.<col>` selects the pivot scope, anything else is a field.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.strip_prefix("pivot.") {
            Some(col) => Self::pivot(col),
            None => Self::field(name),
        }
    }
}

impl core::fmt::Display for Column {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.scope {
            Scope::Field => f.write_str(&self.name),
            Scope::Pivot => write!(f, "pivot.{}", self.name),
        }
    }
}

/// Right-hand side of a [`Predicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Column(Column),
    /// Used by the unary `IS NULL` / `IS NOT NULL` operators.
    None,
}

static NULL: Value = Value::Null;

/// A single `column <op> operand` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: Column,
    pub op: Operator,
    pub operand: Operand,
}

impl Predicate {
    pub fn compare(column: Column, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        match (op, value) {
            (Operator::Eq, Value::Null) => Self::null(column),
            (Operator::NotEq, Value::Null) => Self::not_null(column),
            (op, value) => Self {
                column,
                op,
                operand: Operand::Value(value),
            },
        }
    }

    /// Column-to-column comparison on the same row.
    pub fn columns(column: Column, op: Operator, other: Column) -> Self {
        Self {
            column,
            op,
            operand: Operand::Column(other),
        }
    }

    pub fn is_in(column: Column, values: Vec<Value>) -> Self {
        Self {
            column,
            op: Operator::In,
            operand: Operand::List(values),
        }
    }

    pub fn not_in(column: Column, values: Vec<Value>) -> Self {
        Self {
            column,
            op: Operator::NotIn,
            operand: Operand::List(values),
        }
    }

    pub fn null(column: Column) -> Self {
        Self {
            column,
            op: Operator::IsNull,
            operand: Operand::None,
        }
    }

    pub fn not_null(column: Column) -> Self {
        Self {
            column,
            op: Operator::IsNotNull,
            operand: Operand::None,
        }
    }

    /// Columns read by this predicate.
    pub fn referenced_columns(&self) -> impl Iterator<Item = &Column> {
        let other = match &self.operand {
            Operand::Column(c) => Some(c),
            _ => None,
        };
        core::iter::once(&self.column).chain(other)
    }

    /// Evaluates the predicate with SQL three-valued logic collapsed to
    /// `false` for unknown.
    pub fn evaluate<'a>(&self, lookup: impl Fn(&Column) -> Option<&'a Value>) -> bool {
        let lhs = lookup(&self.column).unwrap_or(&NULL);

        match (&self.op, &self.operand) {
            (Operator::IsNull, _) => lhs.is_null(),
            (Operator::IsNotNull, _) => !lhs.is_null(),
            (_, _) if lhs.is_null() => false,
            (Operator::In, Operand::List(values)) => values.iter().any(|v| sql_eq(lhs, v)),
            (Operator::NotIn, Operand::List(values)) => {
                !values.iter().any(|v| v.is_null() || sql_eq(lhs, v))
            }
            (op, Operand::Value(rhs)) => compare_with(*op, lhs, rhs),
            (op, Operand::Column(other)) => match lookup(other) {
                Some(rhs) => compare_with(*op, lhs, rhs),
                None => false,
            },
            _ => false,
        }
    }
}

fn sql_eq(lhs: &Value, rhs: &Value) -> bool {
    lhs.compare(rhs).is_some_and(|o| o.is_eq())
}

fn compare_with(op: Operator, lhs: &Value, rhs: &Value) -> bool {
    match op {
        Operator::Like => like(lhs, rhs),
        Operator::NotLike => !rhs.is_null() && !like(lhs, rhs),
        Operator::In => sql_eq(lhs, rhs),
        Operator::NotIn => !rhs.is_null() && !sql_eq(lhs, rhs),
        _ => match lhs.compare(rhs) {
            Some(ord) => match op {
                Operator::Eq => ord.is_eq(),
                Operator::NotEq => ord.is_ne(),
                Operator::Lt => ord.is_lt(),
                Operator::Lte => ord.is_le(),
                Operator::Gt => ord.is_gt(),
                Operator::Gte => ord.is_ge(),
                _ => false,
            },
            None => false,
        },
    }
}

/// SQLite-flavoured `LIKE`: `%` and `_` wildcards, ASCII case-insensitive.
fn like(lhs: &Value, pattern: &Value) -> bool {
    let (Some(text), Some(pattern)) = (lhs.as_str(), pattern.as_str()) else {
        return false;
    };
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    like_match(&text, &pattern)
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => (0..=text.len()).any(|i| like_match(&text[i..], rest)),
        Some(('_', rest)) => !text.is_empty() && like_match(&text[1..], rest),
        Some((c, rest)) => text.first() == Some(c) && like_match(&text[1..], rest),
    }
}

//! Backend-neutral filter expressions and field value sets.
//!
//! Column names are plain strings supplied by callers, so every predicate and
//! field set is checked against the record type's known columns before it is
//! rendered. Values are always bound as parameters.

use indexmap::IndexMap;
use sakuya_core::error::CoreError;
use sakuya_core::types::Timestamp;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::record::{is_known_column, Record};

/// A single bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(Timestamp),
    Json(serde_json::Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(v: Timestamp) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Ordered column -> value map, used for inserts and equality lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(IndexMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `defaults` with every entry of `self` laid on top.
    pub fn merged_over(&self, defaults: &Fields) -> Fields {
        let mut merged = defaults.clone();
        for (column, value) in &self.0 {
            merged.0.insert(column.clone(), value.clone());
        }
        merged
    }

    /// AND of one equality per entry. An empty set matches everything.
    pub fn to_predicate(&self) -> Predicate {
        Predicate::And(
            self.0
                .iter()
                .map(|(column, value)| Predicate::Eq(column.clone(), value.clone()))
                .collect(),
        )
    }

    /// Check that every column is a record-specific field of `R`.
    ///
    /// Bookkeeping columns are rejected: the store owns them.
    pub fn check_writable<R: Record>(&self) -> Result<(), CoreError> {
        for column in self.0.keys() {
            if !R::FIELDS.contains(&column.as_str()) {
                if is_known_column::<R>(column) {
                    return Err(CoreError::Validation(format!(
                        "Column '{column}' on {} is managed by the store",
                        R::TABLE
                    )));
                }
                return Err(CoreError::UnknownColumn {
                    entity: R::TABLE,
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// A filter expression over a record's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, FieldValue),
    Ne(String, FieldValue),
    Lt(String, FieldValue),
    Lte(String, FieldValue),
    Gt(String, FieldValue),
    Gte(String, FieldValue),
    In(String, Vec<FieldValue>),
    IsNull(String),
    IsNotNull(String),
    Like(String, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Eq(column.into(), value.into())
}

pub fn ne(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Ne(column.into(), value.into())
}

pub fn lt(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Lt(column.into(), value.into())
}

pub fn lte(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Lte(column.into(), value.into())
}

pub fn gt(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Gt(column.into(), value.into())
}

pub fn gte(column: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    Predicate::Gte(column.into(), value.into())
}

pub fn is_in<V: Into<FieldValue>>(
    column: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> Predicate {
    Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
}

pub fn is_null(column: impl Into<String>) -> Predicate {
    Predicate::IsNull(column.into())
}

pub fn is_not_null(column: impl Into<String>) -> Predicate {
    Predicate::IsNotNull(column.into())
}

pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Predicate {
    Predicate::Like(column.into(), pattern.into())
}

impl Predicate {
    /// Matches every row.
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Fail with `UnknownColumn` if any referenced column is not a column of `R`.
    pub fn check_columns<R: Record>(&self) -> Result<(), CoreError> {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Ne(c, _)
            | Predicate::Lt(c, _)
            | Predicate::Lte(c, _)
            | Predicate::Gt(c, _)
            | Predicate::Gte(c, _)
            | Predicate::In(c, _)
            | Predicate::IsNull(c)
            | Predicate::IsNotNull(c)
            | Predicate::Like(c, _) => {
                if is_known_column::<R>(c) {
                    Ok(())
                } else {
                    Err(CoreError::UnknownColumn {
                        entity: R::TABLE,
                        column: c.clone(),
                    })
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                parts.iter().try_for_each(|p| p.check_columns::<R>())
            }
            Predicate::Not(inner) => inner.check_columns::<R>(),
        }
    }

    /// Render into `qb`. Columns must already have passed [`check_columns`].
    ///
    /// [`check_columns`]: Predicate::check_columns
    pub(crate) fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Predicate::Eq(c, FieldValue::Null) | Predicate::IsNull(c) => {
                qb.push(format!("{c} IS NULL"));
            }
            Predicate::Ne(c, FieldValue::Null) | Predicate::IsNotNull(c) => {
                qb.push(format!("{c} IS NOT NULL"));
            }
            Predicate::Eq(c, v) => push_comparison(qb, c, "=", v),
            Predicate::Ne(c, v) => push_comparison(qb, c, "<>", v),
            Predicate::Lt(c, v) => push_comparison(qb, c, "<", v),
            Predicate::Lte(c, v) => push_comparison(qb, c, "<=", v),
            Predicate::Gt(c, v) => push_comparison(qb, c, ">", v),
            Predicate::Gte(c, v) => push_comparison(qb, c, ">=", v),
            Predicate::In(_, values) if values.is_empty() => {
                qb.push("FALSE");
            }
            Predicate::In(c, values) => {
                qb.push(format!("{c} IN ("));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            }
            Predicate::Like(c, pattern) => {
                qb.push(format!("{c} LIKE "));
                qb.push_bind(pattern.clone());
            }
            Predicate::And(parts) => push_joined(qb, parts, " AND ", "TRUE"),
            Predicate::Or(parts) => push_joined(qb, parts, " OR ", "FALSE"),
            Predicate::Not(inner) => {
                qb.push("NOT (");
                inner.push_sql(qb);
                qb.push(")");
            }
        }
    }
}

impl From<Fields> for Predicate {
    fn from(fields: Fields) -> Self {
        fields.to_predicate()
    }
}

fn push_comparison(qb: &mut QueryBuilder<'_, Postgres>, column: &str, op: &str, value: &FieldValue) {
    qb.push(format!("{column} {op} "));
    push_value(qb, value);
}

fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Predicate], sep: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(sep);
        }
        part.push_sql(qb);
    }
    qb.push(")");
}

/// Bind `value`, or write a literal `NULL` so the parameter takes the
/// column's type instead of an arbitrary one.
pub(crate) fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Null => {
            qb.push("NULL");
        }
        FieldValue::Bool(v) => {
            qb.push_bind(*v);
        }
        FieldValue::Int(v) => {
            qb.push_bind(*v);
        }
        FieldValue::Float(v) => {
            qb.push_bind(*v);
        }
        FieldValue::Text(v) => {
            qb.push_bind(v.clone());
        }
        FieldValue::Uuid(v) => {
            qb.push_bind(*v);
        }
        FieldValue::Timestamp(v) => {
            qb.push_bind(*v);
        }
        FieldValue::Json(v) => {
            qb.push_bind(v.clone());
        }
    }
}

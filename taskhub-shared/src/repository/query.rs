/// Query descriptions understood by every repository backend
///
/// A [`Query`] is a plain value: equality conditions, an optional filter
/// through a related collection, one sort key and an optional window.
/// Backends translate it to SQL (`postgres`) or evaluate it directly
/// (`memory`). Values travel as [`Value`] so that both backends can bind
/// or compare them without knowing the entity type.
///
/// # Example
///
/// ```
/// use taskhub_shared::repository::query::{Conditions, Query, Sort};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let query = Query::new()
///     .filter(Conditions::new().with("user_id", owner).with("status", "pending"))
///     .sort(Sort::asc("created_at"));
///
/// assert_eq!(query.conditions.len(), 2);
/// ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use super::entity::{Entity, RelationDef};
use super::{RepositoryError, RepositoryResult};

/// A single column value used in filters and writes
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / JSON null
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// JSON form of the value, as stored by the in-memory backend
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::Timestamp(t) => {
                JsonValue::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    /// Exact-match comparison against a stored JSON value
    ///
    /// A missing column is passed in as `JsonValue::Null`.
    pub fn matches(&self, stored: &JsonValue) -> bool {
        match self {
            Value::Null => stored.is_null(),
            Value::Bool(b) => stored.as_bool() == Some(*b),
            Value::Int(i) => stored.as_i64() == Some(*i),
            Value::Text(s) => stored.as_str() == Some(s.as_str()),
            Value::Uuid(u) => stored
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map_or(false, |stored| stored == *u),
            Value::Timestamp(t) => stored
                .as_str()
                .and_then(parse_timestamp)
                .map_or(false, |stored| stored == *t),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Ordered list of `column = value` pairs
///
/// Used both as a conjunction of equality filters ([`Conditions`]) and as
/// the set of columns to write ([`Record`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair; a later pair for the same column replaces the earlier one
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails on the first column not in `allowed`
    pub(crate) fn check_columns(&self, table: &str, allowed: &[&str]) -> RepositoryResult<()> {
        for column in self.columns() {
            if !allowed.contains(&column) {
                return Err(RepositoryError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Equality filters, all of which must hold
pub type Conditions = Fields;

/// Columns to write
pub type Record = Fields;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(RepositoryError::InvalidQuery(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// One sort key and its direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

/// Filter on the existence of matching rows in a related collection
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedFilter {
    /// Relation name declared by the entity (e.g. `"user"`)
    pub relation: String,

    /// Conditions on the related rows
    pub conditions: Conditions,
}

/// A complete read/write selector for one entity collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Conditions,
    pub related: Option<RelatedFilter>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Keeps only rows having at least one related row matching `conditions`
    pub fn through(mut self, relation: impl Into<String>, conditions: Conditions) -> Self {
        self.related = Some(RelatedFilter {
            relation: relation.into(),
            conditions,
        });
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restricts the query to one page
    pub fn page(self, page: PageRequest) -> Self {
        self.limit(page.per_page).offset(page.offset())
    }

    /// Checks every column and relation name against the entity schema
    ///
    /// Returns the relation definition used by the related filter, if any.
    pub fn check<E: Entity>(&self) -> RepositoryResult<Option<&'static RelationDef>> {
        self.conditions.check_columns(E::TABLE, E::COLUMNS)?;

        if let Some(sort) = &self.sort {
            if !E::COLUMNS.contains(&sort.column.as_str()) {
                return Err(RepositoryError::UnknownColumn {
                    table: E::TABLE.to_string(),
                    column: sort.column.clone(),
                });
            }
        }

        match &self.related {
            Some(related) => {
                let def = E::relation(&related.relation)?;
                related.conditions.check_columns(def.table, def.columns)?;
                Ok(Some(def))
            }
            None => Ok(None),
        }
    }
}

/// Which page to read (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Page numbers and sizes below 1 are raised to 1
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 15)
    }
}

/// One page of results plus totals
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let last_page = total.div_ceil(request.per_page).max(1);
        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
        }
    }

    /// Transforms the items, keeping the totals
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Total order over stored JSON values, used for sorting
///
/// Nulls sort first. Strings that both parse as RFC 3339 timestamps are
/// compared as instants, so differing fractional precision does not
/// break chronological order.
pub(crate) fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(x), JsonValue::String(y)) => {
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        _ => a.to_string().cmp(&b.to_string()),
    }
}

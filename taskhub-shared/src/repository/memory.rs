/// In-process repository backend
///
/// Rows are kept as JSON objects in a [`MemoryStore`] shared by every
/// repository created from it, so relation filters and eager loading work
/// across entity types exactly as they do against PostgreSQL. The store
/// fills in what the database would: a random UUID primary key, the
/// `created_at`/`updated_at` timestamps and unique-constraint checks.
///
/// Used by the test suites and by `STORAGE_BACKEND=memory`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::entity::{Entity, RelationDef};
use super::query::{compare_json, Conditions, Query, Record, SortDirection, Value};
use super::relations::{key_string, strip_hidden, JsonRow};
use super::{DeleteMode, Repository, RepositoryError, RepositoryResult};

type Tables = HashMap<&'static str, Vec<JsonRow>>;

/// Shared table storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw rows of `table`, soft-deleted ones included
    pub async fn rows(&self, table: &str) -> Vec<JsonRow> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

/// Repository for `E` over a [`MemoryStore`]
pub struct MemoryRepository<E> {
    store: MemoryStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for MemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> MemoryRepository<E> {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }
}

fn column<'a>(row: &'a JsonRow, name: &str) -> &'a JsonValue {
    row.get(name).unwrap_or(&JsonValue::Null)
}

fn matches_all(row: &JsonRow, conditions: &Conditions) -> bool {
    conditions
        .iter()
        .all(|(name, value)| value.matches(column(row, name)))
}

fn has_related(tables: &Tables, row: &JsonRow, def: &RelationDef, conditions: &Conditions) -> bool {
    let Some(key) = key_string(column(row, def.local_key)) else {
        return false;
    };
    tables.get(def.table).map_or(false, |related| {
        related.iter().any(|candidate| {
            key_string(column(candidate, def.foreign_key)).as_deref() == Some(key.as_str())
                && matches_all(candidate, conditions)
        })
    })
}

/// Indices of the rows of `E::TABLE` selected by `query`, in storage order
fn matching<E: Entity>(
    tables: &Tables,
    query: &Query,
    related: Option<&RelationDef>,
    with_trashed: bool,
) -> Vec<usize> {
    let Some(rows) = tables.get(E::TABLE) else {
        return Vec::new();
    };

    rows.iter()
        .enumerate()
        .filter(|(_, row)| matches_all(row, &query.conditions))
        .filter(|(_, row)| match (E::SOFT_DELETE, with_trashed) {
            (Some(deleted_at), false) => column(row, deleted_at).is_null(),
            _ => true,
        })
        .filter(|(_, row)| match (related, &query.related) {
            (Some(def), Some(filter)) => has_related(tables, row, def, &filter.conditions),
            _ => true,
        })
        .map(|(index, _)| index)
        .collect()
}

fn unique_violation<E: Entity>(
    rows: &[JsonRow],
    record: &Record,
    skip: &HashSet<usize>,
) -> Option<RepositoryError> {
    E::UNIQUE.iter().find_map(|unique| {
        let value = record.get(unique)?;
        if *value == Value::Null {
            return None;
        }
        let taken = rows
            .iter()
            .enumerate()
            .any(|(index, row)| !skip.contains(&index) && value.matches(column(row, unique)));
        taken.then(|| RepositoryError::UniqueViolation(format!("{}_{}_key", E::TABLE, unique)))
    })
}

fn decode<E: Entity>(row: &JsonRow) -> RepositoryResult<E> {
    Ok(serde_json::from_value(JsonValue::Object(row.clone()))?)
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn insert(&self, record: Record) -> RepositoryResult<E> {
        record.check_columns(E::TABLE, E::COLUMNS)?;

        let now = Value::Timestamp(Utc::now()).to_json();
        let mut row: JsonRow = E::COLUMNS
            .iter()
            .map(|name| (name.to_string(), JsonValue::Null))
            .collect();
        row.insert(
            E::PRIMARY_KEY.to_string(),
            Value::Uuid(Uuid::new_v4()).to_json(),
        );
        if E::TIMESTAMPS {
            row.insert("created_at".to_string(), now.clone());
            row.insert("updated_at".to_string(), now);
        }
        for (name, value) in record.iter() {
            row.insert(name.to_string(), value.to_json());
        }

        let mut tables = self.store.tables.write().await;
        let rows = tables.entry(E::TABLE).or_default();
        if let Some(err) = unique_violation::<E>(rows, &record, &HashSet::new()) {
            return Err(err);
        }

        let entity = decode::<E>(&row)?;
        rows.push(row);
        Ok(entity)
    }

    async fn select(&self, query: &Query) -> RepositoryResult<Vec<E>> {
        let related = query.check::<E>()?;
        let tables = self.store.tables.read().await;
        let Some(rows) = tables.get(E::TABLE) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<&JsonRow> = matching::<E>(&tables, query, related, false)
            .into_iter()
            .map(|index| &rows[index])
            .collect();

        if let Some(sort) = &query.sort {
            let name = sort.column.as_str();
            selected.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_json(column(a, name), column(b, name)),
                SortDirection::Desc => compare_json(column(b, name), column(a, name)),
            });
        }

        selected
            .into_iter()
            .skip(query.offset.unwrap_or(0) as usize)
            .take(query.limit.map_or(usize::MAX, |limit| limit as usize))
            .map(decode::<E>)
            .collect()
    }

    async fn count(&self, query: &Query) -> RepositoryResult<u64> {
        let related = query.check::<E>()?;
        let tables = self.store.tables.read().await;
        Ok(matching::<E>(&tables, query, related, false).len() as u64)
    }

    async fn update_where(&self, query: &Query, record: Record) -> RepositoryResult<u64> {
        let related = query.check::<E>()?;
        record.check_columns(E::TABLE, E::COLUMNS)?;

        let mut tables = self.store.tables.write().await;
        let targets = matching::<E>(&tables, query, related, false);
        if targets.is_empty() {
            return Ok(0);
        }

        let Some(rows) = tables.get_mut(E::TABLE) else {
            return Ok(0);
        };
        let skip: HashSet<usize> = targets.iter().copied().collect();
        if let Some(err) = unique_violation::<E>(rows, &record, &skip) {
            return Err(err);
        }

        let now = Value::Timestamp(Utc::now()).to_json();
        for index in &targets {
            let row = &mut rows[*index];
            for (name, value) in record.iter() {
                row.insert(name.to_string(), value.to_json());
            }
            if E::TIMESTAMPS && record.get("updated_at").is_none() {
                row.insert("updated_at".to_string(), now.clone());
            }
        }
        Ok(targets.len() as u64)
    }

    async fn delete_where(&self, query: &Query, mode: DeleteMode) -> RepositoryResult<u64> {
        let related = query.check::<E>()?;

        let mut tables = self.store.tables.write().await;
        let targets = matching::<E>(&tables, query, related, mode == DeleteMode::Hard);
        let Some(rows) = tables.get_mut(E::TABLE) else {
            return Ok(0);
        };

        match (E::SOFT_DELETE, mode) {
            (Some(deleted_at), DeleteMode::Soft) => {
                let now = Value::Timestamp(Utc::now()).to_json();
                for index in &targets {
                    rows[*index].insert(deleted_at.to_string(), now.clone());
                }
            }
            _ => {
                let doomed: HashSet<usize> = targets.iter().copied().collect();
                let mut index = 0;
                rows.retain(|_| {
                    let keep = !doomed.contains(&index);
                    index += 1;
                    keep
                });
            }
        }
        Ok(targets.len() as u64)
    }

    async fn fetch_related(
        &self,
        relation: &RelationDef,
        keys: &[String],
    ) -> RepositoryResult<Vec<JsonRow>> {
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let tables = self.store.tables.read().await;

        Ok(tables
            .get(relation.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        key_string(column(row, relation.foreign_key))
                            .map_or(false, |key| wanted.contains(key.as_str()))
                    })
                    .map(|row| strip_hidden(row.clone(), relation.hidden))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Eager loading of related rows
///
/// Relation paths use dot notation: `"user"` loads the task's owner,
/// `"user.tasks"` additionally loads every task of that owner. Related
/// rows are fetched as JSON objects, one query per relation level, and
/// attached to their parents under the relation name. A `BelongsTo`
/// relation becomes an object (or `null`), a `HasMany` relation an array.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

use super::entity::{Entity, RelationDef, RelationKind};
use super::{Repository, RepositoryError, RepositoryResult};

/// A stored row as a JSON object
pub type JsonRow = Map<String, JsonValue>;

/// An entity together with its eagerly loaded relations
#[derive(Debug, Clone, Serialize)]
pub struct Loaded<E> {
    #[serde(flatten)]
    pub entity: E,

    #[serde(flatten)]
    pub relations: JsonRow,
}

/// Parsed set of relation paths, validated against the schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationTree(BTreeMap<String, RelationTree>);

impl RelationTree {
    /// Parses `["user", "user.tasks"]` style paths rooted at `E`
    pub fn parse<E: Entity>(paths: &[&str]) -> RepositoryResult<Self> {
        Self::parse_from(E::TABLE, E::relations(), paths)
    }

    fn parse_from(
        table: &str,
        defs: &'static [RelationDef],
        paths: &[&str],
    ) -> RepositoryResult<Self> {
        let mut tree = RelationTree::default();
        for path in paths {
            if path.is_empty() {
                return Err(RepositoryError::InvalidQuery("empty relation path".into()));
            }
            let mut node = &mut tree;
            let mut current_table = table.to_string();
            let mut current_defs = defs;
            for segment in path.split('.') {
                let def = current_defs
                    .iter()
                    .find(|def| def.name == segment)
                    .ok_or_else(|| RepositoryError::UnknownRelation {
                        table: current_table.clone(),
                        relation: segment.to_string(),
                    })?;
                node = node.0.entry(segment.to_string()).or_default();
                current_table = def.table.to_string();
                current_defs = (def.relations)();
            }
        }
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// String form of a key column, used to match parents with related rows
pub(crate) fn key_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.to_ascii_lowercase()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Serializes an entity into a JSON object
pub(crate) fn to_row<E: Entity>(entity: &E) -> RepositoryResult<JsonRow> {
    match serde_json::to_value(entity)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(RepositoryError::InvalidQuery(format!(
            "{} does not serialize to an object: {}",
            E::TABLE,
            other
        ))),
    }
}

/// Loads `tree` for `entities` using the backend's related-row fetcher
pub(crate) async fn load<E, R>(
    repo: &R,
    entities: Vec<E>,
    tree: &RelationTree,
) -> RepositoryResult<Vec<Loaded<E>>>
where
    E: Entity,
    R: Repository<E> + ?Sized,
{
    let mut rows = entities
        .iter()
        .map(to_row)
        .collect::<RepositoryResult<Vec<_>>>()?;

    attach::<E, R>(repo, &mut rows, E::relations(), tree).await?;

    Ok(entities
        .into_iter()
        .zip(rows)
        .map(|(entity, mut row)| {
            let relations = tree
                .names()
                .filter_map(|name| row.remove_entry(name))
                .collect();
            Loaded { entity, relations }
        })
        .collect())
}

fn attach<'a, E, R>(
    repo: &'a R,
    rows: &'a mut [JsonRow],
    defs: &'static [RelationDef],
    tree: &'a RelationTree,
) -> BoxFuture<'a, RepositoryResult<()>>
where
    E: Entity,
    R: Repository<E> + ?Sized + 'a,
{
    Box::pin(async move {
        for (name, children) in &tree.0 {
            let def = defs
                .iter()
                .find(|def| def.name == name.as_str())
                .ok_or_else(|| RepositoryError::UnknownRelation {
                    table: String::new(),
                    relation: name.clone(),
                })?;

            let mut keys: Vec<String> = rows
                .iter()
                .filter_map(|row| row.get(def.local_key).and_then(key_string))
                .collect();
            keys.sort();
            keys.dedup();

            let mut related = if keys.is_empty() {
                Vec::new()
            } else {
                repo.fetch_related(def, &keys).await?
            };

            if !children.is_empty() {
                attach::<E, R>(repo, &mut related, (def.relations)(), children).await?;
            }

            let mut grouped: HashMap<String, Vec<JsonValue>> = HashMap::new();
            for row in related {
                if let Some(key) = row.get(def.foreign_key).and_then(key_string) {
                    grouped.entry(key).or_default().push(JsonValue::Object(row));
                }
            }

            for row in rows.iter_mut() {
                let matches = row
                    .get(def.local_key)
                    .and_then(key_string)
                    .and_then(|key| grouped.get(&key))
                    .cloned()
                    .unwrap_or_default();
                let value = match def.kind {
                    RelationKind::BelongsTo => {
                        matches.into_iter().next().unwrap_or(JsonValue::Null)
                    }
                    RelationKind::HasMany => JsonValue::Array(matches),
                };
                row.insert(def.name.to_string(), value);
            }
        }
        Ok(())
    })
}

/// Removes hidden columns from a related row
pub(crate) fn strip_hidden(mut row: JsonRow, hidden: &[&str]) -> JsonRow {
    for column in hidden {
        row.remove(*column);
    }
    row
}

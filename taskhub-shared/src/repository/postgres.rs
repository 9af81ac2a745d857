/// PostgreSQL repository backend
///
/// Translates [`Query`] values into SQL with `sqlx::QueryBuilder`. Every
/// value is bound as a parameter; table and column names come from the
/// entity's static schema (queries naming anything else are rejected by
/// [`Query::check`] before SQL is built).
///
/// Related filters become correlated `EXISTS` subqueries:
///
/// ```text
/// SELECT t.* FROM tasks AS t
/// WHERE TRUE AND t.status = $1
///   AND EXISTS (SELECT 1 FROM users AS r WHERE r.id = t.user_id AND r.email = $2)
/// ORDER BY t.created_at ASC
/// ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::marker::PhantomData;
use tracing::debug;

use super::entity::{Entity, RelationDef};
use super::query::{Query, Record, Value};
use super::relations::{strip_hidden, JsonRow};
use super::{DeleteMode, Repository, RepositoryError, RepositoryResult};

/// Repository for `E` backed by a PostgreSQL pool
pub struct PgRepository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PgRepository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> PgRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value.clone() {
        Value::Null => {
            builder.push("NULL");
        }
        Value::Bool(v) => {
            builder.push_bind(v);
        }
        Value::Int(v) => {
            builder.push_bind(v);
        }
        Value::Text(v) => {
            builder.push_bind(v);
        }
        Value::Uuid(v) => {
            builder.push_bind(v);
        }
        Value::Timestamp(v) => {
            builder.push_bind(v);
        }
    }
}

fn push_equals(builder: &mut QueryBuilder<'_, Postgres>, alias: &str, column: &str, value: &Value) {
    builder.push(format!(" AND {}.{}", alias, column));
    if *value == Value::Null {
        builder.push(" IS NULL");
    } else {
        builder.push(" = ");
        push_value(builder, value);
    }
}

/// Appends `WHERE ...` for `query` against the table aliased `t`
fn push_where<E: Entity>(
    builder: &mut QueryBuilder<'_, Postgres>,
    query: &Query,
    related: Option<&RelationDef>,
    with_trashed: bool,
) {
    builder.push(" WHERE TRUE");

    for (column, value) in query.conditions.iter() {
        push_equals(builder, "t", column, value);
    }

    if let (Some(column), false) = (E::SOFT_DELETE, with_trashed) {
        builder.push(format!(" AND t.{} IS NULL", column));
    }

    if let (Some(def), Some(filter)) = (related, &query.related) {
        builder.push(format!(
            " AND EXISTS (SELECT 1 FROM {} AS r WHERE r.{} = t.{}",
            def.table, def.foreign_key, def.local_key
        ));
        for (column, value) in filter.conditions.iter() {
            push_equals(builder, "r", column, value);
        }
        builder.push(")");
    }
}

pub(crate) fn select_sql<E: Entity>(query: &Query) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let related = query.check::<E>()?;
    let mut builder = QueryBuilder::new(format!("SELECT t.* FROM {} AS t", E::TABLE));
    push_where::<E>(&mut builder, query, related, false);

    if let Some(sort) = &query.sort {
        builder.push(format!(" ORDER BY t.{} {}", sort.column, sort.direction.as_sql()));
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);
    }
    if let Some(offset) = query.offset {
        builder.push(" OFFSET ");
        builder.push_bind(offset as i64);
    }
    Ok(builder)
}

pub(crate) fn count_sql<E: Entity>(query: &Query) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let related = query.check::<E>()?;
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} AS t", E::TABLE));
    push_where::<E>(&mut builder, query, related, false);
    Ok(builder)
}

pub(crate) fn insert_sql<E: Entity>(record: &Record) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    record.check_columns(E::TABLE, E::COLUMNS)?;

    let mut builder = QueryBuilder::new(format!("INSERT INTO {}", E::TABLE));
    if record.is_empty() {
        builder.push(" DEFAULT VALUES");
    } else {
        let columns: Vec<&str> = record.columns().collect();
        builder.push(format!(" ({}) VALUES (", columns.join(", ")));
        let mut values = builder.separated(", ");
        for (_, value) in record.iter() {
            match value.clone() {
                Value::Null => values.push("NULL"),
                Value::Bool(v) => values.push_bind(v),
                Value::Int(v) => values.push_bind(v),
                Value::Text(v) => values.push_bind(v),
                Value::Uuid(v) => values.push_bind(v),
                Value::Timestamp(v) => values.push_bind(v),
            };
        }
        values.push_unseparated(")");
    }
    builder.push(" RETURNING *");
    Ok(builder)
}

/// `None` when there is nothing to write
pub(crate) fn update_sql<E: Entity>(
    query: &Query,
    record: &Record,
) -> RepositoryResult<Option<QueryBuilder<'static, Postgres>>> {
    let related = query.check::<E>()?;
    record.check_columns(E::TABLE, E::COLUMNS)?;

    let touch = E::TIMESTAMPS && record.get("updated_at").is_none();
    if record.is_empty() && !touch {
        return Ok(None);
    }

    let mut builder = QueryBuilder::new(format!("UPDATE {} AS t SET ", E::TABLE));
    let mut first = true;
    for (column, value) in record.iter() {
        if !first {
            builder.push(", ");
        }
        first = false;
        builder.push(format!("{} = ", column));
        push_value(&mut builder, value);
    }
    if touch {
        if !first {
            builder.push(", ");
        }
        builder.push("updated_at = NOW()");
    }
    push_where::<E>(&mut builder, query, related, false);
    Ok(Some(builder))
}

pub(crate) fn delete_sql<E: Entity>(
    query: &Query,
    mode: DeleteMode,
) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let related = query.check::<E>()?;

    let mut builder = match (E::SOFT_DELETE, mode) {
        (Some(column), DeleteMode::Soft) => {
            QueryBuilder::new(format!("UPDATE {} AS t SET {} = NOW()", E::TABLE, column))
        }
        _ => QueryBuilder::new(format!("DELETE FROM {} AS t", E::TABLE)),
    };
    push_where::<E>(&mut builder, query, related, mode == DeleteMode::Hard);
    Ok(builder)
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::UniqueViolation(
                db_err.constraint().unwrap_or("unique").to_string(),
            );
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl<E: Entity> Repository<E> for PgRepository<E> {
    async fn insert(&self, record: Record) -> RepositoryResult<E> {
        let mut builder = insert_sql::<E>(&record)?;
        debug!(table = E::TABLE, sql = builder.sql(), "insert");
        builder
            .build_query_as::<E>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn select(&self, query: &Query) -> RepositoryResult<Vec<E>> {
        let mut builder = select_sql::<E>(query)?;
        debug!(table = E::TABLE, sql = builder.sql(), "select");
        Ok(builder.build_query_as::<E>().fetch_all(&self.pool).await?)
    }

    async fn count(&self, query: &Query) -> RepositoryResult<u64> {
        let mut builder = count_sql::<E>(query)?;
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn update_where(&self, query: &Query, record: Record) -> RepositoryResult<u64> {
        let Some(mut builder) = update_sql::<E>(query, &record)? else {
            return Ok(0);
        };
        debug!(table = E::TABLE, sql = builder.sql(), "update");
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_where(&self, query: &Query, mode: DeleteMode) -> RepositoryResult<u64> {
        let mut builder = delete_sql::<E>(query, mode)?;
        debug!(table = E::TABLE, sql = builder.sql(), "delete");
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_related(
        &self,
        relation: &RelationDef,
        keys: &[String],
    ) -> RepositoryResult<Vec<JsonRow>> {
        let sql = format!(
            "SELECT to_jsonb(r) FROM {} AS r WHERE r.{}::text = ANY($1)",
            relation.table, relation.foreign_key
        );
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(keys)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                serde_json::Value::Object(map) => Some(strip_hidden(map, relation.hidden)),
                _ => None,
            })
            .collect())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(crate::db::pool::health_check(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::Task;
    use crate::models::user::User;
    use crate::repository::query::{Conditions, PageRequest, Sort};
    use uuid::Uuid;

    #[test]
    fn test_select_sql_with_filters_and_sort() {
        let query = Query::new()
            .filter(Conditions::new().with("user_id", Uuid::new_v4()).with("status", "pending"))
            .sort(Sort::asc("created_at"));
        let builder = select_sql::<Task>(&query).unwrap();

        assert_eq!(
            builder.sql(),
            "SELECT t.* FROM tasks AS t WHERE TRUE AND t.user_id = $1 AND t.status = $2 ORDER BY t.created_at ASC"
        );
    }

    #[test]
    fn test_select_sql_through_relation_with_page() {
        let query = Query::new()
            .through("user", Conditions::new().with("email", "a@example.com"))
            .sort(Sort::desc("title"))
            .page(PageRequest::new(2, 5));
        let builder = select_sql::<Task>(&query).unwrap();

        assert_eq!(
            builder.sql(),
            "SELECT t.* FROM tasks AS t WHERE TRUE AND EXISTS (SELECT 1 FROM users AS r WHERE r.id = t.user_id AND r.email = $1) ORDER BY t.title DESC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_null_condition_uses_is_null() {
        let query = Query::new().filter(Conditions::new().with("description", Value::Null));
        let builder = select_sql::<Task>(&query).unwrap();
        assert!(builder.sql().ends_with("AND t.description IS NULL"));
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let query = Query::new().filter(Conditions::new().with("1=1; DROP TABLE tasks", true));
        assert!(matches!(
            select_sql::<Task>(&query),
            Err(RepositoryError::UnknownColumn { .. })
        ));

        let query = Query::new().sort(Sort::asc("nope"));
        assert!(select_sql::<Task>(&query).is_err());
    }

    #[test]
    fn test_unknown_relation_is_rejected() {
        let query = Query::new().through("owner", Conditions::new());
        assert!(matches!(
            select_sql::<Task>(&query),
            Err(RepositoryError::UnknownRelation { .. })
        ));
    }

    #[test]
    fn test_insert_sql() {
        let record = Record::new()
            .with("name", "Ada")
            .with("email", "ada@example.com")
            .with("password_hash", "hash");
        let builder = insert_sql::<User>(&record).unwrap();
        assert_eq!(
            builder.sql(),
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING *"
        );
    }

    #[test]
    fn test_update_sql_touches_updated_at() {
        let query = Query::new().filter(Conditions::new().with("id", Uuid::new_v4()));
        let record = Record::new().with("title", "Renamed");
        let builder = update_sql::<Task>(&query, &record).unwrap().unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE tasks AS t SET title = $1, updated_at = NOW() WHERE TRUE AND t.id = $2"
        );
    }

    #[test]
    fn test_delete_sql() {
        let query = Query::new().filter(Conditions::new().with("id", Uuid::new_v4()));
        let builder = delete_sql::<Task>(&query, DeleteMode::Soft).unwrap();
        assert_eq!(builder.sql(), "DELETE FROM tasks AS t WHERE TRUE AND t.id = $1");
    }
}

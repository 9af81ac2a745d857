/// Generic data-access layer
///
/// [`Repository<E>`] is the one persistence abstraction used by the
/// services. Backends implement a handful of primitives (insert, select,
/// count, update, delete, fetch related rows); every named operation
/// (`find`, `get_one`, `paginate_related`, `hard_delete`, ...) is a
/// provided method composed from those primitives, so both backends
/// share identical semantics.
///
/// # Modules
///
/// - [`entity`]: the [`Entity`](entity::Entity) schema trait and relation definitions
/// - [`query`]: filters, records, sorting and pagination values
/// - [`relations`]: eager loading of (nested) relations
/// - [`postgres`]: PostgreSQL backend built on `sqlx::QueryBuilder`
/// - [`memory`]: in-process backend for tests and local development
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::task::Task;
/// use taskhub_shared::repository::{postgres::PgRepository, Repository};
/// use taskhub_shared::repository::query::{Conditions, Sort};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let tasks = PgRepository::<Task>::new(pool);
/// let mine = tasks
///     .get(Conditions::new().with("user_id", owner), Sort::asc("created_at"))
///     .await?;
/// println!("{} tasks", mine.len());
/// # Ok(())
/// # }
/// ```

pub mod entity;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod relations;

use async_trait::async_trait;
use uuid::Uuid;

use entity::{Entity, RelationDef};
use query::{Conditions, Page, PageRequest, Query, Record, Sort};
use relations::{JsonRow, Loaded, RelationTree};

/// Result alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Column is not part of the entity schema
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Relation is not declared by the entity
    #[error("Unknown relation '{relation}' on table '{table}'")]
    UnknownRelation { table: String, relation: String },

    /// Query cannot be expressed
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Failed to (de)serialize a row
    #[error("Row serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How rows are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Stamp the soft-delete column when the entity has one, remove otherwise
    Soft,

    /// Always remove the rows
    Hard,
}

/// Data access for one entity collection
///
/// Implementors provide the primitives; callers normally use the provided
/// operations. All conditions are exact-match conjunctions and every
/// ordering takes one column and one direction.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Inserts a row and returns it as stored
    async fn insert(&self, record: Record) -> RepositoryResult<E>;

    /// Reads rows matching `query`, honoring sort, limit and offset
    async fn select(&self, query: &Query) -> RepositoryResult<Vec<E>>;

    /// Counts rows matching `query` (sort and window are ignored)
    async fn count(&self, query: &Query) -> RepositoryResult<u64>;

    /// Writes `record` to every row matching `query`; returns rows affected
    async fn update_where(&self, query: &Query, record: Record) -> RepositoryResult<u64>;

    /// Deletes every row matching `query`; returns rows affected
    async fn delete_where(&self, query: &Query, mode: DeleteMode) -> RepositoryResult<u64>;

    /// Reads rows of `relation.table` whose foreign key is one of `keys`
    ///
    /// Hidden columns of the related table are stripped.
    async fn fetch_related(
        &self,
        relation: &RelationDef,
        keys: &[String],
    ) -> RepositoryResult<Vec<JsonRow>>;

    /// Verifies the store is reachable
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }

    /// Attaches the relations named by `paths` to `entities`
    async fn load(&self, entities: Vec<E>, paths: &[&str]) -> RepositoryResult<Vec<Loaded<E>>> {
        let tree = RelationTree::parse::<E>(paths)?;
        relations::load(self, entities, &tree).await
    }

    /// Selects one page of rows and the total count
    async fn select_page(&self, query: Query, page: PageRequest) -> RepositoryResult<Page<E>> {
        let total = self.count(&query).await?;
        let data = self.select(&query.page(page)).await?;
        Ok(Page::new(data, page, total))
    }

    // Writes

    async fn create(&self, record: Record) -> RepositoryResult<E> {
        self.insert(record).await
    }

    async fn update(&self, conditions: Conditions, record: Record) -> RepositoryResult<u64> {
        self.update_where(&Query::new().filter(conditions), record)
            .await
    }

    async fn update_by_id(&self, id: Uuid, record: Record) -> RepositoryResult<u64> {
        self.update(Conditions::new().with(E::PRIMARY_KEY, id), record)
            .await
    }

    /// Updates rows having related rows that match `conditions`
    async fn update_related(
        &self,
        relation: &str,
        conditions: Conditions,
        record: Record,
    ) -> RepositoryResult<u64> {
        self.update_where(&Query::new().through(relation, conditions), record)
            .await
    }

    // Plain reads

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<E>> {
        let query = Query::new()
            .filter(Conditions::new().with(E::PRIMARY_KEY, id))
            .limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn get_one(&self, conditions: Conditions, sort: Sort) -> RepositoryResult<Option<E>> {
        let query = Query::new().filter(conditions).sort(sort).limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn get(&self, conditions: Conditions, sort: Sort) -> RepositoryResult<Vec<E>> {
        self.select(&Query::new().filter(conditions).sort(sort))
            .await
    }

    async fn get_all(&self, sort: Sort) -> RepositoryResult<Vec<E>> {
        self.select(&Query::new().sort(sort)).await
    }

    async fn paginate(
        &self,
        conditions: Conditions,
        page: PageRequest,
        sort: Sort,
    ) -> RepositoryResult<Page<E>> {
        self.select_page(Query::new().filter(conditions).sort(sort), page)
            .await
    }

    // Reads with eager loading

    async fn find_with_relations(
        &self,
        id: Uuid,
        relations: &[&str],
    ) -> RepositoryResult<Option<Loaded<E>>> {
        let found = self.find(id).await?.into_iter().collect();
        Ok(self.load(found, relations).await?.into_iter().next())
    }

    async fn get_one_with_relations(
        &self,
        conditions: Conditions,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Option<Loaded<E>>> {
        let found = self.get_one(conditions, sort).await?.into_iter().collect();
        Ok(self.load(found, relations).await?.into_iter().next())
    }

    async fn get_with_relations(
        &self,
        conditions: Conditions,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Vec<Loaded<E>>> {
        let found = self.get(conditions, sort).await?;
        self.load(found, relations).await
    }

    async fn get_all_with_relations(
        &self,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Vec<Loaded<E>>> {
        let found = self.get_all(sort).await?;
        self.load(found, relations).await
    }

    // Reads filtered through a relation

    async fn get_related(
        &self,
        relation: &str,
        conditions: Conditions,
        sort: Sort,
    ) -> RepositoryResult<Vec<E>> {
        self.select(&Query::new().through(relation, conditions).sort(sort))
            .await
    }

    async fn get_one_related(
        &self,
        relation: &str,
        conditions: Conditions,
        sort: Sort,
    ) -> RepositoryResult<Option<E>> {
        let query = Query::new().through(relation, conditions).sort(sort).limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn paginate_related(
        &self,
        relation: &str,
        conditions: Conditions,
        page: PageRequest,
        sort: Sort,
    ) -> RepositoryResult<Page<E>> {
        self.select_page(Query::new().through(relation, conditions).sort(sort), page)
            .await
    }

    async fn fetch_with_relations(
        &self,
        relation: &str,
        conditions: Conditions,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Vec<Loaded<E>>> {
        let found = self.get_related(relation, conditions, sort).await?;
        self.load(found, relations).await
    }

    async fn fetch_one_with_relations(
        &self,
        relation: &str,
        conditions: Conditions,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Option<Loaded<E>>> {
        let found = self
            .get_one_related(relation, conditions, sort)
            .await?
            .into_iter()
            .collect();
        Ok(self.load(found, relations).await?.into_iter().next())
    }

    async fn paginate_with_relations(
        &self,
        relation: &str,
        conditions: Conditions,
        relations: &[&str],
        page: PageRequest,
        sort: Sort,
    ) -> RepositoryResult<Page<Loaded<E>>> {
        let found = self
            .paginate_related(relation, conditions, page, sort)
            .await?;
        self.load_page(found, relations).await
    }

    // Own filters combined with a relation filter; the filtered relation is loaded

    async fn get_by_related_filters(
        &self,
        conditions: Conditions,
        relation: &str,
        related_conditions: Conditions,
        sort: Sort,
    ) -> RepositoryResult<Vec<Loaded<E>>> {
        self.get_with_by_related_filters(conditions, relation, related_conditions, &[relation], sort)
            .await
    }

    async fn get_with_by_related_filters(
        &self,
        conditions: Conditions,
        relation: &str,
        related_conditions: Conditions,
        relations: &[&str],
        sort: Sort,
    ) -> RepositoryResult<Vec<Loaded<E>>> {
        let query = Query::new()
            .filter(conditions)
            .through(relation, related_conditions)
            .sort(sort);
        let found = self.select(&query).await?;
        self.load(found, relations).await
    }

    async fn paginate_by_related_filters(
        &self,
        conditions: Conditions,
        relation: &str,
        related_conditions: Conditions,
        page: PageRequest,
        sort: Sort,
    ) -> RepositoryResult<Page<Loaded<E>>> {
        self.paginate_with_by_related_filters(
            conditions,
            relation,
            related_conditions,
            &[relation],
            page,
            sort,
        )
        .await
    }

    async fn paginate_with_by_related_filters(
        &self,
        conditions: Conditions,
        relation: &str,
        related_conditions: Conditions,
        relations: &[&str],
        page: PageRequest,
        sort: Sort,
    ) -> RepositoryResult<Page<Loaded<E>>> {
        let query = Query::new()
            .filter(conditions)
            .through(relation, related_conditions)
            .sort(sort);
        let found = self.select_page(query, page).await?;
        self.load_page(found, relations).await
    }

    /// Eager-loads relations for the items of a page
    async fn load_page(&self, page: Page<E>, relations: &[&str]) -> RepositoryResult<Page<Loaded<E>>> {
        let Page {
            data,
            current_page,
            per_page,
            total,
            last_page,
        } = page;
        let data = self.load(data, relations).await?;
        Ok(Page {
            data,
            current_page,
            per_page,
            total,
            last_page,
        })
    }

    // Deletes

    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<u64> {
        self.delete(Conditions::new().with(E::PRIMARY_KEY, id))
            .await
    }

    async fn delete(&self, conditions: Conditions) -> RepositoryResult<u64> {
        self.delete_where(&Query::new().filter(conditions), DeleteMode::Soft)
            .await
    }

    async fn delete_through_relation(
        &self,
        relation: &str,
        conditions: Conditions,
    ) -> RepositoryResult<u64> {
        self.delete_where(&Query::new().through(relation, conditions), DeleteMode::Soft)
            .await
    }

    /// Removes matching rows for good, soft-deleted ones included
    async fn hard_delete(&self, conditions: Conditions) -> RepositoryResult<u64> {
        self.delete_where(&Query::new().filter(conditions), DeleteMode::Hard)
            .await
    }
}

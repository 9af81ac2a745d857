/// Entity schema descriptions
///
/// Every persisted type implements [`Entity`], which tells the generic
/// repository which table it lives in, which columns may be filtered,
/// sorted or written, and how it relates to other tables. Nothing is
/// discovered at runtime: the schema is a set of associated constants.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, FromRow};

use super::{RepositoryError, RepositoryResult};

/// Cardinality of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// This row references one parent row (e.g. task → user)
    BelongsTo,

    /// Many rows of the related table reference this row (e.g. user → tasks)
    HasMany,
}

/// A named relation from one table to another
///
/// Rows are joined on `related.foreign_key = this.local_key` for both
/// kinds; only the shape of the loaded value differs (object vs array).
#[derive(Debug)]
pub struct RelationDef {
    /// Name used in relation paths (`"user"`, `"tasks"`)
    pub name: &'static str,

    /// Related table
    pub table: &'static str,

    pub kind: RelationKind,

    /// Column on this table
    pub local_key: &'static str,

    /// Column on the related table
    pub foreign_key: &'static str,

    /// Columns of the related table that may appear in related filters
    pub columns: &'static [&'static str],

    /// Columns of the related table never exposed when loaded
    pub hidden: &'static [&'static str],

    /// Relations of the related table, for nested paths
    pub relations: fn() -> &'static [RelationDef],
}

/// A persisted type handled by the generic repository
pub trait Entity:
    for<'r> FromRow<'r, PgRow> + Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static
{
    /// Table name
    const TABLE: &'static str;

    /// Every column, in table order
    const COLUMNS: &'static [&'static str];

    /// Primary key column (UUID)
    const PRIMARY_KEY: &'static str = "id";

    /// Columns with a unique constraint
    const UNIQUE: &'static [&'static str] = &[];

    /// Columns never serialized in responses
    const HIDDEN: &'static [&'static str] = &[];

    /// Soft-delete timestamp column, if the entity is soft deleted
    const SOFT_DELETE: Option<&'static str> = None;

    /// Whether `created_at`/`updated_at` are maintained by the store
    const TIMESTAMPS: bool = true;

    /// Relations this entity declares
    fn relations() -> &'static [RelationDef] {
        &[]
    }

    /// Looks up a declared relation by name
    fn relation(name: &str) -> RepositoryResult<&'static RelationDef> {
        Self::relations()
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| RepositoryError::UnknownRelation {
                table: Self::TABLE.to_string(),
                relation: name.to_string(),
            })
    }
}

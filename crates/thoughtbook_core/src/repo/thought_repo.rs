//! Thought repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and list/query APIs over `thoughts` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths validate required text before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - All list queries share one ordering: `pinned DESC, created_at DESC,
//!   id DESC`.

use crate::db::DbError;
use crate::model::thought::{
    validate_text, Category, NewThought, Thought, ThoughtId, ThoughtPatch, ThoughtValidationError,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

const THOUGHT_SELECT_SQL: &str = "SELECT
    id,
    title,
    text,
    category,
    created_at,
    pinned
FROM thoughts";

const THOUGHT_ORDER_SQL: &str = " ORDER BY pinned DESC, created_at DESC, id DESC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for thought persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ThoughtValidationError),
    Db(DbError),
    NotFound(ThoughtId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "thought not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted thought data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ThoughtValidationError> for RepoError {
    fn from(value: ThoughtValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Predicate for list queries and live views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThoughtFilter {
    /// Every thought.
    All,
    /// Case-insensitive substring match over title or text.
    ///
    /// A blank query degenerates to [`ThoughtFilter::All`].
    Search(String),
    /// Exact category match.
    Category(Category),
}

/// Repository interface for thought CRUD and queries.
pub trait ThoughtRepository {
    fn create(&self, draft: &NewThought) -> RepoResult<Thought>;
    fn update(&self, id: ThoughtId, patch: &ThoughtPatch) -> RepoResult<Thought>;
    /// Hard delete. Returns whether a row was actually removed; deleting an
    /// unknown id is a no-op, not an error.
    fn delete(&self, id: ThoughtId) -> RepoResult<bool>;
    fn get(&self, id: ThoughtId) -> RepoResult<Option<Thought>>;
    fn list(&self, filter: &ThoughtFilter) -> RepoResult<Vec<Thought>>;
    fn pinned_count(&self) -> RepoResult<u32>;
}

/// SQLite-backed thought repository.
pub struct SqliteThoughtRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteThoughtRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ThoughtRepository for SqliteThoughtRepository<'_> {
    fn create(&self, draft: &NewThought) -> RepoResult<Thought> {
        draft.validate()?;

        let created_at = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO thoughts (title, text, category, created_at, pinned)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                draft.title.trim(),
                draft.text.trim(),
                category_to_db(draft.category),
                created_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("created thought {id} not found in read-back"))
        })
    }

    fn update(&self, id: ThoughtId, patch: &ThoughtPatch) -> RepoResult<Thought> {
        let existing = self.get(id)?.ok_or(RepoError::NotFound(id))?;
        let merged = merge_patch(existing, patch)?;

        // `id` and `created_at` are deliberately absent from the SET list.
        self.conn.execute(
            "UPDATE thoughts
             SET
                title = ?1,
                text = ?2,
                category = ?3,
                pinned = ?4
             WHERE id = ?5;",
            params![
                merged.title.as_str(),
                merged.text.as_str(),
                category_to_db(merged.category),
                bool_to_int(merged.pinned),
                id,
            ],
        )?;

        Ok(merged)
    }

    fn delete(&self, id: ThoughtId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM thoughts WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn get(&self, id: ThoughtId) -> RepoResult<Option<Thought>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{THOUGHT_SELECT_SQL} WHERE id = ?1;"))?;

        stmt.query_row([id], |row| Ok(parse_thought_row(row)))
            .optional()?
            .transpose()
    }

    fn list(&self, filter: &ThoughtFilter) -> RepoResult<Vec<Thought>> {
        let mut sql = String::from(THOUGHT_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        match filter {
            ThoughtFilter::All => {}
            ThoughtFilter::Search(query) => {
                if !query.trim().is_empty() {
                    sql.push_str(
                        " WHERE title LIKE ?1 ESCAPE '\\' OR text LIKE ?1 ESCAPE '\\'",
                    );
                    bind_values.push(Value::Text(like_pattern(query)));
                }
            }
            ThoughtFilter::Category(category) => {
                sql.push_str(" WHERE category = ?1");
                bind_values.push(Value::Text(category_to_db(*category).to_string()));
            }
        }

        sql.push_str(THOUGHT_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut thoughts = Vec::new();

        while let Some(row) = rows.next()? {
            thoughts.push(parse_thought_row(row)?);
        }

        Ok(thoughts)
    }

    fn pinned_count(&self) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM thoughts WHERE pinned = 1;",
            [],
            |row| row.get::<_, i64>(0),
        )?;

        u32::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("pinned count out of range: {count}")))
    }
}

fn merge_patch(existing: Thought, patch: &ThoughtPatch) -> RepoResult<Thought> {
    let title = patch
        .title
        .as_deref()
        .map_or(existing.title, |value| value.trim().to_string());
    let text = match patch.text.as_deref() {
        Some(value) => {
            validate_text(value)?;
            value.trim().to_string()
        }
        None => existing.text,
    };

    Ok(Thought {
        id: existing.id,
        title,
        text,
        category: patch.category.unwrap_or(existing.category),
        created_at: existing.created_at,
        pinned: patch.pinned.unwrap_or(existing.pinned),
    })
}

fn parse_thought_row(row: &Row<'_>) -> RepoResult<Thought> {
    let category_text: String = row.get("category")?;
    let category = parse_category(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in thoughts.category"
        ))
    })?;

    let pinned = match row.get::<_, i64>("pinned")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid pinned value `{other}` in thoughts.pinned"
            )));
        }
    };

    Ok(Thought {
        id: row.get("id")?,
        title: row.get("title")?,
        text: row.get("text")?,
        category,
        created_at: row.get("created_at")?,
        pinned,
    })
}

/// Builds a `%substring%` LIKE pattern with SQL wildcards escaped, so user
/// input only ever matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub(crate) fn category_to_db(category: Category) -> &'static str {
    match category {
        Category::Decision => "decision",
        Category::Lesson => "lesson",
        Category::Reflection => "reflection",
    }
}

pub(crate) fn parse_category(value: &str) -> Option<Category> {
    match value {
        "decision" => Some(Category::Decision),
        "lesson" => Some(Category::Lesson),
        "reflection" => Some(Category::Reflection),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn now_epoch_ms() -> i64 {
    // A clock before the unix epoch collapses to 0 rather than failing the
    // write.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

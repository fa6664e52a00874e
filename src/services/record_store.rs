//! src/services/record_store.rs
//!
//! RecordStore — textbook metadata persisted in SQLite. Reads resolve the
//! owning user with a LEFT JOIN so a missing user row never hides a textbook.

use crate::models::{
    textbook::{NewTextbook, Textbook, TextbookPatch},
    user::User,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Optional equality filter for [`RecordStore::find_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextbookFilter {
    pub user_id: Option<Uuid>,
}

impl TextbookFilter {
    /// Parse the raw `user_id` query value. Absent or empty means "no filter".
    pub fn parse(user_id: Option<&str>) -> RecordResult<Self> {
        match user_id.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::default()),
            Some(raw) => Uuid::parse_str(raw)
                .map(|id| Self { user_id: Some(id) })
                .map_err(|_| RecordError::Validation("Invalid user_id format".into())),
        }
    }
}

const SELECT_TEXTBOOK: &str = "SELECT t.id, t.title, t.description, t.file_path, t.user_id, \
     t.created_at, t.updated_at, \
     u.id AS owner_id, u.email AS owner_email, u.name AS owner_name, \
     u.created_at AS owner_created_at, u.updated_at AS owner_updated_at \
     FROM textbooks t LEFT JOIN users u ON u.id = t.user_id";

#[derive(FromRow)]
struct TextbookRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    file_path: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_id: Option<Uuid>,
    owner_email: Option<String>,
    owner_name: Option<String>,
    owner_created_at: Option<DateTime<Utc>>,
    owner_updated_at: Option<DateTime<Utc>>,
}

impl TextbookRow {
    fn into_domain(self) -> Textbook {
        let user = match (
            self.owner_id,
            self.owner_email,
            self.owner_name,
            self.owner_created_at,
            self.owner_updated_at,
        ) {
            (Some(id), Some(email), Some(name), Some(created_at), Some(updated_at)) => Some(User {
                id,
                email,
                name,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Textbook {
            id: self.id,
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            user_id: self.user_id,
            user,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct RecordStore {
    /// Shared SQLite connection pool.
    db: Arc<SqlitePool>,
}

impl RecordStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a textbook row.
    ///
    /// Assigns `id` when absent; `created_at` and `updated_at` get the same instant.
    pub async fn create(&self, new: NewTextbook) -> RecordResult<Textbook> {
        ensure_present("title", &new.title)?;
        ensure_present("file_path", &new.file_path)?;

        let id = new.id.unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO textbooks (id, title, description, file_path, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.file_path)
        .bind(new.user_id)
        .bind(now)
        .bind(now)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => self.find_by_id(id).await,
            Err(err) if is_unique_violation(&err) => {
                Err(RecordError::Conflict(format!("textbook `{}` already exists", id)))
            }
            Err(err) => Err(RecordError::Sqlx(err)),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> RecordResult<Textbook> {
        let sql = format!("{} WHERE t.id = ?", SELECT_TEXTBOOK);
        sqlx::query_as::<_, TextbookRow>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .map(TextbookRow::into_domain)
            .ok_or(RecordError::NotFound {
                entity: "textbook",
                id,
            })
    }

    /// List textbooks, optionally restricted to one owner. Order is unspecified.
    pub async fn find_all(&self, filter: TextbookFilter) -> RecordResult<Vec<Textbook>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_TEXTBOOK);
        if let Some(user_id) = filter.user_id {
            builder.push(" WHERE t.user_id = ");
            builder.push_bind(user_id);
        }

        let rows: Vec<TextbookRow> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows.into_iter().map(TextbookRow::into_domain).collect())
    }

    /// Apply the provided fields of `patch` and refresh `updated_at`.
    ///
    /// Only the columns present in the patch are written, so concurrent
    /// patches touching different fields do not overwrite each other.
    pub async fn update(&self, id: Uuid, patch: TextbookPatch) -> RecordResult<Textbook> {
        if let Some(title) = &patch.title {
            ensure_present("title", title)?;
        }
        if let Some(file_path) = &patch.file_path {
            ensure_present("file_path", file_path)?;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE textbooks SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(title) = patch.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(file_path) = patch.file_path {
            builder.push(", file_path = ").push_bind(file_path);
        }
        if let Some(user_id) = patch.user_id {
            builder.push(", user_id = ").push_bind(user_id);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&*self.db).await?;
        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound {
                entity: "textbook",
                id,
            });
        }

        self.find_by_id(id).await
    }

    /// Hard-delete a textbook row. The backing object is left in place.
    pub async fn delete(&self, id: Uuid) -> RecordResult<()> {
        let result = sqlx::query("DELETE FROM textbooks WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound {
                entity: "textbook",
                id,
            });
        }
        Ok(())
    }

    /// Lightweight connectivity probe (`SELECT 1`).
    pub async fn ping(&self) -> RecordResult<()> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if value != 1 {
            return Err(RecordError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {}",
                value
            ))));
        }
        Ok(())
    }
}

pub(crate) fn ensure_present(field: &str, value: &str) -> RecordResult<()> {
    if value.trim().is_empty() {
        return Err(RecordError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

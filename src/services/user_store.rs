//! UserStore — the minimal user table textbooks are joined against.

use crate::{
    models::user::{NewUser, User},
    services::record_store::{RecordError, RecordResult, ensure_present, is_unique_violation},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserStore {
    db: Arc<SqlitePool>,
}

impl UserStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a user. Email addresses are unique (case-sensitive).
    pub async fn create(&self, new: NewUser) -> RecordResult<User> {
        ensure_present("email", &new.email)?;
        ensure_present("name", &new.name)?;
        if !new.email.contains('@') {
            return Err(RecordError::Validation("email is invalid".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.trim().to_string(),
            name: new.name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        match sqlx::query(
            "INSERT INTO users (id, email, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(RecordError::Conflict(format!(
                "user with email `{}` already exists",
                user.email
            ))),
            Err(err) => Err(RecordError::Sqlx(err)),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> RecordResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(RecordError::NotFound { entity: "user", id })
    }
}

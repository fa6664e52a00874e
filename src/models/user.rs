//! Represents the owner of textbooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public view of a user, embedded into textbook responses.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /api/v1/users`.
#[derive(Deserialize, Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub name: String,
}

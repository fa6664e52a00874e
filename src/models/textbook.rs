//! Represents a textbook: metadata row plus the key of its PDF in the object store.

use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A textbook record as returned by the API.
///
/// The row stores only the object-store key (`file_path`); the PDF bytes
/// live in whichever `ObjectStore` backend is configured.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Textbook {
    /// Server-assigned unless supplied at creation; immutable afterwards.
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Opaque object-store key, `<user_id>/<uuid><ext>` for uploaded files.
    pub file_path: String,

    /// Owning user. Not validated against the `users` table.
    pub user_id: Uuid,

    /// Owner's public fields, present when a matching user row exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a textbook row.
///
/// `title` and `file_path` default to empty so that a missing field is
/// reported by the record store's validation rather than by the JSON parser.
#[derive(Deserialize, Clone, Debug)]
pub struct NewTextbook {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_path: String,
    pub user_id: Uuid,
}

/// Partial update for a textbook.
///
/// Every field is optional: `None` leaves the stored value untouched.
/// `description` is tri-state: absent keeps it, `null` clears it, a string
/// replaces it.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TextbookPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// Maps a present field (even `null`) to `Some(..)`; absent fields hit `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

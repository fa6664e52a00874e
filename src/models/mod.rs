//! Core data models for the textbook service.
//!
//! Rows map to database tables via `sqlx::FromRow` and serialize as JSON
//! via `serde`. Request-side shapes (`NewTextbook`, `TextbookPatch`, ...)
//! live next to the entity they create or mutate.

pub mod textbook;
pub mod user;

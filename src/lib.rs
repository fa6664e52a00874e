//! Textbook upload and metadata service.
//!
//! PDFs go to an [`services::object_store::ObjectStore`] backend, metadata to
//! SQLite, and an axum router ties them together.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::routes::app;

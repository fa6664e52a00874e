//! Storage and workflow services behind the HTTP handlers.

pub mod local_store;
pub mod object_store;
pub mod record_store;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod upload_service;
pub mod user_store;

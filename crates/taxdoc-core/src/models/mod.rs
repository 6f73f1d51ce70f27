//! Data models: configuration, documents, records and document types.

pub mod config;
pub mod document;
pub mod record;
pub mod schema;

//! MongoDB document-store backend.
//!
//! Records are upserted by their `key` field into a collection of the
//! database named in the connection URL.

mod document;
mod store;

pub use document::{from_document, to_document};
pub use store::{MongoConnector, MongoStore};

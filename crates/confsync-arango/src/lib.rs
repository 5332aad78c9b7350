//! ArangoDB graph-store backend.
//!
//! Talks to the ArangoDB HTTP API. Documents use the record key as `_key`
//! and are written with `overwriteMode=replace`.

mod client;
mod store;

pub use client::{is_valid_document_key, parse_arango_url, ArangoClient, ArangoEndpoint};
pub use store::{from_document, to_document, ArangoConnector, ArangoStore};

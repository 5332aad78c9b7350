//! Core types for confsync.
//!
//! This crate defines what every backend shares:
//! - `Record`: the canonical key/value/format unit of configuration
//! - `codec`: conversion between files on disk and records
//! - `Connector` / `RecordStore`: the backend adapter contract
//! - `Credentials`: injected credential material
//! - `MemoryStore`: an in-memory backend

pub mod codec;
mod credentials;
mod error;
mod memory;
mod record;
mod store;

pub use credentials::Credentials;
pub use error::SyncError;
pub use memory::{MemoryConnector, MemoryStore};
pub use record::{Format, Record, RecordValue};
pub use store::{BackendKind, Connector, RecordStore};

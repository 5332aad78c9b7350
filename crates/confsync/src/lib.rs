//! confsync: sync configuration files between a local directory and
//! MongoDB, ArangoDB or Google Sheets.
//!
//! The [`Registry`] maps a source descriptor to backend connectors and the
//! [`SyncDriver`] runs one init (push) or pull phase per matching backend.

pub mod config;
mod driver;
mod registry;

pub use config::Config;
pub use driver::{ItemResult, Mode, PhaseFailure, PhaseReport, Stage, SyncConfig, SyncDriver, SyncReport};
pub use registry::Registry;

pub use confsync_core::{Credentials, SyncError};

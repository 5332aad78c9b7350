//! Google Sheets spreadsheet backend.
//!
//! Authenticates with a service account and exchanges whole sheets as
//! arrays of row objects.

mod auth;
mod client;
mod store;

pub use auth::{fetch_access_token, load_service_account, sign_assertion, ServiceAccountKey};
pub use client::{parse_spreadsheet_id, sheet_range, SheetsClient, SheetsConfig};
pub use store::{headers_from, row_cells, rows_of, rows_to_objects, SheetsConnector, SheetsStore};

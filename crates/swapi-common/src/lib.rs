//! Shared building blocks for the SWAPI archive workspace
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! - **Types**: raw, resolved, and normalized forms of a person record
//! - **Error Handling**: [`SwapiError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use swapi_common::types::{PersonRow, ResolvedRecord};
//!
//! let raw = serde_json::json!({ "name": "Leia Organa", "height": "1,50" });
//! let record = ResolvedRecord::from_scalars(5, raw.as_object().unwrap()).unwrap();
//! let row = PersonRow::from_resolved(&record).unwrap();
//! assert_eq!(row.height, Some(1.5));
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Result, SwapiError};

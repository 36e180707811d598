//! SWAPI archive ingestion
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Retrieves people from the Star Wars API, resolves every linked resource
//! (homeworld, species, vehicles, starships, films) to readable text, and
//! stores the result in a relational table.
//!
//! # Pipeline
//!
//! - [`scheduler`]: splits the identifier range into groups fetched one wave
//!   at a time
//! - [`fetcher`]: fetches one person and resolves its links
//! - [`resolve`]: turns a link, or a list of links, into text
//! - [`sink`]: writes normalized rows and commits once per run
//! - [`pipeline`]: ties the above together for one run
//!
//! # Example
//!
//! ```no_run
//! use swapi_ingest::config::IngestConfig;
//! use swapi_ingest::pipeline::run_from_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let summary = run_from_config(IngestConfig::from_env()?).await?;
//!     tracing::info!(inserted = summary.inserted, "Run finished");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fetcher;
pub mod http;
pub mod pipeline;
pub mod resolve;
pub mod scheduler;
pub mod sink;

#[cfg(test)]
mod testing;

pub use config::{FailurePolicy, IngestConfig};
pub use pipeline::{IngestPipeline, RunContext, RunSummary};

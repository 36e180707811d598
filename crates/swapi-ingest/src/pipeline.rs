//! End-to-end archive run
//!
//! A run owns one [`RunContext`]: the shared HTTP capability and the sink.
//! Groups are fetched in order; each drained group is normalized and handed
//! to the sink before the next group starts, and one commit closes the run.

use std::sync::Arc;
use std::time::{Duration, Instant};
use swapi_common::types::PersonRow;
use swapi_common::Result;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{FailurePolicy, IngestConfig};
use crate::fetcher::{NotFoundPredicate, RecordFetcher};
use crate::http::{HttpClient, JsonFetcher};
use crate::scheduler::{BatchScheduler, GroupOutcome};
use crate::sink::{RecordSink, SqlSink};

/// Resources shared by every task of a single run
pub struct RunContext<S> {
    pub run_id: Uuid,
    pub http: Arc<dyn JsonFetcher>,
    pub sink: S,
}

impl<S: RecordSink> RunContext<S> {
    pub fn new(http: Arc<dyn JsonFetcher>, sink: S) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            http,
            sink,
        }
    }
}

impl RunContext<SqlSink> {
    /// Open the HTTP client and database described by `config`
    pub async fn open(config: &IngestConfig) -> Result<Self> {
        let http = HttpClient::new(config.request_timeout())?;
        let sink = SqlSink::connect(&config.database_url, config.max_connections).await?;
        Ok(Self::new(Arc::new(http), sink))
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub groups: usize,
    /// Records that reached the sink as rows
    pub fetched: usize,
    pub absent: usize,
    pub skipped: usize,
    pub inserted: u64,
    pub elapsed: Duration,
}

pub struct IngestPipeline {
    config: IngestConfig,
    not_found: Option<Arc<dyn NotFoundPredicate>>,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            not_found: None,
        })
    }

    /// Replace the default not-found heuristic
    pub fn with_not_found_predicate(mut self, predicate: Arc<dyn NotFoundPredicate>) -> Self {
        self.not_found = Some(predicate);
        self
    }

    /// Execute one full run, consuming the context.
    ///
    /// On error the sink is dropped uncommitted, so nothing from this run is
    /// persisted.
    pub async fn run<S: RecordSink>(&self, ctx: RunContext<S>) -> Result<RunSummary> {
        let span = info_span!("archive_run", run_id = %ctx.run_id);
        self.run_inner(ctx).instrument(span).await
    }

    async fn run_inner<S: RecordSink>(&self, ctx: RunContext<S>) -> Result<RunSummary> {
        let started = Instant::now();
        let RunContext { http, mut sink, .. } = ctx;

        info!(
            base_url = %self.config.base_url,
            total = self.config.total_scan_count,
            group_size = self.config.group_size,
            policy = %self.config.failure_policy,
            "Starting archive run"
        );

        sink.ensure_schema().await?;

        let mut fetcher = RecordFetcher::new(http, &self.config.base_url);
        if let Some(predicate) = &self.not_found {
            fetcher = fetcher.with_not_found_predicate(predicate.clone());
        }
        let scheduler = BatchScheduler::new(
            &fetcher,
            self.config.total_scan_count,
            self.config.group_size,
            self.config.failure_policy,
        )?;

        let mut summary = RunSummary::default();
        for (index, ids) in scheduler.groups().into_iter().enumerate() {
            summary.attempted += ids.len();
            let outcome = scheduler.fetch_group(index, ids).await?;

            let rows = self.normalize(&outcome, &mut summary)?;
            summary.groups += 1;
            summary.fetched += rows.len();
            summary.absent += outcome.absent.len();
            summary.skipped += outcome.skipped.len();

            summary.inserted += sink.insert_batch(&rows).await?;
        }

        sink.commit().await?;
        summary.elapsed = started.elapsed();

        info!(
            groups = summary.groups,
            fetched = summary.fetched,
            absent = summary.absent,
            skipped = summary.skipped,
            inserted = summary.inserted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Archive run complete"
        );

        Ok(summary)
    }

    fn normalize(&self, outcome: &GroupOutcome, summary: &mut RunSummary) -> Result<Vec<PersonRow>> {
        let mut rows = Vec::with_capacity(outcome.records.len());
        for record in &outcome.records {
            match PersonRow::from_resolved(record) {
                Ok(row) => rows.push(row),
                Err(e) if self.config.failure_policy == FailurePolicy::SkipAndLog => {
                    warn!(id = record.id, error = %e, "Skipping unstorable record");
                    summary.skipped += 1;
                },
                Err(e) => return Err(e),
            }
        }
        Ok(rows)
    }
}

/// Convenience wrapper: open a context from `config` and run it.
pub async fn run_from_config(config: IngestConfig) -> Result<RunSummary> {
    let ctx = RunContext::open(&config).await?;
    IngestPipeline::new(config)?.run(ctx).await
}

//! Group-synchronous batch scheduler
//!
//! The identifier range is cut into fixed-size groups. All fetches of one
//! group run concurrently on the current task; the next group starts only
//! after every fetch of the previous one has finished. This caps the number
//! of in-flight primary fetches (and their nested link chains) at the group
//! size.

use futures::future::{join_all, try_join_all};
use std::ops::Range;
use swapi_common::types::ResolvedRecord;
use swapi_common::{Result, SwapiError};
use tracing::{error, info, instrument, warn};

use crate::config::FailurePolicy;
use crate::fetcher::RecordFetcher;

/// Split `[1, total)` into contiguous groups of `group_size`.
///
/// The last group may be shorter. A zero group size yields no groups.
pub fn partition(total: u32, group_size: u32) -> Vec<Range<u32>> {
    if group_size == 0 {
        return Vec::new();
    }
    (1..total)
        .step_by(group_size as usize)
        .map(|start| start..start.saturating_add(group_size).min(total))
        .collect()
}

/// Result of one drained group, in ascending identifier order
#[derive(Debug, Default)]
pub struct GroupOutcome {
    pub index: usize,
    pub ids: Range<u32>,
    pub records: Vec<ResolvedRecord>,
    pub absent: Vec<u32>,
    /// Identifiers dropped under [`FailurePolicy::SkipAndLog`]
    pub skipped: Vec<(u32, SwapiError)>,
}

pub struct BatchScheduler<'a> {
    fetcher: &'a RecordFetcher,
    total: u32,
    group_size: u32,
    policy: FailurePolicy,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(
        fetcher: &'a RecordFetcher,
        total: u32,
        group_size: u32,
        policy: FailurePolicy,
    ) -> Result<Self> {
        if group_size == 0 {
            return Err(SwapiError::Config(
                "group size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            fetcher,
            total,
            group_size,
            policy,
        })
    }

    pub fn groups(&self) -> Vec<Range<u32>> {
        partition(self.total, self.group_size)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Fetch every identifier of one group concurrently and wait for all.
    ///
    /// Under [`FailurePolicy::FailFast`] the first per-identifier failure
    /// drops the remaining in-flight fetches and is returned. Under
    /// [`FailurePolicy::SkipAndLog`] per-identifier failures are recorded in
    /// [`GroupOutcome::skipped`]; other failures still abort.
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn fetch_group(&self, index: usize, ids: Range<u32>) -> Result<GroupOutcome> {
        let mut outcome = GroupOutcome {
            index,
            ids: ids.clone(),
            ..Default::default()
        };

        match self.policy {
            FailurePolicy::FailFast => {
                let results = try_join_all(ids.clone().map(|id| async move {
                    self.fetcher.fetch(id).await.map(|record| (id, record))
                }))
                .await
                .inspect_err(|e| error!(group = index, error = %e, "Group aborted"))?;

                for (id, record) in results {
                    match record {
                        Some(record) => outcome.records.push(record),
                        None => outcome.absent.push(id),
                    }
                }
            },
            FailurePolicy::SkipAndLog => {
                let results = join_all(
                    ids.clone()
                        .map(|id| async move { (id, self.fetcher.fetch(id).await) }),
                )
                .await;

                for (id, result) in results {
                    match result {
                        Ok(Some(record)) => outcome.records.push(record),
                        Ok(None) => outcome.absent.push(id),
                        Err(e) if e.is_per_record() => {
                            warn!(id, error = %e, "Skipping identifier");
                            outcome.skipped.push((id, e));
                        },
                        Err(e) => return Err(e),
                    }
                }
            },
        }

        info!(
            group = index,
            first = ids.start,
            last = ids.end.saturating_sub(1),
            records = outcome.records.len(),
            absent = outcome.absent.len(),
            skipped = outcome.skipped.len(),
            "Group drained"
        );

        Ok(outcome)
    }

    /// Run every group in order and collect the resolved records.
    pub async fn run(&self) -> Result<Vec<ResolvedRecord>> {
        let mut records = Vec::new();
        for (index, ids) in self.groups().into_iter().enumerate() {
            records.extend(self.fetch_group(index, ids).await?.records);
        }
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeUpstream, BASE};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn upstream_with(ids: &[u32]) -> FakeUpstream {
        ids.iter()
            .fold(FakeUpstream::new().with_planet_and_film(), |up, id| {
                up.with_person(*id, &format!("Person {}", id))
            })
    }

    #[test]
    fn test_partition_uneven_range() {
        assert_eq!(partition(6, 2), vec![1..3, 3..5, 5..6]);
        assert_eq!(partition(5, 2), vec![1..3, 3..5]);
        assert_eq!(partition(100, 20).len(), 5);
        assert_eq!(partition(100, 20)[4], 81..100);
    }

    #[test]
    fn test_partition_degenerate() {
        assert!(partition(1, 5).is_empty());
        assert!(partition(0, 5).is_empty());
        assert!(partition(10, 0).is_empty());
        assert_eq!(partition(3, 50), vec![1..3]);
    }

    proptest! {
        #[test]
        fn prop_partition_covers_range_in_order(total in 0u32..500, size in 1u32..64) {
            let groups = partition(total, size);
            let flattened: Vec<u32> = groups.iter().cloned().flatten().collect();
            let expected: Vec<u32> = (1..total.max(1)).collect();
            prop_assert_eq!(flattened, expected);
            for (i, group) in groups.iter().enumerate() {
                prop_assert!(!group.is_empty());
                if i + 1 < groups.len() {
                    prop_assert_eq!(group.len() as u32, size);
                }
            }
        }
    }

    #[test]
    fn test_zero_group_size_rejected() {
        let fetcher = RecordFetcher::new(Arc::new(FakeUpstream::new()), BASE);
        assert!(BatchScheduler::new(&fetcher, 10, 0, FailurePolicy::FailFast).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_is_ascending_despite_completion_order() {
        // Earlier identifiers answer later.
        let upstream = (1..=7u32).fold(upstream_with(&[1, 2, 3, 4, 5, 6, 7]), |up, id| {
            up.delayed(
                format!("{}/people/{}/", BASE, id),
                Duration::from_millis(u64::from(100 - id * 10)),
            )
        });
        let fetcher = RecordFetcher::new(Arc::new(upstream), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 8, 3, FailurePolicy::FailFast).unwrap();

        let ids: Vec<u32> = scheduler.run().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_within_group_overlap() {
        let upstream = (1..=3u32).fold(upstream_with(&[1, 2, 3]), |up, id| {
            up.delayed(format!("{}/people/{}/", BASE, id), Duration::from_millis(100))
        });
        let fetcher = RecordFetcher::new(Arc::new(upstream), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 4, 3, FailurePolicy::FailFast).unwrap();

        let started = tokio::time::Instant::now();
        let outcome = scheduler.fetch_group(0, 1..4).await.unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_groups_are_sequential() {
        let upstream = Arc::new(upstream_with(&[1, 2, 3, 4]));
        let fetcher = RecordFetcher::new(upstream.clone(), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 5, 2, FailurePolicy::FailFast).unwrap();

        scheduler.run().await.unwrap();

        // Every primary request of group one precedes every one of group two.
        let primaries: Vec<String> = upstream
            .requests()
            .into_iter()
            .filter(|u| u.contains("/people/"))
            .collect();
        let position = |id: u32| {
            primaries
                .iter()
                .position(|u| u.ends_with(&format!("/people/{}/", id)))
                .unwrap()
        };
        assert!(position(1).max(position(2)) < position(3).min(position(4)));
    }

    #[tokio::test]
    async fn test_absent_identifiers_are_excluded() {
        let fetcher = RecordFetcher::new(Arc::new(upstream_with(&[1, 3])), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 5, 2, FailurePolicy::FailFast).unwrap();

        let outcome = scheduler.fetch_group(0, 1..3).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.absent, vec![2]);

        let ids: Vec<u32> = scheduler.run().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_group() {
        let upstream = upstream_with(&[1, 2]).with(
            format!("{}/people/2/", BASE),
            serde_json::json!({ "name": "C-3PO", "homeworld": format!("{}/planets/500/", BASE) }),
        );
        let upstream = upstream.failing(format!("{}/planets/500/", BASE));
        let fetcher = RecordFetcher::new(Arc::new(upstream), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 3, 2, FailurePolicy::FailFast).unwrap();

        let err = scheduler.fetch_group(0, 1..3).await.unwrap_err();
        assert!(matches!(err, SwapiError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_skip_and_log_keeps_siblings() {
        let upstream = upstream_with(&[1, 2]).with(
            format!("{}/people/2/", BASE),
            serde_json::json!({ "name": "C-3PO", "homeworld": format!("{}/planets/500/", BASE) }),
        );
        let upstream = upstream.failing(format!("{}/planets/500/", BASE));
        let fetcher = RecordFetcher::new(Arc::new(upstream), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 3, 2, FailurePolicy::SkipAndLog).unwrap();

        let outcome = scheduler.fetch_group(0, 1..3).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].id, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, 2);
    }

    #[tokio::test]
    async fn test_skip_and_log_still_aborts_on_fatal_error() {
        let upstream = upstream_with(&[1, 2]).fatal(format!("{}/people/2/", BASE));
        let fetcher = RecordFetcher::new(Arc::new(upstream), BASE);
        let scheduler = BatchScheduler::new(&fetcher, 3, 2, FailurePolicy::SkipAndLog).unwrap();

        let err = scheduler.fetch_group(0, 1..3).await.unwrap_err();
        assert!(matches!(err, SwapiError::Config(_)));
        assert!(!err.is_per_record());
    }
}

//! Paginated fetch-and-aggregate engine
//!
//! Walks a collection's unbounded index space in fixed-width concurrent
//! batches, counting misses until the cumulative threshold says the
//! collection is exhausted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::{Collection, FetchOutcome, ResourceFetcher};
use crate::error::{EngineError, FetchError};

/// Tuning knobs for one pagination run.
#[derive(Debug, Clone)]
pub struct PaginationPolicy {
    /// Concurrent fetches per batch; also the cursor stride.
    pub batch_width: u64,
    /// Cumulative misses that end the run.
    pub miss_threshold: u32,
    /// Hard ceiling on batches, in case the upstream never misses.
    pub max_batches: u32,
    /// Attempts per cursor position when a batch fails outright.
    pub batch_retries: u32,
    /// Base backoff between batch retries, doubled per attempt.
    pub retry_backoff: Duration,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            batch_width: 10,
            miss_threshold: 5,
            max_batches: 100,
            batch_retries: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Cumulative miss counter for one run. Counts every `NotFound` for the
/// life of the run; never reset by later hits. Atomic because outcomes may
/// be observed from concurrent tasks within the run.
pub struct MissTracker {
    misses: AtomicU32,
    threshold: u32,
}

impl MissTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            misses: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn observe(&self, outcome: &FetchOutcome) {
        if matches!(outcome, FetchOutcome::NotFound) {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn misses(&self) -> u32 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn should_stop(&self) -> bool {
        self.misses() >= self.threshold
    }
}

/// Fetch `width` consecutive indices starting at `start`, all concurrently.
/// This is a full join: every fetch completes before the batch returns, and
/// outcomes come back in index order. Any transport-level failure fails the
/// whole batch (after the join), leaving retry to the caller.
pub async fn fetch_batch<F>(
    fetcher: &F,
    collection: Collection,
    start: u64,
    width: u64,
) -> Result<Vec<FetchOutcome>, FetchError>
where
    F: ResourceFetcher + ?Sized,
{
    let fetches = (start..start + width).map(|index| fetcher.fetch(collection, index));

    let mut outcomes = Vec::with_capacity(width as usize);
    for result in join_all(fetches).await {
        outcomes.push(result?);
    }
    Ok(outcomes)
}

/// One request-scoped walk over a collection. Owns the cursor, the miss
/// tracker, and the stop decision; never shared across requests.
pub struct PaginationRun<'a, F: ?Sized> {
    fetcher: &'a F,
    collection: Collection,
    policy: PaginationPolicy,
    cursor: u64,
    batches: u32,
    tracker: MissTracker,
    done: bool,
}

impl<'a, F> PaginationRun<'a, F>
where
    F: ResourceFetcher + ?Sized,
{
    pub fn new(fetcher: &'a F, collection: Collection, policy: PaginationPolicy) -> Self {
        let tracker = MissTracker::new(policy.miss_threshold);
        Self {
            fetcher,
            collection,
            policy,
            cursor: 1,
            batches: 0,
            tracker,
            done: false,
        }
    }

    /// Found records from the next batch, in index order, or `None` once
    /// the run has stopped. Misses inside the batch are counted but not
    /// returned.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Map<String, Value>>>, EngineError> {
        if self.done {
            return Ok(None);
        }

        let outcomes = self.fetch_batch_with_retry().await?;

        let mut found = Vec::new();
        for outcome in outcomes {
            self.tracker.observe(&outcome);
            if let FetchOutcome::Found(record) = outcome {
                found.push(record);
            }
        }

        self.cursor += self.policy.batch_width;
        self.batches += 1;

        if self.tracker.should_stop() {
            debug!(
                collection = %self.collection,
                misses = self.tracker.misses(),
                "miss threshold reached, assuming collection exhausted"
            );
            self.done = true;
        } else if self.batches >= self.policy.max_batches {
            warn!(
                collection = %self.collection,
                batches = self.batches,
                "batch ceiling reached before miss threshold, stopping run"
            );
            self.done = true;
        }

        Ok(Some(found))
    }

    /// Drain the run into a single sequence of records.
    pub async fn collect_all(mut self) -> Result<Vec<Map<String, Value>>, EngineError> {
        let mut records = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            records.extend(batch);
        }
        Ok(records)
    }

    /// Re-issue a failed batch at the same cursor, with exponential
    /// backoff, up to the policy's attempt bound.
    async fn fetch_batch_with_retry(&self) -> Result<Vec<FetchOutcome>, EngineError> {
        let mut attempt = 0;
        loop {
            match fetch_batch(
                self.fetcher,
                self.collection,
                self.cursor,
                self.policy.batch_width,
            )
            .await
            {
                Ok(outcomes) => return Ok(outcomes),
                Err(source) => {
                    attempt += 1;
                    if attempt >= self.policy.batch_retries {
                        return Err(EngineError::RetriesExhausted {
                            cursor: self.cursor,
                            attempts: attempt,
                            source,
                        });
                    }
                    let backoff = self.policy.retry_backoff * 2u32.pow(attempt - 1);
                    warn!(
                        collection = %self.collection,
                        cursor = self.cursor,
                        attempt,
                        error = %source,
                        "batch fetch failed, retrying in {:?}",
                        backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn misses(&self) -> u32 {
        self.tracker.misses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn named_record(name: &str) -> FetchOutcome {
        match json!({ "name": name }) {
            Value::Object(record) => FetchOutcome::Found(record),
            _ => unreachable!(),
        }
    }

    /// Scripted upstream: indices in `present` resolve to records, the
    /// rest are holes. Failure maps make specific indices error, either
    /// forever or for a limited number of calls.
    #[derive(Default)]
    struct ScriptedFetcher {
        present: HashSet<u64>,
        always_found: bool,
        fail_always: HashSet<u64>,
        fail_remaining: Mutex<HashMap<u64, u32>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with_records(indices: impl IntoIterator<Item = u64>) -> Self {
            Self {
                present: indices.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _collection: Collection,
            index: u64,
        ) -> Result<FetchOutcome, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let transient_failure = {
                let mut remaining = self.fail_remaining.lock().unwrap();
                match remaining.get_mut(&index) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if transient_failure || self.fail_always.contains(&index) {
                return Err(FetchError::transport(
                    format!("scripted://{index}"),
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "scripted failure"),
                ));
            }

            if self.always_found || self.present.contains(&index) {
                Ok(named_record(&format!("record-{index}")))
            } else {
                Ok(FetchOutcome::NotFound)
            }
        }
    }

    fn quick_policy(miss_threshold: u32) -> PaginationPolicy {
        PaginationPolicy {
            miss_threshold,
            retry_backoff: Duration::from_millis(1),
            ..PaginationPolicy::default()
        }
    }

    #[test]
    fn tracker_counts_only_misses_and_never_resets() {
        let tracker = MissTracker::new(3);
        let hit = named_record("record");

        tracker.observe(&hit);
        tracker.observe(&FetchOutcome::NotFound);
        tracker.observe(&FetchOutcome::NotFound);
        assert_eq!(tracker.misses(), 2);
        assert!(!tracker.should_stop());

        // A later hit must not erode the accumulated count.
        tracker.observe(&hit);
        tracker.observe(&FetchOutcome::NotFound);
        assert_eq!(tracker.misses(), 3);
        assert!(tracker.should_stop());
    }

    #[tokio::test]
    async fn collects_exactly_the_found_records() {
        // 12 records, then holes: the second batch sees 8 misses and stops.
        let fetcher = ScriptedFetcher::with_records(1..=12);
        let run = PaginationRun::new(&fetcher, Collection::People, quick_policy(5));

        let records = run.collect_all().await.unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0]["name"], "record-1");
        assert_eq!(records[11]["name"], "record-12");
        // Two batches, no retries.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn early_and_late_misses_both_count_toward_the_threshold() {
        // Holes at 2 and 5 inside the first batch, then records through 12.
        // The run must stop once the late misses push the total past 5,
        // regardless of where in the run the early ones happened.
        let fetcher =
            ScriptedFetcher::with_records((1..=12).filter(|i| *i != 2 && *i != 5));
        let mut run = PaginationRun::new(&fetcher, Collection::People, quick_policy(5));

        let first = run.next_batch().await.unwrap().unwrap();
        assert_eq!(first.len(), 8);
        assert_eq!(run.misses(), 2);

        let second = run.next_batch().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(run.misses(), 10);

        assert!(run.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_failure_is_retried_at_the_same_cursor_then_surfaced() {
        let mut fetcher = ScriptedFetcher::with_records(1..=10);
        fetcher.fail_always.insert(5);
        let run = PaginationRun::new(&fetcher, Collection::People, quick_policy(5));

        let error = run.collect_all().await.unwrap_err();
        match error {
            EngineError::RetriesExhausted {
                cursor, attempts, ..
            } => {
                assert_eq!(cursor, 1);
                assert_eq!(attempts, 3);
            }
        }
        // Three full-width attempts, cursor never advanced.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn transient_batch_failure_recovers() {
        let fetcher = ScriptedFetcher::with_records(1..=7);
        fetcher.fail_remaining.lock().unwrap().insert(3, 1);
        let run = PaginationRun::new(&fetcher, Collection::People, quick_policy(5));

        let records = run.collect_all().await.unwrap();
        assert_eq!(records.len(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_fetches_never_exceed_the_batch_width() {
        let mut fetcher = ScriptedFetcher::with_records(1..=35);
        fetcher.delay = Duration::from_millis(20);
        let run = PaginationRun::new(&fetcher, Collection::People, quick_policy(5));

        let records = run.collect_all().await.unwrap();
        assert_eq!(records.len(), 35);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 10);
    }

    #[tokio::test]
    async fn batch_ceiling_stops_an_upstream_that_never_misses() {
        let fetcher = ScriptedFetcher {
            always_found: true,
            ..Default::default()
        };
        let policy = PaginationPolicy {
            batch_width: 4,
            max_batches: 3,
            ..quick_policy(5)
        };
        let run = PaginationRun::new(&fetcher, Collection::Planets, policy);

        let records = run.collect_all().await.unwrap();
        assert_eq!(records.len(), 12);
    }
}

use crate::data_model::{Acceptance, DateRange, Record};
use crate::error::Result;
use crate::storage::checkpoint::{Checkpoint, CheckpointStore};
use crate::utils::prometheus_metrics::*;
use chrono::Utc;
use indicatif::ProgressBar;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Owns the SeenSet and the in-memory records of one run.
///
/// A record is accepted iff its id is unseen and its timestamp lies in the
/// global range (and in the window, when one is given). Every
/// `checkpoint_every` acceptances a checkpoint snapshot is written.
pub struct Collector<R: Record> {
    range: DateRange,
    seen: HashSet<String>,
    records: Vec<R>,
    store: Option<CheckpointStore>,
    checkpoint_every: usize,
    accepted_since_checkpoint: usize,
    prior_records: u64,
    progress: Option<ProgressBar>,
}

impl<R: Record> Collector<R> {
    /// A collector without persistence.
    pub fn new(range: DateRange, checkpoint_every: usize) -> Self {
        Collector {
            range,
            seen: HashSet::new(),
            records: Vec::new(),
            store: None,
            checkpoint_every: checkpoint_every.max(1),
            accepted_since_checkpoint: 0,
            prior_records: 0,
            progress: None,
        }
    }

    /// Writes checkpoints to `store` but ignores whatever it already holds.
    pub fn persisted(range: DateRange, store: CheckpointStore, checkpoint_every: usize) -> Self {
        let mut collector = Self::new(range, checkpoint_every);
        collector.store = Some(store);
        collector
    }

    /// Seeds the SeenSet from `store` so earlier runs' records are never re-added.
    pub async fn resume(range: DateRange, store: CheckpointStore, checkpoint_every: usize) -> Self {
        let checkpoint = store.load().await;
        let mut collector = Self::new(range, checkpoint_every);
        collector.prior_records = checkpoint.records_count;
        collector.seed(checkpoint.seen_ids);
        if !collector.seen.is_empty() {
            info!(
                already_seen = collector.seen.len(),
                "Resuming from checkpoint"
            );
        }
        collector.store = Some(store);
        collector
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn seed<I: IntoIterator<Item = String>>(&mut self, ids: I) {
        self.seen.extend(ids);
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    /// Decides without side effects.
    pub fn evaluate(&self, record: &R, window: Option<&DateRange>) -> Acceptance {
        if self.seen.contains(record.id()) {
            return Acceptance::Duplicate;
        }
        let ts = record.timestamp();
        if !self.range.contains(ts) || window.is_some_and(|w| !w.contains(ts)) {
            return Acceptance::OutOfRange;
        }
        Acceptance::Accepted
    }

    /// Stores `record` if acceptable. Checkpoint failures are logged, never returned.
    pub async fn offer(&mut self, record: R, window: Option<&DateRange>) -> Acceptance {
        let verdict = self.evaluate(&record, window);
        match verdict {
            Acceptance::Accepted => {
                RECORDS_ACCEPTED_TOTAL.inc();
                self.seen.insert(record.id().to_string());
                self.records.push(record);
                self.accepted_since_checkpoint += 1;
                if let Some(progress) = &self.progress {
                    progress.inc(1);
                }
                if self.accepted_since_checkpoint >= self.checkpoint_every {
                    info!(collected = self.records.len(), "Scraped records so far");
                    if let Err(e) = self.checkpoint().await {
                        error!(error = %e, "Checkpoint save failed");
                    }
                }
            }
            Acceptance::Duplicate => {
                RECORDS_DUPLICATE_TOTAL.inc();
                debug!(id = record.id(), "Skipping already seen record");
            }
            Acceptance::OutOfRange => {
                RECORDS_OUT_OF_RANGE_TOTAL.inc();
                debug!(id = record.id(), ts = %record.timestamp(), "Skipping out-of-range record");
            }
        }
        verdict
    }

    /// Consistent view of the current state.
    pub fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            seen_ids: self.seen.iter().cloned().collect(),
            last_run_timestamp: Some(Utc::now().timestamp()),
            records_count: self.prior_records + self.records.len() as u64,
        }
    }

    /// Writes a snapshot now. No-op without a store.
    pub async fn checkpoint(&mut self) -> Result<()> {
        self.accepted_since_checkpoint = 0;
        let Some(store) = &self.store else {
            return Ok(());
        };
        let snapshot = self.snapshot();
        match store.save(&snapshot).await {
            Ok(()) => {
                CHECKPOINT_WRITES_TOTAL.inc();
                debug!(path = %store.path().display(), seen = snapshot.seen_ids.len(), "Checkpoint written");
                Ok(())
            }
            Err(e) => {
                CHECKPOINT_ERRORS_TOTAL.inc();
                Err(e)
            }
        }
    }
}

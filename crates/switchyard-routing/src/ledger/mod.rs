//! Usage ledger: append-only records of every terminal routing outcome.
//!
//! `record` never blocks on persistence. Records go to an in-memory history
//! (pruned by retention) and, when a sink is attached, to a bounded pending
//! buffer drained by a background flush task. When the buffer is full the
//! oldest pending record is dropped with a warning.

mod history;
pub mod record;
pub mod sink;
pub mod summary;

pub use record::{RecordContext, UsageOutcome, UsageRecord};
pub use sink::{JsonlFileSink, UsageSink};
pub use summary::UsageSummary;

use crate::{Result, RoutingError};
use history::History;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard_core::{IgnoreLock as _, LedgerConfig};
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Window of the rolling spend used for the daily budget.
const BUDGET_WINDOW_HOURS: i64 = 24;

struct LedgerInner {
    history: Mutex<History>,
    pending: Mutex<VecDeque<UsageRecord>>,
    sink: Option<AsyncMutex<Box<dyn UsageSink>>>,
    capacity: usize,
    retention: ChronoDuration,
    notify: Notify,
    dropped: AtomicU64,
}

impl LedgerInner {
    fn enqueue(&self, record: UsageRecord) {
        let mut pending = self.pending.lock_ignore_poison();
        if pending.len() >= self.capacity {
            pending.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, capacity = self.capacity, "Usage buffer full, dropped oldest record");
        }
        pending.push_back(record);
    }

    async fn flush(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut sink = sink.lock().await;
        let batch: Vec<UsageRecord> = self.pending.lock_ignore_poison().drain(..).collect();
        if batch.is_empty() {
            return;
        }

        match sink.write_batch(&batch).await {
            Ok(()) => debug!(records = batch.len(), "Flushed usage records"),
            Err(error) => {
                warn!(%error, records = batch.len(), "Usage sink unavailable, keeping records buffered");
                let mut pending = self.pending.lock_ignore_poison();
                for record in batch.into_iter().rev() {
                    pending.push_front(record);
                }
                while pending.len() > self.capacity {
                    pending.pop_front();
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped, "Usage buffer full, dropped oldest record");
                }
            }
        }
    }
}

/// Append-only usage history with buffered persistence.
pub struct UsageLedger {
    inner: Arc<LedgerInner>,
    token: CancellationToken,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl UsageLedger {
    /// Memory-only ledger.
    pub fn in_memory(config: &LedgerConfig) -> Self {
        Self::build(config, None, Vec::new())
    }

    /// Ledger that persists through `sink` from a background task.
    ///
    /// # Errors
    /// Returns an error when called outside a Tokio runtime.
    pub fn with_sink(config: &LedgerConfig, sink: Box<dyn UsageSink>) -> Result<Self> {
        let ledger = Self::build(config, Some(sink), Vec::new());
        ledger.spawn_flusher(Duration::from_millis(config.flush_interval_ms.max(1)))?;
        Ok(ledger)
    }

    /// Re-read a JSONL history at `path`, then keep appending to it.
    ///
    /// Unparseable lines are skipped with a warning; a missing file starts an
    /// empty history.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, or when called
    /// outside a Tokio runtime.
    pub fn restore(path: &Path, config: &LedgerConfig) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => String::new(),
            Err(error) => return Err(RoutingError::Io(error)),
        };

        let mut history = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UsageRecord>(line) {
                Ok(record) => history.push(record),
                Err(error) => warn!(line = index + 1, %error, "Skipping malformed usage record"),
            }
        }
        info!(path = %path.display(), records = history.len(), "Restored usage history");

        let ledger = Self::build(config, Some(Box::new(JsonlFileSink::new(path))), history);
        ledger.spawn_flusher(Duration::from_millis(config.flush_interval_ms.max(1)))?;
        Ok(ledger)
    }

    fn build(
        config: &LedgerConfig,
        sink: Option<Box<dyn UsageSink>>,
        history: Vec<UsageRecord>,
    ) -> Self {
        let retention_hours = i64::try_from(config.retention_hours).unwrap_or(i64::MAX / 3600);
        let ledger = Self {
            inner: Arc::new(LedgerInner {
                history: Mutex::new(History::from_records(history)),
                pending: Mutex::new(VecDeque::new()),
                sink: sink.map(AsyncMutex::new),
                capacity: config.buffer_capacity.max(1),
                retention: ChronoDuration::hours(retention_hours),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
            }),
            token: CancellationToken::new(),
            flusher: Mutex::new(None),
        };
        ledger.prune(Utc::now());
        ledger
    }

    fn spawn_flusher(&self, period: Duration) -> Result<()> {
        let handle = Handle::try_current().map_err(|error| {
            RoutingError::Config(format!("usage persistence needs a Tokio runtime: {error}"))
        })?;
        let inner = Arc::clone(&self.inner);
        let token = self.token.clone();
        let task = handle.spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = inner.notify.notified() => {}
                    () = sleep(period) => {}
                }
                inner.flush().await;
            }
            inner.flush().await;
        });
        *self.flusher.lock_ignore_poison() = Some(task);
        Ok(())
    }

    /// Append a record. Never waits on persistence.
    pub fn record(&self, record: UsageRecord) {
        let now = Utc::now();
        if self.inner.sink.is_some() {
            self.inner.enqueue(record.clone());
            self.inner.notify.notify_one();
        }
        let mut history = self.inner.history.lock_ignore_poison();
        history.push(record);
        history.prune(now - self.inner.retention);
    }

    fn prune(&self, now: DateTime<Utc>) {
        self.inner
            .history
            .lock_ignore_poison()
            .prune(now - self.inner.retention);
    }

    /// Write every pending record now.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Stop the flush task after a final flush.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self.flusher.lock_ignore_poison().take();
        if let Some(task) = task
            && let Err(error) = task.await
        {
            warn!(%error, "Usage flush task ended abnormally");
        }
    }

    /// Aggregate records with `since <= timestamp < until`.
    pub fn summarize(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> UsageSummary {
        let history = self.inner.history.lock_ignore_poison();
        UsageSummary::from_records(
            history
                .iter()
                .filter(|record| record.timestamp >= since && record.timestamp < until),
        )
    }

    /// Spend over the 24 hours before `now`.
    pub fn rolling_spend(&self, now: DateTime<Utc>) -> f64 {
        let since = now - ChronoDuration::hours(BUDGET_WINDOW_HOURS);
        self.inner
            .history
            .lock_ignore_poison()
            .spend_between(since, now)
    }

    /// Copy of the retained history.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.inner
            .history
            .lock_ignore_poison()
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.history.lock_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records waiting for the sink.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock_ignore_poison().len()
    }

    /// Records dropped because the pending buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for UsageLedger {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

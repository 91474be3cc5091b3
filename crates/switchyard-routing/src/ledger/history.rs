//! Time-ordered usage history with an incrementally maintained spend window.

use super::UsageRecord;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Retained records, oldest first.
///
/// `cursor` is the index of the first record inside the spend window last
/// queried, and `window_spend` is the summed cost of `records[cursor..]`.
/// Queries with a later window start only advance the cursor, so repeated
/// budget checks cost the number of records that left the window since the
/// previous check.
#[derive(Debug, Default)]
pub(super) struct History {
    records: VecDeque<UsageRecord>,
    cursor: usize,
    window_spend: f64,
}

impl History {
    pub(super) fn from_records(mut records: Vec<UsageRecord>) -> Self {
        records.sort_by_key(|record| record.timestamp);
        let window_spend = records.iter().map(|record| record.cost).sum();
        Self {
            records: records.into(),
            cursor: 0,
            window_spend,
        }
    }

    /// Insert keeping timestamp order. Appends in the common case.
    pub(super) fn push(&mut self, record: UsageRecord) {
        let in_order = self
            .records
            .back()
            .is_none_or(|last| last.timestamp <= record.timestamp);
        let position = if in_order {
            self.records.len()
        } else {
            self.records
                .partition_point(|existing| existing.timestamp <= record.timestamp)
        };

        if position >= self.cursor {
            self.window_spend += record.cost;
        } else {
            self.cursor += 1;
        }
        self.records.insert(position, record);
    }

    /// Drop records older than `cutoff`, touching only expired ones.
    pub(super) fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self
            .records
            .front()
            .is_some_and(|record| record.timestamp < cutoff)
        {
            if let Some(record) = self.records.pop_front() {
                if self.cursor > 0 {
                    self.cursor -= 1;
                } else {
                    self.window_spend -= record.cost;
                }
            }
        }
        self.settle();
    }

    /// Cost of records with `since < timestamp <= now`.
    pub(super) fn spend_between(&mut self, since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        loop {
            match self.records.get(self.cursor) {
                Some(record) if record.timestamp <= since => {
                    self.window_spend -= record.cost;
                    self.cursor += 1;
                }
                _ => break,
            }
        }
        while let Some(previous) = self
            .cursor
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
        {
            if previous.timestamp <= since {
                break;
            }
            self.window_spend += previous.cost;
            self.cursor -= 1;
        }
        self.settle();

        let ahead: f64 = self
            .records
            .iter()
            .rev()
            .take_while(|record| record.timestamp > now)
            .map(|record| record.cost)
            .sum();
        (self.window_spend - ahead).max(0.0)
    }

    /// An empty window sums to exactly zero.
    fn settle(&mut self) {
        if self.cursor >= self.records.len() {
            self.cursor = self.records.len();
            self.window_spend = 0.0;
        }
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &UsageRecord> {
        self.records.iter()
    }

    pub(super) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RecordContext;
    use chrono::Duration as ChronoDuration;
    use switchyard_core::Strategy;

    fn spent(cost: f64, hours_ago: i64, now: DateTime<Utc>) -> UsageRecord {
        let context = RecordContext {
            correlation_id: format!("{hours_ago}h"),
            strategy: Strategy::CostOptimized,
            complexity: 2,
            latency_ms: 10,
        };
        UsageRecord::success(context, "p", "m", (1, 1), cost, 1)
            .at(now - ChronoDuration::hours(hours_ago))
    }

    fn day_spend(history: &mut History, now: DateTime<Utc>) -> f64 {
        history.spend_between(now - ChronoDuration::hours(24), now)
    }

    #[test]
    fn test_window_slides_forward_and_back() {
        let now = Utc::now();
        let mut history = History::default();
        history.push(spent(4.0, 30, now));
        history.push(spent(2.0, 10, now));
        history.push(spent(1.0, 1, now));

        assert!((day_spend(&mut history, now) - 3.0).abs() < 1e-9);
        assert!((day_spend(&mut history, now + ChronoDuration::hours(20)) - 1.0).abs() < 1e-9);
        assert!((day_spend(&mut history, now - ChronoDuration::hours(7)) - 6.0).abs() < 1e-9);
        assert!(day_spend(&mut history, now + ChronoDuration::hours(48)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_order_insert_keeps_order() {
        let now = Utc::now();
        let mut history = History::default();
        history.push(spent(1.0, 1, now));
        assert!((day_spend(&mut history, now) - 1.0).abs() < 1e-9);

        history.push(spent(8.0, 40, now));
        history.push(spent(2.0, 5, now));
        let ages: Vec<String> = history
            .iter()
            .map(|record| record.correlation_id.clone())
            .collect();
        assert_eq!(ages, vec!["40h", "5h", "1h"]);
        assert!((day_spend(&mut history, now) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_prune_pops_only_expired() {
        let now = Utc::now();
        let mut history = History::from_records(vec![
            spent(1.0, 3, now),
            spent(5.0, 200, now),
            spent(2.0, 50, now),
        ]);
        assert!((day_spend(&mut history, now) - 1.0).abs() < 1e-9);

        history.prune(now - ChronoDuration::hours(168));
        assert_eq!(history.len(), 2);
        assert!((day_spend(&mut history, now) - 1.0).abs() < 1e-9);

        history.prune(now);
        assert_eq!(history.len(), 0);
        assert!(day_spend(&mut history, now).abs() < f64::EPSILON);
    }

    #[test]
    fn test_records_after_now_are_excluded() {
        let now = Utc::now();
        let mut history = History::default();
        history.push(spent(1.0, 2, now));
        history.push(spent(3.0, -1, now));
        assert!((day_spend(&mut history, now) - 1.0).abs() < 1e-9);
    }
}

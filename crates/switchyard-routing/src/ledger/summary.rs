use super::record::UsageRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only aggregation over usage records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_cost: f64,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub cost_by_provider: BTreeMap<String, f64>,
    pub calls_by_provider: BTreeMap<String, u64>,
    /// Successful share of calls; zero when there were none
    pub success_rate: f64,
}

impl UsageSummary {
    pub fn from_records<'record>(records: impl IntoIterator<Item = &'record UsageRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total_calls += 1;
            summary.total_cost += record.cost;
            if record.success {
                summary.successful_calls += 1;
            }
            if let Some(provider) = &record.provider {
                *summary
                    .cost_by_provider
                    .entry(provider.clone())
                    .or_insert(0.0) += record.cost;
                *summary.calls_by_provider.entry(provider.clone()).or_insert(0) += 1;
            }
        }
        if summary.total_calls > 0 {
            summary.success_rate = summary.successful_calls as f64 / summary.total_calls as f64;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::{RecordContext, UsageOutcome};
    use switchyard_core::{ErrorClass, Strategy};

    fn context() -> RecordContext {
        RecordContext {
            correlation_id: "c".to_owned(),
            strategy: Strategy::CostOptimized,
            complexity: 3,
            latency_ms: 10,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = UsageSummary::from_records(&Vec::<UsageRecord>::new());
        assert_eq!(summary.total_calls, 0);
        assert!(summary.success_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_by_provider() {
        let records = vec![
            UsageRecord::success(context(), "a", "a1", (100, 100), 0.25, 1),
            UsageRecord::success(context(), "a", "a1", (100, 100), 0.25, 1),
            UsageRecord::success(context(), "b", "b1", (100, 100), 1.0, 2),
            UsageRecord::failure(
                context(),
                UsageOutcome::AllProvidersFailed,
                Some(("b", "b1", ErrorClass::ProviderInternal)),
                3,
            ),
            UsageRecord::failure(context(), UsageOutcome::NoEligibleProvider, None, 0),
        ];
        let summary = UsageSummary::from_records(&records);
        assert_eq!(summary.total_calls, 5);
        assert_eq!(summary.successful_calls, 3);
        assert!((summary.total_cost - 1.5).abs() < 1e-9);
        assert!((summary.success_rate - 0.6).abs() < 1e-9);
        assert_eq!(summary.calls_by_provider.get("b"), Some(&2));
        assert_eq!(summary.cost_by_provider.get("a").copied(), Some(0.5));
    }
}

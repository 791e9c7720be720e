//! Financial metrics over a stream of normalized records.
//!
//! Aggregation is incremental: `MetricsAggregator::push` is called once per
//! record as rows are decoded and `finish` derives rates and insights.
//! Buckets live in ordered maps, so peak ties resolve to the lowest hour and
//! the earliest date. Amount sums saturate at the `Decimal` bounds.

use crate::engine::reconcile::match_rate;
use crate::engine::status::is_cancellation;
use crate::models::{NormalizedRecord, NormalizedStatus};
use chrono::{Datelike, NaiveDate, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNKNOWN_DIMENSION: &str = "Unknown";

/// Counters kept for every time bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub count: usize,
    /// Sum of successful amounts.
    pub revenue: Decimal,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
}

impl TimeBucket {
    fn add(&mut self, record: &NormalizedRecord) {
        self.count += 1;
        match record.normalized_status {
            NormalizedStatus::Success => {
                self.successful += 1;
                self.revenue = self.revenue.saturating_add(record.amount);
            }
            NormalizedStatus::Failed => self.failed += 1,
            NormalizedStatus::Pending => self.pending += 1,
            NormalizedStatus::Unknown => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInsights {
    pub peak_hour: Option<u32>,
    pub peak_day: Option<NaiveDate>,
    pub average_daily_transactions: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    /// Hour of day (0-23) of the record's local timestamp.
    pub hourly: BTreeMap<u32, TimeBucket>,
    pub daily: BTreeMap<NaiveDate, TimeBucket>,
    /// ISO-8601 week, keyed `YYYY-Www`.
    pub weekly: BTreeMap<String, TimeBucket>,
    /// Calendar month, keyed `YYYY-MM`.
    pub monthly: BTreeMap<String, TimeBucket>,
    pub insights: TimeInsights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionStats {
    pub count: usize,
    pub successful: usize,
    pub total_amount: Decimal,
    pub successful_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub provider: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
    /// Explicit cancellations; also counted in `failed`.
    pub canceled: usize,
    pub conversion_rate: String,
    pub successful_revenue: Decimal,
    pub total_revenue: Decimal,
    pub average_amount: Decimal,
    pub time_analysis: TimeAnalysis,
    pub payment_method_stats: BTreeMap<String, DimensionStats>,
    pub company_stats: BTreeMap<String, DimensionStats>,
}

/// Running sums for one metrics computation.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    metrics: Metrics,
}

impl MetricsAggregator {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            metrics: Metrics {
                provider: provider.into(),
                ..Metrics::default()
            },
        }
    }

    pub fn push(&mut self, record: &NormalizedRecord) {
        let m = &mut self.metrics;
        m.total += 1;
        m.total_revenue = m.total_revenue.saturating_add(record.amount);
        match record.normalized_status {
            NormalizedStatus::Success => {
                m.successful += 1;
                m.successful_revenue = m.successful_revenue.saturating_add(record.amount);
            }
            NormalizedStatus::Failed => m.failed += 1,
            NormalizedStatus::Pending => m.pending += 1,
            NormalizedStatus::Unknown => {}
        }
        if is_cancellation(&record.raw_status) {
            m.canceled += 1;
        }

        add_dimension(&mut m.payment_method_stats, record.payment_method.as_deref(), record);
        add_dimension(&mut m.company_stats, record.company.as_deref(), record);

        let Some(ts) = record.timestamp else {
            return;
        };
        let time = &mut m.time_analysis;
        let date = ts.date();
        let week = date.iso_week();

        time.hourly.entry(ts.hour()).or_default().add(record);
        time.daily.entry(date).or_default().add(record);
        time.weekly
            .entry(format!("{}-W{:02}", week.year(), week.week()))
            .or_default()
            .add(record);
        time.monthly
            .entry(format!("{:04}-{:02}", date.year(), date.month()))
            .or_default()
            .add(record);
    }

    pub fn finish(self) -> Metrics {
        let mut m = self.metrics;
        m.conversion_rate = match_rate(m.successful, m.total);
        m.average_amount = if m.total == 0 {
            Decimal::ZERO
        } else {
            (m.total_revenue / Decimal::from(m.total)).round_dp(2)
        };

        let time = &mut m.time_analysis;
        time.insights = TimeInsights {
            peak_hour: peak(&time.hourly).copied(),
            peak_day: peak(&time.daily).copied(),
            average_daily_transactions: if time.daily.is_empty() {
                Decimal::ZERO
            } else {
                let dated: usize = time.daily.values().map(|b| b.count).sum();
                (Decimal::from(dated) / Decimal::from(time.daily.len())).round_dp(2)
            },
        };
        m
    }
}

fn add_dimension(
    stats: &mut BTreeMap<String, DimensionStats>,
    value: Option<&str>,
    record: &NormalizedRecord,
) {
    let key = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_DIMENSION);
    let entry = stats.entry(key.to_string()).or_default();
    entry.count += 1;
    entry.total_amount = entry.total_amount.saturating_add(record.amount);
    if record.normalized_status == NormalizedStatus::Success {
        entry.successful += 1;
        entry.successful_amount = entry.successful_amount.saturating_add(record.amount);
    }
}

/// Key with the highest count; the first key in map order wins ties.
fn peak<K: Ord>(buckets: &BTreeMap<K, TimeBucket>) -> Option<&K> {
    let mut best: Option<(&K, usize)> = None;
    for (key, bucket) in buckets {
        if best.map_or(true, |(_, count)| bucket.count > count) {
            best = Some((key, bucket.count));
        }
    }
    best.map(|(key, _)| key)
}

/// Aggregate a complete record set in one pass.
pub fn aggregate<'a, I>(records: I, provider: &str) -> Metrics
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut aggregator = MetricsAggregator::new(provider);
    for record in records {
        aggregator.push(record);
    }
    aggregator.finish()
}

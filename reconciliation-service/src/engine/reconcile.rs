//! Hash-join reconciliation of a merchant export against a platform export.
//!
//! Both sides are indexed by tracking id (first record seen wins), then every
//! merchant record is classified exactly once as matched, mismatched or
//! merchant-only, and every platform record without a merchant counterpart is
//! reported as platform-only.

use crate::config::{MatchingConfig, MismatchPolicy};
use crate::models::NormalizedRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a record ended up in one of the "only" buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrphanReason {
    #[serde(rename = "no tracking id")]
    NoTrackingId,
    #[serde(rename = "no matching platform record")]
    NoMatchingPlatformRecord,
    #[serde(rename = "no matching merchant record")]
    NoMatchingMerchantRecord,
}

impl OrphanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoTrackingId => "no tracking id",
            Self::NoMatchingPlatformRecord => "no matching platform record",
            Self::NoMatchingMerchantRecord => "no matching merchant record",
        }
    }
}

/// Which compared dimensions disagree for a mismatched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    StatusOnly,
    AmountOnly,
    StatusAndAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPair {
    pub id: String,
    pub merchant: NormalizedRecord,
    pub platform: NormalizedRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub id: String,
    pub kind: MismatchKind,
    /// Merchant amount minus platform amount, saturated at the `Decimal` bounds.
    pub amount_difference: Decimal,
    pub merchant: NormalizedRecord,
    pub platform: NormalizedRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orphan {
    pub reason: OrphanReason,
    pub record: NormalizedRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub total_merchant: usize,
    pub total_platform: usize,
    pub matched: usize,
    pub merchant_only: usize,
    pub platform_only: usize,
    pub status_mismatch: usize,
    /// `matched / total_merchant` as a percentage with two decimals, `"0%"`
    /// when the merchant side is empty. The denominator is `total_merchant`
    /// under both mismatch policies.
    pub match_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub matched: Vec<MatchedPair>,
    pub status_mismatch: Vec<Mismatch>,
    pub merchant_only: Vec<Orphan>,
    pub platform_only: Vec<Orphan>,
    pub summary: ReconciliationSummary,
}

/// Index records by id; the first record seen for an id wins.
fn build_index(records: &[NormalizedRecord]) -> HashMap<&str, &NormalizedRecord> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(id) = record.id.as_deref() {
            index.entry(id).or_insert(record);
        }
    }
    index
}

fn compare(
    merchant: &NormalizedRecord,
    platform: &NormalizedRecord,
    matching: &MatchingConfig,
) -> Option<MismatchKind> {
    let status_differs = merchant.normalized_status != platform.normalized_status;
    let amount_differs = match matching.policy {
        MismatchPolicy::StatusOnly => false,
        MismatchPolicy::StatusAndAmount => {
            match merchant.amount.checked_sub(platform.amount) {
                Some(difference) => difference.abs() > matching.amount_tolerance,
                None => true,
            }
        }
    };

    match (status_differs, amount_differs) {
        (false, false) => None,
        (true, false) => Some(MismatchKind::StatusOnly),
        (false, true) => Some(MismatchKind::AmountOnly),
        (true, true) => Some(MismatchKind::StatusAndAmount),
    }
}

/// Format `matched / total` as a two-decimal percentage.
pub fn match_rate(matched: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let rate = Decimal::from(matched) * Decimal::ONE_HUNDRED / Decimal::from(total);
    format!("{:.2}%", rate.round_dp(2))
}

pub fn reconcile(
    merchant_records: &[NormalizedRecord],
    platform_records: &[NormalizedRecord],
    matching: &MatchingConfig,
) -> ReconciliationResult {
    let platform_index = build_index(platform_records);
    let merchant_index = build_index(merchant_records);

    let mut matched = Vec::new();
    let mut status_mismatch = Vec::new();
    let mut merchant_only = Vec::new();
    let mut platform_only = Vec::new();

    for record in merchant_records {
        let Some(id) = record.id.as_deref() else {
            merchant_only.push(Orphan {
                reason: OrphanReason::NoTrackingId,
                record: record.clone(),
            });
            continue;
        };

        let Some(platform) = platform_index.get(id) else {
            merchant_only.push(Orphan {
                reason: OrphanReason::NoMatchingPlatformRecord,
                record: record.clone(),
            });
            continue;
        };

        match compare(record, platform, matching) {
            None => matched.push(MatchedPair {
                id: id.to_string(),
                merchant: record.clone(),
                platform: (*platform).clone(),
            }),
            Some(kind) => status_mismatch.push(Mismatch {
                id: id.to_string(),
                kind,
                amount_difference: record.amount.saturating_sub(platform.amount),
                merchant: record.clone(),
                platform: (*platform).clone(),
            }),
        }
    }

    for record in platform_records {
        match record.id.as_deref() {
            None => platform_only.push(Orphan {
                reason: OrphanReason::NoTrackingId,
                record: record.clone(),
            }),
            Some(id) if !merchant_index.contains_key(id) => platform_only.push(Orphan {
                reason: OrphanReason::NoMatchingMerchantRecord,
                record: record.clone(),
            }),
            Some(_) => {}
        }
    }

    let summary = ReconciliationSummary {
        total_merchant: merchant_records.len(),
        total_platform: platform_records.len(),
        matched: matched.len(),
        merchant_only: merchant_only.len(),
        platform_only: platform_only.len(),
        status_mismatch: status_mismatch.len(),
        match_rate: match_rate(matched.len(), merchant_records.len()),
    };

    tracing::debug!(
        total_merchant = summary.total_merchant,
        total_platform = summary.total_platform,
        matched = summary.matched,
        status_mismatch = summary.status_mismatch,
        merchant_only = summary.merchant_only,
        platform_only = summary.platform_only,
        match_rate = %summary.match_rate,
        "Reconciliation finished"
    );

    ReconciliationResult {
        matched,
        status_mismatch,
        merchant_only,
        platform_only,
        summary,
    }
}

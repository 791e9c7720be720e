//! Best-effort classification of an export by its header row.

use crate::config::FieldTable;
use crate::models::{clean_label, Origin};
use serde::{Deserialize, Serialize};

/// A side is only claimed when at least this many of its keywords appear.
const MIN_KEYWORD_HITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Merchant,
    Platform,
    Unknown,
}

impl From<Origin> for FileKind {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Merchant => Self::Merchant,
            Origin::Platform => Self::Platform,
        }
    }
}

/// Detected kind of both files handed to a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTypes {
    pub merchant_file: FileKind,
    pub platform_file: FileKind,
}

fn keyword_hits(headers: &[String], keywords: &[String]) -> usize {
    keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| headers.iter().any(|h| h.contains(k.as_str())))
        .count()
}

/// Classify a file from its headers against every profile's detection keywords.
///
/// The side with the most keyword hits wins when it reaches the threshold; a
/// tie between sides is `Unknown`.
pub fn detect_file_kind<S: AsRef<str>>(headers: &[S], table: &FieldTable) -> FileKind {
    let headers: Vec<String> = headers
        .iter()
        .map(|h| clean_label(h.as_ref()).to_lowercase())
        .collect();

    let best_for = |side: Origin| {
        table
            .profiles()
            .filter(|p| p.side == side)
            .map(|p| keyword_hits(&headers, &p.detect_keywords))
            .max()
            .unwrap_or(0)
    };
    let merchant = best_for(Origin::Merchant);
    let platform = best_for(Origin::Platform);

    match (merchant >= MIN_KEYWORD_HITS, platform >= MIN_KEYWORD_HITS) {
        (true, false) => FileKind::Merchant,
        (false, true) => FileKind::Platform,
        (true, true) if merchant > platform => FileKind::Merchant,
        (true, true) if platform > merchant => FileKind::Platform,
        _ => FileKind::Unknown,
    }
}

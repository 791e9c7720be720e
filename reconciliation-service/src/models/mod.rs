//! Domain models for reconciliation-service.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Record Models
// ============================================================================

/// Which export a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Merchant,
    Platform,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Platform => "platform",
        }
    }
}

/// Closed status taxonomy every raw status is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedStatus {
    Success,
    Failed,
    Pending,
    Unknown,
}

impl NormalizedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }
}

/// One decoded row: column label to value, in source column order.
///
/// Labels are cleaned on construction (byte-order mark, control characters
/// and surrounding whitespace removed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<(String, String)>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (clean_label(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Value of the first column with exactly this label.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Strip a byte-order mark and stray control characters from a column label.
pub fn clean_label(label: &str) -> String {
    label
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonical transaction record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub id: Option<String>,
    pub raw_status: String,
    pub normalized_status: NormalizedStatus,
    pub amount: Decimal,
    pub timestamp: Option<NaiveDateTime>,
    pub payment_method: Option<String>,
    pub company: Option<String>,
    pub provider: String,
    pub currency: Option<String>,
    pub origin: Origin,
}

// ============================================================================
// Job Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Caller's hint for where an upload should be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    #[default]
    Auto,
    Client,
    Server,
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            _ => Err(format!("Invalid processing mode: {}", s)),
        }
    }
}

/// Where an upload is actually processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Inline,
    Offloaded,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Offloaded => "offloaded",
        }
    }

    /// `client` forces inline, `server` forces offloaded, `auto` offloads
    /// anything above the threshold.
    pub fn select(hint: ProcessingMode, file_size: usize, inline_threshold: usize) -> Self {
        match hint {
            ProcessingMode::Client => Self::Inline,
            ProcessingMode::Server => Self::Offloaded,
            ProcessingMode::Auto if file_size > inline_threshold => Self::Offloaded,
            ProcessingMode::Auto => Self::Inline,
        }
    }
}

//! Configuration module for reconciliation-service.

mod providers;

pub use providers::{
    FieldTable, FieldTableError, ProviderProfile, MERCHANT_PROFILE, PLATFORM_PROFILE,
};

use rust_decimal::Decimal;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub ingest: IngestConfig,
    pub jobs: JobConfig,
    pub matching: MatchingConfig,
    pub providers_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Files at or below this size are processed inline in `auto` mode.
    pub inline_threshold_bytes: usize,
    pub max_upload_bytes: usize,
    /// Per-side row cap for the reconcile operation.
    pub max_reconcile_records: usize,
    /// Rows between two progress events in offloaded mode.
    pub progress_row_interval: usize,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub progress_channel_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Pairs are compared on normalized status only.
    StatusOnly,
    /// Pairs are compared on normalized status and on amount within tolerance.
    StatusAndAmount,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "status_only" => Ok(Self::StatusOnly),
            "status_and_amount" => Ok(Self::StatusAndAmount),
            _ => Err(format!("Invalid mismatch policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchingConfig {
    pub policy: MismatchPolicy,
    pub amount_tolerance: Decimal,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            policy: MismatchPolicy::StatusAndAmount,
            amount_tolerance: Decimal::new(1, 2),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            inline_threshold_bytes: 5 * 1024 * 1024,
            max_upload_bytes: 100 * 1024 * 1024,
            max_reconcile_records: 10_000,
            progress_row_interval: 1000,
            temp_dir: env::temp_dir().join("reconciliation-jobs"),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            progress_channel_capacity: 64,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "reconciliation-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            ingest: IngestConfig::default(),
            jobs: JobConfig::default(),
            matching: MatchingConfig::default(),
            providers_file: None,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let ingest_defaults = IngestConfig::default();
        let job_defaults = JobConfig::default();
        let matching_defaults = MatchingConfig::default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| common.log_level.clone());
        let otlp_endpoint = env::var("OTLP_ENDPOINT")
            .ok()
            .or_else(|| common.otlp_endpoint().map(str::to_string));

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "reconciliation-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level,
            otlp_endpoint,
            ingest: IngestConfig {
                inline_threshold_bytes: parse_env(
                    "INLINE_THRESHOLD_BYTES",
                    ingest_defaults.inline_threshold_bytes,
                ),
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", ingest_defaults.max_upload_bytes),
                max_reconcile_records: parse_env(
                    "MAX_RECONCILE_RECORDS",
                    ingest_defaults.max_reconcile_records,
                ),
                progress_row_interval: parse_env(
                    "PROGRESS_ROW_INTERVAL",
                    ingest_defaults.progress_row_interval,
                )
                .max(1),
                temp_dir: env::var("TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(ingest_defaults.temp_dir),
            },
            jobs: JobConfig {
                retention: Duration::from_secs(parse_env(
                    "JOB_RETENTION_SECS",
                    job_defaults.retention.as_secs(),
                )),
                sweep_interval: Duration::from_secs(
                    parse_env("JOB_SWEEP_INTERVAL_SECS", job_defaults.sweep_interval.as_secs())
                        .max(1),
                ),
                progress_channel_capacity: parse_env(
                    "PROGRESS_CHANNEL_CAPACITY",
                    job_defaults.progress_channel_capacity,
                )
                .max(1),
            },
            matching: MatchingConfig {
                policy: match env::var("MISMATCH_POLICY") {
                    Ok(value) => value
                        .parse()
                        .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                    Err(_) => matching_defaults.policy,
                },
                amount_tolerance: match env::var("AMOUNT_TOLERANCE") {
                    Ok(value) => Decimal::from_str(value.trim()).map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("Invalid AMOUNT_TOLERANCE: {}", e))
                    })?,
                    Err(_) => matching_defaults.amount_tolerance,
                },
            },
            providers_file: env::var("PROVIDERS_FILE").ok().map(PathBuf::from),
        })
    }

    /// Load and validate the provider field table this configuration points at.
    pub fn load_field_table(&self) -> Result<FieldTable, AppError> {
        let table = match &self.providers_file {
            Some(path) => FieldTable::from_file(path),
            None => FieldTable::embedded(),
        };
        table.map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

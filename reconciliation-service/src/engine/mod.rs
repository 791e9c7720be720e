//! Matching and analysis engine.
//!
//! Pure, synchronous building blocks shared by every entry point: the HTTP
//! handlers, the inline ingestion path and the offloaded job workers all go
//! through these functions.

pub mod analytics;
pub mod detect;
pub mod keys;
pub mod normalizer;
pub mod reconcile;
pub mod status;

pub use analytics::{aggregate, DimensionStats, Metrics, MetricsAggregator, TimeAnalysis, TimeBucket};
pub use detect::{detect_file_kind, DetectedTypes, FileKind};
pub use keys::resolve_key;
pub use normalizer::Normalizer;
pub use reconcile::{
    reconcile, MatchedPair, Mismatch, MismatchKind, Orphan, OrphanReason, ReconciliationResult,
    ReconciliationSummary,
};
pub use status::normalize_status;

use super::decoder::{count_rows, RowDecoder};
use super::IngestError;
use crate::engine::{Metrics, MetricsAggregator, Normalizer};
use crate::models::NormalizedRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

pub const STAGE_READING: &str = "reading";
pub const STAGE_COUNTED: &str = "counted";
pub const STAGE_NORMALIZING: &str = "normalizing";
pub const STAGE_AGGREGATING: &str = "aggregating";

const PROGRESS_READING: u8 = 10;
const PROGRESS_COUNTED: u8 = 20;
const PROGRESS_NORMALIZED: u8 = 80;
const PROGRESS_AGGREGATING: u8 = 85;

/// Receives intermediate progress of a running ingestion.
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: &str, progress: u8);
}

/// Sink for runs nobody is watching.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _stage: &str, _progress: u8) {}
}

/// Everything one ingestion produces.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub records: Vec<NormalizedRecord>,
    pub metrics: Metrics,
}

/// Decode, normalize and aggregate one file in a single streaming pass.
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    row_interval: usize,
}

impl Pipeline {
    pub fn new(normalizer: Normalizer, row_interval: usize) -> Self {
        Self {
            normalizer,
            row_interval: row_interval.max(1),
        }
    }

    pub fn provider(&self) -> &str {
        &self.normalizer.profile().name
    }

    /// Process an upload that is already in memory. No progress is reported.
    pub fn run_inline(&self, bytes: &[u8]) -> Result<IngestOutcome, IngestError> {
        self.process(bytes, None, &NoProgress)
    }

    /// Process a file on disk, counting rows first so progress can be
    /// reported as a fraction of the whole.
    pub fn run_file(&self, path: &Path, sink: &dyn ProgressSink) -> Result<IngestOutcome, IngestError> {
        let delimiter = self.normalizer.profile().delimiter_byte();
        sink.report(STAGE_READING, PROGRESS_READING);

        let total = count_rows(BufReader::new(File::open(path)?), delimiter)?;
        debug!(path = %path.display(), rows = total, "Counted rows");
        sink.report(STAGE_COUNTED, PROGRESS_COUNTED);

        self.process(BufReader::new(File::open(path)?), Some(total), sink)
    }

    fn process<R: Read>(
        &self,
        source: R,
        total: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<IngestOutcome, IngestError> {
        let decoder = RowDecoder::new(source, self.normalizer.profile().delimiter_byte())?;
        let mut aggregator = MetricsAggregator::new(self.provider());
        let mut records = Vec::with_capacity(total.unwrap_or(0));

        for row in decoder {
            let record = self.normalizer.normalize(&row?);
            aggregator.push(&record);
            records.push(record);

            if let Some(total) = total {
                if records.len() % self.row_interval == 0 {
                    sink.report(STAGE_NORMALIZING, interpolate_progress(records.len(), total));
                }
            }
        }

        if total.is_some() {
            sink.report(STAGE_AGGREGATING, PROGRESS_AGGREGATING);
        }
        let metrics = aggregator.finish();
        debug!(provider = %self.provider(), records = records.len(), "Ingestion finished");

        Ok(IngestOutcome { records, metrics })
    }
}

/// Map `processed` out of `total` rows onto the normalizing band of the
/// progress scale.
pub fn interpolate_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_NORMALIZED;
    }
    let band = (PROGRESS_NORMALIZED - PROGRESS_COUNTED) as usize;
    let done = processed.min(total) * band / total;
    PROGRESS_COUNTED + done as u8
}

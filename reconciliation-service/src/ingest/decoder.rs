use super::IngestError;
use crate::engine::Normalizer;
use crate::models::{clean_label, NormalizedRecord, RawRow};
use std::io::Read;

fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true);
    builder
}

/// Streams `RawRow`s out of a delimited source, one record at a time.
///
/// Rows whose cells are all blank are skipped.
pub struct RowDecoder<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    record: csv::StringRecord,
}

impl<R: Read> RowDecoder<R> {
    pub fn new(source: R, delimiter: u8) -> Result<Self, IngestError> {
        let mut reader = reader_builder(delimiter).from_reader(source);
        let headers = reader.headers()?.iter().map(clean_label).collect();
        Ok(Self {
            reader,
            headers,
            record: csv::StringRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for RowDecoder<R> {
    type Item = Result<RawRow, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) if self.record.iter().all(|v| v.trim().is_empty()) => continue,
                Ok(true) => {
                    let pairs = self.headers.iter().zip(self.record.iter());
                    return Some(Ok(RawRow::from_pairs(pairs)));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Count data rows without materializing them.
pub fn count_rows<R: Read>(source: R, delimiter: u8) -> Result<usize, IngestError> {
    let mut reader = reader_builder(delimiter).from_reader(source);
    let mut record = csv::ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut record)? {
        if record.iter().any(|v| !v.trim_ascii().is_empty()) {
            count += 1;
        }
    }
    Ok(count)
}

/// A fully decoded and normalized file.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub headers: Vec<String>,
    pub records: Vec<NormalizedRecord>,
}

/// Decode and normalize an in-memory file, failing once more than `limit`
/// records are seen.
pub fn decode_records(
    bytes: &[u8],
    normalizer: &Normalizer,
    limit: Option<usize>,
) -> Result<DecodedFile, IngestError> {
    let mut decoder = RowDecoder::new(bytes, normalizer.profile().delimiter_byte())?;
    let headers = decoder.headers().to_vec();
    let mut records = Vec::new();

    for row in &mut decoder {
        let row = row?;
        if let Some(limit) = limit {
            if records.len() >= limit {
                return Err(IngestError::TooManyRecords { limit });
            }
        }
        records.push(normalizer.normalize(&row));
    }

    Ok(DecodedFile { headers, records })
}

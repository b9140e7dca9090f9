//! Chat-history import: batching, store submission, maintenance trigger.
//!
//! Chunks are processed strictly in sequence so only one batch of entries
//! is held in memory at a time. A chunk that the store rejects is counted
//! and skipped over; the import always finishes with a best-effort report.

pub mod normalize;

use self::normalize::{Normalized, normalize};
use crate::error::{Error, Result};
use crate::memory::store::MemoryStore;
use crate::model::record::RawChatRecord;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// Outcome counts for one import call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed_chunks: usize,
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "imported {} of {} records ({} skipped, {} failed chunks)",
            self.imported, self.total, self.skipped, self.failed_chunks
        )
    }
}

/// Runs imports against a memory store.
pub struct Importer<'a> {
    store: &'a dyn MemoryStore,
    self_talker: String,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a dyn MemoryStore, self_talker: impl Into<String>) -> Self {
        Self {
            store,
            self_talker: self_talker.into(),
        }
    }

    pub fn store(&self) -> &dyn MemoryStore {
        self.store
    }

    /// Import records in consecutive chunks of `batch_size`, preserving
    /// input order. After all chunks have been attempted, triggers one
    /// consolidation pass.
    pub async fn import(
        &self,
        records: &[RawChatRecord],
        batch_size: usize,
    ) -> Result<ImportReport> {
        if batch_size == 0 {
            return Err(Error::Validation("batch_size must be > 0".to_string()));
        }

        let start = std::time::Instant::now();
        let mut report = ImportReport {
            total: records.len(),
            ..Default::default()
        };
        let chunk_count = records.len().div_ceil(batch_size);

        for (chunk_index, chunk) in records.chunks(batch_size).enumerate() {
            let mut entries = Vec::with_capacity(chunk.len());
            for raw in chunk {
                match normalize(raw, &self.self_talker) {
                    Normalized::Entry(entry) => entries.push(*entry),
                    Normalized::Skipped(reason) => {
                        tracing::debug!(
                            record_id = raw.id,
                            reason = reason.as_str(),
                            "skipping record"
                        );
                        metrics::records_skipped()
                            .add(1, &[KeyValue::new("reason", reason.as_str())]);
                        report.skipped += 1;
                    }
                }
            }

            if entries.is_empty() {
                continue;
            }

            match self.store.add(&entries).await {
                Ok(()) => {
                    report.imported += entries.len();
                    tracing::info!(
                        chunk = chunk_index + 1,
                        of = chunk_count,
                        imported = entries.len(),
                        "chunk stored"
                    );
                    metrics::records_imported().add(entries.len() as u64, &[]);
                }
                Err(e) => {
                    tracing::warn!(
                        chunk = chunk_index + 1,
                        of = chunk_count,
                        error = %e,
                        "chunk submission failed, continuing"
                    );
                    metrics::chunks_failed().add(1, &[]);
                    report.failed_chunks += 1;
                }
            }
        }

        // One maintenance pass per import call, after every chunk has been
        // attempted. Its failure never taints the report.
        if let Err(e) = self.store.consolidate(false).await {
            tracing::warn!(error = %e, "post-import consolidation failed");
        }

        metrics::operation_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "import")],
        );
        Ok(report)
    }

    /// Import all records as a single chunk.
    pub async fn import_all(&self, records: &[RawChatRecord]) -> Result<ImportReport> {
        self.import(records, records.len().max(1)).await
    }

    /// Import a JSON file containing an array of raw records.
    ///
    /// Anything other than a top-level array is fatal; individual elements
    /// that fail to decode are counted as skips.
    pub async fn import_file(
        &self,
        path: &std::path::Path,
        use_batch: bool,
        batch_size: usize,
    ) -> Result<ImportReport> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Validation(format!("cannot read {}: {e}", path.display())))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::Validation(format!("invalid JSON in {}: {e}", path.display())))?;

        let (records, undecodable) = decode_records(value)?;
        let mut report = if use_batch {
            self.import(&records, batch_size).await?
        } else {
            self.import_all(&records).await?
        };
        report.total += undecodable;
        report.skipped += undecodable;
        Ok(report)
    }
}

/// Split a parsed JSON value into decodable records and a count of array
/// elements that were not valid records. A non-array top level is fatal.
pub fn decode_records(value: serde_json::Value) -> Result<(Vec<RawChatRecord>, usize)> {
    let serde_json::Value::Array(items) = value else {
        return Err(Error::Validation(
            "top-level JSON must be an array of chat records".to_string(),
        ));
    };

    let mut records = Vec::with_capacity(items.len());
    let mut undecodable = 0;
    for item in items {
        match serde_json::from_value::<RawChatRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable record");
                undecodable += 1;
            }
        }
    }
    Ok((records, undecodable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_non_array_top_level() {
        let result = decode_records(serde_json::json!({"id": 1}));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn decode_counts_bad_elements() {
        let (records, undecodable) = decode_records(serde_json::json!([
            {"id": 1, "type_name": "文本", "talker": "u1", "msg": "hi",
             "CreateTime": "2025-01-01 00:00:00"},
            "not a record",
        ]))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(undecodable, 1);
    }
}

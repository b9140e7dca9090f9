//! Metric instrument factories for jarvis-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"jarvis-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for jarvis-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("jarvis-rs")
}

/// Counter: chat records turned into stored memories.
pub fn records_imported() -> Counter<u64> {
    meter()
        .u64_counter("jarvis.import.records_imported")
        .with_description("Chat records imported into the memory store")
        .build()
}

/// Counter: chat records skipped during normalization.
/// Labels: `reason`.
pub fn records_skipped() -> Counter<u64> {
    meter()
        .u64_counter("jarvis.import.records_skipped")
        .with_description("Chat records skipped during normalization")
        .build()
}

/// Counter: chunks the store rejected.
pub fn chunks_failed() -> Counter<u64> {
    meter()
        .u64_counter("jarvis.import.chunks_failed")
        .with_description("Import chunks rejected by the memory store")
        .build()
}

/// Counter: memory store operations (add, query, get, consolidate).
/// Labels: `operation`.
pub fn memory_operations() -> Counter<u64> {
    meter()
        .u64_counter("jarvis.memory.operations")
        .with_description("Number of memory store operations")
        .build()
}

/// Counter: memories merged away by consolidation.
pub fn consolidation_merges() -> Counter<u64> {
    meter()
        .u64_counter("jarvis.memory.consolidation_merges")
        .with_description("Memories merged away by consolidation passes")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jarvis.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}

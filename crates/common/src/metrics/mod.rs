//! Metrics for a sync run
//!
//! Counters follow the `paperstack_*` naming convention. No exporter is
//! installed here; without a recorder the macros are no-ops.

use metrics::{counter, describe_counter, Unit};

/// Metrics prefix for all Paperstack metrics
pub const METRICS_PREFIX: &str = "paperstack";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_records_loaded_total", METRICS_PREFIX),
        Unit::Count,
        "Records loaded from the store"
    );

    describe_counter!(
        format!("{}_records_enriched_total", METRICS_PREFIX),
        Unit::Count,
        "Records whose identity was filled from the paper index"
    );

    describe_counter!(
        format!("{}_enrichment_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Records left incomplete after an index lookup"
    );

    describe_counter!(
        format!("{}_records_discovered_total", METRICS_PREFIX),
        Unit::Count,
        "New records appended from search or recommendations"
    );

    describe_counter!(
        format!("{}_labels_assigned_total", METRICS_PREFIX),
        Unit::Count,
        "Summaries and labels generated"
    );

    describe_counter!(
        format!("{}_writes_total", METRICS_PREFIX),
        Unit::Count,
        "Store writes by operation and status"
    );

    describe_counter!(
        format!("{}_retry_waits_total", METRICS_PREFIX),
        Unit::Count,
        "Backoff waits before retrying a store call"
    );

    tracing::debug!("Metrics registered");
}

pub fn record_loaded(count: usize) {
    counter!(format!("{}_records_loaded_total", METRICS_PREFIX)).increment(count as u64);
}

pub fn record_enrichment(matched: bool) {
    if matched {
        counter!(format!("{}_records_enriched_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_enrichment_misses_total", METRICS_PREFIX)).increment(1);
    }
}

pub fn record_discovered(source: &str, count: usize) {
    counter!(
        format!("{}_records_discovered_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(count as u64);
}

pub fn record_label(kind: &str) {
    counter!(
        format!("{}_labels_assigned_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_write(op: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_writes_total", METRICS_PREFIX),
        "op" => op.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_retry(operation: &str) {
    counter!(
        format!("{}_retry_waits_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        register_metrics();
        record_loaded(3);
        record_enrichment(true);
        record_write("create", false);
        // Just verify it runs without panic
    }
}

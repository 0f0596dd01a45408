//! Metrics recording for driver calls.

use std::time::Instant;

/// Records a counter and a latency histogram for one driver call.
///
/// * `backend` - Backend name (e.g., "sqlite")
/// * `operation` - "query" for result sets, "execute" for everything else
/// * `status` - "success" or "error"
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "recordset_queries_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "recordset_query_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        // No recorder is installed in tests; the macros must be no-ops.
        record_operation_metrics("sqlite", "query", Instant::now(), "success");
        record_operation_metrics("sqlite", "execute", Instant::now(), "error");
    }
}

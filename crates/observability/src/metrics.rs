//! Hub metrics
//!
//! Thin wrappers over the `metrics` macros so every crate records the same
//! names and labels. Without an installed recorder they are no-ops.

use contracts::{Encoding, SourceId};
use metrics::{counter, gauge};

/// Record a snapshot installed in the store
///
/// # Example
///
/// ```ignore
/// let sequence = store.publish(source, snapshot);
/// observability::metrics::record_snapshot_published(source, sequence);
/// ```
pub fn record_snapshot_published(source: SourceId, sequence: u64) {
    counter!("telemetry_hub_snapshots_published_total", "source" => source.config_key())
        .increment(1);
    gauge!("telemetry_hub_snapshot_sequence", "source" => source.config_key())
        .set(sequence as f64);
}

/// Record a failed driver read
pub fn record_read_failure(source: SourceId, kind: &'static str) {
    counter!(
        "telemetry_hub_source_read_failures_total",
        "source" => source.config_key(),
        "kind" => kind
    )
    .increment(1);
}

/// Record an accepted connection entering negotiation
pub fn record_session_opened() {
    counter!("telemetry_hub_sessions_opened_total").increment(1);
    gauge!("telemetry_hub_sessions_active").increment(1.0);
}

/// Record a session leaving, with the reason it ended
pub fn record_session_closed(reason: &'static str) {
    counter!("telemetry_hub_sessions_closed_total", "reason" => reason).increment(1);
    gauge!("telemetry_hub_sessions_active").decrement(1.0);
}

/// Record a rejected negotiation request
pub fn record_negotiation_rejected(reason: &'static str) {
    counter!("telemetry_hub_negotiations_rejected_total", "reason" => reason).increment(1);
}

/// Record one frame written to a subscriber
pub fn record_frame_sent(encoding: Encoding, bytes: usize) {
    counter!("telemetry_hub_frames_sent_total", "encoding" => encoding.as_str()).increment(1);
    counter!("telemetry_hub_frame_bytes_total", "encoding" => encoding.as_str())
        .increment(bytes as u64);
}

/// Record a tick without a frame (aggregate incomplete)
pub fn record_frame_skipped() {
    counter!("telemetry_hub_frames_skipped_total").increment(1);
}

/// Record a failed `accept`
pub fn record_accept_error() {
    counter!("telemetry_hub_accept_errors_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_helpers_render_in_prometheus_format() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_snapshot_published(SourceId::SpuChA, 3);
            record_read_failure(SourceId::Plc, "timeout");
            record_session_opened();
            record_frame_sent(Encoding::Binary, 288);
            record_session_closed("write_failed");
        });

        let rendered = handle.render();
        assert!(rendered.contains("telemetry_hub_snapshots_published_total{source=\"spu_ch_a\"} 1"));
        assert!(rendered.contains("telemetry_hub_snapshot_sequence{source=\"spu_ch_a\"} 3"));
        assert!(rendered.contains("telemetry_hub_frame_bytes_total{encoding=\"binary\"} 288"));
        assert!(rendered.contains("telemetry_hub_sessions_active 0"));
        assert!(rendered.contains("reason=\"write_failed\""));
    }

    #[test]
    fn test_helpers_without_recorder_are_noops() {
        record_frame_skipped();
        record_accept_error();
        record_negotiation_rejected("not_a_number");
    }
}

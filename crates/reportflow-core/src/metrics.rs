use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};

struct ReportMetrics {
    runs: Counter<u64>,
    drafts: Counter<u64>,
    draft_duration_ms: Histogram<f64>,
}

static METRICS: OnceCell<ReportMetrics> = OnceCell::new();

fn handles() -> &'static ReportMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("reportflow");
        ReportMetrics {
            runs: meter
                .u64_counter("report_runs_total")
                .with_description("Report runs by terminal status")
                .init(),
            drafts: meter
                .u64_counter("section_drafts_total")
                .with_description("Section drafting attempts by status")
                .init(),
            draft_duration_ms: meter
                .f64_histogram("section_draft_duration_ms")
                .with_description("Section research and drafting time in milliseconds")
                .init(),
        }
    })
}

/// Record a finished report run (no-op if no meter provider is installed).
pub fn record_run(status: &str, sections: usize) {
    let attrs = [
        KeyValue::new("status", status.to_string()),
        KeyValue::new("sections", sections as i64),
    ];
    handles().runs.add(1, &attrs);
}

/// Record one section worker's drafting attempt.
pub fn record_section_draft(status: &str, duration_ms: u64) {
    let metrics = handles();
    let attrs = [KeyValue::new("status", status.to_string())];
    metrics.drafts.add(1, &attrs);
    metrics.draft_duration_ms.record(duration_ms as f64, &attrs);
}

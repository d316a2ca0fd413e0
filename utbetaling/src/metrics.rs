//! Prometheus metrics for dispatch and reconciliation

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Oppdrag send attempts by outcome
    pub static ref OPPDRAG_SENT_TOTAL: CounterVec = register_counter_vec!(
        "utbetaling_oppdrag_sent_total",
        "Oppdrag send attempts",
        &["status"]
    )
    .unwrap();

    /// Kvitteringer recorded by status
    pub static ref KVITTERING_TOTAL: CounterVec = register_counter_vec!(
        "utbetaling_kvittering_total",
        "Kvitteringer recorded",
        &["status"]
    )
    .unwrap();

    /// Kvitteringer skipped as unreadable or unmatched
    pub static ref KVITTERING_REJECTED_TOTAL: CounterVec = register_counter_vec!(
        "utbetaling_kvittering_rejected_total",
        "Kvitteringer that could not be applied",
        &["reason"]
    )
    .unwrap();

    /// Reconciliation runs by job and outcome
    pub static ref AVSTEMMING_RUNS_TOTAL: CounterVec = register_counter_vec!(
        "utbetaling_avstemming_runs_total",
        "Reconciliation runs",
        &["job", "outcome"]
    )
    .unwrap();

    /// Reconciliation run duration
    pub static ref AVSTEMMING_DURATION: HistogramVec = register_histogram_vec!(
        "utbetaling_avstemming_duration_seconds",
        "Reconciliation run duration in seconds",
        &["job"]
    )
    .unwrap();

    /// Consistency discrepancies by kind
    pub static ref AVVIK_TOTAL: CounterVec = register_counter_vec!(
        "utbetaling_konsistens_avvik_total",
        "Discrepancies found by consistency reconciliation",
        &["kind"]
    )
    .unwrap();
}

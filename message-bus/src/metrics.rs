//! Bus metrics, labelled by subject
//!
//! - `bus_publish_total{subject,outcome}`: publishes by `ok`, `timeout` or `failed`
//! - `bus_publish_timeouts_total{subject}`: publishes cut off by the publish timeout
//! - `bus_publish_duration_seconds{subject}`
//! - `bus_handled_total{subject}`: messages handed to a handler
//! - `bus_handler_failures_total{subject}`: handler returned an error
//! - `bus_handler_duration_seconds{subject}`
//! - `bus_connect_attempts_total{outcome}`

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

lazy_static! {
    pub static ref BUS_PUBLISH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bus_publish_total",
        "Publishes by outcome",
        &["subject", "outcome"]
    )
    .unwrap();

    pub static ref BUS_PUBLISH_TIMEOUTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bus_publish_timeouts_total",
        "Publishes that exceeded the publish timeout",
        &["subject"]
    )
    .unwrap();

    pub static ref BUS_PUBLISH_DURATION: HistogramVec = register_histogram_vec!(
        "bus_publish_duration_seconds",
        "Time to hand a message to the transport",
        &["subject"],
        vec![0.001, 0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .unwrap();

    pub static ref BUS_HANDLED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bus_handled_total",
        "Messages delivered to a handler",
        &["subject"]
    )
    .unwrap();

    pub static ref BUS_HANDLER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bus_handler_failures_total",
        "Messages whose handler returned an error",
        &["subject"]
    )
    .unwrap();

    pub static ref BUS_HANDLER_DURATION: HistogramVec = register_histogram_vec!(
        "bus_handler_duration_seconds",
        "Handler duration",
        &["subject"]
    )
    .unwrap();

    pub static ref BUS_CONNECT_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bus_connect_attempts_total",
        "Connection attempts by outcome",
        &["outcome"]
    )
    .unwrap();
}

// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.
//! Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Sadhya metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("sadhya_inbound_events_total", "Inbound webhook events by payload kind");
    describe_counter!("sadhya_transitions_total", "Committed transitions by resulting stage");
    describe_counter!(
        "sadhya_validation_rejections_total",
        "Inputs rejected and re-prompted, by stage"
    );
    describe_counter!(
        "sadhya_stale_transitions_total",
        "Duplicate or conflicting events answered without effect"
    );
    describe_counter!(
        "sadhya_verification_outcomes_total",
        "Verification link resolutions by outcome"
    );
    describe_counter!("sadhya_outbox_delivered_total", "Outbox jobs delivered, by job kind");
    describe_counter!("sadhya_outbox_failures_total", "Outbox job attempts that failed");
    describe_counter!("sadhya_sessions_reaped_total", "Sessions abandoned or dropped by the reaper");
    describe_histogram!(
        "sadhya_transition_latency_seconds",
        "Time from webhook receipt to committed transition"
    );
    describe_gauge!("sadhya_memory_heap_bytes", "Heap bytes allocated (jemalloc)");
    describe_gauge!("sadhya_memory_resident_bytes", "Resident bytes (jemalloc)");
}

/// Record an inbound event.
pub fn record_inbound(kind: &str) {
    metrics::counter!("sadhya_inbound_events_total", "kind" => kind.to_string()).increment(1);
}

/// Record a committed transition into `stage`.
pub fn record_transition(stage: &str) {
    metrics::counter!("sadhya_transitions_total", "stage" => stage.to_string()).increment(1);
}

/// Record an input rejected at `stage`.
pub fn record_rejection(stage: &str) {
    metrics::counter!("sadhya_validation_rejections_total", "stage" => stage.to_string())
        .increment(1);
}

/// Record a stale transition (`duplicate` or `conflict`).
pub fn record_stale(reason: &str) {
    metrics::counter!("sadhya_stale_transitions_total", "reason" => reason.to_string())
        .increment(1);
}

/// Record a verification link outcome.
pub fn record_verification(outcome: &str) {
    metrics::counter!("sadhya_verification_outcomes_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a delivered outbox job.
pub fn record_outbox_delivered(job: &str) {
    metrics::counter!("sadhya_outbox_delivered_total", "job" => job.to_string()).increment(1);
}

/// Record a failed outbox attempt; `parked` is true when no retry remains.
pub fn record_outbox_failure(job: &str, parked: bool) {
    metrics::counter!(
        "sadhya_outbox_failures_total",
        "job" => job.to_string(),
        "parked" => if parked { "true" } else { "false" }
    )
    .increment(1);
}

/// Record sessions removed by the reaper (`abandoned` or `dropped`).
pub fn record_reaped(action: &str, count: u64) {
    metrics::counter!("sadhya_sessions_reaped_total", "action" => action.to_string())
        .increment(count);
}

/// Record transition latency.
pub fn record_latency(seconds: f64) {
    metrics::histogram!("sadhya_transition_latency_seconds").record(seconds);
}

/// Set the jemalloc allocated-bytes gauge.
pub fn set_memory_heap(bytes: f64) {
    metrics::gauge!("sadhya_memory_heap_bytes").set(bytes);
}

/// Set the jemalloc resident-bytes gauge.
pub fn set_memory_resident(bytes: f64) {
    metrics::gauge!("sadhya_memory_resident_bytes").set(bytes);
}

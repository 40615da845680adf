//! Gateway counters
//!
//! Emitted through the `metrics` facade; without an installed recorder every
//! call is a no-op.
//!
//! - `gateway_requests_total` (counter): label `outcome`
//! - `gateway_refresh_total` (counter): label `result`
//! - `gateway_retries_total` (counter)

/// Record the final outcome of one dispatch.
pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("gateway_requests_total", "outcome" => outcome).increment(1);
}

/// Record one refresh network call and how it ended.
pub fn record_refresh(result: &'static str) {
    metrics::counter!("gateway_refresh_total", "result" => result).increment(1);
}

/// Record a retry sent after a successful refresh.
pub fn record_retry() {
    metrics::counter!("gateway_retries_total").increment(1);
}

use crate::{ErrorKind, InstanceKind, Status};
use http::StatusCode;
use std::time::Duration;

pub(crate) struct InFlightGuard {
    gauge: metrics::Gauge,
}

impl InFlightGuard {
    pub(crate) fn new() -> Self {
        let gauge = metrics::gauge!("ci_dashboard_upstream_inflight");
        gauge.increment(1.0);
        Self { gauge }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.decrement(1.0);
    }
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unauthorized => "unauthorized",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Remote => "remote",
        ErrorKind::Transport => "transport",
        ErrorKind::Decode => "decode",
        ErrorKind::InvalidConfig => "invalid_config",
    }
}

pub(crate) fn record_outcome(
    host: &str,
    status: Option<StatusCode>,
    latency: Duration,
    error_kind: Option<ErrorKind>,
) {
    let host = host.to_owned();
    let status_class = status.map(status_class).unwrap_or("transport");

    metrics::counter!(
        "ci_dashboard_upstream_requests_total",
        "host" => host.clone(),
        "status_class" => status_class
    )
    .increment(1);
    metrics::histogram!(
        "ci_dashboard_upstream_request_duration_seconds",
        "host" => host.clone(),
        "status_class" => status_class
    )
    .record(latency);

    if let Some(kind) = error_kind {
        metrics::counter!(
            "ci_dashboard_upstream_errors_total",
            "host" => host,
            "kind" => error_kind_label(kind)
        )
        .increment(1);
    }
}

pub(crate) fn record_aggregation(kind: InstanceKind, status: Status) {
    metrics::counter!(
        "ci_dashboard_aggregations_total",
        "type" => kind.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

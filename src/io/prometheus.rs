//! Prometheus metrics HTTP endpoint
//!
//! Exposes tracker metrics in Prometheus text format at /metrics and a
//! liveness probe at /health. Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with route label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    route: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{route=\"{route}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    route: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{route=\"{route}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{route=\"{route}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{route=\"{route}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{route=\"{route}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, route: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(4096);

    write_cycle_metrics(&mut output, route, &summary);
    write_fetch_metrics(&mut output, route, &summary);
    write_detection_metrics(&mut output, route, &summary);

    output
}

fn write_cycle_metrics(output: &mut String, route: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "farewatch_cycles_total",
        "Completed tracking cycles",
        MetricType::Counter,
        route,
        summary.cycles_total,
    );
    write_metric(
        output,
        "farewatch_last_cycle_duration_ms",
        "Duration of the most recent cycle in milliseconds",
        MetricType::Gauge,
        route,
        summary.last_cycle_duration_ms,
    );
    write_metric(
        output,
        "farewatch_last_cycle_finished_ms",
        "Epoch milliseconds at which the most recent cycle finished",
        MetricType::Gauge,
        route,
        summary.last_cycle_finished_ms,
    );
    write_metric(
        output,
        "farewatch_tracked_dates",
        "Dates with a recorded lowest price",
        MetricType::Gauge,
        route,
        summary.tracked_dates,
    );
    write_metric(
        output,
        "farewatch_uptime_seconds",
        "Seconds since process start",
        MetricType::Gauge,
        route,
        summary.uptime_secs,
    );
}

fn write_fetch_metrics(output: &mut String, route: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "farewatch_fetch_requests_total",
        "Per-date provider fetches",
        MetricType::Counter,
        route,
        summary.fetch_requests_total,
    );
    write_metric(
        output,
        "farewatch_fetch_failures_total",
        "Per-date provider fetches that failed or timed out",
        MetricType::Counter,
        route,
        summary.fetch_failures_total,
    );
    write_metric(
        output,
        "farewatch_fetch_failure_streak_alerts_total",
        "Dates whose consecutive fetch failures reached the alert threshold",
        MetricType::Counter,
        route,
        summary.fetch_streak_alerts_total,
    );
    write_histogram(
        output,
        "farewatch_fetch_latency_ms",
        "Per-date fetch latency in milliseconds",
        route,
        &summary.fetch_lat_buckets,
        summary.fetch_lat_avg_ms,
    );
    write_metric(
        output,
        "farewatch_fetch_latency_p99_ms",
        "99th percentile fetch latency",
        MetricType::Gauge,
        route,
        summary.fetch_lat_p99_ms,
    );
    write_metric(
        output,
        "farewatch_fetch_latency_max_ms",
        "Maximum fetch latency",
        MetricType::Gauge,
        route,
        summary.fetch_lat_max_ms,
    );
    write_metric(
        output,
        "farewatch_quotes_accepted_total",
        "Quotes that normalized to a usable price",
        MetricType::Counter,
        route,
        summary.quotes_accepted_total,
    );
    write_metric(
        output,
        "farewatch_quotes_rejected_total",
        "Quotes dropped for an unusable price",
        MetricType::Counter,
        route,
        summary.quotes_rejected_total,
    );
}

fn write_detection_metrics(output: &mut String, route: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "farewatch_first_seen_total",
        "Dates recorded for the first time",
        MetricType::Counter,
        route,
        summary.first_seen_total,
    );
    write_metric(
        output,
        "farewatch_drops_total",
        "Price drops detected",
        MetricType::Counter,
        route,
        summary.drops_total,
    );
    write_metric(
        output,
        "farewatch_notifications_sent_total",
        "Drop reports delivered",
        MetricType::Counter,
        route,
        summary.notifications_sent_total,
    );
    write_metric(
        output,
        "farewatch_notifications_failed_total",
        "Drop reports that failed to deliver",
        MetricType::Counter,
        route,
        summary.notifications_failed_total,
    );
    write_metric(
        output,
        "farewatch_ledger_errors_total",
        "Ledger read, write or flush failures",
        MetricType::Counter,
        route,
        summary.ledger_errors_total,
    );
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

/// HTTP request handler
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    route: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &route);
            let mut response = text_response(StatusCode::OK, body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            Ok(response)
        }
        (&Method::GET, "/health") => Ok(text_response(StatusCode::OK, "ok".to_string())),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found".to_string())),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    route: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let route = Arc::new(route);

    info!(port = %port, route = %route, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let route = route.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let route = route.clone();
                                async move { handle_request(req, metrics, route).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

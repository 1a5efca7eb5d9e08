//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and strongly-typed settlement and task metrics, and an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Settlement-related metrics, updated by the reservation code paths.
#[derive(Clone)]
pub struct SettlementMetrics {
    /// Reservations committed on this mint (canonical or hop).
    pub transactions_reserved: IntCounter,
    /// Reservations refused, labelled by error code.
    pub transactions_rejected: IntCounterVec,
    /// Hop requests answered from an existing crossing.
    pub hops_replayed: IntCounter,
    /// Wall time of a reservation on this mint, including forwarding.
    pub reservation_seconds: Histogram,
}

impl SettlementMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let transactions_reserved = IntCounter::with_opts(Opts::new(
            "settlement_transactions_reserved",
            "Total number of reservations committed by this mint",
        ))?;
        registry.register(Box::new(transactions_reserved.clone()))?;

        let transactions_rejected = IntCounterVec::new(
            Opts::new(
                "settlement_transactions_rejected",
                "Total number of reservations refused, by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let hops_replayed = IntCounter::with_opts(Opts::new(
            "settlement_hops_replayed",
            "Hop requests absorbed because the crossing already existed",
        ))?;
        registry.register(Box::new(hops_replayed.clone()))?;

        let reservation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "settlement_reservation_seconds",
                "Time to reserve a transaction on this mint in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(reservation_seconds.clone()))?;

        Ok(Self {
            transactions_reserved,
            transactions_rejected,
            hops_replayed,
            reservation_seconds,
        })
    }
}

/// Background task metrics, labelled by task kind.
#[derive(Clone)]
pub struct TaskMetrics {
    pub succeeded: IntCounterVec,
    pub retried: IntCounterVec,
    /// Tasks that exhausted their retries or failed fatally.
    pub failed: IntCounterVec,
}

impl TaskMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let succeeded = IntCounterVec::new(
            Opts::new("tasks_succeeded", "Task executions that succeeded"),
            &["kind"],
        )?;
        registry.register(Box::new(succeeded.clone()))?;

        let retried = IntCounterVec::new(
            Opts::new("tasks_retried", "Task executions rescheduled after a retryable error"),
            &["kind"],
        )?;
        registry.register(Box::new(retried.clone()))?;

        let failed = IntCounterVec::new(
            Opts::new("tasks_failed", "Tasks marked permanently failed"),
            &["kind"],
        )?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            succeeded,
            retried,
            failed,
        })
    }
}

/// Wrapper around a Prometheus registry and the mint metrics.
///
/// This is the main handle you pass around in the mint. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub settlement: SettlementMetrics,
    pub tasks: TaskMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh registry under the
    /// `mint` namespace.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("mint".to_string()), None)?;
        let settlement = SettlementMetrics::register(&registry)?;
        let tasks = TaskMetrics::register(&registry)?;
        Ok(Self {
            registry,
            settlement,
            tasks,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(error = %err, "metrics connection error");
            }
        });
    }
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut response = text_response(StatusCode::OK, metrics.gather_text());
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            Ok(response)
        }
        _ => Ok(text_response(StatusCode::NOT_FOUND, "not found".to_string())),
    }
}

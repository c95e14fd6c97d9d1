// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters and the `/metrics` endpoint.

use anyhow::Result;
use axum::{http::header, response::IntoResponse, routing::get, Router};
use hyper::StatusCode;
use lazy_static::lazy_static;
use log::{info, warn};
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};
use tokio::net::TcpListener;

// Register the metrics into the global metrics registry.
lazy_static! {
    pub static ref RECEIPTS_INGESTED: IntCounter = register_int_counter!(
        "receipts_ingested_total",
        "Number of receipts created from accepted uploads."
    )
    .unwrap();
    pub static ref UPLOAD_REJECTED: IntCounter = register_int_counter!(
        "upload_rejected_total",
        "Number of uploads rejected before a receipt was created."
    )
    .unwrap();
    pub static ref DISPATCH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "dispatch_failure_total",
        "Number of receipts that could not be handed to the extraction service.",
        &["kind"]
    )
    .unwrap();
    pub static ref CALLBACKS_RESOLVED: IntCounterVec = register_int_counter_vec!(
        "callback_resolved_total",
        "Number of extraction callbacks by outcome.",
        &["outcome"]
    )
    .unwrap();
    pub static ref STALE_RECEIPTS_EXPIRED: IntCounter = register_int_counter!(
        "stale_receipts_expired_total",
        "Number of receipts failed because their extraction result never arrived."
    )
    .unwrap();
}

async fn handle_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
            buffer,
        ),
        Err(err) => {
            warn!("Failed to encode metrics: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_owned())],
                err.to_string().into_bytes(),
            )
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(handle_metrics))
}

/// Serves the global registry on `0.0.0.0:{port}/metrics` until the process
/// exits.
pub async fn run_server(port: u16) -> Result<()> {
    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    info!("Metrics server listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use hyper::{Request, StatusCode};
    use tower::ServiceExt;

    use super::{router, RECEIPTS_INGESTED};

    #[tokio::test]
    async fn exposes_registered_counters() {
        RECEIPTS_INGESTED.inc();

        let response = router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("receipts_ingested_total"));
    }
}

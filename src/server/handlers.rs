// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Route handlers.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::aggregator::TelemetryStatus;
use crate::error::IngestError;
use crate::otlp::{
    count_spans, decode_logs, decode_metrics, ExportLogsServiceRequest,
    ExportMetricsServiceRequest, ExportTraceServiceRequest,
};
use crate::stats::StatsSnapshot;

use super::body::parse_body;
use super::AppState;

type Body = Result<Bytes, BytesRejection>;

pub(crate) async fn ingest_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let result = parse_body::<ExportMetricsServiceRequest>(&headers, body, state.max_body_bytes)
        .await
        .map(|request| apply_metrics(&state, &request));
    respond(&state, "metrics", started, result)
}

pub(crate) async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let result = parse_body::<ExportLogsServiceRequest>(&headers, body, state.max_body_bytes)
        .await
        .map(|request| apply_logs(&state, &request));
    respond(&state, "logs", started, result)
}

/// Traces are validated and counted, never aggregated.
pub(crate) async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    let result = parse_body::<ExportTraceServiceRequest>(&headers, body, state.max_body_bytes)
        .await
        .map(|request| {
            let spans = count_spans(&request);
            state.stats.record_spans(spans);
            debug!(spans, "Received trace spans");
        });
    respond(&state, "traces", started, result)
}

pub(crate) async fn status(State(state): State<AppState>) -> Json<TelemetryStatus> {
    Json(state.aggregator.snapshot())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

pub(crate) async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

fn apply_metrics(state: &AppState, request: &ExportMetricsServiceRequest) {
    let records = decode_metrics(request);
    let report = state.aggregator.apply_metrics(&records);
    state.stats.record_metrics(records.len(), &report);

    debug!(
        records = records.len(),
        applied = report.applied,
        latched = report.latched,
        unknown = report.unknown,
        invalid = report.invalid,
        "Processed metrics payload"
    );

    if let Some(status) = report.snapshot {
        state.notifier.notify(&status);
    }
}

fn apply_logs(state: &AppState, request: &ExportLogsServiceRequest) {
    let records = decode_logs(request, Utc::now().timestamp_millis());
    let report = state.aggregator.apply_logs(&records);

    let ignored = records.iter().filter(|r| !r.is_usage_event());
    state.stats.record_logs(
        records.len(),
        records.len() - report.ignored,
        ignored.map(|r| r.event_name.as_str()),
    );

    for record in &records {
        if let Some(body) = &record.body {
            trace!(event = %record.event_name, timestamp_ms = record.timestamp_ms, body = %body, "Log record");
        }
    }
    debug!(
        records = records.len(),
        applied = report.applied,
        ignored = report.ignored,
        "Processed logs payload"
    );

    if let Some(status) = report.snapshot {
        state.notifier.notify(&status);
    }
}

fn respond(
    state: &AppState,
    route: &'static str,
    started: Instant,
    result: Result<(), IngestError>,
) -> Response {
    state
        .stats
        .record_request(route, started.elapsed(), result.is_ok());

    match result {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => {
            warn!(route, status = err.status_code().as_u16(), error = %err, "Rejected OTLP request");
            err.into_response()
        }
    }
}

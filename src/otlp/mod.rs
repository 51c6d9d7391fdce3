// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP/HTTP JSON payload parsing.
//!
//! - [`wire`] - serde models of the export request bodies
//! - [`value`] - tagged-union decoding of attribute values
//! - [`decode`] - flattening into [`DecodedMetric`] / [`DecodedLog`] records
//!
//! Decoding is tolerant: unknown metric shapes, missing attributes and
//! absent data points are skipped, never treated as errors.

pub mod decode;
pub mod value;
pub mod wire;

pub use decode::{
    count_spans, decode_logs, decode_metrics, DecodedLog, DecodedMetric, LineChange, MetricKind,
    TokenType, UsageEvent, SESSION_ID_ATTR, USAGE_EVENTS,
};
pub use value::{AnyValue, Attributes, KeyValue};
pub use wire::{ExportLogsServiceRequest, ExportMetricsServiceRequest, ExportTraceServiceRequest};

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP/HTTP JSON request bodies.
//!
//! Only the fields this receiver reads are modelled. Every field is
//! optional: missing fields and explicit `null`s decode as empty, and
//! unknown fields (`exponentialHistogram`, `summary`, exemplars, ...) are
//! ignored.

use serde::{Deserialize, Deserializer};

use super::value::{lenient_f64, lenient_i64, lenient_u64, AnyValue, KeyValue};

/// Treat `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Resource (the reporting process).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<KeyValue>,
}

// ============================================================================
// Metrics
// ============================================================================

/// Body of `POST /v1/metrics`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportMetricsServiceRequest {
    #[serde(deserialize_with = "nullable")]
    pub resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceMetrics {
    pub resource: Option<Resource>,
    #[serde(deserialize_with = "nullable")]
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeMetrics {
    #[serde(deserialize_with = "nullable")]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metric {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub sum: Option<NumberPoints>,
    pub gauge: Option<NumberPoints>,
    pub histogram: Option<HistogramPoints>,
}

/// Data points of a `sum` or `gauge` metric.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberPoints {
    #[serde(deserialize_with = "nullable")]
    pub data_points: Vec<NumberDataPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberDataPoint {
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<KeyValue>,
    #[serde(deserialize_with = "lenient_i64")]
    pub as_int: Option<i64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub as_double: Option<f64>,
}

impl NumberDataPoint {
    /// `asDouble` wins over `asInt` when both are present.
    pub fn value(&self) -> Option<f64> {
        self.as_double.or(self.as_int.map(|i| i as f64))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistogramPoints {
    #[serde(deserialize_with = "nullable")]
    pub data_points: Vec<HistogramDataPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistogramDataPoint {
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<KeyValue>,
    #[serde(deserialize_with = "lenient_u64")]
    pub count: Option<u64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub sum: Option<f64>,
}

impl HistogramDataPoint {
    /// Histogram value is its `sum`, falling back to `count`.
    pub fn value(&self) -> Option<f64> {
        self.sum.or(self.count.map(|c| c as f64))
    }
}

// ============================================================================
// Logs
// ============================================================================

/// Body of `POST /v1/logs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportLogsServiceRequest {
    #[serde(deserialize_with = "nullable")]
    pub resource_logs: Vec<ResourceLogs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLogs {
    pub resource: Option<Resource>,
    #[serde(deserialize_with = "nullable")]
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeLogs {
    #[serde(deserialize_with = "nullable")]
    pub log_records: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogRecord {
    #[serde(deserialize_with = "lenient_u64")]
    pub time_unix_nano: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub observed_time_unix_nano: Option<u64>,
    pub body: Option<AnyValue>,
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<KeyValue>,
    /// Top-level event name (newer OTLP versions).
    pub event_name: Option<String>,
}

// ============================================================================
// Traces
// ============================================================================

/// Body of `POST /v1/traces`. Spans are only counted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportTraceServiceRequest {
    #[serde(deserialize_with = "nullable")]
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSpans {
    #[serde(deserialize_with = "nullable")]
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeSpans {
    #[serde(deserialize_with = "nullable")]
    pub spans: Vec<serde::de::IgnoredAny>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_fields_decode_empty() {
        let req: ExportMetricsServiceRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.resource_metrics.is_empty());

        let req: ExportMetricsServiceRequest =
            serde_json::from_value(json!({"resourceMetrics": null})).unwrap();
        assert!(req.resource_metrics.is_empty());

        let req: ExportLogsServiceRequest = serde_json::from_value(json!({
            "resourceLogs": [{"scopeLogs": [{"logRecords": null}]}]
        }))
        .unwrap();
        assert!(req.resource_logs[0].scope_logs[0].log_records.is_empty());
    }

    #[test]
    fn test_number_point_value_accepts_string_int64() {
        let point: NumberDataPoint =
            serde_json::from_value(json!({"asInt": "1200", "timeUnixNano": "1700000000000000000"}))
                .unwrap();
        assert_eq!(point.value(), Some(1200.0));
    }

    #[test]
    fn test_histogram_value_falls_back_to_count() {
        let point: HistogramDataPoint = serde_json::from_value(json!({"count": "7"})).unwrap();
        assert_eq!(point.value(), Some(7.0));

        let point: HistogramDataPoint =
            serde_json::from_value(json!({"count": 7, "sum": 12.5})).unwrap();
        assert_eq!(point.value(), Some(12.5));
    }

    #[test]
    fn test_unknown_metric_shapes_are_ignored() {
        let metric: Metric = serde_json::from_value(json!({
            "name": "claude_code.some.summary",
            "summary": {"dataPoints": [{"count": 1}]}
        }))
        .unwrap();
        assert!(metric.sum.is_none() && metric.gauge.is_none() && metric.histogram.is_none());
    }

    #[test]
    fn test_trace_request_counts_spans() {
        let req: ExportTraceServiceRequest = serde_json::from_value(json!({
            "resourceSpans": [{"scopeSpans": [{"spans": [{"name": "a"}, {"name": "b"}]}]}]
        }))
        .unwrap();
        assert_eq!(req.resource_spans[0].scope_spans[0].spans.len(), 2);
    }
}

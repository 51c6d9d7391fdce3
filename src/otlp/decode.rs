// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Flattening of OTLP requests into decoded records.
//!
//! Pure functions: walk resource -> scope -> metric/log record and yield
//! one [`DecodedMetric`] per metric (its first data point) and one
//! [`DecodedLog`] per log record. Nothing here touches aggregate state.

use tracing::debug;

use super::value::{AnyValue, Attributes, KeyValue};
use super::wire::{
    ExportLogsServiceRequest, ExportMetricsServiceRequest, ExportTraceServiceRequest, Metric,
    Resource,
};

/// Attribute carrying the assistant session identifier.
pub const SESSION_ID_ATTR: &str = "session.id";

/// Prefix the assistant puts on its metric and event names.
const NAME_PREFIX: &str = "claude_code.";

/// Event names that carry authoritative token/cost usage.
pub const USAGE_EVENTS: &[&str] = &["api_request", "user_prompt"];

/// A metric's first data point, ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMetric {
    pub name: String,
    pub value: f64,
    pub attributes: Attributes,
}

/// Metrics this receiver aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Sessions,
    TokenUsage,
    Cost,
    LinesOfCode,
    /// Active time; `seconds` is true when the metric reports seconds.
    ActiveTime { seconds: bool },
    ToolUsage,
}

impl MetricKind {
    /// Classify a metric name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match strip_prefix(name) {
            "sessions.count" | "session.count" => Self::Sessions,
            "token.usage" | "claude.tokens.total" => Self::TokenUsage,
            "cost.usage" | "claude.api_cost.total" => Self::Cost,
            "lines_of_code.count" => Self::LinesOfCode,
            "active_time.ms" | "claude.active_time.duration" => {
                Self::ActiveTime { seconds: false }
            }
            "active_time.total" => Self::ActiveTime { seconds: true },
            "tool_usage.count" | "claude.tool_usage.total" => Self::ToolUsage,
            _ => return None,
        };
        Some(kind)
    }
}

/// Token counter a `token.usage` data point targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Input,
    Output,
    CacheRead,
    CacheCreation,
}

impl TokenType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "cacheRead" | "cache_read" => Some(Self::CacheRead),
            "cacheCreation" | "cache_creation" => Some(Self::CacheCreation),
            _ => None,
        }
    }
}

/// Direction of a `lines_of_code.count` data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    Added,
    Removed,
}

impl LineChange {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl DecodedMetric {
    pub fn kind(&self) -> Option<MetricKind> {
        MetricKind::from_name(&self.name)
    }

    pub fn token_type(&self) -> Option<TokenType> {
        self.attributes
            .first_str(&["type", "token_type"])
            .and_then(|t| TokenType::parse(&t))
    }

    pub fn line_change(&self) -> Option<LineChange> {
        self.attributes
            .first_str(&["type", "operation"])
            .and_then(|t| LineChange::parse(&t))
    }

    /// Tool name, `"unknown"` when the data point does not say.
    pub fn tool_name(&self) -> String {
        self.attributes
            .first_str(&["tool", "tool_name"])
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn session_id(&self) -> Option<String> {
        self.attributes.get_str(SESSION_ID_ATTR)
    }
}

/// One log record, ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Event name with any `claude_code.` prefix removed; empty if absent.
    pub event_name: String,
    pub attributes: Attributes,
    /// Body rendered for display only.
    pub body: Option<String>,
    pub timestamp_ms: i64,
}

/// Usage figures carried by an `api_request` / `user_prompt` event.
///
/// Absent or non-numeric attributes read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageEvent {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cost_usd: f64,
}

impl UsageEvent {
    /// Whether any token counter is non-zero.
    pub fn has_tokens(&self) -> bool {
        self.input_tokens > 0
            || self.output_tokens > 0
            || self.cache_read_tokens > 0
            || self.cache_creation_tokens > 0
    }

    pub fn has_cost(&self) -> bool {
        self.cost_usd > 0.0
    }
}

impl DecodedLog {
    pub fn is_usage_event(&self) -> bool {
        USAGE_EVENTS.contains(&self.event_name.as_str())
    }

    /// Usage figures, if this is a usage event.
    pub fn usage(&self) -> Option<UsageEvent> {
        if !self.is_usage_event() {
            return None;
        }
        let attrs = &self.attributes;
        Some(UsageEvent {
            input_tokens: attrs.get_u64("input_tokens").unwrap_or(0),
            output_tokens: attrs.get_u64("output_tokens").unwrap_or(0),
            cache_read_tokens: attrs.get_u64("cache_read_tokens").unwrap_or(0),
            cache_creation_tokens: attrs.get_u64("cache_creation_tokens").unwrap_or(0),
            cost_usd: attrs
                .get_f64("cost_usd")
                .filter(|c| c.is_finite() && *c >= 0.0)
                .unwrap_or(0.0),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        self.attributes.get_str(SESSION_ID_ATTR)
    }
}

fn strip_prefix(name: &str) -> &str {
    name.strip_prefix(NAME_PREFIX).unwrap_or(name)
}

/// Flatten point attributes, inheriting the resource's `session.id` when
/// the point has none.
fn flatten_attributes(pairs: &[KeyValue], resource_session: Option<&AnyValue>) -> Attributes {
    let mut attributes = Attributes::from_key_values(pairs);
    if let Some(session) = resource_session {
        if !attributes.contains(SESSION_ID_ATTR) {
            attributes.insert(SESSION_ID_ATTR, session.clone());
        }
    }
    attributes
}

fn resource_session(resource: Option<&Resource>) -> Option<AnyValue> {
    resource.and_then(|r| {
        r.attributes
            .iter()
            .find(|kv| kv.key == SESSION_ID_ATTR && kv.value.is_scalar())
            .map(|kv| kv.value.clone())
    })
}

/// First data point of the first wrapper that has any: `sum`, then
/// `gauge`, then `histogram`. Later points are not read.
fn first_point(metric: &Metric) -> Option<(&[KeyValue], Option<f64>)> {
    let number = [metric.sum.as_ref(), metric.gauge.as_ref()]
        .into_iter()
        .flatten()
        .find_map(|points| points.data_points.first());
    if let Some(point) = number {
        return Some((point.attributes.as_slice(), point.value()));
    }

    metric
        .histogram
        .as_ref()
        .and_then(|hist| hist.data_points.first())
        .map(|point| (point.attributes.as_slice(), point.value()))
}

/// Decode a metrics request into one record per metric.
pub fn decode_metrics(request: &ExportMetricsServiceRequest) -> Vec<DecodedMetric> {
    let mut records = Vec::new();

    for rm in &request.resource_metrics {
        let session = resource_session(rm.resource.as_ref());
        for sm in &rm.scope_metrics {
            for metric in &sm.metrics {
                if metric.name.is_empty() {
                    debug!("Skipping metric without a name");
                    continue;
                }

                let Some((attrs, value)) = first_point(metric) else {
                    debug!(metric = %metric.name, "Skipping metric without data points");
                    continue;
                };
                let Some(value) = value else {
                    debug!(metric = %metric.name, "Skipping data point without a value");
                    continue;
                };
                records.push(DecodedMetric {
                    name: metric.name.clone(),
                    value,
                    attributes: flatten_attributes(attrs, session.as_ref()),
                });
            }
        }
    }

    records
}

/// Decode a logs request into one record per log record.
///
/// `received_ms` is used when a record carries no timestamp.
pub fn decode_logs(request: &ExportLogsServiceRequest, received_ms: i64) -> Vec<DecodedLog> {
    let mut records = Vec::new();

    for rl in &request.resource_logs {
        let session = resource_session(rl.resource.as_ref());
        for sl in &rl.scope_logs {
            for log in &sl.log_records {
                let attributes = flatten_attributes(&log.attributes, session.as_ref());

                let event_name = attributes
                    .first_str(&["event.name", "event_name"])
                    .or_else(|| log.event_name.clone())
                    .map(|name| strip_prefix(&name).to_string())
                    .unwrap_or_default();

                let body = log
                    .body
                    .as_ref()
                    .filter(|b| **b != AnyValue::Empty)
                    .map(ToString::to_string);

                let timestamp_ms = log
                    .time_unix_nano
                    .filter(|ns| *ns > 0)
                    .or(log.observed_time_unix_nano.filter(|ns| *ns > 0))
                    .map(|ns| i64::try_from(ns / 1_000_000).unwrap_or(i64::MAX))
                    .unwrap_or(received_ms);

                records.push(DecodedLog {
                    event_name,
                    attributes,
                    body,
                    timestamp_ms,
                });
            }
        }
    }

    records
}

/// Number of spans in a traces request.
pub fn count_spans(request: &ExportTraceServiceRequest) -> usize {
    request
        .resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .map(|ss| ss.spans.len())
        .sum()
}

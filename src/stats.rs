// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Receiver self-metrics.
//!
//! Counts requests per ingestion route, their latency distribution, and
//! what happened to the decoded records. Exposed at `GET /stats` and used
//! for the shutdown summary.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::aggregator::ApplyReport;

/// Name recorded for log records without an event name.
const UNNAMED_EVENT: &str = "<none>";

/// Distinct ignored event names tracked before folding into [`OTHER_EVENTS`].
pub const MAX_EVENT_NAMES: usize = 64;

/// Bucket for event names past [`MAX_EVENT_NAMES`].
const OTHER_EVENTS: &str = "<other>";

/// Longest event name kept, in characters.
const MAX_EVENT_NAME_LEN: usize = 128;

/// Ingestion statistics for one receiver instance.
#[derive(Debug)]
pub struct IngestStats {
    routes: RwLock<BTreeMap<String, RouteStats>>,
    ignored_events: RwLock<BTreeMap<String, u64>>,
    records: RecordCounters,
    start_time: Instant,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(BTreeMap::new()),
            ignored_events: RwLock::new(BTreeMap::new()),
            records: RecordCounters::default(),
            start_time: Instant::now(),
        }
    }

    /// Record one request on `route`.
    pub fn record_request(&self, route: &str, duration: Duration, accepted: bool) {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        routes
            .entry(route.to_string())
            .or_default()
            .record(duration, accepted);
    }

    /// Record the outcome of a metrics payload.
    pub fn record_metrics(&self, decoded: usize, report: &ApplyReport) {
        let c = &self.records;
        c.metric_records.fetch_add(decoded as u64, Ordering::Relaxed);
        c.unknown_metrics.fetch_add(report.unknown as u64, Ordering::Relaxed);
        c.latched_metrics.fetch_add(report.latched as u64, Ordering::Relaxed);
        c.invalid_metrics.fetch_add(report.invalid as u64, Ordering::Relaxed);
    }

    /// Record the outcome of a logs payload.
    pub fn record_logs<'a, I>(&self, decoded: usize, usage_events: usize, ignored: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let c = &self.records;
        c.log_records.fetch_add(decoded as u64, Ordering::Relaxed);
        c.usage_events.fetch_add(usage_events as u64, Ordering::Relaxed);

        let mut events = self
            .ignored_events
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for name in ignored {
            let name = if name.is_empty() { UNNAMED_EVENT } else { name };
            let key: String = name.chars().take(MAX_EVENT_NAME_LEN).collect();
            let key = if events.contains_key(&key) || events.len() < MAX_EVENT_NAMES {
                key
            } else {
                OTHER_EVENTS.to_string()
            };
            let count = events.entry(key).or_insert(0);
            *count = count.saturating_add(1);
        }
    }

    /// Record spans seen in a traces payload.
    pub fn record_spans(&self, count: usize) {
        self.records.spans.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        let ignored = self
            .ignored_events
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let c = &self.records;

        StatsSnapshot {
            uptime_secs: self.uptime().as_secs_f64(),
            routes: routes
                .iter()
                .map(|(name, stats)| (name.clone(), RouteSummary::from(stats)))
                .collect(),
            metric_records: c.metric_records.load(Ordering::Relaxed),
            unknown_metrics: c.unknown_metrics.load(Ordering::Relaxed),
            latched_metrics: c.latched_metrics.load(Ordering::Relaxed),
            invalid_metrics: c.invalid_metrics.load(Ordering::Relaxed),
            log_records: c.log_records.load(Ordering::Relaxed),
            usage_events: c.usage_events.load(Ordering::Relaxed),
            ignored_events: ignored.clone(),
            spans: c.spans.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.ignored_events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.records.reset();
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct RecordCounters {
    metric_records: AtomicU64,
    unknown_metrics: AtomicU64,
    latched_metrics: AtomicU64,
    invalid_metrics: AtomicU64,
    log_records: AtomicU64,
    usage_events: AtomicU64,
    spans: AtomicU64,
}

impl RecordCounters {
    fn reset(&self) {
        for counter in [
            &self.metric_records,
            &self.unknown_metrics,
            &self.latched_metrics,
            &self.invalid_metrics,
            &self.log_records,
            &self.usage_events,
            &self.spans,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Request metrics for one route.
#[derive(Debug, Clone)]
pub struct RouteStats {
    pub accepted: u64,
    /// Requests answered with an error status.
    pub rejected: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl RouteStats {
    pub fn new() -> Self {
        Self {
            accepted: 0,
            rejected: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn requests(&self) -> u64 {
        self.accepted + self.rejected
    }

    pub fn avg_duration(&self) -> Duration {
        match self.requests() {
            0 => Duration::ZERO,
            n => self.total_duration / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }
}

impl Default for RouteStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in microseconds; the final count is the overflow bucket.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Approximate percentile, reported as the upper bound of its bucket.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p90(&self) -> Duration {
        self.percentile(90.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us, 1ms, 10ms, 100ms, 1s
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000])
    }
}

/// Serializable per-route summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub accepted: u64,
    pub rejected: u64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl From<&RouteStats> for RouteSummary {
    fn from(stats: &RouteStats) -> Self {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        Self {
            accepted: stats.accepted,
            rejected: stats.rejected,
            avg_ms: ms(stats.avg_duration()),
            p50_ms: ms(stats.histogram.p50()),
            p90_ms: ms(stats.histogram.p90()),
            p99_ms: ms(stats.histogram.p99()),
            max_ms: ms(stats.max_duration),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime_secs: f64,
    pub routes: BTreeMap<String, RouteSummary>,
    pub metric_records: u64,
    pub unknown_metrics: u64,
    pub latched_metrics: u64,
    pub invalid_metrics: u64,
    pub log_records: u64,
    pub usage_events: u64,
    /// Non-usage log events by event name.
    pub ignored_events: BTreeMap<String, u64>,
    pub spans: u64,
}

impl StatsSnapshot {
    /// Human-readable report, printed on shutdown.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Receiver Stats ===\n\n");
        report.push_str(&format!("Uptime: {:.1}s\n", self.uptime_secs));
        report.push_str(&format!(
            "Metrics: {} records ({} unknown, {} latched, {} invalid)\n",
            self.metric_records, self.unknown_metrics, self.latched_metrics, self.invalid_metrics
        ));
        report.push_str(&format!(
            "Logs: {} records, {} usage events\n",
            self.log_records, self.usage_events
        ));
        report.push_str(&format!("Spans: {}\n", self.spans));

        if !self.routes.is_empty() {
            report.push_str("\nRoutes:\n");
            for (name, route) in &self.routes {
                report.push_str(&format!(
                    "  {}: {} ok, {} rejected, avg {:.2}ms, p99 {:.2}ms\n",
                    name, route.accepted, route.rejected, route.avg_ms, route.p99_ms
                ));
            }
        }

        if !self.ignored_events.is_empty() {
            report.push_str("\nIgnored events:\n");
            for (name, count) in &self.ignored_events {
                report.push_str(&format!("  {}: {}\n", name, count));
            }
        }

        report
    }
}

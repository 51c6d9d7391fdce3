// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Aggregation of decoded records into a single [`TelemetryStatus`].
//!
//! The [`Aggregator`] is the only writer of the status. All updates go
//! through one mutex, and a whole request's records are applied under a
//! single lock acquisition, so concurrent payloads never interleave.
//!
//! # Source precedence
//!
//! Tokens and cost arrive on two channels. The logs channel (per-request
//! `api_request` events) is authoritative: once a logs event records a
//! non-zero value for a field group, the group latches to
//! [`SourceLatch::Logs`] and later metrics-channel updates to it are
//! skipped.
//!
//! Counters saturate at `u64::MAX` and cost at `f64::MAX`.

mod status;

pub use status::{Latches, SourceLatch, TelemetryStatus};

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, trace};

use crate::otlp::{DecodedLog, DecodedMetric, LineChange, MetricKind, TokenType};

/// What applying one metric record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEffect {
    /// At least one field changed.
    Applied,
    /// Known metric, but it did not change anything (e.g. a zero delta).
    Unchanged,
    /// Skipped because the logs channel owns this field group.
    Latched,
    /// Unknown metric name.
    Unknown,
    /// Known metric with an unusable value or missing discriminating attribute.
    Invalid,
}

/// Summary of one batch of records.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub latched: usize,
    pub unknown: usize,
    pub invalid: usize,
    /// Non-usage log events.
    pub ignored: usize,
    /// Copy of the status after the batch, if anything changed.
    pub snapshot: Option<TelemetryStatus>,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[derive(Debug, Default)]
struct State {
    status: TelemetryStatus,
    latches: Latches,
}

/// Owner of the aggregate status.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<State>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one metric record. Returns true if the status changed.
    pub fn apply_metric(&self, record: &DecodedMetric) -> bool {
        let mut state = self.lock();
        let effect = state.apply_metric(record);
        state.finish(effect == MetricEffect::Applied)
    }

    /// Apply one log record. Returns true if the status changed.
    pub fn apply_log(&self, record: &DecodedLog) -> bool {
        let mut state = self.lock();
        let changed = state.apply_log(record);
        state.finish(changed)
    }

    /// Apply every record of one metrics payload atomically.
    pub fn apply_metrics(&self, records: &[DecodedMetric]) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut state = self.lock();

        for record in records {
            match state.apply_metric(record) {
                MetricEffect::Applied => report.applied += 1,
                MetricEffect::Unchanged => {}
                MetricEffect::Latched => report.latched += 1,
                MetricEffect::Unknown => report.unknown += 1,
                MetricEffect::Invalid => report.invalid += 1,
            }
        }

        if state.finish(report.applied > 0) {
            report.snapshot = Some(state.status.clone());
        }
        report
    }

    /// Apply every record of one logs payload atomically.
    pub fn apply_logs(&self, records: &[DecodedLog]) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut state = self.lock();

        for record in records {
            if !record.is_usage_event() {
                report.ignored += 1;
                continue;
            }
            if state.apply_log(record) {
                report.applied += 1;
            }
        }

        if state.finish(report.applied > 0) {
            report.snapshot = Some(state.status.clone());
        }
        report
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> TelemetryStatus {
        self.lock().status.clone()
    }

    /// Current latch state.
    pub fn latches(&self) -> Latches {
        self.lock().latches
    }

    /// Return every field to zero/empty and clear both latches.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = State::default();
        debug!("Telemetry status reset");
    }
}

/// Round a validated non-negative value to a counter delta. Values past
/// `u64::MAX` saturate.
fn count(value: f64) -> u64 {
    value.round() as u64
}

fn add_count(counter: &mut u64, delta: u64) {
    *counter = counter.saturating_add(delta);
}

fn add_cost(total: &mut f64, delta: f64) {
    *total = (*total + delta).min(f64::MAX);
}

impl State {
    /// Stamp `last_update` if anything changed.
    fn finish(&mut self, changed: bool) -> bool {
        if changed {
            self.status.last_update = Some(Utc::now());
        }
        changed
    }

    fn observe_session(&mut self, session_id: Option<String>) -> bool {
        match session_id {
            Some(id) if self.status.current_session_id.as_deref() != Some(id.as_str()) => {
                debug!(session_id = %id, "Observed assistant session");
                self.status.current_session_id = Some(id);
                true
            }
            _ => false,
        }
    }

    fn apply_metric(&mut self, record: &DecodedMetric) -> MetricEffect {
        let Some(kind) = record.kind() else {
            debug!(metric = %record.name, "Ignoring unhandled metric");
            return MetricEffect::Unknown;
        };

        let value = record.value;
        if !value.is_finite() || value < 0.0 {
            debug!(metric = %record.name, value, "Ignoring non-finite or negative metric value");
            return MetricEffect::Invalid;
        }

        let changed = match kind {
            MetricKind::Sessions => {
                let n = count(value);
                add_count(&mut self.status.sessions, n);
                n > 0
            }
            MetricKind::TokenUsage => {
                let Some(token_type) = record.token_type() else {
                    debug!(metric = %record.name, "Token metric without a known type attribute");
                    return MetricEffect::Invalid;
                };
                if !self.latches.tokens.accepts_metrics() {
                    debug!(metric = %record.name, "Token counts owned by logs channel, skipping metric");
                    return MetricEffect::Latched;
                }
                self.latches.tokens.mark_metrics();

                let n = count(value);
                let status = &mut self.status;
                let counter = match token_type {
                    TokenType::Input => &mut status.input_tokens,
                    TokenType::Output => &mut status.output_tokens,
                    TokenType::CacheRead => &mut status.cache_read_tokens,
                    TokenType::CacheCreation => &mut status.cache_creation_tokens,
                };
                add_count(counter, n);
                status.recompute_total_tokens();
                n > 0
            }
            MetricKind::Cost => {
                if !self.latches.cost.accepts_metrics() {
                    debug!(metric = %record.name, "Cost owned by logs channel, skipping metric");
                    return MetricEffect::Latched;
                }
                self.latches.cost.mark_metrics();
                add_cost(&mut self.status.total_cost, value);
                value > 0.0
            }
            MetricKind::LinesOfCode => {
                let Some(change) = record.line_change() else {
                    debug!(metric = %record.name, "Lines metric without added/removed attribute");
                    return MetricEffect::Invalid;
                };
                let n = count(value);
                let counter = match change {
                    LineChange::Added => &mut self.status.lines_added,
                    LineChange::Removed => &mut self.status.lines_removed,
                };
                add_count(counter, n);
                n > 0
            }
            MetricKind::ActiveTime { seconds } => {
                let ms = if seconds { count(value * 1000.0) } else { count(value) };
                add_count(&mut self.status.active_time_ms, ms);
                ms > 0
            }
            MetricKind::ToolUsage => {
                let tool = record.tool_name();
                let n = count(value);
                let is_new = !self.status.tool_usage.contains_key(&tool);
                add_count(self.status.tool_usage.entry(tool).or_insert(0), n);
                n > 0 || is_new
            }
        };

        let session_changed = self.observe_session(record.session_id());
        trace!(metric = %record.name, value, changed, "Applied metric");

        if changed || session_changed {
            MetricEffect::Applied
        } else {
            MetricEffect::Unchanged
        }
    }

    fn apply_log(&mut self, record: &DecodedLog) -> bool {
        let Some(usage) = record.usage() else {
            return false;
        };
        let mut changed = false;

        if usage.has_tokens() {
            self.latches.tokens.mark_logs();
            let status = &mut self.status;
            add_count(&mut status.input_tokens, usage.input_tokens);
            add_count(&mut status.output_tokens, usage.output_tokens);
            add_count(&mut status.cache_read_tokens, usage.cache_read_tokens);
            add_count(&mut status.cache_creation_tokens, usage.cache_creation_tokens);
            status.recompute_total_tokens();
            changed = true;
        }

        if usage.has_cost() {
            self.latches.cost.mark_logs();
            add_cost(&mut self.status.total_cost, usage.cost_usd);
            changed = true;
        }

        changed |= self.observe_session(record.session_id());

        debug!(
            event = %record.event_name,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost_usd = usage.cost_usd,
            total_tokens = self.status.total_tokens,
            "Applied usage event"
        );
        changed
    }
}

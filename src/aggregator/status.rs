// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The aggregate record and its source latches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running totals for the assistant process.
///
/// `total_tokens` is always `input_tokens + output_tokens`; only the
/// aggregator writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryStatus {
    /// Assistant sessions observed.
    pub sessions: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    /// Cumulative cost in USD.
    pub total_cost: f64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub active_time_ms: u64,
    /// Invocations per tool name.
    pub tool_usage: BTreeMap<String, u64>,
    pub last_update: Option<DateTime<Utc>>,
    pub current_session_id: Option<String>,
}

impl TelemetryStatus {
    pub(crate) fn recompute_total_tokens(&mut self) {
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }

    /// Total tool invocations across all tools.
    pub fn tool_invocations(&self) -> u64 {
        self.tool_usage.values().sum()
    }
}

/// Which channel has populated a field group.
///
/// Moves `Unset -> Metrics -> Logs` or `Unset -> Logs`; never leaves `Logs`
/// until [`Aggregator::reset`](super::Aggregator::reset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLatch {
    #[default]
    Unset,
    Metrics,
    Logs,
}

impl SourceLatch {
    /// Whether a metrics-channel update may write this group.
    pub fn accepts_metrics(self) -> bool {
        self != Self::Logs
    }

    pub(crate) fn mark_metrics(&mut self) {
        if *self == Self::Unset {
            *self = Self::Metrics;
        }
    }

    pub(crate) fn mark_logs(&mut self) {
        *self = Self::Logs;
    }
}

/// Latch state for both field groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latches {
    /// Input/output/cache token counters.
    pub tokens: SourceLatch,
    pub cost: SourceLatch,
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Change notifications.
//!
//! Every ingestion request that changes the aggregate publishes a
//! [`TelemetryUpdate`] on a broadcast channel. Sending never blocks: a
//! subscriber that falls behind misses the oldest updates instead of
//! slowing ingestion down.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::TelemetryStatus;

/// Token counters as published to listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBlock {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub cache_read: u64,
    pub cache_creation: u64,
}

/// Lines-of-code counters as published to listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinesBlock {
    pub added: u64,
    pub removed: u64,
}

/// The metrics part of an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBlock {
    pub sessions: u64,
    pub tokens: TokenBlock,
    pub cost_usd: f64,
    pub lines_of_code: LinesBlock,
    pub active_time_ms: u64,
    pub tool_usage: BTreeMap<String, u64>,
    pub session_id: Option<String>,
}

/// Event sent to listeners after the aggregate changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    pub metrics: MetricsBlock,
    /// Placeholder; trace spans are not aggregated.
    pub spans: Vec<serde_json::Value>,
    pub last_update: Option<DateTime<Utc>>,
}

impl From<&TelemetryStatus> for TelemetryUpdate {
    fn from(status: &TelemetryStatus) -> Self {
        Self {
            metrics: MetricsBlock {
                sessions: status.sessions,
                tokens: TokenBlock {
                    input: status.input_tokens,
                    output: status.output_tokens,
                    total: status.total_tokens,
                    cache_read: status.cache_read_tokens,
                    cache_creation: status.cache_creation_tokens,
                },
                cost_usd: status.total_cost,
                lines_of_code: LinesBlock {
                    added: status.lines_added,
                    removed: status.lines_removed,
                },
                active_time_ms: status.active_time_ms,
                tool_usage: status.tool_usage.clone(),
                session_id: status.current_session_id.clone(),
            },
            spans: Vec::new(),
            last_update: status.last_update,
        }
    }
}

/// Default broadcast buffer size.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fan-out of [`TelemetryUpdate`]s to in-process listeners.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<TelemetryUpdate>,
}

impl Notifier {
    /// Create a notifier buffering up to `capacity` updates per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future updates.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.tx.subscribe()
    }

    /// Publish an update built from `status`. Returns the number of
    /// subscribers it reached; having none is not an error.
    pub fn notify(&self, status: &TelemetryStatus) -> usize {
        match self.tx.send(TelemetryUpdate::from(status)) {
            Ok(count) => {
                debug!(receivers = count, total_tokens = status.total_tokens, "Published telemetry update");
                count
            }
            Err(_) => 0,
        }
    }

    /// Run `listener` on its own task for every update.
    ///
    /// The task ends when the notifier is dropped or the listener panics;
    /// either way ingestion is unaffected.
    pub fn spawn_listener<F>(&self, mut listener: F) -> JoinHandle<()>
    where
        F: FnMut(TelemetryUpdate) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => listener(update),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Telemetry listener lagged, skipping missed updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

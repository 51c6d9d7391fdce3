// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP receiver - local telemetry endpoint for an AI coding assistant.
//!
//! Accepts OTLP/HTTP JSON metrics, logs and traces from the assistant
//! process, folds the signals it cares about (tokens, cost, tool usage,
//! lines changed, active time) into one running [`TelemetryStatus`], and
//! lets the host application poll it or subscribe to changes.
//!
//! # Architecture
//!
//! - [`error`] - Error types and result aliases
//! - [`logging`] - `tracing` subscriber setup
//! - [`config`] - Configuration loading and merging
//! - [`otlp`] - Wire types and decoding into flat records
//! - [`aggregator`] - The aggregate status and its update rules
//! - [`notifier`] - Change notifications to in-process listeners
//! - [`stats`] - Receiver self-metrics
//! - [`server`] - HTTP routes and the [`OtlpReceiver`] lifecycle
//!
//! # Example
//!
//! ```rust,ignore
//! use otlp_receiver::{OtlpReceiver, ResolvedConfig, StartOutcome};
//!
//! let mut receiver = OtlpReceiver::new(ResolvedConfig::default());
//! if let StartOutcome::Listening(addr) = receiver.start().await {
//!     println!("telemetry on {addr}");
//! }
//! let status = receiver.snapshot();
//! receiver.stop().await;
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod otlp;
pub mod server;
pub mod stats;

// Re-export commonly used types at crate root
pub use aggregator::{Aggregator, ApplyReport, Latches, SourceLatch, TelemetryStatus};
pub use config::{CliOptions, ResolvedConfig};
pub use error::{ConfigError, IngestError, ReceiverError, Result};
pub use notifier::{Notifier, TelemetryUpdate};
pub use server::{exporter_env, OtlpReceiver, StartOutcome};
pub use stats::{IngestStats, StatsSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

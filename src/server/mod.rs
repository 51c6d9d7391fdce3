// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP transport and receiver lifecycle.
//!
//! # Routes
//!
//! | Method | Path          | Response                                   |
//! |--------|---------------|--------------------------------------------|
//! | POST   | `/v1/metrics` | `{"status":"ok"}`, aggregates metrics      |
//! | POST   | `/v1/logs`    | `{"status":"ok"}`, aggregates usage events |
//! | POST   | `/v1/traces`  | `{"status":"ok"}`, counted only            |
//! | GET    | `/status`     | current [`TelemetryStatus`]                |
//! | GET    | `/health`     | `{"status":"healthy","uptime":<secs>}`     |
//! | GET    | `/stats`      | [`StatsSnapshot`]                          |
//!
//! Anything else is `404 {"error":"Not found"}`. Bodies may be gzip
//! compressed and are capped at the configured size before and after
//! decompression.

mod body;
mod exporter;
mod handlers;

pub use body::{check_content_type, gunzip, parse_body, read_body, BodyEncoding};
pub use exporter::exporter_env;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, TelemetryStatus};
use crate::config::ResolvedConfig;
use crate::error::ReceiverError;
use crate::notifier::{Notifier, TelemetryUpdate};
use crate::stats::{IngestStats, StatsSnapshot};

/// How long `stop()` waits for the server task before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub notifier: Notifier,
    pub stats: Arc<IngestStats>,
    pub started_at: Instant,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            aggregator: Arc::new(Aggregator::new()),
            notifier: Notifier::new(config.broadcast_capacity),
            stats: Arc::new(IngestStats::new()),
            started_at: Instant::now(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Build the receiver's router over `state`.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let limit = state.max_body_bytes;
    let router = Router::new()
        .route(
            "/v1/metrics",
            post(handlers::ingest_metrics).fallback(handlers::not_found),
        )
        .route(
            "/v1/logs",
            post(handlers::ingest_logs).fallback(handlers::not_found),
        )
        .route(
            "/v1/traces",
            post(handlers::ingest_traces).fallback(handlers::not_found),
        )
        .route("/status", get(handlers::status).fallback(handlers::not_found))
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .route("/stats", get(handlers::stats).fallback(handlers::not_found))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state);

    let router = if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.layer(TraceLayer::new_for_http())
}

/// Result of [`OtlpReceiver::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Listening(SocketAddr),
    /// The listener could not be bound. The rest of the application keeps
    /// running without telemetry.
    Unavailable { reason: String },
}

impl StartOutcome {
    pub fn addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Listening(addr) => Some(*addr),
            Self::Unavailable { .. } => None,
        }
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// OTLP/HTTP JSON receiver.
///
/// Owns the aggregate, the notifier and the listener task. State survives
/// `stop()`/`start()` cycles; only [`reset`](Self::reset) clears it.
pub struct OtlpReceiver {
    config: ResolvedConfig,
    state: AppState,
    running: Option<Running>,
}

impl OtlpReceiver {
    pub fn new(config: ResolvedConfig) -> Self {
        let state = AppState::new(&config);
        Self {
            config,
            state,
            running: None,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Router serving this receiver's state, without binding a socket.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Bind the listener and start serving.
    ///
    /// Never fails: a bind error is logged and reported as
    /// [`StartOutcome::Unavailable`]. Calling this while running returns the
    /// current address.
    pub async fn start(&mut self) -> StartOutcome {
        if let Some(running) = &self.running {
            return StartOutcome::Listening(running.addr);
        }

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "OTLP receiver unavailable, continuing without telemetry");
                return StartOutcome::Unavailable {
                    reason: err.to_string(),
                };
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => {
                warn!(error = %err, "OTLP receiver unavailable, continuing without telemetry");
                return StartOutcome::Unavailable {
                    reason: ReceiverError::from(err).to_string(),
                };
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                error!(error = %err, "OTLP receiver server error");
            }
        });

        info!(%addr, "OTLP receiver listening");
        self.running = Some(Running {
            addr,
            shutdown,
            handle,
        });
        StartOutcome::Listening(addr)
    }

    async fn bind(&self) -> Result<TcpListener, ReceiverError> {
        let addr = self.config.socket_addr();
        let err = match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(source) => ReceiverError::Bind { addr, source },
        };

        if err.is_addr_in_use() && self.config.fallback_to_ephemeral_port && addr.port() != 0 {
            warn!(%addr, "Port in use, falling back to an ephemeral port");
            let fallback = SocketAddr::new(addr.ip(), 0);
            return TcpListener::bind(fallback)
                .await
                .map_err(|source| ReceiverError::Bind {
                    addr: fallback,
                    source,
                });
        }
        Err(err)
    }

    /// Close the listener. Resolves once the server task has finished.
    pub async fn stop(&mut self) {
        let Some(Running {
            addr,
            shutdown,
            mut handle,
        }) = self.running.take()
        else {
            return;
        };

        let _ = shutdown.send(());
        if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
            warn!(%addr, "OTLP receiver did not shut down in time, aborting");
            handle.abort();
            let _ = handle.await;
        }
        info!(%addr, "OTLP receiver stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    pub fn snapshot(&self) -> TelemetryStatus {
        self.state.aggregator.snapshot()
    }

    /// Clear the aggregate, e.g. when a new assistant session starts.
    pub fn reset(&self) {
        self.state.aggregator.reset();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.state.notifier.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.state.notifier
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        Arc::clone(&self.state.aggregator)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }

    /// Exporter environment for the running receiver.
    pub fn exporter_env(&self) -> Option<Vec<(&'static str, String)>> {
        self.local_addr().map(exporter_env)
    }
}

impl Drop for OtlpReceiver {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
        }
    }
}

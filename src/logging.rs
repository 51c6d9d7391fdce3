// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostic logging setup.
//!
//! The receiver runs beside an interactive tool, so all output goes to
//! stderr and the default level is quiet enough not to interleave with it.

use std::io;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// How diagnostic logs are filtered and formatted.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when neither `RUST_LOG` nor a filter directive is set.
    pub default_level: Level,
    /// Emit span close events (request timings from the HTTP trace layer).
    pub include_span_events: bool,
    pub include_file_line: bool,
    pub include_target: bool,
    pub ansi_colors: bool,
    pub compact: bool,
    /// Explicit `EnvFilter` directive; wins over `RUST_LOG`.
    pub filter_directive: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose output with request spans.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            compact: false,
            ..Self::default()
        }
    }

    /// Warnings only, no colors.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            ..Self::default()
        }
    }

    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("otlp_receiver=trace,tower_http=debug".to_string()),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Parse a level name such as `"debug"` or `"WARN"`.
pub fn parse_level(name: &str) -> Option<Level> {
    Level::from_str(name.trim()).ok()
}

/// Keeps logging alive for the life of the process.
#[must_use = "logging stops being configured once the guard is dropped"]
pub struct LoggingGuard {
    _private: (),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let result = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(LoggingGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.compact);

        let dev = LoggingConfig::development();
        assert_eq!(dev.default_level, Level::DEBUG);
        assert!(dev.include_span_events);
        assert!(!dev.compact);

        let prod = LoggingConfig::production();
        assert_eq!(prod.default_level, Level::WARN);
        assert!(!prod.ansi_colors);

        let test = LoggingConfig::testing();
        assert_eq!(
            test.filter_directive.as_deref(),
            Some("otlp_receiver=trace,tower_http=debug")
        );
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("otlp_receiver=debug")
            .with_ansi(false);

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.filter_directive.as_deref(), Some("otlp_receiver=debug"));
        assert!(!config.ansi_colors);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! otlp-receiver entry point.

use std::net::IpAddr;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use otlp_receiver::config::{self, CliOptions, ResolvedConfig};
use otlp_receiver::logging::{init_logging, LoggingConfig};
use otlp_receiver::{exporter_env, OtlpReceiver, StartOutcome, TelemetryStatus, VERSION};

/// Local OTLP/HTTP JSON receiver for AI coding assistant telemetry.
#[derive(Parser)]
#[command(name = "otlp-receiver")]
#[command(author, version, about = "Local OTLP telemetry receiver", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "OTLP_RECEIVER_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "OTLP_RECEIVER_BIND")]
    bind: Option<IpAddr>,

    /// Maximum request body size in bytes
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// Use an OS-assigned port if the configured one is taken
    #[arg(long)]
    fallback_ephemeral: bool,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Show debug output
    #[arg(long, conflicts_with_all = ["trace", "quiet"])]
    debug: bool,

    /// Show trace output (full payloads)
    #[arg(long, conflicts_with = "quiet")]
    trace: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn log_level(&self) -> Option<String> {
        let level = if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            return None;
        };
        Some(level.to_string())
    }

    fn options(&self) -> CliOptions {
        CliOptions {
            bind_address: self.bind,
            port: self.port,
            max_body_bytes: self.max_body_bytes,
            fallback_to_ephemeral_port: self.fallback_ephemeral.then_some(true),
            enable_cors: self.no_cors.then_some(false),
            log_level: self.log_level(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the receiver until Ctrl+C (default)
    Serve,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Print exporter environment variables for the configured address
    Env,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.options();
    let workspace_root = std::env::current_dir()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = config::load_config(&workspace_root, options)?;
            serve(config).await
        }
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let config = config::load_config(&workspace_root, options)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Commands::Init => {
            let path = config::init_config(&workspace_root, None)?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
        Commands::Env => {
            let config = config::load_config(&workspace_root, options)?;
            for (key, value) in exporter_env(config.socket_addr()) {
                println!("export {}={}", key, value);
            }
            Ok(())
        }
        Commands::Version => {
            println!("otlp-receiver {}", VERSION);
            Ok(())
        }
    }
}

fn logging_config(config: &ResolvedConfig) -> LoggingConfig {
    let level = config.level();
    let base = if level >= tracing::Level::DEBUG {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    base.with_level(level)
}

async fn serve(config: ResolvedConfig) -> anyhow::Result<()> {
    let _guard = match init_logging(&logging_config(&config)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging disabled: {}", "warning:".yellow(), e);
            None
        }
    };

    let mut receiver = OtlpReceiver::new(config);
    match receiver.start().await {
        StartOutcome::Listening(addr) => {
            println!(
                "{} OTLP receiver listening on {}",
                "✓".green(),
                format!("http://{}", addr).bright_white()
            );
            println!("{}", "Point the assistant at it with:".dimmed());
            for (key, value) in exporter_env(addr) {
                println!("  {}={}", key.cyan(), value);
            }
        }
        StartOutcome::Unavailable { reason } => {
            eprintln!("{} receiver unavailable: {}", "warning:".yellow(), reason);
            return Ok(());
        }
    }

    let listener = receiver.notifier().spawn_listener(|update| {
        let tokens = &update.metrics.tokens;
        info!(
            input = tokens.input,
            output = tokens.output,
            total = tokens.total,
            cost_usd = update.metrics.cost_usd,
            "Telemetry updated"
        );
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }

    receiver.stop().await;
    listener.abort();

    println!("\n{}", receiver.stats().format_report());
    print_status(&receiver.snapshot());
    Ok(())
}

fn print_status(status: &TelemetryStatus) {
    println!("{}", "=== Telemetry ===".bright_blue().bold());
    println!(
        "Tokens: {} input, {} output, {} total ({} cache read, {} cache creation)",
        status.input_tokens,
        status.output_tokens,
        status.total_tokens.to_string().bright_white(),
        status.cache_read_tokens,
        status.cache_creation_tokens
    );
    println!("Cost: ${:.4}", status.total_cost);
    println!(
        "Lines: +{} -{}",
        status.lines_added.to_string().green(),
        status.lines_removed.to_string().red()
    );
    println!("Active time: {:.1}s", status.active_time_ms as f64 / 1000.0);
    println!("Sessions: {}", status.sessions);
    if let Some(id) = &status.current_session_id {
        println!("Current session: {}", id);
    }
    println!("Tool invocations: {}", status.tool_invocations());
    for (tool, count) in &status.tool_usage {
        println!("  {}: {}", tool, count);
    }
}

// Boardroom - Main Entry Point
//
// CLI for the quota service:
// - HTTP server with rate-limited usage API
// - Offline inspection and maintenance of the premium usage log

use anyhow::{Context, Result};
use boardroom_limits::config::Config;
use boardroom_limits::logging;
use boardroom_limits::server::{self, AppState};
use boardroom_limits::usage::{
    FileStore, PremiumService, ThinkingMode, UsageAttempt, UsageTracker,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Boardroom: quota machinery for AI board meetings
#[derive(Parser, Debug)]
#[command(name = "boardroom")]
#[command(author = "Boardroom Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Request rate limiting and premium LLM usage tracking", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Inspect or maintain the premium usage log
    #[command(subcommand)]
    Usage(UsageCommand),
}

#[derive(Subcommand, Debug)]
enum UsageCommand {
    /// Show usage statistics for a service
    Stats {
        /// Service (claude_pro, chatgpt_plus, gemini_advanced)
        service: PremiumService,
    },
    /// Check whether a service is within all of its limits
    CanUse { service: PremiumService },
    /// Pick the best available service in priority order
    Select,
    /// Record a premium-service attempt
    Record {
        #[arg(long)]
        service: PremiumService,

        #[arg(long)]
        agent: String,

        #[arg(long)]
        topic: String,

        /// Thinking mode (quick, balanced, deep)
        #[arg(long, default_value = "balanced")]
        mode: ThinkingMode,

        #[arg(long, default_value_t = 0)]
        response_time_ms: u64,

        /// Mark the attempt as failed
        #[arg(long)]
        failed: bool,

        /// Error message for a failed attempt
        #[arg(long, requires = "failed")]
        error: Option<String>,
    },
    /// Export the usage log as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Purge records older than the retention horizon
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    logging::init(&config.logging, args.verbose)?;
    debug!(data_dir = %config.usage.data_dir, "Configuration loaded");

    match args.command {
        Some(Commands::Serve { port, bind }) => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            let state = AppState::from_config(&config);
            server::serve(&config, state).await?;
        }
        Some(Commands::Usage(command)) => {
            run_usage(&config, command)?;
        }
        None => {
            info!("No command specified. Use \"boardroom --help\" for usage.");
        }
    }

    Ok(())
}

fn run_usage(config: &Config, command: UsageCommand) -> Result<()> {
    let store = Arc::new(FileStore::new(&config.usage.data_dir));
    let tracker = UsageTracker::with_retention(store, config.usage.retention_days);

    match command {
        UsageCommand::Stats { service } => print_json(&tracker.stats_for(service)),
        UsageCommand::CanUse { service } => print_json(&tracker.can_use(service)),
        UsageCommand::Select => print_json(&tracker.select_best_available()),
        UsageCommand::Record {
            service,
            agent,
            topic,
            mode,
            response_time_ms,
            failed,
            error,
        } => {
            let attempt = if failed {
                UsageAttempt::failed(
                    service,
                    agent,
                    topic,
                    mode,
                    response_time_ms,
                    error.unwrap_or_else(|| "unknown error".to_string()),
                )
            } else {
                UsageAttempt::succeeded(service, agent, topic, mode, response_time_ms)
            };
            tracker.record(attempt);
            print_json(&tracker.stats_for(service))
        }
        UsageCommand::Export { output } => {
            let csv = tracker.export_csv();
            match output {
                Some(path) => {
                    fs::write(&path, csv)
                        .with_context(|| format!("Failed to write export to {:?}", path))?;
                    info!("Exported {} records to {:?}", tracker.len(), path);
                }
                None => println!("{}", csv),
            }
            Ok(())
        }
        UsageCommand::Sweep => {
            let removed = tracker.sweep();
            print_json(&serde_json::json!({ "removed": removed, "remaining": tracker.len() }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

//! atlas-discovery main entry point
//!
//! This is the command-line interface for the Atlas CI discovery crawler.

use anyhow::{bail, Context};
use atlas_discovery::config::{load_config_with_hash, Config};
use atlas_discovery::crawler::Coordinator;
use atlas_discovery::output::{load_statistics, print_statistics, print_sync_reports};
use atlas_discovery::storage::{RunStatus, SqliteStorage};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// atlas-discovery: CI pipeline discovery for the Atlas catalog
///
/// Crawls Jenkins-style CI servers folder by folder, records every
/// discovered pipeline job in the catalog database, and triggers builds.
#[derive(Parser, Debug)]
#[command(name = "atlas-discovery")]
#[command(version)]
#[command(about = "CI pipeline discovery for the Atlas catalog", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl CI servers and upsert discovered pipeline jobs
    Sync {
        /// Only sync this server (default: all configured servers)
        #[arg(long)]
        server: Option<String>,

        /// Start at this folder URL instead of the server root
        #[arg(long, requires = "server")]
        folder: Option<String>,
    },

    /// Start a build of a job
    Trigger {
        #[arg(long)]
        server: String,

        /// Absolute URL of the job
        #[arg(long)]
        job: String,

        /// Build parameter (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Show statistics from the database and exit
    Stats,

    /// Validate config and list configured servers without crawling
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Sync { server, folder } => handle_sync(config, config_hash, server, folder).await,
        Command::Trigger {
            server,
            job,
            params,
        } => handle_trigger(config, config_hash, &server, &job, params).await,
        Command::Stats => handle_stats(&config),
        Command::Check => {
            handle_check(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("atlas_discovery=info,warn"),
            1 => EnvFilter::new("atlas_discovery=debug,info"),
            2 => EnvFilter::new("atlas_discovery=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Handles `sync`: crawls one or all servers
async fn handle_sync(
    config: Config,
    config_hash: String,
    server: Option<String>,
    folder: Option<String>,
) -> anyhow::Result<()> {
    if config.servers.is_empty() {
        bail!("no [[server]] entries configured");
    }

    let coordinator = Coordinator::new(config, config_hash)?;

    let results = match &server {
        Some(name) => vec![(name.clone(), coordinator.sync(name, folder.as_deref()).await)],
        None => coordinator.sync_all().await,
    };

    let mut reports = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(report) => {
                if report.status == RunStatus::Failed {
                    failed.push(name);
                }
                reports.push(report);
            }
            Err(e) => {
                eprintln!("{}: sync could not run: {}", name, e);
                failed.push(name);
            }
        }
    }

    print_sync_reports(&reports);

    if !failed.is_empty() {
        tracing::error!("Sync failed for: {}", failed.join(", "));
        bail!("sync failed for {} server(s)", failed.len());
    }

    Ok(())
}

/// Handles `trigger`: starts a build and prints any response body
async fn handle_trigger(
    config: Config,
    config_hash: String,
    server: &str,
    job: &str,
    params: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let parameters: BTreeMap<String, String> = params.into_iter().collect();
    let coordinator = Coordinator::new(config, config_hash)?;

    let response = coordinator
        .trigger(server, job, &parameters)
        .await
        .with_context(|| format!("failed to trigger {}", job))?;

    match response {
        Some(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        None => println!("Build requested for {}", job),
    }

    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles `check`: shows what would be crawled
fn handle_check(config: &Config) {
    println!("=== atlas-discovery check ===\n");

    println!("Discovery:");
    println!("  Tree projection: {}", config.discovery.tree_projection);
    println!("  Workers: {}", config.discovery.workers);
    println!("  Max depth: {}", config.discovery.max_depth);
    println!(
        "  Attempts: {} ({}ms apart)",
        config.discovery.max_attempts, config.discovery.retry_delay_ms
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nServers ({}):", config.servers.len());
    for server in &config.servers {
        let credential = match server.credential.as_deref().and_then(|c| config.credential(c)) {
            Some(entry) if entry.resolve_secret().is_some() => entry.name.as_str(),
            Some(_) => "unresolved secret",
            None => "none",
        };
        println!("  - {} {} (credential: {})", server.name, server.url, credential);
    }

    println!("\n✓ Configuration is valid");
}

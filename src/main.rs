//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest gallery harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::start;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a resumable gallery harvester
///
/// Sumi-Harvest follows a site's recommendation links, queues every page it
/// finds, and downloads each page's images into its own directory. Both the
/// queue and the image directories survive restarts.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable gallery harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Do not discover new pages; only download images for queued pages
    #[arg(long)]
    mute: bool,

    /// Validate config and show what would be harvested without starting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show queue and output statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.mute);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, cli.mute).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, mute: bool) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Entrypoint: {}", config.site.entrypoint);

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout);
    match &config.http.user_agent {
        Some(agent) => println!("  User agent: {}", agent),
        None => println!("  User agent: (client default)"),
    }
    match &config.http.proxy {
        Some(proxy) => println!("  Proxy ({} traffic): {}", proxy.scheme, proxy.url()),
        None => println!("  Proxy: none"),
    }

    println!("\nPersistence:");
    println!("  Database: {}", config.persistence.database_path.display());
    println!("  Output: {}", config.persistence.output.display());

    println!("\nPacing:");
    match &config.throttle {
        Some(throttle) => {
            println!("  Retrieval pause: {}-{}ms", throttle.min, throttle.max);
            println!(
                "  Discovery pause: {}-{}ms",
                throttle.min * 10,
                throttle.max * 10
            );
        }
        None => println!("  No throttle"),
    }
    println!("  Retry delay: {}ms", config.retry.delay);
    println!("  Resync after: {} pages", config.thresholds.pages);
    println!("  Attempts per image: {}", config.thresholds.images);

    println!("\n✓ Configuration is valid");
    if mute {
        println!("✓ Would only retrieve images for already queued pages");
    } else {
        println!("✓ Would start discovery from {}", config.site.entrypoint);
    }
}

/// Handles the --stats mode: shows statistics from the queue and output root
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use sumi_harvest::output::{load_statistics, print_statistics};
    use sumi_harvest::storage::open_store;

    println!("Database: {}\n", config.persistence.database_path.display());

    let store = open_store(&config.persistence.database_path, &config.store)?;
    let stats = load_statistics(&store, &config.persistence.output)?;
    print_statistics(&stats);
    store.close()?;

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, mute: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} starting at {}",
        config.site.base_url,
        config.site.entrypoint
    );

    match start(config, mute).await {
        Ok(()) => {
            tracing::info!("Harvest stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

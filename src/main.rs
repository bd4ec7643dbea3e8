//! Sumi-Swell main entry point
//!
//! This is the command-line interface for the Sumi-Swell cache-invalidation
//! planner.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_swell::build::{run_build_pass, BuildContext, BuildOverrides};
use sumi_swell::config::{load_config_with_hash, Config};
use sumi_swell::output::{print_statistics, ArtifactSink, BuildStatistics, JsonDirSink};
use tracing_subscriber::EnvFilter;

/// Sumi-Swell: incremental cache-invalidation planner
///
/// Sumi-Swell fingerprints every asset of a built site, compares the result
/// with the previously published manifest, and compiles a compact update
/// journal for a browser-resident cache.
#[derive(Parser, Debug)]
#[command(name = "sumi-swell")]
#[command(version)]
#[command(about = "Incremental cache-invalidation planner", long_about = None)]
struct Cli {
    /// Paths to TOML configuration files; later files override earlier ones
    #[arg(value_name = "CONFIG", required = true)]
    config: Vec<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration and print the effective settings
    #[arg(long)]
    dry_run: bool,

    /// Invalidate everything in this build
    #[arg(long)]
    force: bool,

    /// Invalidate a URL once (repeatable)
    #[arg(long, value_name = "URL")]
    refresh: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from {} file(s)", cli.config.len());
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

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let overrides = BuildOverrides {
        force: cli.force,
        refresh: cli.refresh,
    };
    handle_build(config, config_hash, &overrides, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_swell=info,warn"),
            1 => EnvFilter::new("sumi_swell=debug,info"),
            2 => EnvFilter::new("sumi_swell=trace,debug"),
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

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Swell Dry Run ===\n");

    let effective =
        serde_json::to_string_pretty(config).context("Failed to encode configuration")?;
    println!("{}", effective);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} plus {} external URLs",
        config.site.root.display(),
        config.site.external.len()
    );

    Ok(())
}

/// Handles the main build: one pass, then writes the artifacts
async fn handle_build(
    config: Config,
    config_hash: String,
    overrides: &BuildOverrides,
    quiet: bool,
) -> anyhow::Result<()> {
    let site = config.site.clone();
    tracing::info!("Building {} from {}", site.base_url, site.root.display());

    let ctx = BuildContext::new(config)
        .context("Failed to set up build")?
        .with_config_hash(config_hash);

    let output = match run_build_pass(&ctx, overrides).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            return Err(e.into());
        }
    };

    let mut sink = JsonDirSink::new(&site.output_dir, &site.manifest_file, &site.journal_file);
    sink.write(&output.manifest, &output.journal)
        .context("Failed to write artifacts")?;

    if !quiet {
        print_statistics(&BuildStatistics::collect(&output));
    }

    Ok(())
}

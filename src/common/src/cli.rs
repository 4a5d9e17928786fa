use clap::Parser;
use std::path::PathBuf;

/// Common CLI arguments shared by keypurge binaries
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level implied by the CLI flags
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments. `RUST_LOG` takes precedence.
    ///
    /// Logs go to stderr; stdout is reserved for matched key lines.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("keypurge configuration:");
            println!("=======================");
            println!("Store address: {}", config.store.addr);
            println!("Store TLS: {}", config.store.tls);
            println!("Store read timeout: {:?}", config.store.read_timeout);
            println!("Access mode: {}", config.search.access_mode);
            match &config.search.pattern {
                Some(pattern) => println!("Pattern: {pattern:?}"),
                None => println!("Pattern: (not set)"),
            }
            println!("Size threshold: {} bytes", config.search.size_threshold);
            println!("Min occurrences: {}", config.search.min_occurrences);
            println!("Scan batch size: {}", config.scan.batch_size);
            println!("Delete matching keys: {}", config.delete);

            if config.reconcile.enabled {
                println!(
                    "Reconcile: {} clean passes, {:?} between passes",
                    config.reconcile.min_clean_passes,
                    config.reconcile.pass_interval()
                );
                match config.reconcile.max_passes {
                    Some(max) => println!("Reconcile max passes: {max}"),
                    None => println!("Reconcile max passes: unbounded"),
                }
            } else {
                println!("Reconcile: disabled");
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");
        config.validate()?;
        tracing::info!("Configuration validation passed");
        Ok(())
    }
}

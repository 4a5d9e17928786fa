use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{CommonArgs, utils};
use common::config::{AccessMode, Configuration};
use purger::{ConsoleReporter, MatchCondition, Orchestrator, RedisStore};
use std::sync::Arc;

/// List or delete every key whose value matches a search pattern.
///
/// Without --min-occurrences the pattern must equal the whole value. With
/// --min-occurrences N the value must contain the pattern at least N times.
/// An empty pattern selects every value at least --size-threshold bytes long.
#[derive(Parser)]
#[command(name = "keypurge")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Value to search for
    pattern: Option<String>,

    #[arg(long, help = "Delete matching keys instead of listing them")]
    delete: bool,

    #[arg(
        long,
        help = "After deleting, re-check deleted keys until they stay deleted"
    )]
    reconcile: bool,

    #[arg(long, help = "How values are read: flat (string) or fieldmap (hash)")]
    access_mode: Option<AccessMode>,

    #[arg(long, help = "Only consider values at least this many bytes long")]
    size_threshold: Option<usize>,

    #[arg(long, help = "Require at least this many occurrences of the pattern")]
    min_occurrences: Option<usize>,

    #[arg(long, help = "Store address as host:port")]
    addr: Option<String>,

    #[arg(long, help = "Connect without TLS")]
    no_tls: bool,

    #[arg(long, help = "Show the effective configuration and exit")]
    show_config: bool,

    #[arg(long, requires = "show_config", help = "Show configuration in JSON format")]
    json: bool,

    #[arg(long, help = "Validate the configuration and exit")]
    validate: bool,
}

impl Cli {
    /// Flags given on the command line win over every configuration source.
    fn apply_overrides(&self, config: &mut Configuration) {
        if let Some(pattern) = &self.pattern {
            config.search.pattern = Some(pattern.clone());
        }
        if let Some(access_mode) = self.access_mode {
            config.search.access_mode = access_mode;
        }
        if let Some(size_threshold) = self.size_threshold {
            config.search.size_threshold = size_threshold;
        }
        if let Some(min_occurrences) = self.min_occurrences {
            config.search.min_occurrences = min_occurrences;
        }
        if let Some(addr) = &self.addr {
            config.store.addr = addr.clone();
        }
        if self.no_tls {
            config.store.tls = false;
        }
        if self.delete {
            config.delete = true;
        }
        if self.reconcile {
            config.reconcile.enabled = true;
        }
        if self.common.quiet {
            config.progress = false;
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    cli.apply_overrides(&mut config);

    if cli.show_config {
        return utils::display_config(&config, cli.json);
    }

    utils::validate_config(&config)?;
    if cli.validate {
        return Ok(());
    }

    let condition = MatchCondition::try_from(&config.search)?;

    let store = RedisStore::connect(&config.store)
        .await
        .with_context(|| format!("Failed to connect to {}", config.store.addr))?;

    let orchestrator = Orchestrator::from_config(Arc::new(store), &config);
    let mut reporter = ConsoleReporter::new(config.progress);

    if config.delete {
        orchestrator
            .purge(&condition, config.reconcile.enabled, &mut reporter)
            .await
            .with_context(|| format!("error deleting keys matching: {condition}"))?;
    } else {
        orchestrator
            .list(&condition, &mut reporter)
            .await
            .with_context(|| format!("error listing keys matching: {condition}"))?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

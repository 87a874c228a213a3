//! drawprobe CLI - sample a draw service and report its empirical distribution.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use drawprobe::client::{HttpRequester, ResponseParser};
use drawprobe::models::{Config, PoolCatalog, RunStatus};
use drawprobe::pipeline::{
    CancelFlag, CollectorOptions, SampleCollector, SampleReport, progress_bar,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "drawprobe")]
#[command(version)]
#[command(about = "Sample a loot/wish draw service and report its empirical distribution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "drawprobe.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sampling session against the draw service
    Run {
        /// Pool to sample (overrides sampling.pool)
        #[arg(short, long)]
        pool: Option<String>,

        /// Target number of outcomes (overrides sampling.total)
        #[arg(short, long)]
        total: Option<u64>,

        /// Outcomes per call (overrides sampling.batch_size)
        #[arg(short, long)]
        batch_size: Option<u32>,

        /// Requesting user (overrides service.user)
        #[arg(short, long)]
        user: Option<String>,

        /// Endpoint address (overrides service.base_url)
        #[arg(long)]
        base_url: Option<String>,

        /// JSON report path (overrides output.report)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Validate configuration file and catalog
    Validate,

    /// List pools in the catalog
    Pools {
        /// Catalog file (defaults to catalog.path from the config, then the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# drawprobe configuration file

[service]
base_url = "http://localhost:8080/wish/"
# Can reference env vars: user = "${DRAW_USER}"
user = "test_user"
action = "wish"
# Batch size query parameter ("wish" for the legacy PHP endpoint)
count_param = "value"
timeout_secs = 30

[sampling]
pool = "Starpath"
total = 10000
batch_size = 10
max_consecutive_failures = 5
request_interval_ms = 0

[contract]
# "/handle_wish_<pool> <cost> <count> <outcome>..."
header_tokens = 3
count_field = 2
error_prefixes = ["/wish_error_text", "/err_text_wish"]

[catalog]
# path = "catalogs/custom.toml"

[output]
# report = "reports/starpath.json"
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Pools { catalog } => {
            // Same catalog `run` would use unless overridden.
            let path = catalog.or_else(|| {
                Config::from_file(&cli.config)
                    .ok()
                    .and_then(|config| config.catalog.path)
            });
            let catalog =
                PoolCatalog::load(path.as_deref()).context("Failed to load catalog")?;
            println!("{:<20}  {:>6}  {:>12}", "Pool", "Items", "Total weight");
            for pool in catalog.pools() {
                println!(
                    "{:<20}  {:>6}  {:>12.3}",
                    pool.id(),
                    pool.len(),
                    pool.total_weight()
                );
            }
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            config.validate().context("Invalid configuration")?;
            config.resolve_user().context("Failed to resolve user")?;

            let catalog = PoolCatalog::load(config.catalog.path.as_deref())
                .context("Failed to load catalog")?;
            let pool = catalog.pool(&config.sampling.pool)?;

            info!("Configuration is valid");
            info!("  Endpoint: {}", config.service.base_url);
            info!(
                "  Pool: {} ({} catalog items)",
                pool.id(),
                pool.len()
            );
            info!(
                "  Sampling: {} outcomes in batches of {}",
                config.sampling.total, config.sampling.batch_size
            );
            info!(
                "  Failure budget: {} consecutive batches",
                config.sampling.max_consecutive_failures
            );
        }

        Commands::Run {
            pool,
            total,
            batch_size,
            user,
            base_url,
            report,
        } => {
            let mut config = load_config(&cli.config)?;

            // CLI overrides
            if let Some(pool) = pool {
                config.sampling.pool = pool;
            }
            if let Some(total) = total {
                config.sampling.total = total;
            }
            if let Some(batch_size) = batch_size {
                config.sampling.batch_size = batch_size;
            }
            if let Some(user) = user {
                config.service.user = user;
            }
            if let Some(base_url) = base_url {
                config.service.base_url = base_url;
            }
            if report.is_some() {
                config.output.report = report;
            }

            config.validate().context("Invalid configuration")?;
            let user = config.resolve_user().context("Failed to resolve user")?;

            let catalog = PoolCatalog::load(config.catalog.path.as_deref())
                .context("Failed to load catalog")?;
            let pool = catalog.pool(&config.sampling.pool)?;

            if config.sampling.total % u64::from(config.sampling.batch_size) != 0 {
                warn!(
                    total = config.sampling.total,
                    batch_size = config.sampling.batch_size,
                    "Total is not a multiple of batch size; the last batch may overshoot"
                );
            }

            let requester = HttpRequester::from_config(&config.service)?;
            let parser = ResponseParser::new(config.contract.clone());

            let cancel = CancelFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current batch");
                    on_signal.cancel();
                }
            });

            let collector = SampleCollector::new(
                requester,
                parser,
                user,
                CollectorOptions::from_config(&config.sampling),
            )
            .with_cancel_flag(cancel)
            .with_progress(progress_bar(config.sampling.total));

            let started_at = Utc::now();
            let start = Instant::now();
            let run = collector
                .run(
                    &config.sampling.pool,
                    config.sampling.total,
                    config.sampling.batch_size,
                )
                .await;

            let report = SampleReport::build(&run, pool, started_at, start.elapsed());
            report.print_summary();

            if let Some(path) = &config.output.report {
                report
                    .write_json(path)
                    .with_context(|| format!("Failed to write report to {path:?}"))?;
                println!("Report:      {path:?}");
            }

            if run.status() == RunStatus::Degraded {
                return Ok(ExitCode::from(2));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

//! Trawl main entry point
//!
//! This is the command-line interface for the Trawl browser crawler.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use trawl::browser::chromium::ChromiumDriver;
use trawl::browser::http::HttpDriver;
use trawl::browser::BrowserDriver;
use trawl::config::{load_config_with_hash, validate, Config, DriverKind};
use trawl::crawler::{CrawlController, StopReason};
use trawl::log_sink::{FileLogSink, LogSink, TracingLogSink};
use trawl::output::{
    print_statistics, write_records, write_records_to_path, CrawlStatistics, OutputFormat,
};
use trawl::normalize_url;
use tracing_subscriber::EnvFilter;

/// Trawl: a depth-bounded browser crawler
///
/// Trawl follows links from a seed page through a headless browser, waits
/// out anti-automation challenges, and records the title, headings and
/// outbound links of every page it reaches.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version = "1.0.0")]
#[command(about = "A depth-bounded browser crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Maximum link-hops from the seed (overrides crawler.max-depth)
    #[arg(short = 'd', long, value_name = "N")]
    max_depth: Option<u32>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write records to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Record serialization format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Browser backend (overrides browser.driver)
    #[arg(long, value_enum)]
    driver: Option<DriverKind>,

    /// Directory for append-only crawl logs (overrides log.directory)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Validate config and seed and show the effective settings without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    // Command-line overrides
    if let Some(driver) = cli.driver {
        config.browser.driver = driver;
    }
    if let Some(dir) = &cli.log_dir {
        config.log.directory = Some(dir.clone());
    }
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    validate(&config).context("invalid configuration")?;

    let seed = normalize_url(&cli.seed)
        .with_context(|| format!("invalid seed URL '{}'", cli.seed))?;

    if cli.dry_run {
        handle_dry_run(&config, seed.as_str());
        return Ok(());
    }

    // Navigate to the seed as given; normalization only keys the visited set
    handle_crawl(&cli, config, cli.seed.trim()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, seed: &str) {
    println!("=== Trawl Dry Run ===\n");

    println!("Seed: {}", seed);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.delay_min_ms, config.crawler.delay_max_ms
    );
    match config.crawler.max_pages {
        Some(pages) => println!("  Page budget: {}", pages),
        None => println!("  Page budget: unlimited"),
    }
    match config.crawler.max_duration_secs {
        Some(secs) => println!("  Time budget: {}s", secs),
        None => println!("  Time budget: unlimited"),
    }

    println!("\nBrowser:");
    println!("  Driver: {:?}", config.browser.driver);
    println!("  Headless: {}", config.browser.headless);
    println!("  User agent: {}", config.browser.user_agent);
    println!(
        "  Navigation timeout: {}s ({:?})",
        config.browser.navigation_timeout_secs, config.browser.readiness
    );
    println!("  Pool size: {}", config.browser.pool_size);
    if let Some(path) = &config.browser.chrome_path {
        println!("  Chrome path: {}", path.display());
    }

    println!(
        "\nChallenge Indicators ({}):",
        config.challenge.indicators.len()
    );
    for indicator in &config.challenge.indicators {
        println!("  - {}", indicator);
    }
    println!(
        "  Detect timeout: {}ms, resolution timeout: {}s",
        config.challenge.detect_timeout_ms, config.challenge.resolution_timeout_secs
    );

    println!("\nCrawl Log:");
    match &config.log.directory {
        Some(dir) => println!("  {}/{}", dir.display(), config.log.category),
        None => println!("  tracing only ({})", config.log.category),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(cli: &Cli, config: Config, seed: &str) -> anyhow::Result<()> {
    let driver: Arc<dyn BrowserDriver> = match config.browser.driver {
        DriverKind::Chromium => Arc::new(ChromiumDriver::new(&config.browser)),
        DriverKind::Http => Arc::new(HttpDriver::new(&config.browser)?),
    };
    tracing::info!("Using {} driver", driver.name());

    let file_log = config
        .log
        .directory
        .as_ref()
        .map(|dir| Arc::new(FileLogSink::new(dir)));
    let log: Arc<dyn LogSink> = match &file_log {
        Some(sink) => {
            tracing::info!("Writing crawl log under {}", sink.root().display());
            sink.clone() as Arc<dyn LogSink>
        }
        None => Arc::new(TracingLogSink),
    };

    let controller = CrawlController::from_config(&config, driver, log)?;

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            token.cancel();
        }
    });

    let result = controller.crawl(seed, config.crawler.max_depth).await;

    controller.shutdown().await;
    if let Some(sink) = &file_log {
        sink.close().await;
    }
    let report = result?;

    match &cli.output {
        Some(path) => write_records_to_path(&report.records, cli.format, path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => write_records(&report.records, cli.format, std::io::stdout().lock())?,
    }

    if !cli.quiet {
        print_statistics(&CrawlStatistics::from_report(&report));
    }

    if report.stop == StopReason::BrowserUnavailable {
        bail!("browser could not be launched; results are partial");
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use chronicling_harvester::api::{probe, ApiError, CatalogApi, LocApi};
use chronicling_harvester::config::{
    find_config_file, load_config, save_config, Config, LoggingConfig, CONFIG_FILE_NAME,
};
use chronicling_harvester::export::{export, output_file_name};
use chronicling_harvester::harvest::{
    chunk_items, dedup_preserving_order, HarvestSettings, Harvester, ItemFilter,
};
use chronicling_harvester::metadata::{Checkpoint, FetchSettings, MetadataFetcher};
use chronicling_harvester::models::{QueryBuilder, SearchQuery, YearChunk};
use chronicling_harvester::summary::RunSummary;
use chronicling_harvester::utils::{sanitize_filename, RateLimiter};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Chronicling Harvester - Collect newspaper page metadata from Chronicling America
#[derive(Parser, Debug)]
#[command(name = "chronicling-harvester")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Collect newspaper page metadata from the Chronicling America collection", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Which search to run
#[derive(Args, Debug)]
struct QueryArgs {
    /// Full search URL (copied from the loc.gov website)
    #[arg(long, conflicts_with_all = ["keyword", "state", "start_date", "end_date"])]
    url: Option<String>,

    /// Keyword to search for
    #[arg(long, short)]
    keyword: Option<String>,

    /// Restrict to a state, e.g. "west virginia"
    #[arg(long, short, requires = "keyword")]
    state: Option<String>,

    /// First issue date (YYYY-MM-DD)
    #[arg(long, requires = "keyword")]
    start_date: Option<NaiveDate>,

    /// Last issue date (YYYY-MM-DD)
    #[arg(long, requires = "keyword")]
    end_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Harvest a search, fetch item metadata and write a CSV file
    #[command(alias = "h")]
    Harvest {
        #[command(flatten)]
        query: QueryArgs,

        /// Run one search per calendar year between the start and end dates
        #[arg(long, requires_all = ["start_date", "end_date"])]
        by_year: bool,

        /// Output directory (created when missing)
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// Output file name without extension
        #[arg(long)]
        file_stem: Option<String>,

        /// Do not append a timestamp to the file name
        #[arg(long)]
        no_timestamp: bool,

        /// Minimum seconds between requests
        #[arg(long)]
        min_delay: Option<f64>,

        /// Disable random jitter on delays
        #[arg(long)]
        no_jitter: bool,

        /// Stop each search after this many items
        #[arg(long, short)]
        max_items: Option<usize>,

        /// Skip items with no city
        #[arg(long)]
        strict_city: bool,

        /// Drop repeated items, keeping the first occurrence
        #[arg(long)]
        dedup: bool,
    },

    /// Send one small search to check the API is reachable
    Probe {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination (default: ./chronicling-harvester.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

fn print_env_vars() {
    println!("Chronicling Harvester - Environment Variables");
    println!();
    println!("Every configuration key can be set as CHRONAM_<SECTION>__<KEY>:");
    println!("  CHRONAM_API__SEARCH_BASE                  Collection search endpoint");
    println!("  CHRONAM_API__ITEM_HOST                    Host item identifiers must start with");
    println!("  CHRONAM_API__PROXY                        Proxy for all requests (http, https or socks5)");
    println!("  CHRONAM_RATE_LIMITS__MIN_DELAY_SECS       Minimum seconds between requests (default: 4)");
    println!("  CHRONAM_RATE_LIMITS__REQUESTS_PER_MINUTE  Hard request ceiling per minute, 0 disables (default: 20)");
    println!("  CHRONAM_HARVEST__MAX_RETRIES              Retries per search page (default: 5)");
    println!("  CHRONAM_HARVEST__THROTTLE_DELAY_SECS      First sleep after HTTP 429 (default: 60)");
    println!("  CHRONAM_METADATA__STRICT_CITY             Skip items with no city (default: false)");
    println!("  CHRONAM_METADATA__CHECKPOINT_EVERY        Rows between checkpoints, 0 disables (default: 10)");
    println!("  CHRONAM_OUTPUT__DIRECTORY                 Output directory (default: output)");
    println!("  CHRONAM_LOGGING__FORMAT                   \"json\" for structured logs");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging level (e.g., debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export CHRONAM_RATE_LIMITS__MIN_DELAY_SECS=\"7\"");
    println!("  export CHRONAM_OUTPUT__DIRECTORY=\"./coolie\"");
    std::process::exit(0);
}

fn init_tracing(verbose: u8, quiet: bool, logging: &LoggingConfig) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronicling_harvester={}", level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.as_deref() == Some("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Turn the query flags into a search query or per-year chunks
fn build_query(args: &QueryArgs, config: &Config) -> Result<SearchQuery> {
    if let Some(url) = &args.url {
        let query = SearchQuery::from_url(url)
            .with_context(|| format!("Invalid search URL: {}", url))?
            .with_page_size(config.harvest.page_size)
            .with_fields(config.harvest.fields.clone());
        return Ok(query);
    }

    Ok(query_builder(args, config)?.build()?)
}

fn query_builder(args: &QueryArgs, config: &Config) -> Result<QueryBuilder> {
    let Some(keyword) = &args.keyword else {
        bail!("Either --url or --keyword is required");
    };

    let mut builder = QueryBuilder::new(keyword.clone())
        .base(config.api.search_base.clone())
        .page_size(config.harvest.page_size)
        .fields(config.harvest.fields.clone());
    if let Some(state) = &args.state {
        builder = builder.state(state.clone());
    }
    if let Some(start) = args.start_date {
        builder = builder.start_date(start);
    }
    if let Some(end) = args.end_date {
        builder = builder.end_date(end);
    }
    Ok(builder)
}

fn year_chunks(args: &QueryArgs, config: &Config) -> Result<Vec<YearChunk>> {
    let (Some(start), Some(end)) = (args.start_date, args.end_date) else {
        bail!("--by-year needs --start-date and --end-date");
    };
    if start > end {
        bail!("--start-date {} is after --end-date {}", start, end);
    }
    Ok(query_builder(args, config)?.year_chunks(start.year(), end.year())?)
}

fn api_client(config: &Config) -> Result<Arc<dyn CatalogApi>> {
    let api = LocApi::from_config(&config.api).context("Failed to create API client")?;
    Ok(Arc::new(api))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
    }

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(cli.verbose, cli.quiet, &config.logging);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Harvest {
            query,
            by_year,
            output_dir,
            file_stem,
            no_timestamp,
            min_delay,
            no_jitter,
            max_items,
            strict_city,
            dedup,
        }) => {
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }
            if let Some(stem) = file_stem {
                config.output.file_stem = stem;
            }
            if no_timestamp {
                config.output.timestamp = false;
            }
            if let Some(delay) = min_delay {
                config.rate_limits.min_delay_secs = delay;
            }
            if no_jitter {
                config.rate_limits.jitter = false;
            }
            if max_items.is_some() {
                config.harvest.max_items_per_query = max_items;
            }
            config.metadata.strict_city |= strict_city;
            config.harvest.dedup |= dedup;

            run_harvest(&query, by_year, &config, cli.quiet).await?;
        }

        Some(Commands::Probe { query }) => {
            let search = build_query(&query, &config)?;
            let api = api_client(&config)?;

            match probe(api.as_ref(), &search).await {
                Ok(report) => {
                    println!("OK: {} reachable", api.name());
                    match report.total {
                        Some(total) => println!("{} results for {}", total, search.label()),
                        None => println!("No result count reported for {}", search.label()),
                    }
                }
                Err(ApiError::Throttled { retry_after }) => {
                    let wait = retry_after
                        .map(|s| format!(", retry after {}s", s))
                        .unwrap_or_default();
                    bail!("Throttled by {} (HTTP 429{})", api.name(), wait);
                }
                Err(e) => bail!("Probe failed: {}", e),
            }
        }

        Some(Commands::InitConfig { path, force }) => {
            let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_config(&Config::default(), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
        }

        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

async fn run_harvest(args: &QueryArgs, by_year: bool, config: &Config, quiet: bool) -> Result<()> {
    // File name problems should surface before hours of harvesting
    let file_name = output_file_name(
        &config.output.file_stem,
        config.output.timestamp.then(Local::now),
    )?;

    let api = api_client(config)?;
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
    let harvester = Harvester::new(
        api.clone(),
        limiter.clone(),
        ItemFilter::for_host(&config.api.item_host),
        HarvestSettings::from_config(&config.harvest),
    );

    let mut items = if by_year {
        let chunks = year_chunks(args, config)?;
        let outcomes = harvester.harvest_chunks(&chunks).await?;
        for chunk in &outcomes {
            tracing::info!(
                "{}: {} items ({})",
                chunk.year,
                chunk.outcome.items.len(),
                chunk.outcome.stop
            );
        }
        chunk_items(&outcomes)
    } else {
        let query = build_query(args, config)?;
        harvester.harvest(&query).await?.items
    };

    if config.harvest.dedup {
        let before = items.len();
        items = dedup_preserving_order(items);
        tracing::info!("Dedup: {} -> {} items", before, items.len());
    }

    let mut fetcher = MetadataFetcher::new(
        api,
        limiter,
        FetchSettings::from_config(&config.metadata),
    )
    .quiet(quiet);
    if config.metadata.checkpoint_every > 0 {
        let stem = sanitize_filename(&config.output.file_stem)?;
        fetcher = fetcher.with_checkpoint(Checkpoint::new(
            config.output.directory.join(format!("{}_checkpoint.json", stem)),
        ));
    }

    let identifiers = items.len();
    let report = fetcher.fetch_metadata(items).await;
    let summary = RunSummary::new(identifiers, &report, 10);

    let path = export(report.rows, &config.output.directory, &file_name)
        .context("Failed to write CSV output")?;

    summary.log();
    if !quiet {
        println!("{}", path.display());
    }
    Ok(())
}

//! GameScout main entry point
//!
//! This is the command-line interface for the GameScout crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gamescout::config::{load_config_with_hash, Config};
use gamescout::crawler::{build_scheduler, PauseController};
use gamescout::output::{check_status, load_statistics, print_statistics};
use gamescout::queue::AmqpPublisher;
use gamescout::storage::{open_storage, share, SqliteStorage, Storage};
use gamescout::url::parse_base_url;
use gamescout::Source;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// GameScout: a polite game-listing crawler
///
/// GameScout walks the paginated listings of registered game sources while
/// respecting robots.txt, stores every game it finds, and publishes them to
/// a message queue.
#[derive(Parser, Debug)]
#[command(name = "gamescout")]
#[command(version)]
#[command(about = "A polite, resumable game-listing crawler", long_about = None)]
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
    /// Run the crawl scheduler until interrupted
    ///
    /// On Unix, SIGUSR1 pauses crawling at the next page boundary and
    /// SIGUSR2 resumes it immediately.
    Run,

    /// Check storage and queue connectivity
    Status,

    /// Show crawl statistics from the database
    Stats,

    /// Manage registered game sources
    #[command(subcommand)]
    Sources(SourcesCommand),
}

#[derive(Subcommand, Debug)]
enum SourcesCommand {
    /// List registered sources
    List,

    /// Register a new source
    Add {
        /// Unique source name
        name: String,

        /// Start page of the listing
        url: String,

        /// Selector for game links
        #[arg(long)]
        link_selector: String,

        /// Selector for the next-page link
        #[arg(long)]
        next_page_selector: String,
    },

    /// Change a source's URL or selectors, keeping its progress
    Update {
        name: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        link_selector: Option<String>,

        #[arg(long)]
        next_page_selector: Option<String>,
    },

    /// Delete a source
    Remove { name: String },

    /// Clear a source's resume cursor so the next walk starts from its URL
    Reset { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Run => handle_run(&config).await,
        Command::Status => handle_status(&config).await,
        Command::Stats => handle_stats(&config),
        Command::Sources(command) => handle_sources(&config, command),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gamescout=info,warn"),
            1 => EnvFilter::new("gamescout=debug,info"),
            2 => EnvFilter::new("gamescout=trace,debug"),
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

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))
}

/// Handles `run`: polls all sources until Ctrl-C
async fn handle_run(config: &Config) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(config).context("Failed to start the crawler")?;
    tracing::info!(
        "Scraper at {}, publishing to queue '{}'",
        config.scraper.base_url()?,
        config.queue.name
    );

    listen_for_signals(scheduler.control());
    scheduler.run().await?;
    Ok(())
}

/// Maps process signals onto the pause controller
fn listen_for_signals(control: PauseController) {
    let on_interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping at the next page boundary");
            on_interrupt.shutdown();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::user_defined1()) {
            Ok(mut stream) => {
                let control = control.clone();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        control.pause();
                    }
                });
            }
            Err(e) => tracing::warn!("Cannot listen for SIGUSR1: {}", e),
        }

        match signal(SignalKind::user_defined2()) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        control.resume();
                    }
                });
            }
            Err(e) => tracing::warn!("Cannot listen for SIGUSR2: {}", e),
        }
    }
}

/// Handles `status`: probes storage and the queue
async fn handle_status(config: &Config) -> anyhow::Result<()> {
    let storage = share(open_database(config)?);
    let publisher = AmqpPublisher::new(config.queue.require_connection()?, config.queue.name.as_str());

    let report = check_status(&storage, &publisher, None).await;
    println!("{}", report);

    if !report.healthy() {
        bail!("one or more dependencies are unreachable");
    }
    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles `sources`: registry maintenance
fn handle_sources(config: &Config, command: SourcesCommand) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;

    match command {
        SourcesCommand::List => {
            let sources = storage.get_all_sources()?;
            if sources.is_empty() {
                println!("No sources registered");
            }
            for source in sources {
                println!("{}", source.name);
                println!("  URL:            {}", source.url);
                println!("  Link selector:  {}", source.link_selector);
                println!("  Next selector:  {}", source.next_page_selector);
                println!(
                    "  Resume at:      {}",
                    source.current_page.as_deref().unwrap_or("(start)")
                );
            }
        }
        SourcesCommand::Add {
            name,
            url,
            link_selector,
            next_page_selector,
        } => {
            parse_base_url(&url)?;
            storage.insert_source(&Source::new(name.as_str(), url, link_selector, next_page_selector))?;
            println!("✓ Added source '{}'", name);
        }
        SourcesCommand::Update {
            name,
            url,
            link_selector,
            next_page_selector,
        } => {
            let Some(mut source) = storage.find_source(&name)? else {
                bail!("no source named '{}'", name);
            };
            if let Some(url) = url {
                parse_base_url(&url)?;
                source.url = url;
            }
            if let Some(selector) = link_selector {
                source.link_selector = selector;
            }
            if let Some(selector) = next_page_selector {
                source.next_page_selector = selector;
            }
            storage.update_source(&source)?;
            println!("✓ Updated source '{}'", name);
        }
        SourcesCommand::Remove { name } => {
            if !storage.delete_source(&name)? {
                bail!("no source named '{}'", name);
            }
            println!("✓ Removed source '{}'", name);
        }
        SourcesCommand::Reset { name } => {
            storage.update_page(&name, None)?;
            println!("✓ Source '{}' will restart from its URL", name);
        }
    }

    Ok(())
}

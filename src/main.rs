//! blogharvest CLI: harvest blogs into the post store and read digests
//! back out of it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use blogharvest::config::{Config, LogFormat};
use blogharvest::types::LogReporter;
use blogharvest::{digest, sites, Harvester, PostStore, RangeQuery};

#[derive(Parser)]
#[command(name = "blogharvest")]
#[command(about = "Harvest blog posts into a deduplicating store and build digests")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "blogharvest.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the harvest pipeline over the built-in sites
    Harvest {
        /// Sites to harvest (default: all)
        #[arg(short, long)]
        site: Vec<String>,

        /// Erase all stored records before harvesting
        #[arg(long)]
        erase: bool,
    },

    /// List stored post URLs in a date range
    List {
        /// Start date (inclusive), e.g. 2025-02-25
        #[arg(long)]
        start: NaiveDate,

        /// End date (inclusive)
        #[arg(long)]
        end: NaiveDate,

        /// Filter by exact source
        #[arg(long)]
        source: Option<String>,

        /// Filter by content match (case-insensitive regex or substring)
        #[arg(long = "match")]
        match_string: Option<String>,
    },

    /// Assemble a Markdown digest of matching posts
    Digest {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        source: Option<String>,

        #[arg(long = "match")]
        match_string: Option<String>,

        /// Write the digest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assemble an LLM summarization prompt for matching posts
    Prompt {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        source: Option<String>,

        #[arg(long = "match")]
        match_string: Option<String>,
    },

    /// List distinct sources present in the store
    Sources {
        /// Only named adapters, not reference attributions
        #[arg(long)]
        roots_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    init_tracing(&config, cli.verbose)?;

    match cli.command {
        Commands::Harvest { site, erase } => {
            let harvester = Harvester::new(&config, sites::builtin_adapters())?;
            let new_ids = harvester.run(&site, erase, &LogReporter).await?;
            println!("Harvested {} new record(s)", new_ids.len());
            harvester.close()?;
        }

        Commands::List {
            start,
            end,
            source,
            match_string,
        } => {
            let store = open_store(&config)?;
            let query = range_query(start, end, source, match_string)?;
            for url in digest::list_documents(&store, &query)? {
                println!("{url}");
            }
        }

        Commands::Digest {
            start,
            end,
            source,
            match_string,
            output,
        } => {
            let store = open_store(&config)?;
            let query = range_query(start, end, source, match_string)?;
            let document = digest::markdown_digest(&store, &query)?;
            match output {
                Some(path) => std::fs::write(&path, document)
                    .with_context(|| format!("failed to write digest to {}", path.display()))?,
                None => println!("{document}"),
            }
        }

        Commands::Prompt {
            start,
            end,
            source,
            match_string,
        } => {
            let store = open_store(&config)?;
            let query = range_query(start, end, source, match_string)?;
            println!("{}", digest::prompt_digest(&store, &query)?);
        }

        Commands::Sources { roots_only } => {
            let store = open_store(&config)?;
            for source in store.distinct_sources(roots_only)? {
                println!("{source}");
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<PostStore> {
    PostStore::open(&config.store.data_dir).context("failed to open post store")
}

fn range_query(
    start: NaiveDate,
    end: NaiveDate,
    source: Option<String>,
    match_string: Option<String>,
) -> Result<RangeQuery> {
    let mut query = RangeQuery::new(start, end)?;
    query.source = source;
    query.match_string = match_string;
    Ok(query)
}

fn init_tracing(config: &Config, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => config.logging.level.as_level(),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    match config.logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
    .context("failed to install tracing subscriber")
}

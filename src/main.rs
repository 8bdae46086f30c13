//! qrstore CLI
//!
//! Command-line interface for a query/result archive:
//! - Save a query and its result
//! - Load stored results and queries
//! - List queries, results and per-query history
//! - Filter queries by field value

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use qrstore::storage::{parse_timestamp, Document};
use qrstore::{Config, LoggingConfig, QueryId, ResultIndex, ResultStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "qrstore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Content-addressed archive of query/result pairs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory (overrides config)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Store plain .json files instead of .json.gz
    #[arg(long, global = true)]
    pub no_compress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a query and its result (JSON files, `-` for stdin)
    Save {
        query: PathBuf,
        result: PathBuf,
        /// Sample time, YYYYMMDD_HHMMSS or YYYY-MM-DDTHH:MM:SS (default: now)
        #[arg(short, long)]
        time: Option<String>,
    },

    /// Print a stored result with its query
    Load {
        result_id: String,
    },

    /// Print a stored query
    Query {
        query_id: String,
    },

    /// List all query ids
    Queries,

    /// List result ids (of the given queries, or all)
    Results {
        query_ids: Vec<String>,
    },

    /// List the results of one query, oldest first
    History {
        query_id: String,
    },

    /// List queries whose field equals a value, e.g. `lang=rust` or `/meta/page=2`
    Filter {
        condition: String,
    },

    /// Show store statistics
    Stats,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is configured by the config file, so the search is reported afterwards
    let (mut config, search) = match &cli.config {
        Some(path) => (Config::load_with_env(path)?, None),
        None => {
            let search = Config::search_default();
            (search.config.clone(), Some(search))
        }
    };
    if let Some(root) = &cli.root {
        config.storage.root = root.to_string_lossy().to_string();
    }
    if cli.no_compress {
        config.storage.compress = false;
    }

    init_logging(&config.logging);
    if let Some(search) = &search {
        search.log();
    }

    let open_store = || -> Result<ResultStore> {
        let store = ResultStore::open(config.store_config())
            .with_context(|| format!("opening store at {}", config.storage.root))?;
        tracing::debug!("Store root: {:?}", store.root());
        Ok(store)
    };

    match cli.command {
        Commands::Config { output } => {
            let content = qrstore::generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }

        Commands::Save {
            query,
            result,
            time,
        } => {
            let store = open_store()?;
            let query = read_document(&query)?;
            let result = read_document(&result)?;
            let sample_time = time.as_deref().map(parse_time).transpose()?;

            let (query_id, result_id) = store.save_query_and_result(&query, &result, sample_time)?;
            print_json(&serde_json::json!({
                "query_id": query_id,
                "result_id": result_id,
            }))?;
        }

        Commands::Load { result_id } => {
            let store = open_store()?;
            let loaded = store.load_result_id(&result_id)?;
            print_json(&loaded)?;
        }

        Commands::Query { query_id } => {
            let store = open_store()?;
            let query_id = QueryId::parse(&query_id)?;
            print_json(&store.load_query(&query_id)?)?;
        }

        Commands::Queries => {
            let store = open_store()?;
            let mut ids = store.find_query_ids()?;
            ids.sort();
            for id in ids {
                println!("{}", id);
            }
        }

        Commands::Results { query_ids } => {
            let store = open_store()?;
            let index = ResultIndex::build(&store)?;
            let requested = if query_ids.is_empty() {
                index.query_ids().to_vec()
            } else {
                query_ids
                    .iter()
                    .map(|id| QueryId::parse(id))
                    .collect::<Result<Vec<_>, _>>()?
            };

            let mut ids = index.get_result_ids_for_queries(&requested);
            ids.sort();
            for id in ids {
                println!("{}", id);
            }
        }

        Commands::History { query_id } => {
            let store = open_store()?;
            let query_id = QueryId::parse(&query_id)?;
            let index = ResultIndex::build(&store)?;
            for (sample_time, result_id) in index.history(&query_id) {
                println!("{}  {}", sample_time, result_id);
            }
        }

        Commands::Filter { condition } => {
            let store = open_store()?;
            let (pointer, expected) = parse_condition(&condition)?;
            let index = ResultIndex::build(&store)?;
            let (matching, _) =
                index.filter_query_ids(|query| query.pointer(&pointer) == Some(&expected), None)?;
            for id in matching {
                println!("{}  ({} results)", id, index.result_count(&id));
            }
        }

        Commands::Stats => {
            let store = open_store()?;
            let index = ResultIndex::build(&store)?;
            println!("Root:  {}", store.root().display());
            println!("Store: {}", store.stats()?);
            println!("Index: {}", index.stats());
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("qrstore={}", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_time(text: &str) -> Result<NaiveDateTime> {
    if let Ok(time) = parse_timestamp(text) {
        return Ok(time);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("invalid sample time: {}", text))
}

/// `key=value` → (JSON pointer, expected value); the value is JSON if it parses
fn parse_condition(condition: &str) -> Result<(String, Document)> {
    let Some((key, value)) = condition.split_once('=') else {
        bail!("expected key=value, got {:?}", condition);
    };
    if key.is_empty() {
        bail!("empty key in {:?}", condition);
    }

    let pointer = if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{}", key)
    };
    let expected = serde_json::from_str(value).unwrap_or_else(|_| Document::from(value));
    Ok((pointer, expected))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! `kbsearch`: query the knowledge base or the web from the command line.
//!
//! ```bash
//! kbsearch search "IEC 61850 protocol" --top-k 5
//! kbsearch search "substation automation" --source internet
//! kbsearch health
//! kbsearch info --json
//! ```

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use kbsearch_core::config::AppConfig;
use kbsearch_core::{DataSource, ProviderInfo, Provenance, SearchResponse};
use kbsearch_router::{DataSourceRouter, DegradationState, StoreHealth};

/// Exit status for an invalid configuration.
const CONFIG_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "kbsearch")]
#[command(about = "Knowledge-base and web search with graceful degradation", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
        /// internet | knowledge_base
        #[arg(long, short = 's', value_name = "SOURCE", default_value = "knowledge_base")]
        source: DataSource,
        /// Number of results (defaults to TOP_K_DEFAULT)
        #[arg(long, short = 'k', value_name = "N")]
        top_k: Option<usize>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe the embedding provider, vector store and reranker
    Health,
    /// Show the active backends (secrets masked)
    Info {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let router = match AppConfig::load().and_then(|config| DataSourceRouter::from_config(&config)) {
        Ok(router) => router,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(CONFIG_ERROR);
        }
    };

    match run(cli.command, &router).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, router: &DataSourceRouter) -> Result<()> {
    match command {
        Commands::Search { query, source, top_k, json } => {
            let top_k = top_k.unwrap_or_else(|| router.default_top_k());
            debug!(%source, top_k, "search");
            let response = router.search_by_data_source(&query, source, top_k).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response).context("serializing response")?);
            } else {
                print_response(&query, &response);
            }
            Ok(())
        }
        Commands::Health => {
            let snapshot = router.health().probe().await;
            let up = |ok: bool| if ok { "ok" } else { "down" };
            println!("embedding : {}", up(snapshot.embedding));
            println!(
                "store     : {}",
                match snapshot.store {
                    StoreHealth::Ready => "ok",
                    StoreHealth::CollectionMissing => "collection missing",
                    StoreHealth::Unreachable => "down",
                }
            );
            println!("reranker  : {}", snapshot.reranker.map(up).unwrap_or("disabled"));
            if let DegradationState::Degraded(cause) = snapshot.state() {
                bail!("knowledge base searches will be served from fallback ({})", cause.as_str());
            }
            Ok(())
        }
        Commands::Info { json } => {
            let backends = router.backends();
            let mut entries = vec![("embedding", backends.embedder.info()), ("store", backends.store.info())];
            if let Some(reranker) = &backends.reranker {
                entries.push(("reranker", reranker.info()));
            }
            if json {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| serde_json::to_value(v).map(|v| (k.to_string(), v)))
                    .collect::<Result<_, serde_json::Error>>()
                    .context("serializing backend info")?;
                println!("{}", serde_json::to_string_pretty(&map).context("serializing backend info")?);
            } else {
                for (role, info) in &entries {
                    print_info(role, info);
                }
                if backends.reranker.is_none() {
                    println!("reranker: disabled");
                }
            }
            Ok(())
        }
    }
}

fn print_info(role: &str, info: &ProviderInfo) {
    println!("{role}: {}", info.provider);
    for (key, value) in &info.details {
        println!("  {key} = {value}");
    }
}

fn print_response(query: &str, response: &SearchResponse) {
    println!("{} results for \"{query}\" from {}", response.len(), response.data_source);
    if let Some(cause) = response.degraded {
        println!("degraded: {}", cause.as_str());
    }
    for (i, r) in response.results.iter().enumerate() {
        let tag = match r.provenance {
            Provenance::Real => "",
            Provenance::Fallback => " [fallback]",
        };
        println!("\n  {}. {}{tag}", i + 1, r.title);
        let mut meta = vec![format!("source={}", r.source)];
        if let Some(page) = r.page_number {
            meta.push(format!("page={page}"));
        }
        if let Some(score) = r.relevance_score {
            meta.push(format!("relevance={score:.4}"));
        }
        if let Some(score) = r.similarity_score {
            meta.push(format!("similarity={score:.4}"));
        }
        if let Some(url) = &r.url {
            meta.push(url.clone());
        }
        println!("     {}", meta.join("  "));
        println!("     {}", r.content);
    }
}

use shard_search_cluster::client::cache::ResultCache;
use shard_search_cluster::client::requests::ClusterClient;
use shard_search_cluster::client::types::{IndexingOutcome, TransactionIds};
use shard_search_cluster::config::ClusterConfig;
use shard_search_cluster::membership::service::RegistryService;
use shard_search_cluster::membership::status;
use shard_search_cluster::orchestrator::service::OrchestratorService;
use shard_search_cluster::search::tokenizer::parse_keywords;
use shard_search_cluster::search::types::SearchOutcome;
use shard_search_cluster::storage::codec::encode_postings;
use shard_search_cluster::transport::discovery;
use shard_search_cluster::worker::service::WorkerService;

use anyhow::{Result, anyhow};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "0.0.0.0:0";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    let config = Arc::new(ClusterConfig::from_env()?);
    tracing::debug!("Configuration: {}", serde_json::to_string(&*config)?);
    let flags = Flags::parse(&args[2..])?;

    match args[1].as_str() {
        "registry" => run_registry(flags, config).await,
        "worker" => run_worker(flags, config).await,
        "orchestrator" => run_orchestrator(flags, config).await,
        "index" => run_index(flags, config).await,
        "search" => run_search(flags, config).await,
        other => {
            eprintln!("Unknown role: {}", other);
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {} <role> [options]", program);
    eprintln!("  {} registry [--bind <addr:port>] [--status <addr:port>]", program);
    eprintln!("  {} worker [--bind <addr:port>]", program);
    eprintln!("  {} orchestrator [--bind <addr:port>]", program);
    eprintln!("  {} index <segment-dir> [--txn <id>]", program);
    eprintln!("  {} search <keyword>...", program);
    eprintln!("Example: {} registry --bind 127.0.0.1:5000", program);
}

#[derive(Debug, Default)]
struct Flags {
    bind: Option<SocketAddr>,
    status: Option<SocketAddr>,
    txn: Option<i32>,
    positional: Vec<String>,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Self> {
        let mut flags = Flags::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    flags.bind = Some(flag_value(args, i)?.parse()?);
                    i += 2;
                }
                "--status" => {
                    flags.status = Some(flag_value(args, i)?.parse()?);
                    i += 2;
                }
                "--txn" => {
                    flags.txn = Some(flag_value(args, i)?.parse()?);
                    i += 2;
                }
                _ => {
                    flags.positional.push(args[i].clone());
                    i += 1;
                }
            }
        }
        Ok(flags)
    }

    fn bind(&self) -> Result<SocketAddr> {
        match self.bind {
            Some(addr) => Ok(addr),
            None => Ok(DEFAULT_BIND.parse()?),
        }
    }
}

fn flag_value(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", args[i]))
}

async fn run_registry(flags: Flags, config: Arc<ClusterConfig>) -> Result<()> {
    let bind_addr = flags.bind()?;
    let registry = RegistryService::new(bind_addr, config).await?;
    registry.clone().start().await?;

    // Status endpoint: explicit address, or the bind port + 1000 when the port is fixed.
    let status_addr = match flags.status {
        Some(addr) => Some(addr),
        None if bind_addr.port() != 0 => bind_addr
            .port()
            .checked_add(1000)
            .map(|port| SocketAddr::new(bind_addr.ip(), port)),
        None => None,
    };
    if let Some(addr) = status_addr {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(registry, listener).await {
                tracing::error!("Status endpoint stopped: {:#}", e);
            }
        });
    }

    wait_for_shutdown().await
}

async fn run_worker(flags: Flags, config: Arc<ClusterConfig>) -> Result<()> {
    let registry = discovery::lookup(&config.registry_info_path).await?;
    let worker = WorkerService::new(flags.bind()?, registry, config).await?;
    tracing::info!("Worker {} owns {}", worker.local_peer, worker.category());
    worker.start().await;

    wait_for_shutdown().await
}

async fn run_orchestrator(flags: Flags, config: Arc<ClusterConfig>) -> Result<()> {
    let registry = discovery::lookup(&config.registry_info_path).await?;
    let orchestrator = OrchestratorService::new(flags.bind()?, registry, config).await?;
    orchestrator.start().await?;

    wait_for_shutdown().await
}

async fn run_index(flags: Flags, config: Arc<ClusterConfig>) -> Result<()> {
    let [dir] = flags.positional.as_slice() else {
        return Err(anyhow!("index takes exactly one segment directory"));
    };

    let client = match flags.txn {
        Some(first) => {
            let orchestrator = discovery::lookup(&config.orchestrator_info_path).await?;
            ClusterClient::with_parts(
                orchestrator,
                TransactionIds::starting_at(first),
                ResultCache::default(),
            )
        }
        None => ClusterClient::discover(&config).await?,
    };

    match client.request_indexing(Path::new(dir)).await? {
        IndexingOutcome::Done => {
            println!("Indexed {}", dir);
            Ok(())
        }
        IndexingOutcome::Failed => {
            eprintln!("Indexing {} failed", dir);
            std::process::exit(2);
        }
    }
}

async fn run_search(flags: Flags, config: Arc<ClusterConfig>) -> Result<()> {
    let keywords = parse_keywords(&flags.positional.join(" "));
    if keywords.is_empty() {
        return Err(anyhow!("search needs at least one keyword"));
    }

    let client = ClusterClient::discover(&config).await?;
    match client.request_searching(&keywords).await? {
        SearchOutcome::Done(results) => {
            for (keyword, postings) in results {
                println!("{}: {}", keyword, encode_postings(&postings));
            }
            Ok(())
        }
        SearchOutcome::Failed => {
            eprintln!("Search failed");
            std::process::exit(2);
        }
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

//! kb-worker — long-lived queue consumer wrapping the Pipeline Coordinator.
//!
//! Pops one URL at a time and runs it to completion synchronously; on
//! SIGTERM/SIGINT the in-flight session is allowed to reach its natural end
//! (bounded by the fetch timeout) before the process exits. Grounded on
//! `crates/server/src/ingestion/queue_listener.rs`'s
//! consecutive-error backoff shape and `crates/ingest/src/bin/ingest-worker.rs`'s
//! CLI/tracing-init/main layout.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kb_core::config::Config;
use kb_core::seedlist::lookup_vendor_hint;
use kb_coordinator::Coordinator;
use kb_ingest::{create_embedder, Fetcher};
use kb_monitor::Monitor;
use kb_notify::{HttpChatTransport, Notifier};
use kb_queue::{MemoryQueue, Queue, QueueError, SqsQueue};
use kb_store::{AtomStore, FingerprintIndex, MetricsStore};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_STORAGE_ERROR: i32 = 2;

/// kb-worker — queue consumer for the ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "kb-worker", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the consumer loop until shutdown.
    Run,
    /// Report basic liveness: config load, queue reachability, storage reachability.
    Status,
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    kb_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    match cli.command {
        Command::Status => run_status(&config).await,
        Command::Run => run_worker(&config).await,
    }
}

async fn run_status(config: &Config) -> i32 {
    let queue = match build_queue(config).await {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "failed to build queue backend");
            return EXIT_CONFIG_ERROR;
        }
    };
    match queue.health_check().await {
        Ok(health) => info!(%health, "queue reachable"),
        Err(e) => {
            error!(error = %e, "queue health check failed");
            return EXIT_STORAGE_ERROR;
        }
    }

    match kb_store::connect(&config.postgres).await {
        Ok(_pool) => info!("postgres reachable, migrations up to date"),
        Err(e) => {
            error!(error = %e, "postgres unreachable");
            return EXIT_STORAGE_ERROR;
        }
    }

    info!("kb-worker status: ok");
    EXIT_OK
}

async fn run_worker(config: &Config) -> i32 {
    let queue: Arc<dyn Queue> = match build_queue(config).await {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "failed to build queue backend");
            return EXIT_CONFIG_ERROR;
        }
    };

    let llm = match kb_llm::providers::create_provider(&config.llm) {
        Ok(p) => Arc::from(p),
        Err(e) => {
            error!(error = %e, "failed to build llm provider");
            return EXIT_CONFIG_ERROR;
        }
    };

    let embedder: Arc<dyn kb_ingest::embedding::Embedder> = match create_embedder(&config.embedding) {
        Ok(e) => Arc::from(e),
        Err(e) => {
            error!(error = %e, "failed to build embedder");
            return EXIT_CONFIG_ERROR;
        }
    };

    let pool = match kb_store::connect(&config.postgres).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to connect to postgres / apply migrations");
            return EXIT_STORAGE_ERROR;
        }
    };

    let fingerprint = Arc::new(FingerprintIndex::new(pool.clone()));
    let atom_store = Arc::new(AtomStore::new(pool.clone()));
    let metrics_store = MetricsStore::new(pool.clone());

    let (shutdown_tx, monitor_shutdown_rx) = broadcast::channel::<()>(4);
    let (monitor, monitor_handle) =
        Monitor::spawn(config.monitor.clone(), Some(metrics_store), monitor_shutdown_rx);

    let notifier_task = config.notifier.webhook_url.clone().map(|webhook_url| {
        let transport: Arc<dyn kb_notify::ChatTransport> =
            Arc::new(HttpChatTransport::new(webhook_url, None));
        let notifier = Arc::new(Notifier::new(&config.notifier, transport));
        let events = monitor.subscribe();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { notifier.run(events, shutdown_rx).await })
    });

    let fetcher = Fetcher::new(&config.fetch);
    let coordinator = Coordinator::new(
        fetcher,
        llm,
        embedder,
        fingerprint,
        atom_store,
        monitor,
        config.llm.temperature,
        config.llm.max_tokens,
        config.embedding.batch_size as usize,
        config.embedding.max_retries,
    );

    let mut shutdown_signal = shutdown_tx.subscribe();
    let pop_timeout = Duration::from_secs(config.worker.pop_timeout_secs);
    let seed_list_path = config.scheduler.seed_list_path.clone();

    spawn_signal_listener(shutdown_tx.clone());

    info!("kb-worker entering consumer loop");
    loop {
        let popped = tokio::select! {
            res = queue.pop(pop_timeout) => res,
            _ = shutdown_signal.recv() => {
                info!("shutdown signal received while idle, exiting");
                break;
            }
        };

        let item = match popped {
            Ok(Some(item)) => item,
            Ok(None) => continue, // liveness tick, nothing to do
            Err(e) => {
                warn!(error = %e, "queue pop failed, retrying");
                continue;
            }
        };

        let vendor_hint = lookup_vendor_hint(&seed_list_path, &item.url);
        coordinator.run_session(&item.url, vendor_hint).await;

        if let Err(e) = queue.ack(&item).await {
            warn!(url = %item.url, error = %e, "failed to ack processed item");
        }
    }

    let _ = shutdown_tx.send(());
    let drain_timeout = Duration::from_secs(config.worker.shutdown_drain_timeout_secs);
    if tokio::time::timeout(drain_timeout, monitor_handle).await.is_err() {
        warn!("monitor writer did not finish draining within timeout");
    }
    if let Some(task) = notifier_task {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            warn!("notifier did not finish draining within timeout");
        }
    }

    info!("kb-worker shut down cleanly");
    EXIT_OK
}

/// Forward SIGTERM/SIGINT onto the shutdown broadcast so the consumer loop
/// and the monitor/notifier writer tasks all observe the same signal.
fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("received ctrl-c");
        }
        let _ = shutdown_tx.send(());
    });
}

async fn build_queue(config: &Config) -> Result<Arc<dyn Queue>, QueueError> {
    match config.queue.backend.as_str() {
        "sqs" => Ok(Arc::new(SqsQueue::new(&config.queue).await?)),
        "memory" => Ok(Arc::new(MemoryQueue::new())),
        other => Err(QueueError::Connection(format!("unknown queue backend: '{other}'"))),
    }
}

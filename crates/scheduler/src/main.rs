//! kb-scheduler — fixed-cadence seed-list sweep.
//!
//! No subcommands: the only behavior is the sweep loop. Grounded on
//! `crates/server/src/ingestion/scheduler.rs`'s poll-loop shape (sleep,
//! query/read due work, per-item try/warn-continue), adapted from a
//! cron-driven per-source due query to a fixed interval over a static
//! seed-list file, since this core has no per-source cron scheduling concept.

use std::sync::Arc;
use std::time::Duration;

use kb_core::config::Config;
use kb_core::seedlist::parse_seed_list;
use kb_ingest::sniff_source_type;
use kb_queue::{MemoryQueue, Queue, QueueError, SqsQueue};
use kb_store::FingerprintIndex;
use tracing::{error, info, warn};

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
    let config = Config::from_env();
    config.log_summary();

    let queue: Arc<dyn Queue> = match build_queue(&config).await {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "failed to build queue backend");
            return 1;
        }
    };

    let pool = match kb_store::connect(&config.postgres).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to connect to postgres / apply migrations");
            return 2;
        }
    };
    let fingerprint = FingerprintIndex::new(pool);

    let cadence = Duration::from_secs(config.scheduler.cadence_secs);
    info!(cadence_secs = cadence.as_secs(), path = %config.scheduler.seed_list_path, "kb-scheduler starting sweep loop");

    let mut shutdown = std::pin::pin!(shutdown_signal());
    loop {
        tokio::select! {
            _ = tokio::time::sleep(cadence) => {
                sweep(&config.scheduler.seed_list_path, &fingerprint, queue.as_ref()).await;
            }
            _ = &mut shutdown => {
                info!("kb-scheduler shutting down");
                break;
            }
        }
    }

    0
}

async fn sweep(seed_list_path: &str, fingerprint: &FingerprintIndex, queue: &dyn Queue) {
    let contents = match tokio::fs::read_to_string(seed_list_path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %seed_list_path, error = %e, "scheduler: failed to read seed list, skipping sweep");
            return;
        }
    };

    let entries = parse_seed_list(&contents);
    let mut claimed = 0u32;
    let mut skipped = 0u32;

    for entry in &entries {
        let source_type = sniff_source_type(&entry.url, None);
        let result = fingerprint.try_claim(&entry.url, source_type).await;
        if !result.claimed {
            skipped += 1;
            continue;
        }
        if let Err(e) = queue.push(&entry.url).await {
            warn!(url = %entry.url, error = %e, "scheduler: failed to enqueue claimed url");
            continue;
        }
        claimed += 1;
    }

    info!(total = entries.len(), claimed, skipped, "scheduler: sweep complete");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn build_queue(config: &Config) -> Result<Arc<dyn Queue>, QueueError> {
    match config.queue.backend.as_str() {
        "sqs" => Ok(Arc::new(SqsQueue::new(&config.queue).await?)),
        "memory" => Ok(Arc::new(MemoryQueue::new())),
        other => Err(QueueError::Connection(format!("unknown queue backend: '{other}'"))),
    }
}

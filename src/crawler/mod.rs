//! Crawler module for page discovery and image retrieval
//!
//! This module contains the harvesting logic, including:
//! - HTTP fetching (client construction, status vs. transport failures)
//! - HTML parsing of recommendation links and gallery images
//! - The discovery (producer) and retrieval (consumer) workers
//! - Supervision and restart of failed workers

mod discovery;
mod fetcher;
mod parser;
mod retrieval;
mod supervisor;
mod throttle;

pub use discovery::{DiscoveryStep, DiscoveryWorker};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use parser::{extract_image_sources, extract_recommendations, Recommendation};
pub use retrieval::{RetrievalPass, RetrievalWorker};
pub use supervisor::{supervise, RestartPolicy};
pub use throttle::Throttle;

use crate::config::Config;
use crate::output::ensure_output_root;
use crate::storage::open_store;
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Starts the harvester
///
/// This is the main entry point. It will:
/// 1. Create the output root and verify the queue database opens
/// 2. Build the shared HTTP client
/// 3. Launch the retrieval worker and, unless `mute`, the discovery worker,
///    each under its own supervisor
///
/// Workers run until the process is terminated, so this only returns when a
/// supervisor gives up on its worker.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `mute` - Do not discover new pages; only drain the existing queue
pub async fn start(config: Config, mute: bool) -> Result<(), HarvestError> {
    let config = Arc::new(config);

    ensure_output_root(&config.persistence.output)?;
    open_store(&config.persistence.database_path, &config.store)?.close()?;
    let client = build_http_client(&config.http)?;
    let policy = RestartPolicy::from_config(&config.supervisor);

    let mut workers = JoinSet::new();

    if mute {
        tracing::info!("Discovery is muted, only retrieving images");
    } else {
        let config = Arc::clone(&config);
        let client = client.clone();
        workers.spawn(supervise("discovery", policy.clone(), move || {
            DiscoveryWorker::new(Arc::clone(&config), client.clone()).run()
        }));
    }

    {
        let config = Arc::clone(&config);
        workers.spawn(supervise("retrieval", policy, move || {
            RetrievalWorker::new(Arc::clone(&config), client.clone()).run()
        }));
    }

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Stopping harvest: {}", e);
                workers.abort_all();
                return Err(e);
            }
            Err(e) => {
                workers.abort_all();
                return Err(HarvestError::WorkerPanicked {
                    worker: "supervisor",
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(())
}

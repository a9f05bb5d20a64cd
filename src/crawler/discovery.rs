//! Page discovery worker
//!
//! Walks the recommendation graph one page at a time: fetch the current
//! entrypoint, record every recommended page that is not queued yet, then
//! follow the first recommendation. Every `thresholds.pages` iterations the
//! walk restarts from the configured entrypoint so it does not drift away
//! from the intended part of the site.

use crate::config::Config;
use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::extract_recommendations;
use crate::crawler::throttle::Throttle;
use crate::storage::{open_store, PageQueue};
use crate::url::resolve;
use crate::HarvestError;
use reqwest::Client;
use std::sync::Arc;

/// Discovery sleeps this many times longer than retrieval so it does not
/// outrun the image downloads
const DISCOVERY_THROTTLE_FACTOR: u64 = 10;

/// Outcome of one discovery iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStep {
    /// Moved on to the first recommendation of the fetched page
    Advanced { discovered: usize, inserted: usize },

    /// Iteration budget reached; the next step starts from the origin again
    Resynced { discovered: usize, inserted: usize },

    /// The page could not be used; the next step starts from the origin again
    Unavailable,
}

/// Producer half of the harvester
pub struct DiscoveryWorker {
    config: Arc<Config>,
    client: Client,
    origin: String,
    entrypoint: String,
    iterations: u32,
    throttle: Option<Throttle>,
}

impl DiscoveryWorker {
    pub fn new(config: Arc<Config>, client: Client) -> Self {
        let origin = config.site.entrypoint.clone();
        let throttle = Throttle::from_config(config.throttle.as_ref())
            .map(|throttle| throttle.scaled(DISCOVERY_THROTTLE_FACTOR));

        Self {
            config,
            client,
            entrypoint: origin.clone(),
            origin,
            iterations: 0,
            throttle,
        }
    }

    /// The construction-time entrypoint
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The page the next step will fetch
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    /// Successful iterations since the last restart from the origin
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Runs one discovery iteration against `queue`
    ///
    /// Fetch failures are reported as [`DiscoveryStep::Unavailable`] and
    /// reset the walk to the origin. Storage failures are returned as errors.
    pub async fn step<Q: PageQueue>(&mut self, queue: &mut Q) -> Result<DiscoveryStep, HarvestError> {
        let url = resolve(&self.config.site.base_url, &self.entrypoint);
        tracing::info!(url = %url, "Reached new page");

        let body = match fetch_url(&self.client, &url).await {
            Ok(FetchResult::Success { body }) => body,
            Ok(FetchResult::HttpError { status_code }) => {
                tracing::warn!(url = %url, status = status_code, "Status code is not ok");
                self.restart_from_origin();
                return Ok(DiscoveryStep::Unavailable);
            }
            Err(e) => {
                tracing::warn!(url = %url, "Failed to reach the page: {}", e);
                self.restart_from_origin();
                return Ok(DiscoveryStep::Unavailable);
            }
        };

        let recommendations = extract_recommendations(&String::from_utf8_lossy(&body));
        let Some(next) = recommendations.first().map(|r| r.url.clone()) else {
            tracing::warn!(url = %url, "No recommendation links found");
            self.restart_from_origin();
            return Ok(DiscoveryStep::Unavailable);
        };

        let mut inserted = 0;
        for recommendation in &recommendations {
            if queue.page_exists(&recommendation.url)? {
                continue;
            }
            tracing::info!(
                url = %recommendation.url,
                label = %recommendation.label,
                "Saving new page"
            );
            queue.insert_page(&recommendation.url, &recommendation.label)?;
            inserted += 1;
        }

        let discovered = recommendations.len();
        self.entrypoint = next;
        self.iterations += 1;

        if self.iterations >= self.config.thresholds.pages {
            tracing::info!(
                iterations = self.iterations,
                "Restarting discovery from initial entrypoint"
            );
            self.restart_from_origin();
            return Ok(DiscoveryStep::Resynced {
                discovered,
                inserted,
            });
        }

        Ok(DiscoveryStep::Advanced {
            discovered,
            inserted,
        })
    }

    // Any failure discards the walk so far, not just the failed page.
    // See DESIGN.md before changing this.
    fn restart_from_origin(&mut self) {
        self.entrypoint = self.origin.clone();
        self.iterations = 0;
    }

    /// Runs the worker until a storage error occurs
    ///
    /// Unavailable pages are retried forever: wait the retry delay, reopen
    /// the queue connection, start again from the origin.
    pub async fn run(mut self) -> Result<(), HarvestError> {
        let config = Arc::clone(&self.config);
        let mut store = open_store(&config.persistence.database_path, &config.store)?;
        tracing::info!(entrypoint = %self.origin, "Discovery worker started");

        loop {
            match self.step(&mut store).await? {
                DiscoveryStep::Unavailable => {
                    tokio::time::sleep(config.retry.delay()).await;
                    store.close()?;
                    store = open_store(&config.persistence.database_path, &config.store)?;
                }
                DiscoveryStep::Advanced { .. } | DiscoveryStep::Resynced { .. } => {
                    if let Some(throttle) = &self.throttle {
                        throttle.pause().await;
                    }
                }
            }
        }
    }
}

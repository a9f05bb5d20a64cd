//! Image retrieval worker
//!
//! Takes the oldest ready page, downloads its images into the page's
//! directory and marks the page finished. The directory's entry count tells
//! a later pass where to resume, so an interrupted page never re-downloads
//! what it already has.

use crate::config::Config;
use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::extract_image_sources;
use crate::crawler::throttle::Throttle;
use crate::output::PageDirectory;
use crate::storage::{open_store, PageQueue};
use crate::url::{full_size_image_url, image_extension, resolve};
use crate::HarvestError;
use reqwest::Client;
use std::sync::Arc;

/// Outcome of one retrieval pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalPass {
    /// No ready page in the queue
    Idle,

    /// The page itself could not be fetched; it stays ready
    PageUnavailable { url: String },

    /// A transport error interrupted the images; the page stays ready
    Aborted {
        url: String,
        saved: usize,
        skipped: usize,
    },

    /// Every image was saved or skipped and the page is finished
    Finished {
        url: String,
        saved: usize,
        skipped: usize,
    },
}

enum ImageOutcome {
    Saved,
    Skipped,
    Unreachable(reqwest::Error),
}

/// Consumer half of the harvester
pub struct RetrievalWorker {
    config: Arc<Config>,
    client: Client,
    throttle: Option<Throttle>,
}

impl RetrievalWorker {
    pub fn new(config: Arc<Config>, client: Client) -> Self {
        let throttle = Throttle::from_config(config.throttle.as_ref());
        Self {
            config,
            client,
            throttle,
        }
    }

    /// Processes the oldest ready page in `queue`, if any
    pub async fn process_next<Q: PageQueue>(&self, queue: &mut Q) -> Result<RetrievalPass, HarvestError> {
        let Some(page) = queue.next_ready_page()? else {
            return Ok(RetrievalPass::Idle);
        };

        let url = resolve(&self.config.site.base_url, &page.url);
        let body = match fetch_url(&self.client, &url).await {
            Ok(FetchResult::Success { body }) => body,
            Ok(FetchResult::HttpError { status_code }) => {
                tracing::warn!(url = %url, status = status_code, "Status code is not ok");
                return Ok(RetrievalPass::PageUnavailable { url: page.url });
            }
            Err(e) => {
                tracing::warn!(url = %url, "Failed to reach the page: {}", e);
                return Ok(RetrievalPass::PageUnavailable { url: page.url });
            }
        };

        let sources = extract_image_sources(&String::from_utf8_lossy(&body));

        let dir = PageDirectory::for_label(&self.config.persistence.output, &page.label);
        dir.ensure()?;
        let resume_from = dir.resume_index()?;

        tracing::info!(
            url = %url,
            label = %page.label,
            images = sources.len(),
            resume_from,
            "Start dealing with page"
        );

        let mut saved = 0;
        let mut skipped = 0;
        for (ordinal, source) in sources.iter().enumerate().skip(resume_from) {
            let source = full_size_image_url(source);
            match self.retrieve_image(&dir, ordinal, &source).await? {
                ImageOutcome::Saved => saved += 1,
                ImageOutcome::Skipped => skipped += 1,
                ImageOutcome::Unreachable(e) => {
                    tracing::warn!(url = %url, ordinal, "Failed to get the image, aborting page: {}", e);
                    return Ok(RetrievalPass::Aborted {
                        url: page.url,
                        saved,
                        skipped,
                    });
                }
            }
        }

        if !queue.mark_finished(&page.url)? {
            tracing::warn!(url = %page.url, "Page was already finished");
        }
        tracing::info!(url = %url, label = %page.label, saved, skipped, "Finished dealing with page");

        Ok(RetrievalPass::Finished {
            url: page.url,
            saved,
            skipped,
        })
    }

    /// Downloads one image, retrying bad statuses up to the image threshold
    ///
    /// When the budget runs out an empty placeholder named after the last
    /// status takes the image's slot. Transport errors are returned as
    /// `Unreachable` without retrying.
    async fn retrieve_image(
        &self,
        dir: &PageDirectory,
        ordinal: usize,
        source: &str,
    ) -> Result<ImageOutcome, HarvestError> {
        let url = resolve(&self.config.site.base_url, source);
        let extension = image_extension(source);
        let attempts = self.config.thresholds.images.max(1);

        let mut last_status = 0;
        for attempt in 1..=attempts {
            match fetch_url(&self.client, &url).await {
                Ok(FetchResult::Success { body }) => {
                    let path = dir.save_image(ordinal, &extension, &body)?;
                    tracing::info!(path = %path.display(), "Saving image");
                    return Ok(ImageOutcome::Saved);
                }
                Ok(FetchResult::HttpError { status_code }) => {
                    last_status = status_code;
                    tracing::warn!(url = %url, status = status_code, attempt, "Status code is not ok");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry.delay()).await;
                    }
                }
                Err(e) => return Ok(ImageOutcome::Unreachable(e)),
            }
        }

        let path = dir.save_placeholder(ordinal, &extension, last_status)?;
        tracing::warn!(path = %path.display(), "Retry times exceeded, skipping image");
        Ok(ImageOutcome::Skipped)
    }

    /// Runs the worker until a storage or filesystem error occurs
    pub async fn run(self) -> Result<(), HarvestError> {
        let config = Arc::clone(&self.config);
        let mut store = open_store(&config.persistence.database_path, &config.store)?;
        tracing::info!("Retrieval worker started");

        loop {
            match self.process_next(&mut store).await? {
                RetrievalPass::Finished { .. } => {
                    if let Some(throttle) = &self.throttle {
                        throttle.pause().await;
                    }
                }
                pass => {
                    if pass == RetrievalPass::Idle {
                        tracing::debug!("No ready page, waiting");
                    }
                    tokio::time::sleep(config.retry.delay()).await;
                    store.close()?;
                    store = open_store(&config.persistence.database_path, &config.store)?;
                }
            }
        }
    }
}

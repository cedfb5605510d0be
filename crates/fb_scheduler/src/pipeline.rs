use fb_core::{ConfigProvider, Error, Result};
use fb_crawler::ContentCrawler;
use fb_delivery::DeliveryManager;
use fb_digest::DigestRenderer;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::scheduler::{JobHandler, Scheduler};

pub const DIGEST_JOB_NAME: &str = "morning-brief";

/// Where a digest cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    NoSources,
    NoArticles,
    NoNewArticles,
    NoDestinations,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub fetched: usize,
    pub new_articles: usize,
    pub persisted: usize,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl CycleReport {
    fn stopped(outcome: CycleOutcome, fetched: usize) -> Self {
        Self {
            outcome,
            fetched,
            new_articles: 0,
            persisted: 0,
            delivered: Vec::new(),
            failed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerSummary {
    pub sources_count: usize,
    pub destinations_count: usize,
    /// New articles the triggered cycle stored and delivered.
    pub articles_count: usize,
}

/// fetch -> dedup -> persist -> deliver, one run at a time.
pub struct DigestPipeline {
    config: Arc<dyn ConfigProvider>,
    crawler: ContentCrawler,
    renderer: DigestRenderer,
    delivery: DeliveryManager,
    run_guard: Mutex<()>,
}

impl DigestPipeline {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        crawler: ContentCrawler,
        renderer: DigestRenderer,
        delivery: DeliveryManager,
    ) -> Self {
        Self {
            config,
            crawler,
            renderer,
            delivery,
            run_guard: Mutex::new(()),
        }
    }

    pub async fn execute_digest_cycle(&self) -> Result<CycleReport> {
        let _guard = self.run_guard.lock().await;

        let sources = self.config.enabled_sources().await?;
        if sources.is_empty() {
            info!("no RSS sources configured, skipping digest");
            return Ok(CycleReport::stopped(CycleOutcome::NoSources, 0));
        }

        info!(sources = sources.len(), "fetching articles");
        let articles = self.crawler.fetch_all(&sources).await;
        let fetched = articles.len();
        if articles.is_empty() {
            info!("no articles fetched from any source");
            return Ok(CycleReport::stopped(CycleOutcome::NoArticles, 0));
        }

        let fresh = self.crawler.filter_new(articles).await;
        if fresh.is_empty() {
            info!(fetched, "no new articles to send");
            return Ok(CycleReport::stopped(CycleOutcome::NoNewArticles, fetched));
        }
        info!(fetched, new = fresh.len(), "found new articles");

        // Only stored articles go out, so every delivery record has its row.
        let stored = self.crawler.persist(&fresh).await?;
        if stored.is_empty() {
            info!(new = fresh.len(), "new articles collide with stored ones, nothing to send");
            return Ok(CycleReport {
                new_articles: fresh.len(),
                ..CycleReport::stopped(CycleOutcome::NoNewArticles, fetched)
            });
        }

        let mut report = CycleReport {
            outcome: CycleOutcome::NoDestinations,
            fetched,
            new_articles: fresh.len(),
            persisted: stored.len(),
            delivered: Vec::new(),
            failed: Vec::new(),
        };

        let destinations = self.config.enabled_destinations().await?;
        if destinations.is_empty() {
            warn!("no destinations configured, new articles were saved but not sent");
            return Ok(report);
        }

        for destination in &destinations {
            let pending = self.delivery.pending_for(destination, &stored).await;
            let digest = if pending.is_empty() {
                self.renderer.no_new_content()
            } else {
                self.renderer.render(&pending)
            };

            match self.delivery.send(destination, &digest).await {
                Ok(()) => report.delivered.push(destination.id.clone()),
                Err(e) => {
                    error!(destination = %destination.name, "digest not delivered: {}", e);
                    report.failed.push(destination.id.clone());
                }
            }
        }

        report.outcome = CycleOutcome::Delivered;
        info!(
            articles = report.persisted,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "digest cycle finished"
        );
        Ok(report)
    }

    /// Runs a cycle right away. Missing sources or destinations are an error
    /// here, before anything is fetched.
    pub async fn trigger_now(&self) -> Result<TriggerSummary> {
        info!("manual digest trigger");
        let sources = self.config.enabled_sources().await?;
        if sources.is_empty() {
            return Err(Error::Configuration("no RSS sources configured".to_string()));
        }
        let destinations = self.config.enabled_destinations().await?;
        if destinations.is_empty() {
            return Err(Error::Configuration("no destinations configured".to_string()));
        }

        let report = self.execute_digest_cycle().await?;
        Ok(TriggerSummary {
            sources_count: sources.len(),
            destinations_count: destinations.len(),
            articles_count: report.persisted,
        })
    }

    /// Registers the digest under [`DIGEST_JOB_NAME`].
    pub async fn schedule(self: &Arc<Self>, scheduler: &Scheduler, expression: &str) -> Result<()> {
        scheduler
            .add_job(DIGEST_JOB_NAME, expression, self.job_handler())
            .await
    }

    pub fn job_handler(self: &Arc<Self>) -> Arc<dyn JobHandler> {
        let pipeline = Arc::clone(self);
        Arc::new(move || {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.execute_digest_cycle().await.map(|_| ()) }
        })
    }
}

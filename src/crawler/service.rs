use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, HttpTransport};
use crate::crawler::{crawl_city, CrawlReport};
use crate::sources;
use crate::storage::sqlite::Storage;

pub struct ScrapingService {
    cfg: Config,
    storage: Storage,
}

impl ScrapingService {
    pub async fn new(cfg: Config) -> anyhow::Result<Self> {
        let storage = Storage::new(&cfg.database_url).await?;
        Ok(Self { cfg, storage })
    }

    /// Runs every registered source across every configured city, one
    /// stream at a time. A failed stream is reported and the next one
    /// starts; nothing here aborts siblings.
    pub async fn run(&mut self) -> anyhow::Result<Vec<CrawlReport>> {
        let fetcher = Fetcher::new(
            HttpTransport::new(),
            self.cfg.max_retries,
            self.cfg.initial_backoff,
            self.cfg.backoff_factor,
        );

        let mut reports = Vec::new();
        for extractor in sources::all() {
            let base_urls = self.cfg.base_urls(extractor.tag());
            if base_urls.is_empty() {
                warn!(source = extractor.tag(), "No URL template, skipping source");
                continue;
            }

            for (city, base_url) in base_urls {
                info!(source = extractor.tag(), %city, "Starting stream");
                let report = crawl_city(
                    &fetcher,
                    extractor.as_ref(),
                    &mut self.storage,
                    &city,
                    &base_url,
                    self.cfg.politeness,
                )
                .await;
                reports.push(report);
            }
        }

        Ok(reports)
    }

    pub async fn total_stored(&self) -> anyhow::Result<i64> {
        self.storage.total().await
    }
}

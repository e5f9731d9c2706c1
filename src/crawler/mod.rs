use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::sources::Extractor;
use crate::storage::sqlite::Storage;

pub mod fetcher;
pub mod models;
pub mod service;

use fetcher::{Fetcher, PageTransport};
use models::Listing;

/// How a single (source, city) stream ended. None of these is fatal to
/// sibling streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every page up to the discovered maximum was processed.
    Completed,
    /// A page came back with no listings before the maximum was reached.
    Exhausted,
    /// A fetch ran out of retries.
    Aborted,
}

#[derive(Debug)]
pub struct CrawlReport {
    pub source: &'static str,
    pub city: String,
    pub outcome: CrawlOutcome,
    pub pages: u32,
    pub inserted: usize,
    pub updated: usize,
}

pub async fn crawl_city<T: PageTransport>(
    fetcher: &Fetcher<T>,
    extractor: &dyn Extractor,
    storage: &mut Storage,
    city: &str,
    base_url: &str,
    politeness: Duration,
) -> CrawlReport {
    let source = extractor.tag();
    let first = extractor.first_page();

    let mut report = CrawlReport {
        source,
        city: city.to_string(),
        outcome: CrawlOutcome::Aborted,
        pages: 0,
        inserted: 0,
        updated: 0,
    };

    let first_html = match fetcher.fetch(&page_url(base_url, first)).await {
        Ok(html) => html,
        Err(e) => {
            warn!(source, city, error = %e, "Failed to fetch the first page");
            return report;
        }
    };

    let max_page = extractor.max_page(&first_html);
    info!(source, city, max_page, "Discovered page count");

    let mut page = first;
    loop {
        let html = match fetcher.fetch(&page_url(base_url, page)).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source, city, page, error = %e, "Fetch failed mid-run, aborting stream");
                report.outcome = CrawlOutcome::Aborted;
                break;
            }
        };

        let raw_listings = extractor.listings(&html);
        if raw_listings.is_empty() {
            info!(source, city, page, "No more listings, stream exhausted");
            report.outcome = CrawlOutcome::Exhausted;
            break;
        }

        let mut batch = Vec::with_capacity(raw_listings.len());
        for raw in raw_listings {
            match Listing::build(raw) {
                Ok(listing) => batch.push(listing),
                Err(e) => {
                    // One malformed listing must not sink the page.
                    warn!(source, city, page, error = %e, "Skipping invalid listing");
                }
            }
        }

        let summary = storage.upsert_listings(&batch, source).await;
        report.inserted += summary.inserted;
        report.updated += summary.updated;
        report.pages += 1;

        if page >= max_page {
            report.outcome = CrawlOutcome::Completed;
            break;
        }

        sleep(politeness).await;
        page += 1;
    }

    info!(
        source,
        city,
        outcome = ?report.outcome,
        pages = report.pages,
        inserted = report.inserted,
        updated = report.updated,
        "Stream finished"
    );
    report
}

fn page_url(base_url: &str, page: u32) -> String {
    format!("{}{}", base_url, page)
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::fetcher::testing::ScriptedTransport;
    use super::fetcher::AttemptError;
    use super::*;
    use crate::crawler::models::RawListing;

    // Page bodies are comma-separated titles; an empty body is an empty page.
    struct FakeSource {
        max_page: u32,
    }

    impl Extractor for FakeSource {
        fn tag(&self) -> &'static str {
            "fake"
        }

        fn max_page(&self, _html: &str) -> u32 {
            self.max_page
        }

        fn listings(&self, html: &str) -> Vec<RawListing> {
            html.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| RawListing {
                    title: Some(t.to_string()),
                    price: Some("100 000 zł".to_string()),
                    ..RawListing::default()
                })
                .collect()
        }
    }

    async fn storage() -> Storage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Storage::from_pool(pool).await.unwrap()
    }

    fn fetcher(
        script: Vec<Result<String, AttemptError>>,
    ) -> (Fetcher<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new(script);
        // Zero backoff: the sqlite pool's worker thread cannot coexist with
        // tokio's paused clock, so these tests must run on real time.
        let fetcher = Fetcher::new(transport.clone(), 5, Duration::ZERO, 2);
        (fetcher, transport)
    }

    async fn run(
        fetcher: &Fetcher<ScriptedTransport>,
        source: &FakeSource,
        storage: &mut Storage,
    ) -> CrawlReport {
        crawl_city(
            fetcher,
            source,
            storage,
            "gdansk",
            "http://fake.test/?page=",
            Duration::ZERO,
        )
        .await
    }

    #[tokio::test]
    async fn reaches_max_page_and_completes() {
        // Discovery fetch of page 1, then pages 1 and 2.
        let (fetcher, _transport) = fetcher(vec![
            Ok("a,b".to_string()),
            Ok("a,b".to_string()),
            Ok("c".to_string()),
        ]);
        let mut storage = storage().await;

        let report = run(&fetcher, &FakeSource { max_page: 2 }, &mut storage).await;

        assert_eq!(report.outcome, CrawlOutcome::Completed);
        assert_eq!(report.pages, 2);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.updated, 0);
    }

    #[tokio::test]
    async fn empty_page_before_max_ends_as_exhausted() {
        let (fetcher, transport) = fetcher(vec![
            Ok("a,b".to_string()),
            Ok("a,b".to_string()),
            Ok("".to_string()),
        ]);
        let mut storage = storage().await;

        let report = run(&fetcher, &FakeSource { max_page: 5 }, &mut storage).await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted);
        assert_eq!(report.pages, 1);
        assert_eq!(report.inserted, 2);
        // Page 3 and beyond were never fetched.
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn failed_first_fetch_aborts_with_no_pages() {
        let (fetcher, _transport) = fetcher(vec![
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
        ]);
        let mut storage = storage().await;

        let report = run(&fetcher, &FakeSource { max_page: 3 }, &mut storage).await;

        assert_eq!(report.outcome, CrawlOutcome::Aborted);
        assert_eq!(report.pages, 0);
        assert_eq!(report.inserted, 0);
    }

    #[tokio::test]
    async fn mid_run_fetch_failure_keeps_earlier_totals() {
        let mut script = vec![Ok("a,b".to_string()), Ok("a,b".to_string())];
        script.extend((0..5).map(|_| Err(AttemptError::Connection("down".to_string()))));
        let (fetcher, _transport) = fetcher(script);
        let mut storage = storage().await;

        let report = run(&fetcher, &FakeSource { max_page: 4 }, &mut storage).await;

        assert_eq!(report.outcome, CrawlOutcome::Aborted);
        assert_eq!(report.pages, 1);
        assert_eq!(report.inserted, 2);
    }

    #[tokio::test]
    async fn invalid_listings_are_skipped_not_fatal() {
        struct OneBadApple;

        impl Extractor for OneBadApple {
            fn tag(&self) -> &'static str {
                "fake"
            }

            fn max_page(&self, _html: &str) -> u32 {
                1
            }

            fn listings(&self, _html: &str) -> Vec<RawListing> {
                vec![
                    RawListing {
                        title: Some("good".to_string()),
                        price: Some("100 000 zł".to_string()),
                        ..RawListing::default()
                    },
                    RawListing {
                        title: Some("bad".to_string()),
                        price: Some("cena do uzgodnienia".to_string()),
                        ..RawListing::default()
                    },
                    RawListing {
                        title: Some("also good".to_string()),
                        area: Some("40 m²".to_string()),
                        ..RawListing::default()
                    },
                ]
            }
        }

        let (fetcher, _transport) = fetcher(vec![Ok("x".to_string()), Ok("x".to_string())]);
        let mut storage = storage().await;

        let report = crawl_city(
            &fetcher,
            &OneBadApple,
            &mut storage,
            "gdansk",
            "http://fake.test/?page=",
            Duration::ZERO,
        )
        .await;

        assert_eq!(report.outcome, CrawlOutcome::Completed);
        assert_eq!(report.inserted, 2);
        assert_eq!(storage.total().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_run_over_the_same_pages_updates_instead_of_inserting() {
        let mut storage = storage().await;

        let (fetcher1, _t1) = fetcher(vec![Ok("a,b".to_string()), Ok("a,b".to_string())]);
        let first = run(&fetcher1, &FakeSource { max_page: 1 }, &mut storage).await;
        assert_eq!(first.inserted, 2);

        let (fetcher2, _t2) = fetcher(vec![Ok("a,b".to_string()), Ok("a,b".to_string())]);
        let second = run(&fetcher2, &FakeSource { max_page: 1 }, &mut storage).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(storage.total().await.unwrap(), 2);
    }
}

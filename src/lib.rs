use serde_json::Value;
use tokio::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

pub mod cache;
pub mod sink;
pub mod ted;

mod data;
mod error;
mod utils;

pub use data::{columns, Row, Schema, TED_COLUMNS};
pub use error::ScraperError;

use cache::PageCache;
use ted::{DetailExtractor, DetailPage, NoticeExtractor};

/// Turns one document into flat rows.
pub trait Extractor {
    type Document;

    fn extract(&self, doc: &Self::Document) -> Vec<Row>;
}

/// Where search pages and rendered notices come from.
#[async_trait::async_trait]
pub trait NoticeSource: Send + Sync {
    async fn search_page(&self, page: u32, limit: u32) -> Result<Value, ScraperError>;
    async fn notice_html(&self, notice_id: &str) -> Result<String, ScraperError>;
}

pub trait Sink {
    /// Writes `rows`, returning how many were written.
    fn write_rows(&mut self, rows: &[Row]) -> Result<usize, ScraperError>;
    fn flush(&mut self) -> Result<(), ScraperError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScrapeMode {
    /// Flatten the notices of each search page.
    Search,
    /// Render every notice of each search page and read it by label.
    Detail,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub mode: ScrapeMode,
    pub start_page: u32,
    pub pages: u32,
    pub page_size: u32,
    pub delay: Duration,
    pub use_cache: bool,
    pub language: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            mode: ScrapeMode::Search,
            start_page: 1,
            pages: 1,
            page_size: 100,
            delay: Duration::from_secs(2),
            use_cache: true,
            language: ted::PREFERRED_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_ok: u32,
    pub pages_failed: u32,
    pub notices: u32,
    pub notices_failed: u32,
    pub rows: usize,
}

/// Keeps at least `delay` between two remote requests.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Throttle {
            delay,
            last_request: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = last_request.take() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        last_request.replace(Instant::now());
    }
}

async fn fetch_page<S>(
    source: &S,
    cache: Option<&PageCache>,
    throttle: &Throttle,
    config: &ScrapeConfig,
    page: u32,
) -> Result<Value, ScraperError>
where
    S: NoticeSource + ?Sized,
{
    if config.use_cache {
        if let Some(value) = cache.and_then(|cache| cache.load(page)) {
            return Ok(value);
        }
    }

    throttle.wait().await;
    debug!("Fetch page {}", page);
    let value = source.search_page(page, config.page_size).await?;
    if let Some(cache) = cache {
        cache.store(page, &value);
    }
    Ok(value)
}

/// Scrapes `config.pages` search pages starting at `config.start_page` into
/// `sink`, one request at a time.
///
/// A page or notice that cannot be fetched is logged and skipped, as is a
/// page without a notice list. An empty list ends the run. Only sink
/// failures abort.
pub async fn run_scraper<S, K>(
    source: &S,
    cache: Option<&PageCache>,
    sink: &mut K,
    config: &ScrapeConfig,
) -> Result<RunSummary, ScraperError>
where
    S: NoticeSource + ?Sized,
    K: Sink + ?Sized,
{
    let throttle = Throttle::new(config.delay);
    let notice_extractor = NoticeExtractor::new(config.language.as_str());
    let detail_extractor = DetailExtractor::default();
    let mut summary = RunSummary::default();
    let mut total_logged = false;

    let last_page = config.start_page.saturating_add(config.pages);
    for page in config.start_page..last_page {
        let value = match fetch_page(source, cache, &throttle, config, page).await {
            Ok(value) => value,
            Err(e) => {
                error!("Skip page {}: {}", page, e);
                summary.pages_failed += 1;
                continue;
            }
        };

        if !total_logged {
            if let Some(total) = ted::total_notice_count(&value) {
                info!("Total notices matching the query: {}", total);
                total_logged = true;
            }
        }

        let Some(notices) = ted::notice_list(&value) else {
            warn!("Skip page {}: response has no notice list", page);
            summary.pages_failed += 1;
            continue;
        };
        if notices.is_empty() {
            info!("Page {} has no notices, stop", page);
            break;
        }
        summary.pages_ok += 1;

        let mut rows = vec![];
        match config.mode {
            ScrapeMode::Search => {
                for notice in notices {
                    rows.extend(notice_extractor.extract(notice));
                }
                summary.notices += notices.len() as u32;
            }
            ScrapeMode::Detail => {
                let (ids, rejected) = ted::publication_numbers(&value);
                for notice_id in rejected {
                    warn!("[{}] Skip notice with malformed publication number", notice_id);
                    summary.notices_failed += 1;
                }

                for notice_id in ids {
                    throttle.wait().await;
                    let html = match source.notice_html(&notice_id).await {
                        Ok(html) => html,
                        Err(e) => {
                            warn!("[{}] Skip notice: {}", notice_id, e);
                            summary.notices_failed += 1;
                            continue;
                        }
                    };

                    let extracted = {
                        let doc = DetailPage::parse(notice_id, &html);
                        detail_extractor.extract(&doc)
                    };
                    rows.extend(extracted);
                    summary.notices += 1;
                }
            }
        }

        let written = sink.write_rows(&rows)?;
        summary.rows += written;
        info!("[page {}] Wrote {} rows ({} total)", page, written, summary.rows);
    }

    sink.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<u32, Value>,
        htmls: HashMap<String, String>,
        requested: std::sync::Mutex<Vec<u32>>,
    }

    #[async_trait::async_trait]
    impl NoticeSource for FakeSource {
        async fn search_page(&self, page: u32, _limit: u32) -> Result<Value, ScraperError> {
            self.requested.lock().unwrap().push(page);
            self.pages
                .get(&page)
                .cloned()
                .ok_or(ScraperError::HttpStatus {
                    status: 500,
                    body: "boom".to_string(),
                })
        }

        async fn notice_html(&self, notice_id: &str) -> Result<String, ScraperError> {
            self.htmls
                .get(notice_id)
                .cloned()
                .ok_or(ScraperError::MissingField("noticeAsHtml"))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        rows: Vec<Row>,
        flushed: bool,
    }

    impl Sink for MemorySink {
        fn write_rows(&mut self, rows: &[Row]) -> Result<usize, ScraperError> {
            self.rows.extend_from_slice(rows);
            Ok(rows.len())
        }

        fn flush(&mut self) -> Result<(), ScraperError> {
            self.flushed = true;
            Ok(())
        }
    }

    fn config(mode: ScrapeMode, pages: u32) -> ScrapeConfig {
        ScrapeConfig {
            mode,
            pages,
            delay: Duration::ZERO,
            use_cache: false,
            ..ScrapeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped_and_empty_page_stops() {
        let mut source = FakeSource::default();
        source.pages.insert(
            1,
            json!({
                "totalNoticeCount": 3,
                "notices": [
                    {
                        "publication-number": "1-2024",
                        "lots": [{"lotIdentifier": "A"}, {"lotIdentifier": "B"}]
                    },
                    {"publication-number": "2-2024"}
                ]
            }),
        );
        source
            .pages
            .insert(3, json!({"notices": [{"publication-number": "3-2024"}]}));
        source.pages.insert(4, json!({"notices": []}));

        let mut sink = MemorySink::default();
        let summary = run_scraper(&source, None, &mut sink, &config(ScrapeMode::Search, 10))
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                pages_ok: 2,
                pages_failed: 1,
                notices: 3,
                notices_failed: 0,
                rows: 4,
            }
        );
        assert_eq!(*source.requested.lock().unwrap(), vec![1, 2, 3, 4]);
        assert!(sink.flushed);

        let numbers: Vec<_> = sink.rows.iter().filter_map(|r| r.get(NOTICE_NUMBER)).collect();
        assert_eq!(numbers, vec!["1-2024", "1-2024", "2-2024", "3-2024"]);
    }

    #[tokio::test]
    async fn test_detail_mode_skips_failing_notice() {
        let mut source = FakeSource::default();
        source.pages.insert(
            1,
            json!({"notices": [
                {"publication-number": "1-2024"},
                {"publication-number": "2-2024"},
                {"publication-number": "../etc"}
            ]}),
        );
        source.htmls.insert(
            "1-2024".to_string(),
            r#"<html><body><div><span>Official name</span>: ACME</div></body></html>"#.to_string(),
        );

        let mut sink = MemorySink::default();
        let summary = run_scraper(&source, None, &mut sink, &config(ScrapeMode::Detail, 1))
            .await
            .unwrap();

        assert_eq!(summary.notices, 1);
        assert_eq!(summary.notices_failed, 2);
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].get(NOTICE_NUMBER), Some("1-2024"));
        assert_eq!(sink.rows[0].get(BUYER_NAME), Some("ACME"));
    }

    #[tokio::test]
    async fn test_page_without_notice_list_is_failed_not_final() {
        let mut source = FakeSource::default();
        source
            .pages
            .insert(1, json!({"message": "Query syntax error", "status": 400}));
        source
            .pages
            .insert(2, json!({"notices": [{"publication-number": "2-2024"}]}));

        let mut sink = MemorySink::default();
        let summary = run_scraper(&source, None, &mut sink, &config(ScrapeMode::Search, 2))
            .await
            .unwrap();

        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.pages_ok, 1);
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(*source.requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cached_page_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path());
        cache.store(1, &json!({"notices": [{"publication-number": "9-2024"}]}));

        let mut source = FakeSource::default();
        source
            .pages
            .insert(2, json!({"notices": [{"publication-number": "10-2024"}]}));

        let mut sink = MemorySink::default();
        let config = ScrapeConfig {
            use_cache: true,
            ..config(ScrapeMode::Search, 2)
        };
        let summary = run_scraper(&source, Some(&cache), &mut sink, &config)
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(*source.requested.lock().unwrap(), vec![2]);
        assert!(cache.load(2).is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_still_stores_pages() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path());
        cache.store(1, &json!({"notices": [{"publication-number": "stale"}]}));

        let mut source = FakeSource::default();
        source
            .pages
            .insert(1, json!({"notices": [{"publication-number": "1-2024"}]}));

        let mut sink = MemorySink::default();
        run_scraper(&source, Some(&cache), &mut sink, &config(ScrapeMode::Search, 1))
            .await
            .unwrap();

        assert_eq!(sink.rows[0].get(NOTICE_NUMBER), Some("1-2024"));
        assert_eq!(cache.load(1), source.pages.get(&1).cloned());
    }
}

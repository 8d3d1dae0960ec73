//! A single crawl instance: drives the worker loop, enforces session
//! limits, and records results.

use crate::config::CrawlConfig;
use crate::content_parser::ContentParser;
use crate::content_sink::ContentSink;
use crate::error::FailureKind;
use crate::frontier::{Priority, UrlFrontier};
use crate::imurl::ImUrl;
use crate::log_bus::LogBus;
use crate::page_fetcher::PageFetcher;
use crate::robots::RobotsPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Queued,
    Downloading,
    Parsed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub text: Option<String>,
    pub links_found: usize,
    pub raw: Option<String>,
    pub crawl_status: CrawlStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Idle polling interval while the frontier has nothing ready; also the
/// number of consecutive empty ticks required before a worker declares
/// the session drained.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_TICKS_BEFORE_DRAIN: u32 = 20;

pub struct CrawlSession<S: ContentSink> {
    pub id: String,
    config: CrawlConfig,
    frontier: Arc<UrlFrontier>,
    robots: Arc<RobotsPolicy>,
    fetcher: Arc<PageFetcher>,
    parser: ContentParser,
    sink: Arc<S>,
    log_bus: Arc<LogBus>,
    results: Mutex<Vec<CrawlResult>>,
    stop_flag: AtomicBool,
    completed: AtomicBool,
    in_flight: AtomicU32,
}

impl<S: ContentSink + 'static> CrawlSession<S> {
    #[must_use]
    pub fn new(
        id: String,
        config: CrawlConfig,
        robots: Arc<RobotsPolicy>,
        fetcher: Arc<PageFetcher>,
        sink: Arc<S>,
        log_bus: Arc<LogBus>,
    ) -> Self {
        Self {
            id,
            frontier: Arc::new(UrlFrontier::new(config.max_retries, config.per_host_max_concurrency)),
            config,
            robots,
            fetcher,
            parser: ContentParser::new(),
            sink,
            log_bus,
            results: Mutex::new(Vec::new()),
            stop_flag: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            in_flight: AtomicU32::new(0),
        }
    }

    /// Seed the frontier and spawn `worker_count` worker tasks. The
    /// returned handles are owned by `SessionManager`, which joins them
    /// on `stop` or janitor cleanup.
    pub async fn start(self: &Arc<Self>, seed_url: &str) -> anyhow::Result<Vec<JoinHandle<()>>> {
        self.frontier.add(seed_url, None, true, Priority::High, 0).await;
        self.log_bus.info(format!("session {} started at {seed_url}", self.id), Some(&self.id));

        let mut handles = Vec::with_capacity(self.config.worker_count as usize);
        for _ in 0..self.config.worker_count {
            let session = Arc::clone(self);
            handles.push(tokio::spawn(async move { session.worker_loop().await }));
        }
        Ok(handles)
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> CrawlStatus {
        let results = self.results.lock().await;
        if results.is_empty() {
            return CrawlStatus::Queued;
        }
        if results
            .iter()
            .any(|r| matches!(r.crawl_status, CrawlStatus::Queued | CrawlStatus::Downloading))
        {
            CrawlStatus::Downloading
        } else {
            CrawlStatus::Parsed
        }
    }

    pub async fn results(&self) -> Vec<CrawlResult> {
        self.results.lock().await.clone()
    }

    async fn worker_loop(self: Arc<Self>) {
        let mut idle_ticks = 0u32;

        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            if self.results.lock().await.len() as u64 >= self.config.max_pages {
                break;
            }

            let robots = Arc::clone(&self.robots);
            let item = self.frontier.next(|host| robots.cached_crawl_delay(host)).await;

            let Some(item) = item else {
                if self.frontier.is_empty().await && self.in_flight.load(Ordering::SeqCst) == 0 {
                    idle_ticks += 1;
                    if idle_ticks >= IDLE_TICKS_BEFORE_DRAIN {
                        break;
                    }
                } else {
                    idle_ticks = 0;
                }
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                continue;
            };
            idle_ticks = 0;

            let host = item.url.host().unwrap_or_default().to_string();
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            self.process(item).await;
            self.frontier.release_host(&host);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.completed.store(true, Ordering::SeqCst);
    }

    #[tracing::instrument(skip(self, item), fields(session_id = %self.id))]
    async fn process(&self, item: crate::frontier::QueuedUrl) {
        let started_at = Utc::now();
        let host = item.url.host().unwrap_or_default().to_string();
        let scheme = item.url.scheme();

        if self.config.respect_robots_txt {
            let allowed = self.robots.is_allowed(scheme, &host, item.url.path()).await;
            if !allowed {
                self.frontier.mark_visited(&item.url).await;
                self.log_bus.info(format!("robots denied {}", item.url), Some(&self.id));
                self.push_result(CrawlResult {
                    url: item.url.as_str().to_string(),
                    final_url: None,
                    status_code: None,
                    content_type: None,
                    title: None,
                    meta_description: None,
                    text: None,
                    links_found: 0,
                    raw: None,
                    crawl_status: CrawlStatus::Skipped,
                    error: Some("robots denied".to_string()),
                    started_at,
                    finished_at: Some(Utc::now()),
                })
                .await;
                return;
            }
        }

        let outcome = self.fetcher.fetch(item.url.as_str()).await;

        if !outcome.success {
            let kind = outcome.error_kind.unwrap_or(FailureKind::Unknown);
            self.handle_failure(&item, &outcome, kind, started_at).await;
            return;
        }

        let is_html = outcome
            .content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let (title, meta_description, text, links_found) = if is_html {
            let parsed = self.parser.parse(&outcome.body, &item.url);
            for link in &parsed.links {
                if item.depth + 1 > self.config.max_depth {
                    continue;
                }
                if self.config.respect_robots_txt {
                    let link_host = link.host().unwrap_or_default();
                    if !self.robots.is_allowed(link.scheme(), link_host, link.path()).await {
                        continue;
                    }
                }
                self.frontier
                    .add(link.as_str(), Some(&item.url), false, Priority::Normal, item.depth + 1)
                    .await;
            }

            let text = if self.config.extract_text_content { Some(parsed.text.clone()) } else { None };
            let links_found = parsed.links.len();
            let result = self
                .sink
                .store_parsed(
                    &self.id,
                    item.url.as_str(),
                    &outcome.final_url,
                    &parsed,
                    self.config.store_raw_content.then_some(outcome.body.as_str()),
                    outcome.status_code,
                    outcome.content_type.as_deref(),
                )
                .await;
            if let Err(err) = result {
                self.log_bus.warning(format!("content sink error for {}: {err}", item.url), Some(&self.id));
            }
            (parsed.title, parsed.meta_description, text, links_found)
        } else {
            (None, None, None, 0)
        };

        self.frontier.mark_visited(&item.url).await;
        self.push_result(CrawlResult {
            url: item.url.as_str().to_string(),
            final_url: Some(outcome.final_url),
            status_code: outcome.status_code,
            content_type: outcome.content_type,
            title,
            meta_description,
            text,
            links_found,
            raw: self.config.store_raw_content.then_some(outcome.body),
            crawl_status: CrawlStatus::Parsed,
            error: None,
            started_at,
            finished_at: Some(Utc::now()),
        })
        .await;
    }

    async fn handle_failure(
        &self,
        item: &crate::frontier::QueuedUrl,
        outcome: &crate::page_fetcher::FetchOutcome,
        kind: FailureKind,
        started_at: DateTime<Utc>,
    ) {
        let error = outcome.error.clone().unwrap_or_else(|| "unknown failure".to_string());

        if kind.is_retryable() && item.retry_count < self.config.max_retries {
            self.log_bus.warning(format!("{} failed ({kind}), scheduling retry", item.url), Some(&self.id));
            self.frontier
                .schedule_retry(item.url.clone(), item.depth, item.retry_count, error.clone(), kind)
                .await;
        } else {
            self.frontier.mark_visited(&item.url).await;
            self.log_bus.info(format!("{} failed terminally ({kind})", item.url), Some(&self.id));
        }

        self.push_result(CrawlResult {
            url: item.url.as_str().to_string(),
            final_url: Some(outcome.final_url.clone()),
            status_code: outcome.status_code,
            content_type: outcome.content_type.clone(),
            title: None,
            meta_description: None,
            text: None,
            links_found: 0,
            raw: None,
            crawl_status: CrawlStatus::Failed,
            error: Some(error),
            started_at,
            finished_at: Some(Utc::now()),
        })
        .await;
    }

    async fn push_result(&self, result: CrawlResult) {
        self.results.lock().await.push(result);
    }
}

//! Core configuration type for a crawl session.
//!
//! Every field has a documented default (§6 of the governing spec) so a
//! session can be started with `CrawlConfig::default()`; the builder
//! exists for validated, fluent overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlConfig {
    /// Cap on results per session.
    pub max_pages: u64,
    /// Links beyond this depth are not enqueued.
    pub max_depth: u32,
    /// Sent in HTTP requests and in robots.txt group matching.
    pub user_agent: String,
    /// Per-fetch timeout, in milliseconds.
    pub request_timeout_ms: u32,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub respect_robots_txt: bool,
    /// Include the raw response body in `CrawlResult`.
    pub store_raw_content: bool,
    /// Populate `parsed.text`.
    pub extract_text_content: bool,
    /// Enable the headless-render fallback for SPA shells.
    pub spa_rendering_enabled: bool,
    /// Base URL of the render side-service; required when
    /// `spa_rendering_enabled` is true.
    pub render_base_url: Option<String>,
    /// Worker tasks spawned per session.
    pub worker_count: u32,
    /// Retry attempts per URL before giving up.
    pub max_retries: u32,
    /// Concurrent in-flight fetches permitted against one host.
    pub per_host_max_concurrency: u32,
}

pub const DEFAULT_MAX_PAGES: u64 = 1000;
pub const DEFAULT_MAX_DEPTH: u32 = 5;
pub const DEFAULT_USER_AGENT: &str = "politecrawl/0.1";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 30_000;
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;
pub const DEFAULT_WORKER_COUNT: u32 = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_PER_HOST_MAX_CONCURRENCY: u32 = 1;

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            respect_robots_txt: true,
            store_raw_content: false,
            extract_text_content: true,
            spa_rendering_enabled: false,
            render_base_url: None,
            worker_count: DEFAULT_WORKER_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            per_host_max_concurrency: DEFAULT_PER_HOST_MAX_CONCURRENCY,
        }
    }
}

impl CrawlConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.request_timeout_ms))
    }
}

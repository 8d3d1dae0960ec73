//! External storage boundary for parsed pages.
//!
//! The crawl engine never persists page content itself; it hands every
//! successfully parsed page to a `ContentSink` implementation supplied
//! by the embedder. A no-op sink is provided for tests and examples.

use crate::content_parser::ParsedPage;

/// Implemented by the embedder to receive parsed pages as they are
/// crawled. Methods are `async` since most real sinks are backed by a
/// database or search index. `CrawlSession` is generic over this trait
/// rather than boxing it, so no `dyn`-compatibility shim is needed.
pub trait ContentSink: Send + Sync {
    fn store_parsed(
        &self,
        session_id: &str,
        url: &str,
        final_url: &str,
        parsed: &ParsedPage,
        raw: Option<&str>,
        status_code: Option<u16>,
        content_type: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Discards everything. Useful for tests and for running a crawl purely
/// to exercise the frontier/fetch/parse pipeline without indexing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpContentSink;

impl ContentSink for NoOpContentSink {
    async fn store_parsed(
        &self,
        _session_id: &str,
        _url: &str,
        _final_url: &str,
        _parsed: &ParsedPage,
        _raw: Option<&str>,
        _status_code: Option<u16>,
        _content_type: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

//! Static HTTP fetching with redirect policy, SPA detection, and
//! headless-render fallback.

use crate::error::FailureKind;
use crate::log_bus::LogBus;
use crate::render_client::{RenderClient, RenderOutcome};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default total timeout passed to the render service when a page needs
/// a headless render; the external service applies its own internal
/// `waitFor` cap, this bounds the whole HTTP round trip.
const DEFAULT_RENDER_TIMEOUT_MS: u32 = 60_000;

/// Minimum gap between two "render service unavailable" log lines for
/// the same host, so a dead render service doesn't spam the log bus
/// once per page.
const RENDER_UNAVAILABLE_WARNING_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a single fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub body: String,
    pub final_url: String,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

pub struct PageFetcher {
    client: reqwest::Client,
    render_client: Option<Arc<RenderClient>>,
    spa_rendering_enabled: bool,
    log_bus: Arc<LogBus>,
    last_unavailable_warning: DashMap<String, Instant>,
}

impl PageFetcher {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        render_client: Option<Arc<RenderClient>>,
        spa_rendering_enabled: bool,
        log_bus: Arc<LogBus>,
    ) -> Self {
        Self {
            client,
            render_client,
            spa_rendering_enabled,
            log_bus,
            last_unavailable_warning: DashMap::new(),
        }
    }

    /// Log "render service unavailable" at warning level, at most once
    /// per host per [`RENDER_UNAVAILABLE_WARNING_INTERVAL`].
    fn warn_render_unavailable_once(&self, url: &str) {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());

        let now = Instant::now();
        let should_warn = match self.last_unavailable_warning.get(&host) {
            Some(last) => now.duration_since(*last) >= RENDER_UNAVAILABLE_WARNING_INTERVAL,
            None => true,
        };
        if should_warn {
            self.last_unavailable_warning.insert(host.clone(), now);
            self.log_bus.warning(format!("render service unavailable, falling back to static HTML for {host}"), None);
        }
    }

    /// Fetch `url`. May delegate to the render service when the static
    /// response looks like an unrendered SPA shell.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut outcome = match self.client.get(url).send().await {
            Ok(resp) => response_to_outcome(url, resp).await,
            Err(err) => return transport_failure(url, &err),
        };

        if !outcome.success || !self.spa_rendering_enabled {
            return outcome;
        }

        if !is_spa_page(&outcome.body, &outcome.final_url) {
            return outcome;
        }

        let Some(render_client) = &self.render_client else { return outcome };
        if !render_client.is_available().await {
            self.warn_render_unavailable_once(&outcome.final_url);
            return outcome;
        }

        match render_client.render(&outcome.final_url, DEFAULT_RENDER_TIMEOUT_MS, false, None).await {
            RenderOutcome::Success { html, status_code, .. } => {
                outcome.body = html;
                outcome.status_code = Some(status_code);
            }
            RenderOutcome::Failure { .. } => {}
        }

        outcome
    }

    /// Like [`Self::fetch`] but only follows redirects that stay on
    /// `seed_host`; an off-domain redirect is reported as a failure
    /// rather than silently followed.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_with_domain_restriction(&self, url: &str, seed_host: &str) -> FetchOutcome {
        let client = match reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::custom({
                let seed_host = seed_host.to_string();
                move |attempt| {
                    let same_host = attempt
                        .url()
                        .host_str()
                        .is_some_and(|h| h.eq_ignore_ascii_case(&seed_host));
                    if same_host {
                        attempt.follow()
                    } else {
                        attempt.stop()
                    }
                }
            }))
            .build()
        {
            Ok(c) => c,
            Err(err) => return transport_failure(url, &err),
        };

        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => return transport_failure(url, &err),
        };

        let final_host = response.url().host_str().map(str::to_string);
        if final_host.as_deref().is_some_and(|h| !h.eq_ignore_ascii_case(seed_host)) {
            return FetchOutcome {
                success: false,
                status_code: Some(response.status().as_u16()),
                content_type: None,
                body: String::new(),
                final_url: response.url().to_string(),
                error: Some("off-domain redirect".to_string()),
                error_kind: Some(FailureKind::OffDomain),
            };
        }

        response_to_outcome(url, response).await
    }
}

async fn response_to_outcome(requested_url: &str, resp: reqwest::Response) -> FetchOutcome {
    let status = resp.status();
    let final_url = resp.url().to_string();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = resp.text().await.unwrap_or_default();

    if status.is_success() {
        FetchOutcome {
            success: true,
            status_code: Some(status.as_u16()),
            content_type,
            body,
            final_url,
            error: None,
            error_kind: None,
        }
    } else {
        let kind = FailureKind::from_status(status.as_u16());
        FetchOutcome {
            success: false,
            status_code: Some(status.as_u16()),
            content_type,
            body,
            final_url,
            error: Some(format!("HTTP {status} fetching {requested_url}")),
            error_kind: Some(kind),
        }
    }
}

fn transport_failure(url: &str, err: &reqwest::Error) -> FetchOutcome {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    };
    FetchOutcome {
        success: false,
        status_code: err.status().map(|s| s.as_u16()),
        content_type: None,
        body: String::new(),
        final_url: url.to_string(),
        error: Some(err.to_string()),
        error_kind: Some(kind),
    }
}

static ROOT_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<div[^>]+id=["']?(root|__next|app)["']?"#).expect("root marker regex")
});
static VUE_DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)v-if|v-for|v-bind|v-on|\{\{.*?\}\}").expect("vue directive regex"));
static NG_APP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<body[^>]*\bng-app\b|\bng-controller\b"#).expect("ng-app regex"));
static BOOTSTRAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)ReactDOM\.render|new Vue\(|platformBrowser|<script[^>]+id=["']?__NEXT_DATA__"#)
        .expect("bootstrap regex")
});
static ALPINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)x-data|@click|x-show"#).expect("alpine regex"));

/// Heuristic SPA shell detector. Positive on root-marker containers with
/// framework directives, or a known framework bootstrap call; Alpine.js
/// markup is explicitly excluded since it augments static HTML rather
/// than replacing it with a client-rendered shell.
#[must_use]
pub fn is_spa_page(html: &str, _url: &str) -> bool {
    if ALPINE_RE.is_match(html) && !BOOTSTRAP_RE.is_match(html) {
        return false;
    }

    if BOOTSTRAP_RE.is_match(html) {
        return true;
    }

    if NG_APP_RE.is_match(html) {
        return true;
    }

    if ROOT_MARKER_RE.is_match(html) && VUE_DIRECTIVE_RE.is_match(html) {
        return true;
    }

    ROOT_MARKER_RE.is_match(html) && html.matches("<div").count() <= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_nextjs_bootstrap() {
        let html = r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__">{}</script></body></html>"#;
        assert!(is_spa_page(html, "https://example.com"));
    }

    #[test]
    fn detects_react_dom_render() {
        let html = "<html><body><div id=\"root\"></div><script>ReactDOM.render(<App/>, root)</script></body></html>";
        assert!(is_spa_page(html, "https://example.com"));
    }

    #[test]
    fn alpine_js_is_not_a_spa() {
        let html = r#"<html><body><div x-data="{open:false}"><button @click="open=true" x-show="open">go</button></div></body></html>"#;
        assert!(!is_spa_page(html, "https://example.com"));
    }

    #[test]
    fn traditional_multipage_site_is_not_a_spa() {
        let html = "<html><body><nav><a href=\"/about\">About</a></nav><p>Welcome to our site about React and Vue.</p></body></html>";
        assert!(!is_spa_page(html, "https://example.com"));
    }

    #[tokio::test]
    async fn fetch_returns_success_for_200_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>hi</body></html>")
            .create_async().await;

        let fetcher = PageFetcher::new(reqwest::Client::new(), None, false, Arc::new(LogBus::new()));
        let outcome = fetcher.fetch(&format!("{}/", server.url())).await;
        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_classifies_5xx_as_http5xx() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(503).create_async().await;

        let fetcher = PageFetcher::new(reqwest::Client::new(), None, false, Arc::new(LogBus::new()));
        let outcome = fetcher.fetch(&format!("{}/", server.url())).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(FailureKind::Http5xx));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_classifies_429_distinctly() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(429).create_async().await;

        let fetcher = PageFetcher::new(reqwest::Client::new(), None, false, Arc::new(LogBus::new()));
        let outcome = fetcher.fetch(&format!("{}/", server.url())).await;
        assert_eq!(outcome.error_kind, Some(FailureKind::Http429));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn successful_render_overrides_status_code() {
        let mut server = mockito::Server::new_async().await;
        let mut render_server = mockito::Server::new_async().await;

        server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__">{}</script></body></html>"#)
            .create_async()
            .await;
        render_server.mock("HEAD", "/health").with_status(200).create_async().await;
        render_server
            .mock("POST", "/content")
            .with_status(200)
            .with_body(r#"{"html":"<html>rendered</html>"}"#)
            .create_async()
            .await;

        let fetcher = PageFetcher::new(
            reqwest::Client::new(),
            Some(Arc::new(crate::render_client::RenderClient::new(render_server.url()).unwrap())),
            true,
            Arc::new(LogBus::new()),
        );
        let outcome = fetcher.fetch(&format!("{}/", server.url())).await;
        assert_eq!(outcome.body, "<html>rendered</html>");
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test]
    async fn render_unavailable_is_logged_only_once_within_the_interval() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__">{}</script></body></html>"#)
            .create_async()
            .await;

        let log_bus = Arc::new(LogBus::new());
        let fetcher = PageFetcher::new(
            reqwest::Client::new(),
            Some(Arc::new(crate::render_client::RenderClient::new("http://127.0.0.1:1").unwrap())),
            true,
            Arc::clone(&log_bus),
        );

        let mut rx = log_bus.subscribe_admin();
        let url = format!("{}/", server.url());
        fetcher.fetch(&url).await;
        fetcher.fetch(&url).await;

        let first = rx.recv().await;
        assert!(first.is_some());
        // The second fetch's warning is suppressed since it's within the
        // per-host throttle interval; confirm nothing else arrives
        // promptly.
        let second =
            tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(second.is_err() || second.unwrap().is_none());
    }
}

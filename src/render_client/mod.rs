//! Client for an external JavaScript rendering service.
//!
//! The service is a separate process reachable over HTTP; this crate
//! never launches or embeds a browser itself. A `POST {base}/content`
//! call renders `url` and returns the resulting DOM as HTML; `HEAD
//! {base}/health` is used to probe availability before committing a
//! page fetch to the render path.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `waitFor`, in milliseconds, sent on every render request: longer when
/// the caller wants to wait for the page to go network-idle, shorter
/// otherwise. Mirrors the external service's own default split.
const WAIT_FOR_NETWORK_IDLE_MS: u32 = 20_000;
const WAIT_FOR_DEFAULT_MS: u32 = 5_000;

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
    #[serde(rename = "waitFor")]
    wait_for: u32,
    #[serde(rename = "rejectResourceTypes")]
    reject_resource_types: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    html: String,
}

const REJECTED_RESOURCE_TYPES: &[&str] = &["image", "media", "font"];

/// Outcome of a render attempt. Failures keep any partial body returned
/// by the service for diagnostics. Both variants carry the HTTP status
/// (when one was received) and how long the call took, mirroring the
/// external render service's own result contract.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Success { html: String, status_code: u16, render_time: Duration },
    Failure { reason: String, partial_body: Option<String>, status_code: Option<u16>, render_time: Duration },
}

pub struct RenderClient {
    client: reqwest::Client,
    base_url: String,
}

impl RenderClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    /// `HEAD {base}/health`; used before falling back to the render
    /// path so a dead render service doesn't cost every page a timeout.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        matches!(self.client.head(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    /// Render `url` via the external service, aborting the call after
    /// `timeout_ms`. `wait_for_network_idle` selects the `waitFor` value
    /// sent to the service (20s when true, 5s otherwise). Success
    /// requires HTTP 200 and a non-empty body; anything else is reported
    /// as a [`RenderOutcome::Failure`] carrying whatever partial body the
    /// service returned, for diagnostics.
    #[tracing::instrument(skip(self, headers))]
    pub async fn render(
        &self,
        url: &str,
        timeout_ms: u32,
        wait_for_network_idle: bool,
        headers: Option<std::collections::HashMap<String, String>>,
    ) -> RenderOutcome {
        let started = Instant::now();
        let endpoint = format!("{}/content", self.base_url.trim_end_matches('/'));
        let wait_for = if wait_for_network_idle { WAIT_FOR_NETWORK_IDLE_MS } else { WAIT_FOR_DEFAULT_MS };
        let request = RenderRequest {
            url,
            wait_for,
            reject_resource_types: REJECTED_RESOURCE_TYPES,
            headers,
        };

        let response = match self
            .client
            .post(&endpoint)
            .timeout(Duration::from_millis(u64::from(timeout_ms)))
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) if err.is_timeout() => {
                tracing::warn!(%url, "render service timed out, falling back to static HTML");
                return RenderOutcome::Failure {
                    reason: "render service timed out".to_string(),
                    partial_body: None,
                    status_code: None,
                    render_time: started.elapsed(),
                };
            }
            Err(err) if err.is_connect() => {
                tracing::warn!(%url, "render service unavailable, falling back to static HTML");
                return RenderOutcome::Failure {
                    reason: "render service unavailable".to_string(),
                    partial_body: None,
                    status_code: None,
                    render_time: started.elapsed(),
                };
            }
            Err(err) => {
                return RenderOutcome::Failure {
                    reason: err.to_string(),
                    partial_body: None,
                    status_code: err.status().map(|s| s.as_u16()),
                    render_time: started.elapsed(),
                };
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let render_time = started.elapsed();

        if status.is_success() {
            let html = serde_json::from_str::<RenderResponse>(&body)
                .map(|r| r.html)
                .unwrap_or(body);
            if html.is_empty() {
                return RenderOutcome::Failure {
                    reason: "render service returned an empty body".to_string(),
                    partial_body: None,
                    status_code: Some(status.as_u16()),
                    render_time,
                };
            }
            RenderOutcome::Success { html, status_code: status.as_u16(), render_time }
        } else {
            RenderOutcome::Failure {
                reason: format!("render service returned HTTP {status}"),
                partial_body: if body.is_empty() { None } else { Some(body) },
                status_code: Some(status.as_u16()),
                render_time,
            }
        }
    }
}

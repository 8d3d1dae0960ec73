//! Crate-wide error hierarchy.
//!
//! `CrawlError` is the library-facing error type returned by fallible
//! operations in the crawl engine. It mirrors the `FailureKind` taxonomy
//! so a `CrawlResult` can carry both a human-readable message and a
//! machine-classifiable kind without re-deriving one from the other.

use thiserror::Error;

/// Category of a fetch/crawl failure, independent of the underlying
/// transport library. Used both to decide retry policy (see
/// [`crate::frontier`]) and to tag [`crate::session::CrawlResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    Network,
    Timeout,
    Dns,
    Tls,
    Http4xx,
    Http5xx,
    Http429,
    Http408,
    RobotsDenied,
    OffDomain,
    Parser,
    Unknown,
}

impl FailureKind {
    /// Classify an HTTP status code into a failure kind.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            408 => Self::Http408,
            429 => Self::Http429,
            400..=499 => Self::Http4xx,
            500..=599 => Self::Http5xx,
            _ => Self::Unknown,
        }
    }

    /// Whether the frontier should schedule a retry for this kind.
    ///
    /// DNS is retryable only for transient resolution failures; callers
    /// that already know the DNS failure was permanent (NXDOMAIN) should
    /// classify it as [`Self::Unknown`] instead of relying on this default.
    /// HTTP 4xx is terminal except for 408 (request timeout) and 429
    /// (rate limited), both of which get their own retryable kind.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Timeout | Self::Http5xx | Self::Http429 | Self::Http408 | Self::Dns => true,
            Self::Http4xx | Self::Tls | Self::RobotsDenied | Self::OffDomain | Self::Parser | Self::Unknown => false,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Tls => "tls",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Http429 => "http_429",
            Self::Http408 => "http_408",
            Self::RobotsDenied => "robots_denied",
            Self::OffDomain => "off_domain",
            Self::Parser => "parser",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Library-surface error type. Call sites that aggregate several fallible
/// subsystems (config loading, the composition root) should prefer
/// `anyhow::Result` with `.context(...)` instead of matching on this enum.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        kind: FailureKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("render service error for {url}: {reason}")]
    Render { url: String, reason: String },

    #[error("invalid crawl configuration: {0}")]
    Config(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl CrawlError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { kind, .. } => *kind,
            Self::InvalidUrl { .. } | Self::Config(_) | Self::SessionNotFound(_) | Self::Invariant(_) => {
                FailureKind::Unknown
            }
            Self::Render { .. } => FailureKind::Network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_timeout_and_rate_limit_are_retryable() {
        assert_eq!(FailureKind::from_status(408), FailureKind::Http408);
        assert_eq!(FailureKind::from_status(429), FailureKind::Http429);
        assert!(FailureKind::Http408.is_retryable());
        assert!(FailureKind::Http429.is_retryable());
    }

    #[test]
    fn other_4xx_are_terminal() {
        assert_eq!(FailureKind::from_status(404), FailureKind::Http4xx);
        assert!(!FailureKind::Http4xx.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert_eq!(FailureKind::from_status(503), FailureKind::Http5xx);
        assert!(FailureKind::Http5xx.is_retryable());
    }
}

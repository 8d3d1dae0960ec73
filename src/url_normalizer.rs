//! URL sanitization, normalization and validation.
//!
//! `sanitize` strips control bytes and a fixed set of zero-width/formatting
//! codepoints before any parsing happens; `normalize` resolves a raw href
//! against an optional base into an absolute [`ImUrl`]; `is_valid` is a
//! last-chance regex gate used by the content parser before a link is
//! handed back to the frontier.

use crate::imurl::ImUrl;
use once_cell::sync::Lazy;
use regex::Regex;

/// Codepoints dropped by `sanitize`: zero-width spaces/joiners, BOM, and
/// the bidi control characters. Ported byte-for-byte from the crawler this
/// module's semantics were grown from; no NFC/NFKC normalization is applied.
const STRIPPED_CODEPOINTS: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}',
    '\u{200E}', '\u{200F}',
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}',
    '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}',
];

static VALID_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(https?://)[^\s/:?#]+(\.[^\s/:?#]+)*(?::\d+)?(/[^\s?#]*)?(\?[^\s#]*)?(#[^\s]*)?$"#)
        .expect("valid URL regex")
});

/// Trim ASCII whitespace, drop ASCII control bytes (<0x20, 0x7F), and drop
/// the zero-width/formatting codepoints above. Re-emits surviving
/// characters verbatim; idempotent (`sanitize(sanitize(s)) == sanitize(s)`).
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\r' || c == '\n');

    trimmed
        .chars()
        .filter(|&c| {
            if (c as u32) < 0x20 || c as u32 == 0x7F {
                return false;
            }
            !STRIPPED_CODEPOINTS.contains(&c)
        })
        .collect()
}

/// Resolve `raw` (scheme-relative, path-absolute, or relative) against
/// `base` into an absolute, normalized [`ImUrl`].
///
/// - scheme-relative (`//host/...`) is prefixed with `https:`
/// - path-absolute (`/...`) resolves against `base`'s scheme+host
/// - relative resolves against `base`'s directory
/// - host is lowercased; path case is preserved; fragment is dropped.
///   A bare host normalizes to its root path (`https://EX.com` and
///   `https://ex.com/` both become `https://ex.com/`) since the `url`
///   crate always serializes a `/` path for http(s) authorities.
pub fn normalize(raw: &str, base: Option<&ImUrl>) -> Result<ImUrl, crate::error::CrawlError> {
    let sanitized = sanitize(raw);
    if sanitized.is_empty() {
        return Err(invalid(raw, "empty after sanitization"));
    }

    let resolved = if sanitized.starts_with("//") {
        format!("https:{sanitized}")
    } else if sanitized.starts_with('/') {
        let base = base.ok_or_else(|| invalid(raw, "path-absolute URL with no base"))?;
        format!("{}://{}{}", base.scheme(), authority(base), sanitized)
    } else if sanitized.contains("://") {
        sanitized
    } else {
        let base = base.ok_or_else(|| invalid(raw, "relative URL with no base"))?;
        base.join(&sanitized)
            .map_err(|e| invalid(raw, &format!("failed to resolve against base: {e}")))?
            .to_string()
    };

    let mut parsed = url::Url::parse(&resolved).map_err(|e| invalid(raw, &e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(raw, &format!("unsupported scheme {other:?}"))),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| invalid(raw, "missing host"))?
        .to_lowercase();
    parsed
        .set_host(Some(&host))
        .map_err(|e| invalid(raw, &format!("failed to lowercase host: {e}")))?;
    parsed.set_fragment(None);

    ImUrl::parse(parsed.as_str()).map_err(|e| invalid(raw, &e.to_string()))
}

fn authority(url: &ImUrl) -> String {
    match url.port() {
        Some(p) => format!("{}:{p}", url.host().unwrap_or_default()),
        None => url.host().unwrap_or_default().to_string(),
    }
}

fn invalid(raw: &str, reason: &str) -> crate::error::CrawlError {
    crate::error::CrawlError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate an absolute URL string against the crawler's acceptance regex.
/// Stricter than `url::Url::parse`: rejects whitespace inside the URL and
/// schemes other than http/https, matching what the content parser is
/// willing to hand back to the frontier.
#[must_use]
pub fn is_valid(url: &str) -> bool {
    VALID_URL_RE.is_match(url)
}

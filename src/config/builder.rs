//! Fluent builder for [`CrawlConfig`], with validation deferred to
//! `build()`.
//!
//! Unlike the typestate builder this module is adapted from, every field
//! here has a spec-mandated default, so there is no required-field state
//! machine to encode; `build()` only needs to check cross-field
//! invariants (e.g. `spa_rendering_enabled` needs `render_base_url`).

use super::types::CrawlConfig;
use crate::error::CrawlError;

#[derive(Debug, Clone, Default)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: CrawlConfig::default() }
    }

    #[must_use]
    pub fn max_pages(mut self, v: u64) -> Self {
        self.config.max_pages = v;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, v: u32) -> Self {
        self.config.max_depth = v;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, v: impl Into<String>) -> Self {
        self.config.user_agent = v.into();
        self
    }

    #[must_use]
    pub fn request_timeout_ms(mut self, v: u32) -> Self {
        self.config.request_timeout_ms = v;
        self
    }

    #[must_use]
    pub fn follow_redirects(mut self, v: bool) -> Self {
        self.config.follow_redirects = v;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, v: u32) -> Self {
        self.config.max_redirects = v;
        self
    }

    #[must_use]
    pub fn respect_robots_txt(mut self, v: bool) -> Self {
        self.config.respect_robots_txt = v;
        self
    }

    #[must_use]
    pub fn store_raw_content(mut self, v: bool) -> Self {
        self.config.store_raw_content = v;
        self
    }

    #[must_use]
    pub fn extract_text_content(mut self, v: bool) -> Self {
        self.config.extract_text_content = v;
        self
    }

    #[must_use]
    pub fn spa_rendering_enabled(mut self, v: bool) -> Self {
        self.config.spa_rendering_enabled = v;
        self
    }

    #[must_use]
    pub fn render_base_url(mut self, v: impl Into<String>) -> Self {
        self.config.render_base_url = Some(v.into());
        self
    }

    #[must_use]
    pub fn worker_count(mut self, v: u32) -> Self {
        self.config.worker_count = v;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, v: u32) -> Self {
        self.config.max_retries = v;
        self
    }

    #[must_use]
    pub fn per_host_max_concurrency(mut self, v: u32) -> Self {
        self.config.per_host_max_concurrency = v;
        self
    }

    /// Validate cross-field invariants and produce the final config.
    ///
    /// # Errors
    /// Returns [`CrawlError::Config`] when `worker_count` or
    /// `per_host_max_concurrency` is zero, or when SPA rendering is
    /// enabled without a `render_base_url`.
    pub fn build(self) -> Result<CrawlConfig, CrawlError> {
        let config = self.config;

        if config.worker_count == 0 {
            return Err(CrawlError::Config("worker_count must be >= 1".to_string()));
        }
        if config.per_host_max_concurrency == 0 {
            return Err(CrawlError::Config("per_host_max_concurrency must be >= 1".to_string()));
        }
        if config.spa_rendering_enabled && config.render_base_url.is_none() {
            return Err(CrawlError::Config(
                "render_base_url is required when spa_rendering_enabled is true".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_succeeds() {
        assert!(CrawlConfigBuilder::new().build().is_ok());
    }

    #[test]
    fn zero_worker_count_is_rejected() {
        assert!(CrawlConfigBuilder::new().worker_count(0).build().is_err());
    }

    #[test]
    fn spa_rendering_without_base_url_is_rejected() {
        assert!(CrawlConfigBuilder::new().spa_rendering_enabled(true).build().is_err());
    }

    #[test]
    fn spa_rendering_with_base_url_succeeds() {
        let config = CrawlConfigBuilder::new()
            .spa_rendering_enabled(true)
            .render_base_url("http://localhost:9222")
            .build()
            .unwrap();
        assert!(config.spa_rendering_enabled);
    }
}

//! Configuration module for web crawling.
//!
//! Provides [`CrawlConfig`] and its fluent [`CrawlConfigBuilder`], with
//! validation and spec-mandated defaults for every field.

pub mod builder;
pub mod types;

pub use builder::CrawlConfigBuilder;
pub use types::CrawlConfig;

//! URL frontier: priority queues, retry scheduling, dedup, and per-host
//! pacing.
//!
//! Lock ordering when an operation touches more than one map: `main →
//! retry → queued → visited → last_visit`. Every caller that needs more
//! than one lock acquires them in this order to avoid deadlock; no
//! operation in this module needs more than two at once today, but the
//! order is fixed regardless so future additions stay safe. `in_flight`
//! is a `DashMap` (lock-free, per-key sharded locking) and sits outside
//! that ordering since it is only ever touched on its own.

use crate::error::FailureKind;
use crate::imurl::ImUrl;
use crate::url_normalizer;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Retry,
}

/// A URL waiting in the frontier.
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    pub url: ImUrl,
    pub depth: u32,
    pub priority: Priority,
    pub retry_count: u32,
    pub ready_at: Instant,
    pub last_error: Option<String>,
    pub last_failure: Option<FailureKind>,
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.ready_at == other.ready_at
    }
}
impl Eq for QueuedUrl {}

impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.ready_at.cmp(&self.ready_at))
    }
}
impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(300);
const JITTER_FRACTION: f64 = 0.3;

pub struct UrlFrontier {
    main: Mutex<BinaryHeap<QueuedUrl>>,
    retry: Mutex<BinaryHeap<QueuedUrl>>,
    queued: Mutex<HashSet<String>>,
    visited: Mutex<HashSet<String>>,
    last_visit: Mutex<std::collections::HashMap<String, Instant>>,
    /// Reserved slots per host, held from the moment `next()` dispatches
    /// a URL until the caller reports completion via `release_host`.
    /// Enforces `per_host_max_concurrency` across the gap between
    /// dispatch and `mark_visited`, which `last_visit` pacing alone
    /// cannot: two workers calling `next()` back-to-back would otherwise
    /// both receive URLs for the same host before either fetch finishes.
    in_flight: DashMap<String, u32>,
    max_retries: u32,
    per_host_max_concurrency: u32,
}

impl UrlFrontier {
    #[must_use]
    pub fn new(max_retries: u32, per_host_max_concurrency: u32) -> Self {
        Self {
            main: Mutex::new(BinaryHeap::new()),
            retry: Mutex::new(BinaryHeap::new()),
            queued: Mutex::new(HashSet::new()),
            visited: Mutex::new(HashSet::new()),
            last_visit: Mutex::new(std::collections::HashMap::new()),
            in_flight: DashMap::new(),
            max_retries,
            per_host_max_concurrency: per_host_max_concurrency.max(1),
        }
    }

    /// Normalize `raw`, then enqueue into `main` unless already visited
    /// or already queued (both skippable via `force`).
    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        raw: &str,
        base: Option<&ImUrl>,
        force: bool,
        priority: Priority,
        depth: u32,
    ) -> bool {
        let Ok(url) = url_normalizer::normalize(raw, base) else {
            return false;
        };
        let key = url.as_str().to_string();

        if !force && self.visited.lock().await.contains(&key) {
            return false;
        }

        let mut queued = self.queued.lock().await;
        if !force && queued.contains(&key) {
            return false;
        }
        queued.insert(key);
        drop(queued);

        self.main.lock().await.push(QueuedUrl {
            url,
            depth,
            priority,
            retry_count: 0,
            ready_at: Instant::now(),
            last_error: None,
            last_failure: None,
        });
        true
    }

    /// Remove any copy of `url` from `main` and enqueue into `retry`
    /// with `ready_at = now + delay`. No-op once `retry_count` reaches
    /// `max_retries`.
    #[tracing::instrument(skip(self, error))]
    pub async fn schedule_retry(
        &self,
        url: ImUrl,
        depth: u32,
        retry_count: u32,
        error: String,
        failure_kind: FailureKind,
    ) {
        if retry_count >= self.max_retries {
            self.queued.lock().await.remove(url.as_str());
            return;
        }

        let delay = backoff_delay(retry_count);
        let mut main = self.main.lock().await;
        let without = std::mem::take(&mut *main)
            .into_iter()
            .filter(|q| q.url.as_str() != url.as_str())
            .collect();
        *main = without;
        drop(main);

        self.retry.lock().await.push(QueuedUrl {
            url,
            depth,
            priority: Priority::Retry,
            retry_count: retry_count + 1,
            ready_at: Instant::now() + delay,
            last_error: Some(error),
            last_failure: Some(failure_kind),
        });
    }

    /// Pop the next URL that is ready (`ready_at <= now`), permitted by
    /// per-host pacing, and within `per_host_max_concurrency`'s reserved
    /// slots for its host, highest priority first, ties broken by
    /// earliest `ready_at`. The host's slot is reserved before the URL
    /// is returned; callers must call [`Self::release_host`] exactly
    /// once per dispatched item, once that item's fetch has concluded
    /// (success, failure, or robots denial).
    #[tracing::instrument(skip(self, crawl_delay))]
    pub async fn next<F>(&self, crawl_delay: F) -> Option<QueuedUrl>
    where
        F: Fn(&str) -> Duration,
    {
        let now = Instant::now();
        let mut main = self.main.lock().await;
        let mut retry = self.retry.lock().await;

        let mut candidates: Vec<QueuedUrl> =
            std::mem::take(&mut *main).into_iter().chain(std::mem::take(&mut *retry)).collect();
        candidates.sort();

        let last_visit = self.last_visit.lock().await;
        let mut chosen_idx = None;
        for (idx, q) in candidates.iter().enumerate().rev() {
            if q.ready_at > now {
                continue;
            }
            let host = q.url.host().unwrap_or_default();
            let paced_ok = last_visit
                .get(host)
                .is_none_or(|last| now.duration_since(*last) >= crawl_delay(host));
            if !paced_ok {
                continue;
            }
            let slot_ok = self.in_flight.get(host).is_none_or(|c| *c < self.per_host_max_concurrency);
            if slot_ok {
                chosen_idx = Some(idx);
                break;
            }
        }
        drop(last_visit);

        let result = chosen_idx.map(|idx| candidates.remove(idx));

        if let Some(q) = &result {
            let host = q.url.host().unwrap_or_default().to_string();
            *self.in_flight.entry(host).or_insert(0) += 1;
        }

        for c in candidates {
            if c.priority == Priority::Retry {
                retry.push(c);
            } else {
                main.push(c);
            }
        }

        result
    }

    /// Release a host's reserved in-flight slot, taken by a prior
    /// `next()` call. Must be called exactly once per item returned by
    /// `next()`, regardless of how that item's processing concluded.
    pub fn release_host(&self, host: &str) {
        let mut drop_entry = false;
        if let Some(mut count) = self.in_flight.get_mut(host) {
            *count = count.saturating_sub(1);
            drop_entry = *count == 0;
        }
        if drop_entry {
            self.in_flight.remove(host);
        }
    }

    /// Record `url` as visited, update per-host pacing, and release it
    /// from the queued dedup set.
    pub async fn mark_visited(&self, url: &ImUrl) {
        let key = url.as_str().to_string();
        self.visited.lock().await.insert(key.clone());
        self.queued.lock().await.remove(&key);
        if let Some(host) = url.host() {
            self.last_visit.lock().await.insert(host.to_string(), Instant::now());
        }
    }

    /// Hook for optional persistence of a completed result; no-op by
    /// default since storage is delegated to `ContentSink`.
    pub async fn mark_completed(&self, _url: &ImUrl) {}

    pub async fn is_empty(&self) -> bool {
        self.main.lock().await.is_empty() && self.retry.lock().await.is_empty()
    }

    pub async fn visited_count(&self) -> usize {
        self.visited.lock().await.len()
    }
}

/// `delay = min(base * 2^retry_count + jitter, cap)`, jitter up to 30%
/// of the un-jittered delay. Monotonically non-decreasing in expectation
/// as `retry_count` grows, until the cap is hit.
fn backoff_delay(retry_count: u32) -> Duration {
    let exp = DEFAULT_BASE_BACKOFF.as_millis() as u64 * (1u64 << retry_count.min(20));
    let base = exp.min(DEFAULT_BACKOFF_CAP.as_millis() as u64);
    let jitter_max = (base as f64 * JITTER_FRACTION) as u64;
    let jitter = if jitter_max == 0 { 0 } else { rand::random::<u64>() % jitter_max };
    Duration::from_millis((base + jitter).min(DEFAULT_BACKOFF_CAP.as_millis() as u64))
}

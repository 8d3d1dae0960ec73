//! Live log/event fan-out to subscribers.
//!
//! One process-wide [`LogBus`] backs two kinds of topic: `admin`
//! (everything) and `session:{id}` (only events tagged with that
//! session). Both are views over a single `tokio::sync::broadcast`
//! channel — its ring buffer already gives every subscriber a bounded
//! mailbox with drop-oldest-on-lag semantics and a lag counter for free,
//! so this module adds only the topic filter, the global rate limit,
//! and message truncation on top.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 4096;
const RATE_LIMIT_PER_SECOND: u32 = 100;
const MESSAGE_CAP_BYTES: usize = 15 * 1024;
const TRUNCATED_LEN: usize = 1000;
const TRUNCATION_MARKER: &str = "...[truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A structured event as seen by subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
    pub session_id: Option<String>,
}

impl LogEvent {
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>, session_id: Option<String>) -> Self {
        let mut message = message.into();
        if message.len() > MESSAGE_CAP_BYTES {
            message.truncate(TRUNCATED_LEN);
            message.push_str(TRUNCATION_MARKER);
        }
        Self {
            level,
            message,
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            session_id,
        }
    }
}

struct RateWindow {
    window_start_ms: AtomicU64,
    count: AtomicU32,
    last_warning_ms: AtomicU64,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            window_start_ms: AtomicU64::new(now_ms()),
            count: AtomicU32::new(0),
            last_warning_ms: AtomicU64::new(0),
        }
    }

    /// Returns `Some(should_warn)` if the event is allowed (always
    /// carrying `false` for `should_warn`), or `None` if the event must
    /// be dropped; `should_warn` distinguishes the first drop in a
    /// window (which gets an aggregated warning) from subsequent ones.
    fn admit(&self) -> RateDecision {
        let now = now_ms();
        let window_start = self.window_start_ms.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) >= 1000 {
            self.window_start_ms.store(now, Ordering::Relaxed);
            self.count.store(0, Ordering::Relaxed);
        }

        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count <= RATE_LIMIT_PER_SECOND {
            return RateDecision::Admit;
        }

        let last_warn = self.last_warning_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last_warn) >= 1000 {
            self.last_warning_ms.store(now, Ordering::Relaxed);
            RateDecision::DropWithWarning
        } else {
            RateDecision::DropSilently
        }
    }
}

enum RateDecision {
    Admit,
    DropWithWarning,
    DropSilently,
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Process-wide event fan-out.
pub struct LogBus {
    sender: broadcast::Sender<LogEvent>,
    rate: RateWindow,
    dropped: Mutex<u64>,
}

impl LogBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, rate: RateWindow::new(), dropped: Mutex::new(0) }
    }

    /// Publish an event. Subject to the global rolling rate limit;
    /// excess events are dropped and counted, with one aggregated
    /// warning emitted per second of sustained overload.
    pub fn publish(&self, event: LogEvent) {
        match self.rate.admit() {
            RateDecision::Admit => {
                let _ = self.sender.send(event);
            }
            RateDecision::DropWithWarning => {
                *self.dropped.lock().unwrap_or_else(|e| e.into_inner()) += 1;
                let _ = self.sender.send(LogEvent::new(
                    LogLevel::Warning,
                    "rate-limiting active: dropping excess log events",
                    None,
                ));
            }
            RateDecision::DropSilently => {
                *self.dropped.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            }
        }
    }

    pub fn debug(&self, message: impl Into<String>, session_id: Option<&str>) {
        self.publish(LogEvent::new(LogLevel::Debug, message, session_id.map(str::to_string)));
    }
    pub fn info(&self, message: impl Into<String>, session_id: Option<&str>) {
        self.publish(LogEvent::new(LogLevel::Info, message, session_id.map(str::to_string)));
    }
    pub fn warning(&self, message: impl Into<String>, session_id: Option<&str>) {
        self.publish(LogEvent::new(LogLevel::Warning, message, session_id.map(str::to_string)));
    }
    pub fn error(&self, message: impl Into<String>, session_id: Option<&str>) {
        self.publish(LogEvent::new(LogLevel::Error, message, session_id.map(str::to_string)));
    }

    /// Subscribe to the `admin` topic: every event published to the bus.
    #[must_use]
    pub fn subscribe_admin(&self) -> FilteredReceiver {
        FilteredReceiver { inner: self.sender.subscribe(), topic: Topic::Admin }
    }

    /// Subscribe to the `session:{id}` topic: only events tagged with
    /// this session id.
    #[must_use]
    pub fn subscribe_session(&self, session_id: impl Into<String>) -> FilteredReceiver {
        FilteredReceiver { inner: self.sender.subscribe(), topic: Topic::Session(session_id.into()) }
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        *self.dropped.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new()
    }
}

enum Topic {
    Admin,
    Session(String),
}

/// A topic-filtered view over the bus's broadcast channel. Lag (the
/// subscriber falling behind the bounded mailbox) surfaces as
/// `RecvError::Lagged(n)`, exactly as `tokio::sync::broadcast` reports
/// it; this is the "drop counter" for a single subscriber's lag.
pub struct FilteredReceiver {
    inner: broadcast::Receiver<LogEvent>,
    topic: Topic,
}

impl FilteredReceiver {
    /// Await the next event matching this subscriber's topic, skipping
    /// non-matching events and transparently resuming past lag errors.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, event: &LogEvent) -> bool {
        match &self.topic {
            Topic::Admin => true,
            Topic::Session(id) => event.session_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admin_receives_all_events() {
        let bus = LogBus::new();
        let mut sub = bus.subscribe_admin();
        bus.info("hello", Some("s1"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.message, "hello");
    }

    #[tokio::test]
    async fn session_topic_filters_by_id() {
        let bus = LogBus::new();
        let mut sub = bus.subscribe_session("s1");
        bus.info("for s2", Some("s2"));
        bus.info("for s1", Some("s1"));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.message, "for s1");
    }

    #[test]
    fn long_message_is_truncated() {
        let long = "x".repeat(MESSAGE_CAP_BYTES + 100);
        let event = LogEvent::new(LogLevel::Info, long, None);
        assert!(event.message.len() <= TRUNCATED_LEN + TRUNCATION_MARKER.len());
        assert!(event.message.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn short_message_is_untouched() {
        let event = LogEvent::new(LogLevel::Info, "short", None);
        assert_eq!(event.message, "short");
    }

    #[test]
    fn rate_limiter_admits_up_to_the_cap() {
        let window = RateWindow::new();
        let mut admitted = 0;
        for _ in 0..RATE_LIMIT_PER_SECOND {
            if matches!(window.admit(), RateDecision::Admit) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, RATE_LIMIT_PER_SECOND);
        assert!(matches!(window.admit(), RateDecision::DropWithWarning));
    }
}

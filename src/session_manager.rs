//! Lifecycle of concurrent crawl sessions: id allocation, start/stop,
//! status queries, and background cleanup of finished sessions.

use crate::config::CrawlConfig;
use crate::content_sink::ContentSink;
use crate::error::CrawlError;
use crate::log_bus::LogBus;
use crate::page_fetcher::PageFetcher;
use crate::robots::RobotsPolicy;
use crate::session::{CrawlResult, CrawlSession, CrawlStatus};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const JANITOR_INTERVAL: Duration = Duration::from_secs(30);

fn completed_retention() -> chrono::Duration {
    chrono::Duration::minutes(5)
}

pub enum SessionStatusReport {
    NotFound,
    Starting,
    Crawling,
    Completed,
}

struct ActiveSession<S: ContentSink> {
    session: Arc<CrawlSession<S>>,
    workers: Vec<JoinHandle<()>>,
    completed_at: Mutex<Option<chrono::DateTime<Utc>>>,
}

/// Owns every running [`CrawlSession`] for the process. Session ids are
/// `"crawl_" + millis-since-epoch + "_" + a monotonic counter`, matching
/// the id scheme this crate's crawl-orchestration heritage uses.
pub struct SessionManager<S: ContentSink> {
    sessions: Mutex<std::collections::HashMap<String, ActiveSession<S>>>,
    robots: Arc<RobotsPolicy>,
    sink: Arc<S>,
    log_bus: Arc<LogBus>,
    counter: AtomicU64,
}

impl<S: ContentSink + 'static> SessionManager<S> {
    #[must_use]
    pub fn new(user_agent: String, sink: Arc<S>, log_bus: Arc<LogBus>) -> Self {
        Self {
            sessions: Mutex::new(std::collections::HashMap::new()),
            robots: Arc::new(RobotsPolicy::new(reqwest::Client::new(), user_agent)),
            sink,
            log_bus,
            counter: AtomicU64::new(0),
        }
    }

    fn next_session_id(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("crawl_{millis}_{n}")
    }

    /// Start a new session crawling from `seed_url`. Returns immediately
    /// once workers are spawned; the session runs in the background.
    pub async fn start(&self, seed_url: &str, config: CrawlConfig) -> Result<String, CrawlError> {
        let id = self.next_session_id();

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(config.max_redirects as usize)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| CrawlError::Config(e.to_string()))?;

        let render_client = match &config.render_base_url {
            Some(base) if config.spa_rendering_enabled => {
                Some(Arc::new(crate::render_client::RenderClient::new(base.clone()).map_err(|e| {
                    CrawlError::Config(format!("failed to build render client: {e}"))
                })?))
            }
            _ => None,
        };
        let fetcher = Arc::new(PageFetcher::new(
            client,
            render_client,
            config.spa_rendering_enabled,
            Arc::clone(&self.log_bus),
        ));

        let session = Arc::new(CrawlSession::new(
            id.clone(),
            config,
            Arc::clone(&self.robots),
            fetcher,
            Arc::clone(&self.sink),
            Arc::clone(&self.log_bus),
        ));

        let workers = session
            .start(seed_url)
            .await
            .map_err(|e| CrawlError::Invariant(e.to_string()))?;

        self.sessions.lock().await.insert(
            id.clone(),
            ActiveSession { session, workers, completed_at: Mutex::new(None) },
        );

        Ok(id)
    }

    pub async fn status(&self, id: &str) -> SessionStatusReport {
        let sessions = self.sessions.lock().await;
        let Some(active) = sessions.get(id) else { return SessionStatusReport::NotFound };

        match active.session.status().await {
            CrawlStatus::Queued => SessionStatusReport::Starting,
            CrawlStatus::Downloading => SessionStatusReport::Crawling,
            _ if active.session.is_completed() => SessionStatusReport::Completed,
            _ => SessionStatusReport::Crawling,
        }
    }

    pub async fn results(&self, id: &str) -> Option<Vec<CrawlResult>> {
        let sessions = self.sessions.lock().await;
        let active = sessions.get(id)?;
        Some(active.session.results().await)
    }

    pub async fn stop(&self, id: &str) -> bool {
        let sessions = self.sessions.lock().await;
        let Some(active) = sessions.get(id) else { return false };
        active.session.stop();
        true
    }

    pub async fn active_sessions(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Spawn the background janitor. It wakes every 30 s, finds
    /// sessions completed ≥5 min ago, releases the sessions lock, joins
    /// their worker tasks, then re-acquires the lock to erase them.
    pub fn start_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(JANITOR_INTERVAL);
            loop {
                interval.tick().await;
                manager.run_janitor_pass().await;
            }
        })
    }

    async fn run_janitor_pass(&self) {
        let now = Utc::now();
        let mut to_remove = Vec::new();

        {
            let sessions = self.sessions.lock().await;
            for (id, active) in sessions.iter() {
                if !active.session.is_completed() {
                    continue;
                }
                let mut completed_at = active.completed_at.lock().await;
                let stamp = *completed_at.get_or_insert(now);
                if now - stamp >= completed_retention() {
                    to_remove.push(id.clone());
                }
            }
        }

        if to_remove.is_empty() {
            return;
        }

        let mut sessions = self.sessions.lock().await;
        for id in to_remove {
            if let Some(active) = sessions.remove(&id) {
                for handle in active.workers {
                    handle.abort();
                }
                self.log_bus.info(format!("session {id} cleaned up"), None);
            }
        }
    }
}

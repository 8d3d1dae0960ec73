//! End-to-end scenario tests exercising the public crate API against a
//! local `mockito` server.

use politecrawl::{CrawlConfig, CrawlStatus, NoOpContentSink, SessionManager};
use std::sync::Arc;
use std::time::Duration;

fn test_manager() -> Arc<SessionManager<NoOpContentSink>> {
    Arc::new(SessionManager::new(
        "politecrawl-test/1.0".to_string(),
        Arc::new(NoOpContentSink),
        Arc::new(politecrawl::LogBus::new()),
    ))
}

async fn wait_for_completion(manager: &SessionManager<NoOpContentSink>, id: &str) -> Vec<politecrawl::CrawlResult> {
    for _ in 0..100 {
        if matches!(manager.status(id).await, politecrawl::SessionStatusReport::Completed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    manager.results(id).await.unwrap_or_default()
}

#[tokio::test]
async fn s1_static_fetch_and_parse_discovers_linked_page() {
    let mut server = mockito::Server::new_async().await;
    let root = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<html><head><title>T</title></head><body><a href="/a">x</a></body></html>"#)
        .create_async()
        .await;
    let child = server
        .mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Child</title></head><body></body></html>")
        .create_async()
        .await;

    let manager = test_manager();
    let config = CrawlConfig { respect_robots_txt: false, worker_count: 1, ..CrawlConfig::default() };
    let id = manager.start(&format!("{}/", server.url()), config).await.unwrap();

    let results = wait_for_completion(&manager, &id).await;

    let root_result = results.iter().find(|r| r.url.ends_with('/')).expect("root result");
    assert_eq!(root_result.title.as_deref(), Some("T"));
    assert!(results.iter().any(|r| r.url.ends_with("/a")));

    root.assert_async().await;
    child.assert_async().await;
}

#[tokio::test]
async fn s2_robots_denial_is_recorded_as_skipped() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /private/\n")
        .create_async()
        .await;

    let manager = test_manager();
    let config = CrawlConfig { respect_robots_txt: true, worker_count: 1, ..CrawlConfig::default() };
    let id = manager.start(&format!("{}/private/p", server.url()), config).await.unwrap();

    let results = wait_for_completion(&manager, &id).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].crawl_status, CrawlStatus::Skipped);
    assert!(results[0].error.as_deref().unwrap_or_default().contains("robots"));
}

#[tokio::test]
async fn s3_terminal_failure_after_exhausting_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", "/").with_status(503).expect(1).create_async().await;

    let manager = test_manager();
    let config = CrawlConfig {
        respect_robots_txt: false,
        worker_count: 1,
        max_retries: 0,
        ..CrawlConfig::default()
    };
    let id = manager.start(&format!("{}/", server.url()), config).await.unwrap();

    let results = wait_for_completion(&manager, &id).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].crawl_status, CrawlStatus::Failed);
    mock.assert_async().await;
}

#[test]
fn s4_normalizer_is_idempotent() {
    let once = politecrawl::url_normalizer::normalize("  https://EX.com/a/b#f ", None).unwrap();
    assert_eq!(once.as_str(), "https://ex.com/a/b");
    let twice = politecrawl::url_normalizer::normalize(once.as_str(), None).unwrap();
    assert_eq!(once.as_str(), twice.as_str());
}

#[tokio::test]
async fn s5_spa_positive_uses_render_fallback() {
    let mut server = mockito::Server::new_async().await;
    let mut render_server = mockito::Server::new_async().await;

    let page = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__">{}</script></body></html>"#)
        .create_async()
        .await;
    let health = render_server.mock("HEAD", "/health").with_status(200).create_async().await;
    let render = render_server
        .mock("POST", "/content")
        .with_status(200)
        .with_body(r#"{"html":"<html>OK</html>"}"#)
        .create_async()
        .await;

    let fetcher = politecrawl::page_fetcher::PageFetcher::new(
        reqwest::Client::new(),
        Some(Arc::new(politecrawl::render_client::RenderClient::new(render_server.url()).unwrap())),
        true,
        Arc::new(politecrawl::LogBus::new()),
    );
    let outcome = fetcher.fetch(&format!("{}/", server.url())).await;

    assert_eq!(outcome.body, "<html>OK</html>");
    page.assert_async().await;
    health.assert_async().await;
    render.assert_async().await;
}

#[test]
fn s6_alpine_js_is_not_detected_as_spa() {
    let html = r#"<html><body><div x-data="{open:false}"><button @click="open=true" x-show="open">go</button></div></body></html>"#;
    assert!(!politecrawl::page_fetcher::is_spa_page(html, "https://example.com"));
}

#[tokio::test]
async fn s7_per_host_pacing_spaces_out_visits() {
    let mut server = mockito::Server::new_async().await;
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nCrawl-delay: 1\n")
        .create_async()
        .await;
    let a = server
        .mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body></body></html>")
        .create_async()
        .await;

    let manager = test_manager();
    let config = CrawlConfig {
        respect_robots_txt: true,
        worker_count: 1,
        max_pages: 3,
        ..CrawlConfig::default()
    };
    let started = std::time::Instant::now();
    let id = manager.start(&format!("{}/a", server.url()), config).await.unwrap();

    let _results = wait_for_completion(&manager, &id).await;
    // With a 1s crawl-delay and only one in-flight URL, the run should
    // not complete near-instantly; this is a coarse smoke check rather
    // than an exact timing assertion (worker idle-drain also takes ~1s).
    assert!(started.elapsed() >= Duration::from_millis(900));

    robots.assert_async().await;
    a.assert_async().await;
}

#[tokio::test]
async fn s8_concurrent_workers_never_exceed_per_host_concurrency_limit() {
    use politecrawl::frontier::{Priority, UrlFrontier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    let frontier = Arc::new(UrlFrontier::new(5, 1));
    for i in 0..20 {
        frontier
            .add(&format!("https://same-host.example/{i}"), None, false, Priority::Normal, 0)
            .await;
    }

    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let current = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let frontier = Arc::clone(&frontier);
        let max_concurrent = Arc::clone(&max_concurrent);
        let current = Arc::clone(&current);
        handles.push(tokio::spawn(async move {
            loop {
                match frontier.next(|_| Duration::ZERO).await {
                    Some(item) => {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        current.fetch_sub(1, Ordering::SeqCst);

                        let host = item.url.host().unwrap().to_string();
                        frontier.mark_visited(&item.url).await;
                        frontier.release_host(&host);
                    }
                    None => {
                        if frontier.is_empty().await {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    // Every dispatched URL shares one host and `per_host_max_concurrency`
    // is 1, so no two of the 8 workers should ever have held a reserved
    // slot for that host at the same time, despite all racing on the
    // same `next()` call concurrently.
    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
}

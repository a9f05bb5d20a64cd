//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the gallery site and drive the
//! discovery and retrieval workers one step at a time against a real queue
//! database in a temporary directory. The last test runs the supervised
//! workers through `start` for a bounded time.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::config::{
    Config, HttpConfig, PersistenceConfig, RetryConfig, SiteConfig, StoreConfig,
    SupervisorConfig, ThresholdConfig, ThrottleConfig,
};
use sumi_harvest::crawler::{
    build_http_client, start, DiscoveryStep, DiscoveryWorker, RetrievalPass, RetrievalWorker,
};
use sumi_harvest::output::load_statistics;
use sumi_harvest::storage::{open_store, PageQueue, SqliteStore};
use sumi_harvest::PageStatus;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            entrypoint: "/start".to_string(),
        },
        http: HttpConfig {
            timeout: 5,
            user_agent: Some("TestBot/1.0".to_string()),
            proxy: None,
        },
        persistence: PersistenceConfig {
            database_path: dir.join("queue.db"),
            output: dir.join("out"),
        },
        throttle: None,
        thresholds: ThresholdConfig {
            pages: 10,
            images: 3,
        },
        retry: RetryConfig { delay: 10 }, // Very short for testing
        store: StoreConfig::default(),
        supervisor: SupervisorConfig::default(),
    }
}

fn open_test_store(config: &Config) -> SqliteStore {
    open_store(&config.persistence.database_path, &config.store).expect("Failed to open store")
}

fn discovery_worker(config: &Arc<Config>) -> DiscoveryWorker {
    let client = build_http_client(&config.http).expect("Failed to build client");
    DiscoveryWorker::new(Arc::clone(config), client)
}

fn retrieval_worker(config: &Arc<Config>) -> RetrievalWorker {
    let client = build_http_client(&config.http).expect("Failed to build client");
    RetrievalWorker::new(Arc::clone(config), client)
}

/// Renders a page whose recommendation boxes link to `links`
fn recommendation_page(links: &[(&str, &str)]) -> String {
    let boxes: String = links
        .iter()
        .map(|(href, title)| {
            format!(
                r#"<div class="recommentBox"><a href="{}" title="{}"><img src="/cover.jpg"></a></div>"#,
                href, title
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", boxes)
}

/// Renders a gallery page with the given thumbnail sources
fn gallery_page(sources: &[&str]) -> String {
    let images: String = sources
        .iter()
        .map(|src| format!(r#"<img class="showMiniImage" data-src="{}">"#, src))
        .collect();
    format!(
        r#"<html><body><div class="rootContant">{}</div></body></html>"#,
        images
    )
}

/// Renders a page that is both a gallery and a source of recommendations
fn site_page(links: &[(&str, &str)], sources: &[&str]) -> String {
    let boxes: String = links
        .iter()
        .map(|(href, title)| {
            format!(
                r#"<div class="recommentBox"><a href="{}" title="{}">{}</a></div>"#,
                href, title, title
            )
        })
        .collect();
    let images: String = sources
        .iter()
        .map(|src| format!(r#"<img class="showMiniImage" data-src="{}">"#, src))
        .collect();
    format!(
        r#"<html><body><div class="rootContant">{}</div>{}</body></html>"#,
        images, boxes
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_discovery_skips_known_pages() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(
        &mock_server,
        "/start",
        recommendation_page(&[("/p/1", "One"), ("/p/2", "Two")]),
    )
    .await;
    mount_html(
        &mock_server,
        "/p/1",
        recommendation_page(&[("/p/2", "Two"), ("/p/3", "Three")]),
    )
    .await;

    let mut store = open_test_store(&config);
    let mut worker = discovery_worker(&config);

    let step = worker.step(&mut store).await.unwrap();
    assert_eq!(
        step,
        DiscoveryStep::Advanced {
            discovered: 2,
            inserted: 2
        }
    );
    assert_eq!(worker.entrypoint(), "/p/1");

    let step = worker.step(&mut store).await.unwrap();
    assert_eq!(
        step,
        DiscoveryStep::Advanced {
            discovered: 2,
            inserted: 1
        }
    );
    assert_eq!(worker.entrypoint(), "/p/2");
    assert_eq!(worker.iterations(), 2);

    assert_eq!(store.count_total_pages().unwrap(), 3);
    let third = store.get_page("/p/3").unwrap().expect("page should exist");
    assert_eq!(third.label, "Three");
    assert_eq!(third.status, PageStatus::Ready);
}

#[tokio::test]
async fn test_discovery_resyncs_after_page_threshold() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), temp.path());
    config.thresholds.pages = 2;
    let config = Arc::new(config);

    mount_html(&mock_server, "/start", recommendation_page(&[("/p/1", "One")])).await;
    mount_html(&mock_server, "/p/1", recommendation_page(&[("/p/2", "Two")])).await;

    let mut store = open_test_store(&config);
    let mut worker = discovery_worker(&config);

    assert!(matches!(
        worker.step(&mut store).await.unwrap(),
        DiscoveryStep::Advanced { .. }
    ));
    assert_eq!(
        worker.step(&mut store).await.unwrap(),
        DiscoveryStep::Resynced {
            discovered: 1,
            inserted: 1
        }
    );

    // The walk starts over from the configured entrypoint
    assert_eq!(worker.entrypoint(), worker.origin());
    assert_eq!(worker.iterations(), 0);
    assert_eq!(store.count_total_pages().unwrap(), 2);
}

#[tokio::test]
async fn test_discovery_failure_returns_to_origin() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(&mock_server, "/start", recommendation_page(&[("/p/1", "One")])).await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let mut store = open_test_store(&config);
    let mut worker = discovery_worker(&config);

    worker.step(&mut store).await.unwrap();
    assert_eq!(worker.entrypoint(), "/p/1");

    assert_eq!(
        worker.step(&mut store).await.unwrap(),
        DiscoveryStep::Unavailable
    );
    assert_eq!(worker.entrypoint(), "/start");
    assert_eq!(worker.iterations(), 0);

    // What was recorded before the failure stays recorded
    assert!(store.page_exists("/p/1").unwrap());
}

#[tokio::test]
async fn test_discovery_page_without_recommendations_is_unavailable() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(&mock_server, "/start", "<html><body>nothing</body></html>".to_string()).await;

    let mut store = open_test_store(&config);
    let mut worker = discovery_worker(&config);

    assert_eq!(
        worker.step(&mut store).await.unwrap(),
        DiscoveryStep::Unavailable
    );
    assert_eq!(store.count_total_pages().unwrap(), 0);
}

#[tokio::test]
async fn test_retrieval_idle_on_empty_queue() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    let mut store = open_test_store(&config);
    let worker = retrieval_worker(&config);

    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Idle
    );
}

#[tokio::test]
async fn test_retrieval_processes_pages_in_discovery_order() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(&mock_server, "/first", gallery_page(&[])).await;
    mount_html(&mock_server, "/second", gallery_page(&[])).await;

    let mut store = open_test_store(&config);
    store.insert_page("/first", "First").unwrap();
    store.insert_page("/second", "Second").unwrap();

    let worker = retrieval_worker(&config);

    match worker.process_next(&mut store).await.unwrap() {
        RetrievalPass::Finished { url, .. } => assert_eq!(url, "/first"),
        other => panic!("expected Finished, got {:?}", other),
    }
    match worker.process_next(&mut store).await.unwrap() {
        RetrievalPass::Finished { url, .. } => assert_eq!(url, "/second"),
        other => panic!("expected Finished, got {:?}", other),
    }
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Idle
    );
}

#[tokio::test]
async fn test_retrieval_resumes_partially_downloaded_page() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(
        &mock_server,
        "/a",
        gallery_page(&["/img/0_t.jpg", "/img/1_t.jpg", "/img/2_t.jpg"]),
    )
    .await;

    // Images already on disk must not be requested again
    for done in ["/img/0.jpg", "/img/1.jpg"] {
        Mock::given(method("GET"))
            .and(path(done))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/img/2.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page_dir = config.persistence.output.join("Alpha");
    fs::create_dir_all(&page_dir).unwrap();
    fs::write(page_dir.join("0.jpg"), b"old").unwrap();
    fs::write(page_dir.join("1.jpg_404"), b"").unwrap();

    let mut store = open_test_store(&config);
    store.insert_page("/a", "Alpha").unwrap();

    let worker = retrieval_worker(&config);
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Finished {
            url: "/a".to_string(),
            saved: 1,
            skipped: 0
        }
    );

    assert_eq!(dir_entries(&page_dir), vec!["0.jpg", "1.jpg_404", "2.jpg"]);
    assert_eq!(fs::read(page_dir.join("2.jpg")).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    assert_eq!(fs::read(page_dir.join("0.jpg")).unwrap(), b"old".to_vec());

    let page = store.get_page("/a").unwrap().unwrap();
    assert_eq!(page.status, PageStatus::Finished);
}

#[tokio::test]
async fn test_retrieval_skips_image_after_attempt_budget() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(
        &mock_server,
        "/b",
        gallery_page(&["/img/broken_t.png", "/img/fine_t.png"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/broken.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/fine.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut store = open_test_store(&config);
    store.insert_page("/b", "Beta").unwrap();

    let worker = retrieval_worker(&config);
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Finished {
            url: "/b".to_string(),
            saved: 1,
            skipped: 1
        }
    );

    let page_dir = config.persistence.output.join("Beta");
    assert_eq!(dir_entries(&page_dir), vec!["0.png_404", "1.png"]);
    assert_eq!(fs::metadata(page_dir.join("0.png_404")).unwrap().len(), 0);
    assert_eq!(
        store.get_page("/b").unwrap().unwrap().status,
        PageStatus::Finished
    );
}

#[tokio::test]
async fn test_retrieval_retries_image_until_it_succeeds() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(&mock_server, "/d", gallery_page(&["/img/flaky_t.jpg"])).await;

    // First attempt is refused, the second one gets the image
    Mock::given(method("GET"))
        .and(path("/img/flaky.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/flaky.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut store = open_test_store(&config);
    store.insert_page("/d", "Delta").unwrap();

    let worker = retrieval_worker(&config);
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Finished {
            url: "/d".to_string(),
            saved: 1,
            skipped: 0
        }
    );

    let page_dir = config.persistence.output.join("Delta");
    assert_eq!(dir_entries(&page_dir), vec!["0.jpg"]);
    assert_eq!(fs::read(page_dir.join("0.jpg")).unwrap(), b"jpg".to_vec());

    let requests = mock_server.received_requests().await.unwrap();
    let image_requests = requests
        .iter()
        .filter(|request| request.url.path() == "/img/flaky.jpg")
        .count();
    assert_eq!(image_requests, 2);
}

#[tokio::test]
async fn test_retrieval_network_failure_leaves_page_ready() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    // Nothing listens on port 1, so the second image fails at the transport level
    mount_html(
        &mock_server,
        "/c",
        gallery_page(&["/img/ok_t.jpg", "http://127.0.0.1:1/gone_t.jpg", "/img/later_t.jpg"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/ok.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/later.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut store = open_test_store(&config);
    store.insert_page("/c", "Gamma").unwrap();

    let worker = retrieval_worker(&config);
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::Aborted {
            url: "/c".to_string(),
            saved: 1,
            skipped: 0
        }
    );

    let page_dir = config.persistence.output.join("Gamma");
    assert_eq!(dir_entries(&page_dir), vec!["0.jpg"]);
    assert_eq!(
        store.get_page("/c").unwrap().unwrap().status,
        PageStatus::Ready
    );
}

#[tokio::test]
async fn test_retrieval_unavailable_page_stays_ready() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let mut store = open_test_store(&config);
    store.insert_page("/missing", "Missing").unwrap();

    let worker = retrieval_worker(&config);
    assert_eq!(
        worker.process_next(&mut store).await.unwrap(),
        RetrievalPass::PageUnavailable {
            url: "/missing".to_string()
        }
    );

    assert_eq!(
        store.get_page("/missing").unwrap().unwrap().status,
        PageStatus::Ready
    );
    assert!(!config.persistence.output.join("Missing").exists());
}

#[tokio::test]
async fn test_discovered_pages_are_harvested() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(&mock_server.uri(), temp.path()));

    mount_html(&mock_server, "/start", recommendation_page(&[("/g/1", "Gallery One")])).await;
    mount_html(&mock_server, "/g/1", gallery_page(&["/img/x_t.gif"])).await;
    Mock::given(method("GET"))
        .and(path("/img/x.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gif".to_vec()))
        .mount(&mock_server)
        .await;

    // Each worker owns its own connection to the same database
    let mut discovery_store = open_test_store(&config);
    let mut retrieval_store = open_test_store(&config);

    let mut discovery = discovery_worker(&config);
    discovery.step(&mut discovery_store).await.unwrap();

    let retrieval = retrieval_worker(&config);
    assert!(matches!(
        retrieval.process_next(&mut retrieval_store).await.unwrap(),
        RetrievalPass::Finished { saved: 1, .. }
    ));

    let stats = load_statistics(&retrieval_store, &config.persistence.output).unwrap();
    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.pages_by_status.get(&PageStatus::Finished), Some(&1));
    assert_eq!(stats.page_directories, 1);
    assert_eq!(stats.images_saved, 1);
    assert_eq!(stats.images_skipped, 0);

    discovery_store.close().unwrap();
    retrieval_store.close().unwrap();
}

#[tokio::test]
async fn test_start_harvests_site_until_stopped() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), temp.path());
    config.throttle = Some(ThrottleConfig { min: 1, max: 2 });

    // Discovery walks /start -> /g/1 -> /g/2 -> /g/3 -> /broken. The broken
    // page sends it back to /start, so the walk repeats until stopped.
    mount_html(
        &mock_server,
        "/start",
        site_page(&[("/g/1", "Gallery 1"), ("/g/2", "Gallery 2")], &[]),
    )
    .await;
    mount_html(
        &mock_server,
        "/g/1",
        site_page(&[("/g/2", "Gallery 2"), ("/g/3", "Gallery 3")], &["/img/1_t.jpg"]),
    )
    .await;
    mount_html(
        &mock_server,
        "/g/2",
        site_page(&[("/g/3", "Gallery 3"), ("/g/1", "Gallery 1")], &["/img/2_t.jpg"]),
    )
    .await;
    mount_html(
        &mock_server,
        "/g/3",
        site_page(&[("/broken", "Broken"), ("/g/1", "Gallery 1")], &["/img/3_t.jpg"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/\d+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec()))
        .mount(&mock_server)
        .await;

    let config = Arc::new(config);

    // The workers only stop when the process does; give them a bounded run
    let outcome = tokio::time::timeout(
        Duration::from_millis(1500),
        start(Config::clone(&config), false),
    )
    .await;
    assert!(outcome.is_err(), "harvest should still be running");

    let store = open_test_store(&config);
    assert_eq!(store.count_total_pages().unwrap(), 4);
    for (url, label) in [("/g/1", "Gallery 1"), ("/g/2", "Gallery 2"), ("/g/3", "Gallery 3")] {
        let page = store.get_page(url).unwrap().expect("page should be queued");
        assert_eq!(page.status, PageStatus::Finished, "{} should be finished", url);
        assert_eq!(
            dir_entries(&config.persistence.output.join(label)),
            vec!["0.jpg"]
        );
    }

    // The broken page stays queued for a later pass
    let broken = store.get_page("/broken").unwrap().unwrap();
    assert_eq!(broken.status, PageStatus::Ready);
    assert!(!config.persistence.output.join("Broken").exists());
}

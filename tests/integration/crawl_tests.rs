//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock catalog servers and test
//! fetching, pagination and the full harvest cycle end-to-end.

use catalog_harvester::config::{Config, CrawlerConfig, UserAgentConfig};
use catalog_harvester::crawler::{
    build_http_client, crawl_list, harvest, BackoffCoordinator, Catalog, Coordinator, Fetcher,
};
use catalog_harvester::storage::{RunStatus, SqliteStorage, Storage};
use catalog_harvester::{FailurePolicy, HarvestError, MetadataField};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = format!("{}/", server.uri());
    config.crawler = CrawlerConfig {
        concurrency_limit: 4,
        max_attempts: 3,
        cooldown_ms: 20,
        request_timeout_secs: 5,
        ..CrawlerConfig::default()
    };
    config.user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
    };
    config.output.database_path = db_path.display().to_string();
    config
}

fn test_fetcher(max_attempts: u32) -> Fetcher {
    fetcher_with(4, Duration::from_millis(20), max_attempts)
}

fn fetcher_with(max_in_flight: usize, cooldown: Duration, max_attempts: u32) -> Fetcher {
    let client =
        build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
    let backoff = Arc::new(BackoffCoordinator::new(max_in_flight, cooldown));
    Fetcher::new(client, backoff, max_attempts)
}

/// A valid v4 UUID, distinct per `n`
fn dataset_id(n: u32) -> String {
    format!("{:08x}-aaaa-4bbb-8ccc-{:012x}", n, n)
}

fn index_page(sections: &[&str], total: usize) -> String {
    let tabs: String = sections
        .iter()
        .map(|section| {
            format!(
                r#"<div class="AccordionPanelTab"><a onclick="location.href='{}'">{}</a></div>"#,
                section, section
            )
        })
        .collect();
    format!(
        "<html><body><span>Αρχική</span><span>{} datasets</span>{}</body></html>",
        total, tabs
    )
}

fn list_page(dataset_ids: &[String], next: Option<&str>, extra: &str) -> String {
    let rows: String = dataset_ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr>
                <td><span class="format-box">CSV</span></td>
                <td><span class="datasetcat">Οικονομία</span></td>
                <td><a class="datasethead" href="/dataset/{}">Dataset</a></td>
                </tr>"#,
                id
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a href="{}">Επόμενη</a>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body>{}
        <font class="datasetresults">Αποτελέσματα</font>
        <table><tr><th>Μορφή</th><th>Κατηγορία</th><th>Τίτλος</th></tr>{}</table>
        {}</body></html>"#,
        extra, rows, next
    )
}

/// Detail page with three of the ten labels present
fn detail_page(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <html><body>
        <div class="datasethead">{}</div>
        <p><b>Πηγή Ενημέρωσης:</b> Στατιστική Υπηρεσία</p>
        <p><b>Χρέωση:</b> Δωρεάν</p>
        <p><b>e-mail:</b> info@example.org</p>
        </body></html>"#,
        title
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts an index with two sections of two datasets each
async fn mount_catalog(server: &MockServer) -> Vec<String> {
    mount_page(server, "/", index_page(&["/section/a", "/section/b"], 4)).await;

    let ids: Vec<String> = (1..=4).map(dataset_id).collect();
    mount_page(server, "/section/a", list_page(&ids[0..2], None, "")).await;
    mount_page(server, "/section/b", list_page(&ids[2..4], None, "")).await;

    for (n, id) in ids.iter().enumerate() {
        mount_page(
            server,
            &format!("/dataset/{}", id),
            detail_page(&format!("Dataset {}", n + 1)),
        )
        .await;
    }
    ids
}

#[tokio::test]
async fn test_fetch_retries_transient_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let page = fetcher
        .fetch(&format!("{}/page", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(page.body, "ok");
    assert_eq!(fetcher.backoff().cooldown_episodes(), 2);
    assert!(fetcher.backoff().is_open());
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let result = fetcher.fetch(&format!("{}/page", mock_server.uri())).await;

    match result {
        Err(HarvestError::ExhaustedRetries { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, HarvestError::Status { status: 503, .. }));
        }
        other => panic!("expected ExhaustedRetries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_does_not_retry_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let result = fetcher
        .fetch(&format!("{}/missing", mock_server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(HarvestError::Status { status: 404, .. })
    ));
    assert_eq!(fetcher.backoff().cooldown_episodes(), 0);
}

#[tokio::test]
async fn test_concurrent_fetches_stay_within_limit() {
    let mock_server = MockServer::start().await;
    let delay = Duration::from_millis(200);

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok").set_delay(delay))
        .expect(6)
        .mount(&mock_server)
        .await;

    let limit = 2;
    let fetcher = fetcher_with(limit, Duration::from_millis(20), 1);
    let url = format!("{}/slow", mock_server.uri());

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let fetcher = fetcher.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move { fetcher.fetch(&url).await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().body, "ok");
    }

    // Six requests, two at a time: at least three delay rounds
    assert!(start.elapsed() >= delay * 3);
    assert_eq!(fetcher.backoff().available_permits(), limit);
}

#[tokio::test]
async fn test_fetch_reports_final_url_after_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/new/index"),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new/index", "moved".to_string()).await;

    let page = test_fetcher(1)
        .fetch(&format!("{}/old", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(page.url, format!("{}/new/index", mock_server.uri()));
    assert_eq!(page.body, "moved");
}

#[tokio::test]
async fn test_full_harvest_two_sections() {
    let mock_server = MockServer::start().await;
    let ids = mount_catalog(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");
    let config = create_test_config(&mock_server, &db_path);

    let report = harvest(config, "test_hash").await.unwrap();

    assert_eq!(report.expected_total, Some(4));
    assert_eq!(report.scraped, 4);
    assert_eq!(report.persisted, 4);
    assert_eq!(report.count_matches(), Some(true));
    assert!(report.failures.is_empty());

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_records().unwrap(), 4);

    for id in &ids {
        let detail_url = format!("{}/dataset/{}", mock_server.uri(), id);
        let stored = storage.get_record(&detail_url).unwrap().unwrap();
        let record = stored.record;

        assert_eq!(record.identifier, Some(id.replace('-', "")));
        assert_eq!(record.formats.as_deref(), Some("CSV"));
        assert_eq!(record.category, "Οικονομία");
        assert_eq!(record.metadata.populated(), 3);
        assert_eq!(
            record
                .metadata
                .iter()
                .filter(|(_, value)| value.is_none())
                .count(),
            7
        );
        assert_eq!(record.metadata.get(MetadataField::Fee), Some("Δωρεάν"));
        assert!(record.title.starts_with("Dataset "));
    }

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test_hash");
    assert_eq!(run.persisted_count, Some(4));
}

#[tokio::test]
async fn test_second_harvest_refreshes_rows() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");

    let first = harvest(create_test_config(&mock_server, &db_path), "hash")
        .await
        .unwrap();
    let second = harvest(create_test_config(&mock_server, &db_path), "hash")
        .await
        .unwrap();

    assert_eq!(first.persisted, 4);
    assert_eq!(second.persisted, 4);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_warning_marker_triggers_suppressed_refetch() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server, &temp_dir.path().join("unused.sqlite"));
    let catalog = Catalog::from_config(&config).unwrap();

    let fresh: Vec<String> = (1..=2).map(dataset_id).collect();
    let stale = vec![dataset_id(99)];
    let second_page = vec![dataset_id(3)];

    // Suppressed copy: the real rows, but a broken next link
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("Collapse", ""))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(list_page(&fresh, Some("/broken"), "")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("Start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&second_page, None, "")))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(
            &stale,
            Some("/list?Start=2"),
            "<p>[Replication or Save Conflict]</p>",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let start = format!("{}/list", mock_server.uri());
    let rows = crawl_list(&test_fetcher(3), &catalog, &start).await.unwrap();

    let detail_urls: Vec<String> = rows.iter().map(|row| row.detail_url.clone()).collect();
    assert_eq!(
        detail_urls,
        vec![
            format!("{}/dataset/{}", mock_server.uri(), dataset_id(1)),
            format!("{}/dataset/{}", mock_server.uri(), dataset_id(2)),
            format!("{}/dataset/{}", mock_server.uri(), dataset_id(3)),
        ]
    );
    assert_eq!(rows[0].list_url, start);
    assert_eq!(rows[2].list_url, format!("{}/list?Start=2", mock_server.uri()));
}

#[tokio::test]
async fn test_pagination_loop_is_malformed() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server, &temp_dir.path().join("unused.sqlite"));
    let catalog = Catalog::from_config(&config).unwrap();

    mount_page(
        &mock_server,
        "/list",
        list_page(&[dataset_id(1)], Some("/list"), ""),
    )
    .await;

    let result = crawl_list(
        &test_fetcher(1),
        &catalog,
        &format!("{}/list", mock_server.uri()),
    )
    .await;

    assert!(matches!(result, Err(HarvestError::MalformedMarkup { .. })));
}

/// Mounts one section with two datasets, the second of which is missing
async fn mount_catalog_with_missing_detail(server: &MockServer) {
    mount_page(server, "/", index_page(&["/section/a"], 2)).await;

    let ids: Vec<String> = (1..=2).map(dataset_id).collect();
    mount_page(server, "/section/a", list_page(&ids, None, "")).await;
    mount_page(
        server,
        &format!("/dataset/{}", ids[0]),
        detail_page("Present"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/dataset/{}", ids[1])))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_collect_policy_keeps_partial_results() {
    let mock_server = MockServer::start().await;
    mount_catalog_with_missing_detail(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");
    let mut config = create_test_config(&mock_server, &db_path);
    config.crawler.failure_policy = FailurePolicy::Collect;

    let report = harvest(config, "hash").await.unwrap();

    assert_eq!(report.scraped, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].target.ends_with(&dataset_id(2)));
    assert_eq!(report.count_matches(), Some(false));

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.failed_items, Some(1));
}

#[tokio::test]
async fn test_abort_policy_fails_run_and_persists_nothing() {
    let mock_server = MockServer::start().await;
    mount_catalog_with_missing_detail(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");
    let config = create_test_config(&mock_server, &db_path);
    assert_eq!(config.crawler.failure_policy, FailurePolicy::Abort);

    let result = harvest(config, "hash").await;

    match result {
        Err(HarvestError::Aggregate { target, source }) => {
            assert!(target.ends_with(&dataset_id(2)));
            assert!(matches!(*source, HarvestError::Status { status: 404, .. }));
        }
        other => panic!("expected Aggregate, got {:?}", other),
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_records().unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn test_aborted_run_leaves_gate_open() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        index_page(&["/section/a", "/section/b"], 2),
    )
    .await;

    // Section a fails fatally while section b is in its cooldown
    Mock::given(method("GET"))
        .and(path("/section/a"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(100)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/section/b"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server, &temp_dir.path().join("unused.sqlite"));
    let catalog = Catalog::from_config(&config).unwrap();
    let fetcher = fetcher_with(4, Duration::from_secs(60), 3);
    let coordinator = Coordinator::new(fetcher, catalog, FailurePolicy::Abort);

    let result = coordinator.run().await;
    assert!(matches!(result, Err(HarvestError::Aggregate { .. })));
    assert_eq!(coordinator.fetcher().backoff().cooldown_episodes(), 1);

    let permit = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.fetcher().backoff().acquire(),
    )
    .await
    .expect("gate still closed after the aborted run")
    .unwrap();
    drop(permit);
    assert!(coordinator.fetcher().backoff().is_open());
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for both the crawled site and
//! the analysis service endpoint, exercising the full crawl cycle
//! end-to-end: frontier, rate control, fetch retries, batching,
//! checkpointing, aggregation, and output generation.

use async_trait::async_trait;
use linguamap::analysis::{
    AnalysisClient, AnalysisError, AnalysisResult, Analyzer,
};
use linguamap::config::{
    AnalysisConfig, Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use linguamap::crawler::crawl;
use linguamap::frontier::VisitOutcome;
use linguamap::storage::CheckpointStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at a mock site
fn test_config(base_url: &str, dir: &Path, max_pages: u64, batch_size: usize) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            max_page_bytes: 1024 * 1024,
            disallowed_extensions: vec!["pdf".to_string(), "jpg".to_string()],
        },
        crawler: CrawlerConfig {
            max_pages,
            batch_size,
            max_retries: 2,
            base_delay_ms: 10,
            min_delay_ms: 1,
            max_delay_ms: 200,
            error_window: 5,
            error_threshold: 0.3,
            backoff_base_ms: 5,
            backoff_cap_ms: 20,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        analysis: AnalysisConfig {
            endpoint: "https://unused.example.com/v1/chat/completions".to_string(),
            model: "test-model".to_string(),
            api_key_env: "UNUSED_TEST_KEY".to_string(),
            concurrency: 2,
            max_retries: 1,
            retry_delay_ms: 1,
            translate: false,
        },
        output: OutputConfig {
            database_path: dir.join("checkpoint.db").to_string_lossy().to_string(),
            output_dir: dir.join("final-output").to_string_lossy().to_string(),
            summary_path: dir.join("summary.json").to_string_lossy().to_string(),
        },
    }
}

/// Scripted analyzer keyed by URL path
struct TestAnalyzer {
    by_path: HashMap<String, AnalysisResult>,
    fail_paths: Vec<String>,
    calls: AtomicU32,
}

impl TestAnalyzer {
    fn new() -> Self {
        Self {
            by_path: HashMap::new(),
            fail_paths: Vec::new(),
            calls: AtomicU32::new(0),
        }
    }

    fn with_result(mut self, path: &str, language: &str, importance: u8) -> Self {
        self.by_path.insert(
            path.to_string(),
            AnalysisResult {
                language: language.to_string(),
                languages: vec![],
                category: "general".to_string(),
                summary: format!("Summary of {}", path),
                keywords: vec![],
                importance,
            },
        );
        self
    }

    fn failing_on(mut self, path: &str) -> Self {
        self.fail_paths.push(path.to_string());
        self
    }
}

#[async_trait]
impl Analyzer for TestAnalyzer {
    async fn analyze(
        &self,
        _text: &str,
        url: &str,
        _title: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url_path = url::Url::parse(url)
            .map_err(|e| AnalysisError::Permanent(e.to_string()))?
            .path()
            .to_string();

        if self.fail_paths.contains(&url_path) {
            return Err(AnalysisError::Transient("scripted failure".to_string()));
        }

        Ok(self.by_path.get(&url_path).cloned().unwrap_or(AnalysisResult {
            language: "english".to_string(),
            languages: vec![],
            category: "general".to_string(),
            summary: "Default summary".to_string(),
            keywords: vec![],
            importance: 5,
        }))
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, AnalysisError> {
        Ok(format!("[{}] {}", target_language, text))
    }
}

/// Mounts a simple HTML page on the mock site
async fn mount_page(server: &MockServer, page_path: &str, title: &str, links: &[&str]) {
    let link_html: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a>"#, l))
        .collect();
    let body = format!(
        r#"<html><head><title>{}</title></head><body><p>Content of {}</p>{}</body></html>"#,
        title, title, link_html
    );
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Counts GET requests the mock server received for a path
async fn requests_for(server: &MockServer, target: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == target)
        .count()
}

fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[tokio::test]
async fn test_full_crawl_groups_and_outputs() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", "Home", &["/page1", "/page2", "/page-fr"]).await;
    mount_page(&server, "/page1", "Page One", &[]).await;
    mount_page(&server, "/page2", "Page Two", &[]).await;
    mount_page(&server, "/page-fr", "Page Francaise", &[]).await;

    let analyzer = Arc::new(
        TestAnalyzer::new()
            .with_result("/", "english", 5)
            .with_result("/page1", "english", 9)
            .with_result("/page2", "english", 3)
            .with_result("/page-fr", "french", 7),
    );

    let config = test_config(&server.uri(), dir.path(), 10, 2);
    let (_tx, rx) = shutdown_channel();

    let report = crawl(config, "hash".to_string(), analyzer, true, rx)
        .await
        .expect("crawl failed");

    assert!(report.completed);
    assert_eq!(report.pages_succeeded, 4);
    assert_eq!(report.pages_abandoned, 0);
    assert_eq!(report.language_counts["english"], 3);
    assert_eq!(report.language_counts["french"], 1);

    // Consolidated documents written per language
    let english = dir.path().join("final-output/site_content_english.txt");
    let french = dir.path().join("final-output/site_content_french.txt");
    assert!(english.exists());
    assert!(french.exists());
    assert!(dir
        .path()
        .join("final-output/site_content_english_paginated.txt")
        .exists());

    // Within the english group: importance 9 before 5 before 3
    let english_text = std::fs::read_to_string(english).unwrap();
    let first = english_text.find("PAGE 1: PAGE ONE").unwrap();
    let second = english_text.find("PAGE 2: HOME").unwrap();
    let third = english_text.find("PAGE 3: PAGE TWO").unwrap();
    assert!(first < second && second < third);

    // Summary written
    let summary = std::fs::read_to_string(dir.path().join("summary.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(parsed["pages_succeeded"], 4);
}

#[tokio::test]
async fn test_no_url_fetched_twice() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Three spellings of the same canonical URL, plus a repeat link
    mount_page(
        &server,
        "/",
        "Home",
        &["/page1", "/page1/", "/page1#frag", "/page1"],
    )
    .await;
    mount_page(&server, "/page1", "Page One", &[]).await;

    let analyzer = Arc::new(TestAnalyzer::new());
    let config = test_config(&server.uri(), dir.path(), 10, 5);
    let (_tx, rx) = shutdown_channel();

    let report = crawl(config, "hash".to_string(), analyzer, true, rx)
        .await
        .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(requests_for(&server, "/page1").await, 1);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/a", "/b", "/c"]).await;
    mount_page(&server, "/a", "A", &["/d"]).await;
    mount_page(&server, "/b", "B", &[]).await;
    mount_page(&server, "/c", "C", &[]).await;
    mount_page(&server, "/d", "D", &[]).await;

    let script = || {
        Arc::new(
            TestAnalyzer::new()
                .with_result("/", "english", 5)
                .with_result("/a", "french", 8)
                .with_result("/b", "english", 9)
                .with_result("/c", "french", 2)
                .with_result("/d", "english", 9),
        )
    };

    // Interrupted run: budget of 2 pages, then resume to completion
    let resumed_dir = TempDir::new().unwrap();
    {
        let config = test_config(&server.uri(), resumed_dir.path(), 2, 1);
        let (_tx, rx) = shutdown_channel();
        let report = crawl(config, "hash".to_string(), script(), true, rx)
            .await
            .expect("first run failed");
        assert_eq!(report.pages_succeeded, 2);
    }
    let before_resume = server.received_requests().await.unwrap_or_default().len();
    {
        let config = test_config(&server.uri(), resumed_dir.path(), 10, 1);
        let (_tx, rx) = shutdown_channel();
        let report = crawl(config, "hash".to_string(), script(), false, rx)
            .await
            .expect("resumed run failed");
        assert!(report.completed);
        assert_eq!(report.pages_succeeded, 5);
    }

    // No checkpointed page was refetched on resume: the first two pages
    // (/ and /a) were each requested exactly once across both runs
    assert_eq!(requests_for(&server, "/").await, 1);
    assert_eq!(requests_for(&server, "/a").await, 1);
    assert!(before_resume > 0);

    // Uninterrupted run over the same site snapshot, separate state
    let full_dir = TempDir::new().unwrap();
    {
        let config = test_config(&server.uri(), full_dir.path(), 10, 1);
        let (_tx, rx) = shutdown_channel();
        crawl(config, "hash".to_string(), script(), true, rx)
            .await
            .expect("uninterrupted run failed");
    }

    // Same final LanguageGroup contents (keys, members, scores, order)
    let load_groups = |dir: &Path| {
        let store = CheckpointStore::open(&dir.join("checkpoint.db")).unwrap();
        let pages = store.load_analyzed_pages().unwrap();
        linguamap::aggregate::aggregate(&pages)
    };

    let resumed = load_groups(resumed_dir.path());
    let full = load_groups(full_dir.path());

    let flatten = |groups: &std::collections::BTreeMap<String, linguamap::aggregate::LanguageGroup>| {
        groups
            .iter()
            .map(|(lang, group)| {
                (
                    lang.clone(),
                    group
                        .pages
                        .iter()
                        .map(|p| (p.page.url.clone(), p.analysis.importance))
                        .collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(flatten(&resumed), flatten(&full));
}

#[tokio::test]
async fn test_429_raises_persisted_host_delay() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // First answer is a 429; the retry succeeds
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", &[]).await;

    let config = test_config(&server.uri(), dir.path(), 10, 1);
    let base_delay = config.crawler.base_delay_ms;
    let db_path = config.output.database_path.clone();
    let (_tx, rx) = shutdown_channel();

    let report = crawl(
        config,
        "hash".to_string(),
        Arc::new(TestAnalyzer::new()),
        true,
        rx,
    )
    .await
    .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 1);

    // The checkpointed host statistics carry the elevated delay
    let store = CheckpointStore::open(Path::new(&db_path)).unwrap();
    let (state, _) = store.load().unwrap().unwrap();
    let stats = state.host_stats.get("127.0.0.1").expect("host stats missing");
    assert!(
        stats.current_delay_ms > base_delay,
        "delay {} should exceed base {}",
        stats.current_delay_ms,
        base_delay
    );
}

#[tokio::test]
async fn test_rejected_content_is_skipped_not_fetched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", "Home", &["/brochure", "/leaflet.pdf", "/page1"]).await;
    mount_page(&server, "/page1", "Page One", &[]).await;

    // Served with a non-page content type
    Mock::given(method("GET"))
        .and(path("/brochure"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("%PDF-1.4")
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), dir.path(), 10, 2);
    let db_path = config.output.database_path.clone();
    let (_tx, rx) = shutdown_channel();

    let report = crawl(
        config,
        "hash".to_string(),
        Arc::new(TestAnalyzer::new()),
        true,
        rx,
    )
    .await
    .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(report.pages_skipped, 1);

    // The extension-rejected link was never enqueued, let alone fetched
    assert_eq!(requests_for(&server, "/leaflet.pdf").await, 0);

    // The rejected page is not in the visited set's fetched subset and
    // produced no page record
    let store = CheckpointStore::open(Path::new(&db_path)).unwrap();
    let (state, pages) = store.load().unwrap().unwrap();
    let brochure_url = format!("{}/brochure", server.uri());
    assert_eq!(
        state.visited.get(&brochure_url),
        Some(&VisitOutcome::Skipped)
    );
    assert!(pages.iter().all(|p| !p.page.url.contains("/brochure")));
}

#[tokio::test]
async fn test_failed_analysis_lands_in_unknown_bucket() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", "Home", &["/broken"]).await;
    mount_page(&server, "/broken", "Broken", &[]).await;

    let analyzer = Arc::new(
        TestAnalyzer::new()
            .with_result("/", "english", 5)
            .failing_on("/broken"),
    );

    let config = test_config(&server.uri(), dir.path(), 10, 5);
    let db_path = config.output.database_path.clone();
    let (_tx, rx) = shutdown_channel();

    let report = crawl(config, "hash".to_string(), analyzer, true, rx)
        .await
        .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(report.pages_unanalyzed, 1);
    assert_eq!(report.language_counts["unknown"], 1);

    let store = CheckpointStore::open(Path::new(&db_path)).unwrap();
    let groups = linguamap::aggregate::aggregate(&store.load_analyzed_pages().unwrap());
    let unknown = &groups["unknown"];
    assert_eq!(unknown.pages.len(), 1);
    assert!(unknown.pages[0].page.url.contains("/broken"));
    assert_eq!(unknown.pages[0].analysis.importance, 0);
}

#[tokio::test]
async fn test_permanent_failure_abandons_url_but_crawl_continues() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // /missing has no mock; wiremock answers 404
    mount_page(&server, "/", "Home", &["/missing", "/page1"]).await;
    mount_page(&server, "/page1", "Page One", &[]).await;

    let config = test_config(&server.uri(), dir.path(), 10, 5);
    let (_tx, rx) = shutdown_channel();

    let report = crawl(
        config,
        "hash".to_string(),
        Arc::new(TestAnalyzer::new()),
        true,
        rx,
    )
    .await
    .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(report.pages_abandoned, 1);
    assert!(report
        .failures
        .iter()
        .any(|f| f.url.contains("/missing") && f.reason.contains("404")));
}

#[tokio::test]
async fn test_server_errors_retried_then_succeed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Two 500s, then success; max_retries = 2 covers this
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", &[]).await;

    let config = test_config(&server.uri(), dir.path(), 10, 1);
    let (_tx, rx) = shutdown_channel();

    let report = crawl(
        config,
        "hash".to_string(),
        Arc::new(TestAnalyzer::new()),
        true,
        rx,
    )
    .await
    .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 1);
    assert_eq!(report.pages_abandoned, 0);
    assert_eq!(requests_for(&server, "/").await, 3);
}

#[tokio::test]
async fn test_robots_disallow_blocks_enqueue() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", &["/private", "/public"]).await;
    mount_page(&server, "/public", "Public", &[]).await;
    mount_page(&server, "/private", "Private", &[]).await;

    let config = test_config(&server.uri(), dir.path(), 10, 5);
    let (_tx, rx) = shutdown_channel();

    let report = crawl(
        config,
        "hash".to_string(),
        Arc::new(TestAnalyzer::new()),
        true,
        rx,
    )
    .await
    .expect("crawl failed");

    assert_eq!(report.pages_succeeded, 2);
    assert_eq!(requests_for(&server, "/private").await, 0);
}

#[tokio::test]
async fn test_analysis_client_against_mock_endpoint() {
    let server = MockServer::start().await;

    let analysis_json = serde_json::json!({
        "language": "french",
        "languages": ["french", "english"],
        "category": "consular_services",
        "summary": "Visa requirements.",
        "keywords": ["visa"],
        "importance_score": 8
    });
    let response = serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": analysis_json.to_string()
            }
        }]
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(&server)
        .await;

    std::env::set_var("LINGUAMAP_TEST_KEY_PARSE", "test-key");
    let config = AnalysisConfig {
        endpoint: format!("{}/v1/chat/completions", server.uri()),
        model: "test-model".to_string(),
        api_key_env: "LINGUAMAP_TEST_KEY_PARSE".to_string(),
        concurrency: 1,
        max_retries: 0,
        retry_delay_ms: 1,
        translate: false,
    };

    let client = AnalysisClient::new(&config).unwrap();
    let result = client
        .analyze("Quelques informations sur les visas.", "https://example.com/visa", Some("Visas"))
        .await
        .unwrap();

    assert_eq!(result.language, "french");
    assert_eq!(result.languages, vec!["french", "english"]);
    assert_eq!(result.category, "consular_services");
    assert_eq!(result.importance, 8);
}

#[tokio::test]
async fn test_analysis_client_classifies_server_error_as_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    std::env::set_var("LINGUAMAP_TEST_KEY_TRANSIENT", "test-key");
    let config = AnalysisConfig {
        endpoint: format!("{}/v1/chat/completions", server.uri()),
        model: "test-model".to_string(),
        api_key_env: "LINGUAMAP_TEST_KEY_TRANSIENT".to_string(),
        concurrency: 1,
        max_retries: 0,
        retry_delay_ms: 1,
        translate: false,
    };

    let client = AnalysisClient::new(&config).unwrap();
    let error = client
        .analyze("text", "https://example.com/", None)
        .await
        .unwrap_err();

    assert!(error.is_transient());
}

#[tokio::test]
async fn test_analysis_client_requires_api_key() {
    let config = AnalysisConfig {
        endpoint: "https://api.example.com/v1/chat/completions".to_string(),
        model: "test-model".to_string(),
        api_key_env: "LINGUAMAP_TEST_KEY_DEFINITELY_UNSET".to_string(),
        concurrency: 1,
        max_retries: 0,
        retry_delay_ms: 1,
        translate: false,
    };

    assert!(AnalysisClient::new(&config).is_err());
}

#[tokio::test]
async fn test_translation_applied_to_group_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", "Accueil", &["/page-en"]).await;
    mount_page(&server, "/page-en", "English Page", &[]).await;

    let analyzer = Arc::new(
        TestAnalyzer::new()
            .with_result("/", "french", 5)
            .with_result("/page-en", "english", 5),
    );

    let mut config = test_config(&server.uri(), dir.path(), 10, 5);
    config.analysis.translate = true;
    let (_tx, rx) = shutdown_channel();

    crawl(config, "hash".to_string(), analyzer, true, rx)
        .await
        .expect("crawl failed");

    // Each page matches its own group's language, so nothing gets
    // translated even with translation enabled.
    let french = std::fs::read_to_string(dir.path().join("final-output/site_content_french.txt"))
        .unwrap();
    assert!(!french.contains("[french]"));

    let english =
        std::fs::read_to_string(dir.path().join("final-output/site_content_english.txt")).unwrap();
    assert!(!english.contains("[english]"));
}

#[tokio::test]
async fn test_multi_language_page_translated_per_group() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", "Bilingual Home", &[]).await;

    // The service explicitly lists two languages; the page joins both
    // groups and is translated for the group it doesn't match
    let mut analyzer = TestAnalyzer::new();
    analyzer.by_path.insert(
        "/".to_string(),
        AnalysisResult {
            language: "english".to_string(),
            languages: vec!["english".to_string(), "french".to_string()],
            category: "general".to_string(),
            summary: "Bilingual page.".to_string(),
            keywords: vec![],
            importance: 6,
        },
    );

    let mut config = test_config(&server.uri(), dir.path(), 10, 5);
    config.analysis.translate = true;
    let (_tx, rx) = shutdown_channel();

    let report = crawl(config, "hash".to_string(), Arc::new(analyzer), true, rx)
        .await
        .expect("crawl failed");

    assert_eq!(report.language_counts["english"], 1);
    assert_eq!(report.language_counts["french"], 1);

    let french = std::fs::read_to_string(dir.path().join("final-output/site_content_french.txt"))
        .unwrap();
    assert!(french.contains("[french]"));

    let english =
        std::fs::read_to_string(dir.path().join("final-output/site_content_english.txt")).unwrap();
    assert!(!english.contains("[english]"));
}

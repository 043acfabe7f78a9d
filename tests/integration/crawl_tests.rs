//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and crawl it end-to-end
//! through the HTTP driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trawl::browser::http::HttpDriver;
use trawl::config::{parse_config, BrowserConfig, Config};
use trawl::crawler::{
    ChallengeHandler, CrawlController, CrawlSettings, FailureKind, PolitenessDelay, StopReason,
};
use trawl::log_sink::{FileLogSink, LogSink, MemoryLogSink};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts an HTML page at `route`
async fn mount_page(server: &MockServer, route: &str, body: String) {
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

fn html(title: &str, body: &str) -> String {
    format!(
        r#"<html><head><title>{}</title></head><body>{}</body></html>"#,
        title, body
    )
}

/// Controller over the HTTP driver with no politeness delay
fn controller(log: Arc<dyn LogSink>) -> CrawlController {
    let config = Config::default();
    let driver = HttpDriver::new(&config.browser).expect("Failed to build HTTP driver");
    let challenge =
        ChallengeHandler::from_config(&config.challenge).expect("Default indicators are valid");
    let settings = CrawlSettings {
        delay: PolitenessDelay::none(),
        ..CrawlSettings::from_config(&config)
    };

    CrawlController::new(Arc::new(driver), log, challenge, settings)
}

#[tokio::test]
async fn test_full_crawl_small_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/a",
        html(
            "Home",
            r#"<h1> Welcome </h1><h2>News</h2>
               <a href="/b">B</a>
               <a href="/c">C</a>
               <a href="mailto:team@example.test">Mail</a>"#,
        ),
    )
    .await;
    mount_page(&server, "/b", html("Page B", "<h3>Leaf</h3>")).await;
    mount_page(
        &server,
        "/c",
        html("Page C", r#"<a href="/a">Back home</a>"#),
    )
    .await;

    let log = Arc::new(MemoryLogSink::new());
    let controller = controller(log.clone());
    let report = controller
        .crawl(&format!("{}/a", base), 2)
        .await
        .expect("Crawl failed");

    let urls: Vec<String> = report.records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/a", base),
            format!("{}/b", base),
            format!("{}/c", base)
        ]
    );

    let home = &report.records[0].data;
    assert_eq!(home.title, "Home");
    assert_eq!(home.headings, vec!["Welcome", "News"]);
    assert_eq!(
        home.links,
        vec![
            format!("{}/b", base),
            format!("{}/c", base),
            "mailto:team@example.test".to_string()
        ]
    );
    assert_eq!(report.records[1].data.headings, vec!["Leaf"]);
    assert_eq!(report.stop, StopReason::Completed);
    assert!(report.failures.is_empty());

    // Three pages plus the summary
    assert_eq!(log.payloads("crawl").len(), 4);

    controller.shutdown().await;
}

#[tokio::test]
async fn test_http_error_does_not_stop_siblings() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/a",
        html("Home", r#"<a href="/broken">X</a><a href="/c">C</a>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/c", html("Page C", "")).await;

    let controller = controller(Arc::new(MemoryLogSink::new()));
    let report = controller
        .crawl(&format!("{}/a", base), 2)
        .await
        .expect("Crawl failed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[1].data.title, "Page C");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::Navigation);
    assert!(report.failures[0].message.contains("HTTP 500"));
}

#[tokio::test]
async fn test_trailing_slash_links_are_fetched_as_written() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/a", html("Home", r#"<a href="/docs/">Docs</a>"#)).await;
    mount_page(&server, "/docs/", html("Docs", "<h1>Guide</h1>")).await;

    let controller = controller(Arc::new(MemoryLogSink::new()));
    let report = controller
        .crawl(&format!("{}/a", base), 1)
        .await
        .expect("Crawl failed");

    assert!(report.failures.is_empty());
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[1].url, format!("{}/docs", base));
    assert_eq!(report.records[1].data.title, "Docs");
}

#[tokio::test]
async fn test_presents_configured_user_agent() {
    let server = MockServer::start().await;
    let user_agent = "trawl-integration/1.0";

    Mock::given(method("GET"))
        .and(path("/a"))
        .and(header("user-agent", user_agent))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("Identified", ""))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::default();
    let driver = HttpDriver::new(&config.browser).expect("Failed to build HTTP driver");
    let settings = CrawlSettings {
        delay: PolitenessDelay::none(),
        user_agent: user_agent.to_string(),
        ..CrawlSettings::from_config(&config)
    };
    let controller = CrawlController::new(
        Arc::new(driver),
        Arc::new(MemoryLogSink::new()),
        ChallengeHandler::new(vec![], Duration::from_secs(1), Duration::from_secs(1)),
        settings,
    );

    let report = controller
        .crawl(&format!("{}/a", server.uri()), 0)
        .await
        .expect("Crawl failed");

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].data.title, "Identified");
}

#[tokio::test]
async fn test_challenge_resolved_by_meta_refresh() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/gate",
        format!(
            r#"<html><head><title>Just a moment...</title>
               <meta http-equiv="refresh" content="0; url={}/content"></head>
               <body><div id="cf-challenge-running">Checking your browser</div></body></html>"#,
            base
        ),
    )
    .await;
    mount_page(
        &server,
        "/content",
        html("Real content", "<h1>Article</h1>"),
    )
    .await;

    let log = Arc::new(MemoryLogSink::new());
    let controller = controller(log.clone());
    let report = controller
        .crawl(&format!("{}/gate", base), 0)
        .await
        .expect("Crawl failed");

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].url, format!("{}/gate", base));
    assert_eq!(report.records[0].data.title, "Real content");
    assert_eq!(log.payloads("crawl")[0]["challenge"], "#cf-challenge-running");
}

#[tokio::test]
async fn test_unresolvable_challenge_is_node_failure() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/gate",
        html("Captcha", r#"<div class="hcaptcha-box"></div>"#),
    )
    .await;

    let controller = controller(Arc::new(MemoryLogSink::new()));
    let report = controller
        .crawl(&format!("{}/gate", server.uri()), 1)
        .await
        .expect("Crawl failed");

    assert!(report.records.is_empty());
    assert_eq!(report.failures_of(FailureKind::ChallengeTimeout), 1);
}

/// Every line of every log file under `<root>/<category>`
fn read_log_lines(root: &Path, category: &str) -> Vec<serde_json::Value> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root.join(category))
        .expect("Category directory missing")
        .flat_map(|day| std::fs::read_dir(day.unwrap().path()).unwrap())
        .map(|file| file.unwrap().path())
        .collect();
    files.sort();

    files
        .iter()
        .flat_map(|path| {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).expect("Log line is not JSON"))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[tokio::test]
async fn test_file_log_sink_records_each_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/a", html("Home", r#"<a href="/b">B</a>"#)).await;
    mount_page(&server, "/b", html("Page B", "")).await;

    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let sink = Arc::new(FileLogSink::new(dir.path()));
    let controller = controller(sink.clone());

    controller
        .crawl(&format!("{}/a", base), 3)
        .await
        .expect("Crawl failed");
    sink.close().await;

    let lines = read_log_lines(dir.path(), "crawl");
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["url"], format!("{}/a", base));
    assert_eq!(lines[0]["status"], "ok");
    assert_eq!(lines[1]["depth"], 1);
    assert_eq!(lines[2]["event"], "summary");
    assert_eq!(lines[2]["records"], 2);
}

#[tokio::test]
async fn test_config_file_drives_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/a",
        html("Home", r#"<a href="/b">B</a><a href="/c">C</a>"#),
    )
    .await;
    mount_page(&server, "/b", html("Page B", "")).await;
    mount_page(&server, "/c", html("Page C", "")).await;

    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("trawl.toml");
    std::fs::write(
        &config_path,
        r#"
[crawler]
max-depth = 4
delay-min-ms = 0
delay-max-ms = 0
max-pages = 2

[browser]
driver = "http"
navigation-timeout-secs = 5

[log]
category = "site-crawl"
"#,
    )
    .expect("Failed to write config");

    let config = trawl::config::load_config(&config_path).expect("Failed to load config");
    let driver = HttpDriver::new(&config.browser).expect("Failed to build HTTP driver");
    let log = Arc::new(MemoryLogSink::new());
    let controller = CrawlController::from_config(&config, Arc::new(driver), log.clone())
        .expect("Failed to build controller");

    let report = controller
        .crawl(&format!("{}/a", base), config.crawler.max_depth)
        .await
        .expect("Crawl failed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stop, StopReason::PageBudget);
    assert_eq!(log.payloads("site-crawl").len(), 3);
    assert!(log.payloads("crawl").is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_crawling() {
    let err = parse_config(
        r#"
[crawler]
delay-min-ms = 3000
delay-max-ms = 1000
"#,
    );
    assert!(err.is_err());

    let browser = BrowserConfig {
        navigation_timeout_secs: 5,
        ..BrowserConfig::default()
    };
    assert!(HttpDriver::new(&browser).is_ok());
}

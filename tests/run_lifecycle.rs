//! Integration tests for a full run: registry, feeds, model, archive.
//!
//! Feeds and the model endpoint are served by wiremock. The model echoes the
//! prompt back as `prompt ||| prompt`, and the prompt file is just `{title}`,
//! so classification after enrichment sees the original title keywords.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use robonews::config::{Config, FetchConfig, LlmConfig};
use robonews::enrich::{Enricher, OllamaClient, PromptTemplate};
use robonews::feed::build_client;
use robonews::pipeline::{Pipeline, RunReport};
use robonews::registry::Registry;
use robonews::storage::{ArchiveStore, Category};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct EchoPrompt;

impl Respond for EchoPrompt {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"role": "assistant", "content": format!("{prompt} ||| {prompt}")}
        }))
    }
}

fn rss(items: &[(&str, &str, i64)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, days_old)| {
            let date = Utc::now() - Duration::days(*days_old) - Duration::minutes(5);
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>About {title}</description>\
                 <pubDate>{}</pubDate></item>",
                date.to_rfc2822()
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#)
}

async fn serve_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn serve_echo_model(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(EchoPrompt)
        .mount(server)
        .await;
}

fn test_config(dir: &TempDir, server: &MockServer) -> Config {
    let prompt_file = dir.path().join("prompt.md");
    std::fs::write(&prompt_file, "{title}").unwrap();

    Config {
        archive_file: dir.path().join("news_archive.json"),
        prompt_file,
        fetch: FetchConfig {
            max_retries: 0,
            retry_base_ms: 0,
            ..FetchConfig::default()
        },
        llm: LlmConfig {
            base_url: server.uri(),
            models: vec!["test-model".to_string()],
            max_attempts: 2,
            rate_limit_backoff_ms: 0,
            cooldown_ms: 0,
            fallback_summary_width: 12,
            probe_models: false,
            ..LlmConfig::default()
        },
        ..Config::default()
    }
}

fn registry(server: &MockServer, sources: &[(&str, &str)]) -> Registry {
    let records: Vec<serde_json::Value> = sources
        .iter()
        .map(|(route, cat)| {
            serde_json::json!({"url": format!("{}{}", server.uri(), route), "title": route, "cat": cat})
        })
        .collect();
    Registry::from_json(&serde_json::json!({ "robotics": records }).to_string()).unwrap()
}

async fn run_once(config: &Config, registry: &Registry) -> RunReport {
    let mut archive = ArchiveStore::load(&config.archive_file, config.max_archive_items);
    let client = OllamaClient::from_config(&config.llm).unwrap();
    let enricher = Enricher::new(
        client,
        PromptTemplate::load_or_default(&config.prompt_file),
        config.enrich_settings(),
    );
    let mut pipeline = Pipeline::new(
        build_client(&config.fetch.user_agent).unwrap(),
        config.fetch_policy(),
        enricher,
        config.run_limits(),
    )
    .probe_models(config.llm.probe_models)
    .reclassify_on_load(config.reclassify_on_load);

    pipeline.run(registry, &mut archive).await.unwrap()
}

fn reload(config: &Config) -> ArchiveStore {
    ArchiveStore::load(&config.archive_file, config.max_archive_items)
}

// ============================================================================
// Classification scenarios
// ============================================================================

#[tokio::test]
async fn test_humanoid_paper_archived_and_duplicate_skipped() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/news",
        rss(&[("Robot arm startup raises funds", "https://news.example/dup", 1)]),
    )
    .await;
    serve_feed(
        &server,
        "/papers",
        rss(&[("New Humanoid Robot Unveiled", "https://papers.example/1", 1)]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    let seeded = serde_json::json!([{
        "title": "기존 기사",
        "link": "https://news.example/dup",
        "date": "2026-01-01 00:00",
        "source": "News",
        "category": "robotics",
        "summary": "이미 보관된 기사"
    }]);
    std::fs::write(&config.archive_file, seeded.to_string()).unwrap();

    let sources = registry(&server, &[("/news", "robotics"), ("/papers", "paper")]);
    let report = run_once(&config, &sources).await;

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.archived, 1);
    assert_eq!(report.papers, 1);

    let archive = reload(&config);
    assert_eq!(archive.len(), 2);
    let existing: Vec<_> = archive
        .items()
        .iter()
        .filter(|item| item.link == "https://news.example/dup")
        .collect();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0].title, "기존 기사");

    let paper = archive
        .items()
        .iter()
        .find(|item| item.link == "https://papers.example/1")
        .unwrap();
    assert_eq!(paper.category, Category::Humanoid);
    assert_eq!(paper.title, "New Humanoid Robot Unveiled");
    assert_eq!(paper.original_title, "New Humanoid Robot Unveiled");
}

#[tokio::test]
async fn test_paper_without_keywords_is_discarded() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/papers",
        rss(&[("Optimizing Drone Flight Paths", "https://papers.example/drone", 1)]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    let report = run_once(&config, &registry(&server, &[("/papers", "paper")])).await;

    assert_eq!(report.papers_filtered, 1);
    assert_eq!(report.archived, 0);
    assert!(reload(&config).is_empty());
}

#[tokio::test]
async fn test_recency_window() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/news",
        rss(&[
            ("Warehouse robot fleet grows", "https://news.example/old", 8),
            ("Robot arm startup raises funds", "https://news.example/new", 2),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    let report = run_once(&config, &registry(&server, &[("/news", "robotics")])).await;

    assert_eq!(report.stale, 1);
    let archive = reload(&config);
    let links: Vec<&str> = archive.links().collect();
    assert_eq!(links, vec!["https://news.example/new"]);
}

// ============================================================================
// Archive invariants across runs
// ============================================================================

#[tokio::test]
async fn test_links_stay_unique_across_runs() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/news",
        rss(&[
            ("Gripper maker expands", "https://news.example/a", 0),
            ("Bipedal robot demo", "https://news.example/b", 1),
        ]),
    )
    .await;
    serve_feed(
        &server,
        "/mirror",
        rss(&[("Gripper maker expands", "https://news.example/a", 0)]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    let sources = registry(&server, &[("/news", "robotics"), ("/mirror", "robotics")]);

    let first = run_once(&config, &sources).await;
    assert_eq!(first.archived, 2);
    assert_eq!(first.duplicates, 1);

    let second = run_once(&config, &sources).await;
    assert_eq!(second.archived, 0);
    assert_eq!(second.duplicates, 3);

    let archive = reload(&config);
    let mut links: Vec<&str> = archive.links().collect();
    links.sort_unstable();
    links.dedup();
    assert_eq!(links.len(), archive.len());
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn test_truncation_evicts_oldest() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/news",
        rss(&[
            ("Robot news oldest", "https://news.example/3", 3),
            ("Robot news newest", "https://news.example/1", 0),
            ("Robot news middle", "https://news.example/2", 1),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = Config {
        max_archive_items: 2,
        ..test_config(&dir, &server)
    };
    run_once(&config, &registry(&server, &[("/news", "robotics")])).await;

    let archive = reload(&config);
    let links: Vec<&str> = archive.links().collect();
    assert_eq!(links, vec!["https://news.example/1", "https://news.example/2"]);
}

// ============================================================================
// Degraded paths
// ============================================================================

#[tokio::test]
async fn test_rate_limited_model_falls_back_to_original_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;
    serve_feed(
        &server,
        "/news",
        rss(&[("Dexterous hands at scale", "https://news.example/h", 0)]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    let report = run_once(&config, &registry(&server, &[("/news", "robotics")])).await;

    assert_eq!(report.fallback_enrichments, 1);
    let archive = reload(&config);
    let item = &archive.items()[0];
    assert_eq!(item.title, "Dexterous hands at scale");
    assert_eq!(item.summary, "About Dex...");
    assert_eq!(item.category, Category::Hand);
}

#[tokio::test]
async fn test_corrupt_archive_is_replaced() {
    let server = MockServer::start().await;
    serve_echo_model(&server).await;
    serve_feed(
        &server,
        "/news",
        rss(&[("Tactile sensor skin", "https://news.example/t", 0)]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &server);
    std::fs::write(&config.archive_file, "[{ truncated").unwrap();

    let report = run_once(&config, &registry(&server, &[("/news", "robotics")])).await;
    assert_eq!(report.archived, 1);
    assert_eq!(reload(&config).len(), 1);
}

//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to serve a small site (one listing page, two
//! articles, two author profiles) and run the full pipeline end-to-end.

use byline_harvest::config::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use byline_harvest::crawler::{
    build_http_client, run_harvest, Frontier, HttpFetcher, Record, ShutdownHandle, StageHandlers,
};
use byline_harvest::storage::{MemorySink, RecordStore, RunStatus};
use byline_harvest::ArticlePattern;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SOLO_PATH: &str = "/sites/jane/2024/03/07/solo-piece/";
const DUO_PATH: &str = "/sites/bob/2024/03/08/joint-piece/";
const JANE_PATH: &str = "/sites/jane/";
const BOB_PATH: &str = "/sites/bob/";

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Creates a test configuration pointed at the mock server
fn create_test_config(host: &str, seeds: Vec<String>, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches: 4,
            request_timeout_secs: 5,
            max_retries: 0,
            retry_delay_ms: 1,
        },
        user_agent: user_agent(),
        site: SiteConfig {
            article_host: host.to_string(),
            seeds,
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
            flush_every: 2,
        },
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn host_of(server: &MockServer) -> String {
    let url = Url::parse(&server.uri()).unwrap();
    format!("{}:{}", url.host_str().unwrap(), url.port().unwrap())
}

/// Mounts the listing, both articles and both author pages
async fn mount_site(server: &MockServer) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/money/"))
        .respond_with(html(format!(
            r#"<html><body>
                 <h1 class="chansec-header"><div class="fs-content">Money</div></h1>
                 <div class="card"><a href="{base}{SOLO_PATH}">Solo</a></div>
                 <div class="card"><a href="{DUO_PATH}">Duo</a></div>
                 <article class="stream-item">
                   <a class="stream-item__title" href="{base}{SOLO_PATH}">Solo again</a>
                 </article>
                 <div class="card"><a href="https://elsewhere.com/sites/x/2024/03/08/away/">Away</a></div>
               </body></html>"#
        )))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(SOLO_PATH))
        .respond_with(html(
            r#"<html><body>
                 <div class="header-content-container"><div class="content-data">
                   <time>Mar 7, 2024</time><span class="time"><time>9:00am EST</time></span>
                 </div></div>
                 <div class="article-headline-container"><h1 class="fs-headline">Solo Piece</h1></div>
                 <div class="article-body"><p>Only one voice.</p></div>
               </body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(DUO_PATH))
        .respond_with(html(format!(
            r#"<html><body>
                 <div class="article-headline-container"><h1 class="fs-headline">Joint Piece</h1></div>
                 <div class="top-contrib-block">
                   <div class="contribs"><div class="contrib-container">
                     <a class="fs-author-avatar" href="{JANE_PATH}">Jane</a>
                   </div></div>
                   <div class="contribs"><div class="contrib-container">
                     <a class="fs-author-avatar" href="{base}{BOB_PATH}">Bob</a>
                   </div></div>
                 </div>
                 <div class="article-body">
                   <h3>Intro</h3>
                   <p>Two voices.</p>
                   <ol><li><em>First point</em></li></ol>
                 </div>
               </body></html>"#
        )))
        .expect(1)
        .mount(server)
        .await;

    for (author_path, name) in [(JANE_PATH, "Jane Doe"), (BOB_PATH, "Bob Roe")] {
        Mock::given(method("GET"))
            .and(path(author_path))
            .respond_with(html(format!(
                r#"<html><body>
                     <h1 class="contributor-details__name"><span>{name}</span></h1>
                     <div class="contributor-details__type"><span>Staff</span></div>
                     <div class="contributor-about__full-description"><p>Writes.</p><p>Edits.</p></div>
                     <div class="contributor-social"><a href="https://twitter.com/x">t</a></div>
                   </body></html>"#
            )))
            .expect(1)
            .mount(server)
            .await;
    }
}

fn memory_frontier(server: &MockServer) -> Frontier<MemorySink> {
    let pattern = ArticlePattern::for_host(&host_of(server)).unwrap();
    let handlers = StageHandlers::new(pattern).unwrap();
    let client = build_http_client(&user_agent(), Duration::from_secs(5)).unwrap();
    let fetcher = Arc::new(HttpFetcher::new(client, 0, Duration::from_millis(1)));
    Frontier::new(fetcher, handlers, MemorySink::new(), 4)
}

fn by_article<'a>(records: &'a [Record], article_path: &str) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| r.article.url.ends_with(article_path))
        .collect()
}

#[tokio::test]
async fn test_listing_article_author_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let seed = Url::parse(&format!("{}/money/", server.uri())).unwrap();
    let (report, sink) = memory_frontier(&server).run(vec![seed]).await.unwrap();
    let records = sink.records();

    assert_eq!(records.len(), 3);
    for record in records {
        assert_eq!(record.listing.context_header.as_deref(), Some("Money"));
    }

    let solo = by_article(records, SOLO_PATH);
    assert_eq!(solo.len(), 1);
    assert!(solo[0].author.is_none());
    assert_eq!(solo[0].article.title.as_deref(), Some("Solo Piece"));
    assert_eq!(solo[0].article.date_ymd.as_deref(), Some("Mar 7, 2024"));
    assert_eq!(solo[0].article.date_hm.as_deref(), Some("9:00am EST"));

    let duo = by_article(records, DUO_PATH);
    assert_eq!(duo.len(), 2);
    assert_eq!(duo[0].article, duo[1].article);
    assert_eq!(
        duo[0].article.content_parts,
        vec!["Intro", "Two voices.", "First point"]
    );

    let profiles: HashSet<String> = duo
        .iter()
        .map(|r| r.author.as_ref().unwrap().profile_url.clone())
        .collect();
    assert_eq!(
        profiles,
        HashSet::from([
            format!("{}{}", server.uri(), JANE_PATH),
            format!("{}{}", server.uri(), BOB_PATH),
        ])
    );
    for record in &duo {
        let author = record.author.as_ref().unwrap();
        assert_eq!(author.contributor_type.as_deref(), Some("Staff"));
        assert_eq!(author.about, "Writes. Edits.");
        assert_eq!(author.social_links, vec!["https://twitter.com/x"]);
    }

    assert_eq!(report.seeds_processed, 1);
    assert_eq!(report.articles_fetched, 2);
    assert_eq!(report.authors_fetched, 2);
    assert_eq!(report.tasks_failed, 0);
    assert_eq!(report.records_sunk, 3);
}

#[tokio::test]
async fn test_missing_author_page_keeps_the_other_record() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/money/"))
        .respond_with(html(format!(
            r#"<div class="card"><a href="{base}{DUO_PATH}">Duo</a></div>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DUO_PATH))
        .respond_with(html(format!(
            r#"<div class="top-contrib-block">
                 <div class="contribs"><div class="contrib-container">
                   <a class="fs-author-avatar" href="{JANE_PATH}">Jane</a></div></div>
                 <div class="contribs"><div class="contrib-container">
                   <a class="fs-author-avatar" href="/sites/gone/">Gone</a></div></div>
               </div>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JANE_PATH))
        .respond_with(html(
            r#"<h1 class="contributor-details__name"><span>Jane Doe</span></h1>"#.to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/gone/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let seed = Url::parse(&format!("{}/money/", base)).unwrap();
    let (report, sink) = memory_frontier(&server).run(vec![seed]).await.unwrap();

    assert_eq!(report.tasks_failed, 1);
    assert_eq!(sink.records().len(), 1);
    let author = sink.records()[0].author.as_ref().unwrap();
    assert_eq!(author.name.as_deref(), Some("Jane Doe"));
    assert!(sink.records()[0].listing.context_header.is_none());
}

#[tokio::test]
async fn test_run_harvest_persists_to_sqlite() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &host_of(&server),
        vec![format!("{}/money/", server.uri())],
        db_path.to_str().unwrap(),
    );

    let report = run_harvest(&config, "test-hash", ShutdownHandle::new())
        .await
        .unwrap();
    assert_eq!(report.records_sunk, 3);
    assert_eq!(report.sink_failures, 0);

    let store = RecordStore::open(&db_path).unwrap();
    let runs = store.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].config_hash, "test-hash");
    assert_eq!(runs[0].record_count, 3);

    let records = store.load_records(runs[0].id).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(by_article(&records, DUO_PATH).len(), 2);
    assert_eq!(store.count_articles(runs[0].id).unwrap(), 2);
}

#[tokio::test]
async fn test_interrupted_harvest_is_marked() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &host_of(&server),
        vec![format!("{}/money/", server.uri())],
        db_path.to_str().unwrap(),
    );

    let shutdown = ShutdownHandle::new();
    shutdown.request();
    let report = run_harvest(&config, "test-hash", shutdown).await.unwrap();

    assert_eq!(report.tasks_dispatched, 0);
    assert_eq!(report.tasks_abandoned, 1);

    let store = RecordStore::open(&db_path).unwrap();
    let runs = store.list_runs().unwrap();
    assert_eq!(runs[0].status, RunStatus::Interrupted);
    assert_eq!(runs[0].record_count, 0);
}

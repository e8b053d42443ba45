//! Integration tests for the dashboard HTTP server.
//!
//! Each test starts a server on an ephemeral port against a temporary task
//! store and talks to it over HTTP.

use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

use schedule_dashboard::config::Config;
use schedule_dashboard::dashboard::{PROJECT_NAME, UNAUTHORIZED_BODY, start_server};
use schedule_dashboard::export::{CSV_HEADER, UTF8_BOM};
use schedule_dashboard::store::SharedStore;

const USER: &str = "planner";
const PASS: &str = "s3cret:with-colon";

/// A running server and the temp dir backing it.
struct TestServer {
    base: String,
    client: reqwest::Client,
    store: Arc<SharedStore>,
    _shutdown: oneshot::Sender<()>,
    _dir: TempDir,
}

impl TestServer {
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base, path))
            .basic_auth(USER, Some(PASS))
    }

    fn get_anonymous(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base, path))
    }
}

/// Helper to start a server; `body` is written as the task store if given.
async fn start(body: Option<&str>) -> TestServer {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let tasks_path = dir.path().join("tasks.json");
    if let Some(body) = body {
        std::fs::write(&tasks_path, body).unwrap();
    }

    let mut config = Config::default();
    config.server.bind = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.tasks_path = tasks_path.clone();
    config.server.public_dir = dir.path().join("public");
    config.auth.username = USER.to_string();
    config.auth.password = PASS.to_string();

    let store = Arc::new(SharedStore::open(&tasks_path));
    let (shutdown, addr) = start_server(Arc::clone(&store), Arc::new(config))
        .await
        .expect("Failed to start server");

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        store,
        _shutdown: shutdown,
        _dir: dir,
    }
}

fn sample_store() -> String {
    // Deliberately not in serde_json's canonical formatting.
    r#"{
  "tasks": [
    {"id": 1, "text": "Civil works", "start_date": "2025-01-06", "duration": 90, "progress": 0.4, "type": "phase"},
    {"id": 2, "text": "Pour, slab", "start_date": "2025-03-01", "duration": 10, "progress": 1, "parent": 1, "priority": "critical"},
    {"id": 3, "text": "Fit-out", "start_date": "2026-09-01", "duration": 30, "progress": 0.5, "parent": 1},
    {"id": 4, "text": "Handover", "start_date": "2028-01-10", "duration": 5}
  ],
  "links": [ {"id": 1, "source": 2, "target": 3, "type": "0"} ]
}"#
    .to_string()
}

#[tokio::test]
async fn unauthenticated_requests_are_challenged() {
    let server = start(Some(&sample_store())).await;

    for path in ["/", "/api/tasks", "/healthz", "/style.css"] {
        let resp = server.get_anonymous(path).send().await.unwrap();
        assert_eq!(resp.status(), 401, "{path}");
        let challenge = resp.headers()["www-authenticate"].to_str().unwrap();
        assert!(challenge.starts_with("Basic realm="), "{challenge}");
        assert_eq!(resp.text().await.unwrap(), UNAUTHORIZED_BODY);
    }

    let wrong = server
        .client
        .get(format!("{}/api/tasks", server.base))
        .basic_auth(USER, Some("nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
}

#[tokio::test]
async fn api_tasks_returns_store_verbatim() {
    let body = sample_store();
    let server = start(Some(&body)).await;

    let resp = server.get("/api/tasks").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    assert_eq!(resp.text().await.unwrap(), body);
}

#[tokio::test]
async fn api_tasks_reports_unreadable_store() {
    let server = start(None).await;

    let resp = server.get("/api/tasks").send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Failed to load tasks"}));

    let stats = server.get("/api/stats").send().await.unwrap();
    assert_eq!(stats.status(), 500);
}

#[tokio::test]
async fn healthz_reports_project() {
    let server = start(Some(&sample_store())).await;

    let body: Value = server.get("/healthz").send().await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["project"], PROJECT_NAME);
}

#[tokio::test]
async fn stats_respect_year_filter() {
    let server = start(Some(&sample_store())).await;

    let all: Value = server.get("/api/stats").send().await.unwrap().json().await.unwrap();
    assert_eq!(all["total"], 3);
    assert_eq!(all["completed"], 1);
    assert_eq!(all["in_progress"], 1);
    assert_eq!(all["critical"], 1);
    assert_eq!(all["overall_progress_percent"], 50);

    let y2025: Value = server
        .get("/api/stats?year=2025")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(y2025["total"], 2);
    assert_eq!(y2025["overall_progress_percent"], 75);

    let bad = server.get("/api/stats?year=someday").send().await.unwrap();
    assert_eq!(bad.status(), 400);
    let err: Value = bad.json().await.unwrap();
    assert_eq!(err["code"], "INVALID_FIELD_VALUE");
}

#[tokio::test]
async fn schedule_view_has_levels_and_buckets() {
    let server = start(Some(&sample_store())).await;

    let body: Value = server.get("/api/schedule").send().await.unwrap().json().await.unwrap();
    assert_eq!(body["filter"], "all");
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 4);

    let slab = tasks.iter().find(|t| t["id"] == "2").unwrap();
    assert_eq!(slab["level"], 1);
    assert_eq!(slab["end_date"], "2025-03-11");
    assert_eq!(slab["status"], "Completed");
    assert_eq!(slab["bucket"], "year1");

    let handover = tasks.iter().find(|t| t["id"] == "4").unwrap();
    assert_eq!(handover["bucket"], "year3");
    assert_eq!(body["links"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_hierarchy_is_unprocessable() {
    let server = start(Some(
        r#"{"tasks": [{"id": 1, "text": "A", "start_date": "2025-01-01", "parent": 7}], "links": []}"#,
    ))
    .await;

    // The raw store is still served as-is.
    assert_eq!(server.get("/api/tasks").send().await.unwrap().status(), 200);

    for path in [
        "/api/schedule",
        "/api/schedule?year=2025",
        "/api/stats?year=2025",
        "/api/export?year=2025",
    ] {
        let resp = server.get(path).send().await.unwrap();
        assert_eq!(resp.status(), 422, "{path}");
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["code"], "DANGLING_PARENT", "{path}");
    }
}

#[tokio::test]
async fn export_downloads_csv() {
    let server = start(Some(&sample_store())).await;

    let resp = server.get("/api/export").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"westmere_factory_development_"));
    assert!(disposition.ends_with(".csv\""));

    let csv = resp.text().await.unwrap();
    assert!(csv.starts_with(UTF8_BOM));
    let lines: Vec<&str> = csv.trim_start_matches(UTF8_BOM).lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 5);
    assert!(lines[2].starts_with("1,2,\"    Pour, slab\",2025-03-01,2025-03-11,10,100%,critical,Completed,Civil works,"));
}

#[tokio::test]
async fn root_serves_embedded_shell() {
    let server = start(Some(&sample_store())).await;

    let resp = server.get("/").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("/api/schedule"));
}

#[tokio::test]
async fn reload_picks_up_new_store() {
    let server = start(Some(&sample_store())).await;
    write_store(server.store.path(), r#"{"tasks": [], "links": []}"#);
    server.store.reload();

    let stats: Value = server.get("/api/stats").send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["total"], 0);
}

fn write_store(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
}

//! Integration tests for the HTTP API.
//!
//! Each test binds a server to an ephemeral port and drives it with reqwest.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use std::sync::Arc;
use study_tasks::api::{ApiHandle, start_server};
use study_tasks::clock::ManualClock;
use study_tasks::db::Database;
use study_tasks::lifecycle::TaskManager;

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

struct TestServer {
    handle: ApiHandle,
    clock: Arc<ManualClock>,
    db: Database,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(now: NaiveDateTime) -> Self {
        let db = setup_db();
        let clock = Arc::new(ManualClock::new(now));
        let manager = TaskManager::new(db.clone(), clock.clone());
        let handle = start_server(manager, "127.0.0.1", 0).await.unwrap();
        Self {
            handle,
            clock,
            db,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.handle.addr(), path)
    }

    async fn create(&self, owner: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/users/{}/tasks", owner)))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn essay() -> Value {
    json!({
        "title": "Essay",
        "description": "Modern history",
        "start_date": "2025-01-01",
        "due_date": "2025-01-05",
        "time_due": "09:00"
    })
}

#[tokio::test]
async fn health_reports_version() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;
    let body: Value = server
        .client
        .get(server.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    server.handle.shutdown();
}

#[tokio::test]
async fn create_get_list_round_trip() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;

    let resp = server.create("alice", essay()).await;
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["status"], "Pending");
    assert_eq!(created["priority"], "low");
    assert_eq!(created["time_due"], "09:00");
    let id = created["id"].as_str().unwrap().to_string();

    let fetched: Value = server
        .client
        .get(server.url(&format!("/api/users/alice/tasks/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], id.as_str());

    let listed: Vec<Value> = server
        .client
        .get(server.url("/api/users/alice/tasks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let other: Vec<Value> = server
        .client
        .get(server.url("/api/users/bob/tasks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(other.is_empty());
    server.handle.shutdown();
}

#[tokio::test]
async fn validation_errors_are_400_with_code() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;

    let mut body = essay();
    body["start_date"] = json!("2025-01-09");
    let resp = server.create("alice", body).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "VALIDATION_ERROR");

    let mut body = essay();
    body["priority"] = json!("urgent");
    let resp = server.create("alice", body).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "INVALID_PRIORITY");
    assert_eq!(err["field"], "priority");
    server.handle.shutdown();
}

#[tokio::test]
async fn patch_complete_and_delete() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;
    let created: Value = server.create("alice", essay()).await.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let task_url = server.url(&format!("/api/users/alice/tasks/{}", id));

    let patched: Value = server
        .client
        .patch(&task_url)
        .json(&json!({ "priority": "High", "due_date": "2025-01-06" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(patched["priority"], "high");
    assert_eq!(patched["schedule_epoch"], 1);

    let completed: Value = server
        .client
        .post(format!("{}/complete", task_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(completed["status"], "Completed");
    assert_eq!(completed["is_completed"], true);

    let resp = server.client.delete(&task_url).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let resp = server.client.get(&task_url).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "NOT_FOUND");
    server.handle.shutdown();
}

#[tokio::test]
async fn other_owner_cannot_touch_task() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;
    let created: Value = server.create("alice", essay()).await.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = server
        .client
        .delete(server.url(&format!("/api/users/bob/tasks/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    server.handle.shutdown();
}

#[tokio::test]
async fn list_reflects_clock_without_sweep() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;
    server.create("alice", essay()).await;

    server.clock.set(at(2025, 1, 5, 9, 30));
    let listed: Vec<Value> = server
        .client
        .get(server.url("/api/users/alice/tasks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["status"], "OverDue");
    server.handle.shutdown();
}

#[tokio::test]
async fn notifications_filter_unread() {
    let server = TestServer::start(at(2025, 1, 1, 8, 0)).await;
    let read = server
        .db
        .append_notification("alice", None, "past_due", "Late", "Essay is late")
        .unwrap();
    server
        .db
        .append_notification("alice", None, "due_soon", "Soon", "Essay due soon")
        .unwrap();
    server.db.mark_notification_read("alice", read.id).unwrap();

    let all: Vec<Value> = server
        .client
        .get(server.url("/api/users/alice/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let unread: Vec<Value> = server
        .client
        .get(server.url("/api/users/alice/notifications?unread=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["kind"], "due_soon");
    server.handle.shutdown();
}

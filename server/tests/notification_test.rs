//! Integration tests for deadline scheduling, notification fan-out, and
//! pending-task queries.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use courier_server::state::AppState;
use courier_server::store::TaskStore;
use courier_server::tasks::scheduler::DeadlineScheduler;
use courier_server::ws::registry::SessionRegistry;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_test_server() -> (SocketAddr, AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = courier_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = AppState {
        db,
        sessions: SessionRegistry::new(),
        scheduler: DeadlineScheduler::new(),
    };

    let app = courier_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (addr, state)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect to WebSocket");
    ws
}

async fn send_json(ws: &mut WsClient, frame: Value) {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send frame");
}

async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Connection closed")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("Invalid JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected message: {:?}", other),
        }
    }
}

async fn recv_until(ws: &mut WsClient, pred: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..20 {
        let frame = recv_json(ws).await;
        if pred(&frame) {
            return frame;
        }
    }
    panic!("Did not receive expected frame within 20 frames");
}

async fn assert_no_frame_matching(ws: &mut WsClient, pred: impl Fn(&Value) -> bool, ms: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return;
        }
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let frame: Value = serde_json::from_str(&text).expect("Invalid JSON frame");
                assert!(!pred(&frame), "Unexpected frame: {}", frame);
            }
            Ok(Some(Ok(_))) => continue,
            _ => return,
        }
    }
}

async fn register(ws: &mut WsClient, username: &str) {
    send_json(ws, json!({"type": "register", "username": username})).await;
    let frame = recv_until(ws, |f| f["type"] == "registration_success").await;
    assert_eq!(frame["username"], username);
}

/// Insert a task row directly; task CRUD is outside the relay's surface.
fn insert_task(
    state: &AppState,
    id: &str,
    title: &str,
    deadline: DateTime<Utc>,
    assignee: Option<&str>,
    assigned_by: Option<&str>,
    status: &str,
) {
    let conn = state.db.lock().unwrap();
    conn.execute(
        "INSERT INTO tasks (id, task_title, deadline, assignee, assigned_by, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            title,
            deadline.to_rfc3339(),
            assignee,
            assigned_by,
            status,
            Utc::now().to_rfc3339()
        ],
    )
    .expect("Failed to insert task");
}

#[tokio::test]
async fn test_deadline_notifies_assignee_and_assigner() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    let mut alice = connect(addr).await;
    register(&mut bob, "bob").await;
    register(&mut alice, "alice").await;

    let deadline = Utc::now() + ChronoDuration::milliseconds(200);
    insert_task(
        &state,
        "task-1",
        "Ship report",
        deadline,
        Some("bob"),
        Some("alice"),
        "PENDING",
    );
    state
        .scheduler
        .schedule_fire_at("task-1".into(), deadline, state.db.clone(), state.sessions.clone());

    let to_bob = recv_until(&mut bob, |f| f["type"] == "deadline_notification").await;
    assert_eq!(to_bob["taskId"], "task-1");
    assert_eq!(to_bob["taskTitle"], "Ship report");
    assert_eq!(to_bob["assignee"], "bob");
    assert_eq!(to_bob["assignedBy"], "alice");
    assert_eq!(to_bob["message"], "Task 'Ship report' has reached its deadline!");

    let to_alice = recv_until(&mut alice, |f| f["type"] == "deadline_notification").await;
    assert_eq!(
        to_alice["message"],
        "Task 'Ship report' assigned to bob has reached its deadline!"
    );
}

#[tokio::test]
async fn test_deadline_with_offline_assignee_still_notifies_assigner() {
    let (addr, state) = start_test_server().await;
    let mut alice = connect(addr).await;
    register(&mut alice, "alice").await;

    let deadline = Utc::now() + ChronoDuration::milliseconds(200);
    insert_task(
        &state,
        "task-2",
        "Water plants",
        deadline,
        Some("bob"),
        Some("alice"),
        "PENDING",
    );
    state
        .scheduler
        .schedule_fire_at("task-2".into(), deadline, state.db.clone(), state.sessions.clone());

    // Bob is offline and his copy is dropped, but alice still gets hers.
    let to_alice = recv_until(&mut alice, |f| f["type"] == "deadline_notification").await;
    assert_eq!(
        to_alice["message"],
        "Task 'Water plants' assigned to bob has reached its deadline!"
    );
}

#[tokio::test]
async fn test_self_assigned_task_notifies_once() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    register(&mut bob, "bob").await;

    let deadline = Utc::now() + ChronoDuration::milliseconds(200);
    insert_task(
        &state,
        "task-3",
        "Solo chore",
        deadline,
        Some("bob"),
        Some("bob"),
        "PENDING",
    );
    state
        .scheduler
        .schedule_fire_at("task-3".into(), deadline, state.db.clone(), state.sessions.clone());

    let first = recv_until(&mut bob, |f| f["type"] == "deadline_notification").await;
    assert_eq!(first["message"], "Task 'Solo chore' has reached its deadline!");
    assert_no_frame_matching(&mut bob, |f| f["type"] == "deadline_notification", 300).await;
}

#[tokio::test]
async fn test_cancel_prevents_notification() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    register(&mut bob, "bob").await;

    let deadline = Utc::now() + ChronoDuration::milliseconds(400);
    insert_task(
        &state,
        "task-4",
        "Cancelled chore",
        deadline,
        Some("bob"),
        None,
        "PENDING",
    );
    state
        .scheduler
        .schedule_fire_at("task-4".into(), deadline, state.db.clone(), state.sessions.clone());
    assert_eq!(state.scheduler.pending(), 1);

    state.scheduler.cancel("task-4");
    assert_eq!(state.scheduler.pending(), 0);

    assert_no_frame_matching(&mut bob, |f| f["type"] == "deadline_notification", 800).await;

    // Cancelling an unknown id is a no-op.
    state.scheduler.cancel("task-does-not-exist");
}

#[tokio::test]
async fn test_deleted_task_fires_nothing() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    register(&mut bob, "bob").await;

    // Scheduled but never inserted: the fire-time re-read finds nothing.
    let deadline = Utc::now() + ChronoDuration::milliseconds(200);
    state
        .scheduler
        .schedule_fire_at("task-ghost".into(), deadline, state.db.clone(), state.sessions.clone());

    assert_no_frame_matching(&mut bob, |f| f["type"] == "deadline_notification", 600).await;
}

#[tokio::test]
async fn test_pending_tasks_rearmed_like_at_boot() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    register(&mut bob, "bob").await;

    let deadline = Utc::now() + ChronoDuration::milliseconds(200);
    insert_task(&state, "task-8", "Survived restart", deadline, Some("bob"), None, "PENDING");
    insert_task(&state, "task-9", "Already done", deadline, Some("bob"), None, "DONE");

    // Same loop the binary runs at startup: load PENDING tasks, arm timers.
    let tasks = TaskStore::new(state.db.clone())
        .find_pending()
        .await
        .expect("Pending query failed");
    assert_eq!(tasks.len(), 1);
    for task in &tasks {
        state.scheduler.schedule_fire_at(
            task.id.clone(),
            task.deadline,
            state.db.clone(),
            state.sessions.clone(),
        );
    }

    let frame = recv_until(&mut bob, |f| f["type"] == "deadline_notification").await;
    assert_eq!(frame["taskId"], "task-8");
}

#[tokio::test]
async fn test_get_pending_tasks_filters_by_assignee_and_status() {
    let (addr, state) = start_test_server().await;
    let mut bob = connect(addr).await;
    register(&mut bob, "bob").await;

    let deadline = Utc::now() + ChronoDuration::hours(1);
    insert_task(&state, "task-5", "Open task", deadline, Some("bob"), Some("alice"), "PENDING");
    insert_task(&state, "task-6", "Done task", deadline, Some("bob"), Some("alice"), "DONE");
    insert_task(&state, "task-7", "Someone else's", deadline, Some("carol"), None, "PENDING");

    send_json(&mut bob, json!({"type": "get_pending_tasks"})).await;
    let frame = recv_until(&mut bob, |f| f["type"] == "pending_tasks").await;

    let tasks = frame["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], "task-5");
    assert_eq!(tasks[0]["taskTitle"], "Open task");
    assert_eq!(tasks[0]["assignedBy"], "alice");
    assert_eq!(tasks[0]["status"], "PENDING");
}

//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "test"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "HTTP task dispatcher against a local task runtime."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use stagehand_scenario::{HttpTaskDispatcher, TaskDispatcher};
use tokio::net::TcpListener;

async fn run_task(
    Path(task): Path<String>,
    Json(params): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match task.as_str() {
        "echo" => (StatusCode::OK, Json(json!({"task": task, "params": params}))),
        "revert" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "execution reverted: insufficient funds"})),
        ),
        _ => (StatusCode::NOT_FOUND, Json(Value::Null)),
    }
}

async fn spawn_runtime() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/tasks/:task", post(run_task));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn successful_task_returns_body() {
    let addr = spawn_runtime().await;
    let dispatcher = HttpTaskDispatcher::new(&format!("http://{addr}")).unwrap();
    let result = dispatcher
        .dispatch("echo", &json!({"amount": 5}))
        .await
        .unwrap();
    assert_eq!(result, json!({"task": "echo", "params": {"amount": 5}}));
}

#[tokio::test]
async fn failing_task_surfaces_error_field() {
    let addr = spawn_runtime().await;
    let dispatcher = HttpTaskDispatcher::new(&format!("http://{addr}/")).unwrap();
    let err = dispatcher.dispatch("revert", &json!({})).await.unwrap_err();
    assert_eq!(err.message, "execution reverted: insufficient funds");
}

#[tokio::test]
async fn status_without_message_is_reported() {
    let addr = spawn_runtime().await;
    let dispatcher = HttpTaskDispatcher::new(&format!("http://{addr}")).unwrap();
    let err = dispatcher.dispatch("unknown", &json!({})).await.unwrap_err();
    assert!(err.message.contains("404"), "{}", err.message);
}

#[tokio::test]
async fn unreachable_runtime_is_a_dispatch_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dispatcher = HttpTaskDispatcher::new(&format!("http://{addr}")).unwrap();
    let err = dispatcher.dispatch("echo", &json!({})).await.unwrap_err();
    assert!(err.message.contains("transport error"), "{}", err.message);
}

//! ---
//! sh_section: "05-interfaces"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "REST surface for scenarios, batch runs, and execution history."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Registry, TextEncoder, TEXT_FORMAT};
use serde::Serialize;
use serde_json::Value;
use stagehand_history::HistoryError;
use stagehand_orchestrator::{BatchError, BatchOrchestrator};
use stagehand_scenario::{EnhancedScenario, LoadError, ScenarioExecution};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared API state exposed to handlers.
pub struct ApiState {
    orchestrator: Arc<BatchOrchestrator>,
    registry: Option<Arc<Registry>>,
}

impl ApiState {
    pub fn new(orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            orchestrator,
            registry: None,
        }
    }

    /// Expose `registry` at `GET /metrics`.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("scenarios", &self.orchestrator.catalog().root())
            .field("history", &self.orchestrator.history().path())
            .field("metrics", &self.registry.is_some())
            .finish()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    /// Address the listener is bound to, with any ephemeral port resolved.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Build the API router.
///
/// Scenario names containing `/` must be percent-encoded in the path
/// (`erc20%2Ftransfer`).
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/scenarios", get(list_scenarios).post(create_scenario))
        .route("/api/scenarios/run-batch", post(run_batch))
        .route("/api/scenarios/history", get(list_history))
        .route("/api/scenarios/history/:id", get(get_history))
        .route("/api/scenarios/:name", get(get_scenario).put(update_scenario))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the API until [`ApiServer::shutdown`] is called.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = router(state);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let addr = listener
        .local_addr()
        .context("failed to read API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchStarted {
    message: &'static str,
    execution_id: String,
}

#[derive(Debug, Serialize)]
struct ScenarioSaved {
    message: &'static str,
    name: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::InvalidName { .. } | LoadError::Parse { .. } => {
                Self::bad_request(err.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "api request failed");
        } else {
            warn!(status = %self.status, message = %self.message, "api request rejected");
        }
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn list_scenarios(State(state): State<Arc<ApiState>>) -> Json<Vec<String>> {
    Json(state.orchestrator.catalog().list_scenarios())
}

async fn get_scenario(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<EnhancedScenario>, ApiError> {
    state
        .orchestrator
        .catalog()
        .load_scenario(&name)
        .map(Json)
        .map_err(|err| match err {
            LoadError::InvalidName { .. } => ApiError::from(err),
            other => ApiError::internal(other.to_string()),
        })
}

async fn run_batch(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchStarted>), ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let names = batch_names(&body)?;
    let execution_id = state.orchestrator.start_batch(names)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BatchStarted {
            message: "Batch execution started",
            execution_id,
        }),
    ))
}

fn batch_names(body: &Value) -> Result<Vec<String>, ApiError> {
    let Some(Value::Array(items)) = body.get("scenarios") else {
        return Err(ApiError::bad_request("scenarios must be an array of names"));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| ApiError::bad_request("scenario names must be strings"))
        })
        .collect()
}

async fn list_history(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<ScenarioExecution>>, ApiError> {
    Ok(Json(state.orchestrator.history().get_all()?))
}

async fn get_history(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ScenarioExecution>, ApiError> {
    state
        .orchestrator
        .history()
        .get_by_id(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("execution '{id}' not found")))
}

async fn create_scenario(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ScenarioSaved>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let name = body.get("name").and_then(Value::as_str);
    let content = present(&body, "content");
    let (Some(name), Some(content)) = (name, content) else {
        return Err(ApiError::bad_request("name and content are required"));
    };
    state
        .orchestrator
        .catalog()
        .save_scenario(name, content.clone())?;
    info!(scenario = name, "scenario created");
    Ok(Json(ScenarioSaved {
        message: "Scenario saved",
        name: name.to_owned(),
    }))
}

async fn update_scenario(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ScenarioSaved>, ApiError> {
    let Json(body) = payload.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let Some(content) = present(&body, "content") else {
        return Err(ApiError::bad_request("content is required"));
    };
    state
        .orchestrator
        .catalog()
        .save_scenario(&name, content.clone())?;
    info!(scenario = %name, "scenario updated");
    Ok(Json(ScenarioSaved {
        message: "Scenario updated",
        name,
    }))
}

/// `body[key]` unless it is absent or `null`.
fn present<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|value| !value.is_null())
}

async fn metrics(State(state): State<Arc<ApiState>>) -> Response {
    let Some(registry) = &state.registry else {
        return ApiError::new(StatusCode::NOT_FOUND, "metrics are disabled").into_response();
    };
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT))],
            body,
        )
            .into_response(),
        Err(err) => ApiError::internal(format!("metrics encoding error: {err}")).into_response(),
    }
}

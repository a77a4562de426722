//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Task dispatcher seam and the HTTP-backed implementation."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use crate::error::DispatchError;

/// Host capability that executes a named operation.
///
/// The engine knows nothing about what a task does; any error returned here
/// is treated as the task having raised.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task: &str, params: &Value) -> Result<Value, DispatchError>;
}

/// Dispatches tasks to a remote contract-interaction runtime.
///
/// `params` is posted as the JSON body to `<endpoint>/tasks/<task>`. A 2xx
/// response body becomes the task result; any other status is a failure
/// whose message is taken from the body's `error` or `message` field.
#[derive(Debug, Clone)]
pub struct HttpTaskDispatcher {
    client: Client,
    endpoint: Url,
}

impl HttpTaskDispatcher {
    pub fn new(endpoint: &str) -> Result<Self, DispatchError> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            DispatchError::new(format!("invalid dispatcher endpoint '{endpoint}': {err}"))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(DispatchError::new(format!(
                "dispatcher endpoint '{endpoint}' cannot carry a path"
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| DispatchError::new(format!("failed to build http client: {err}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn task_url(&self, task: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("tasks").push(task);
        }
        url
    }
}

#[async_trait]
impl TaskDispatcher for HttpTaskDispatcher {
    async fn dispatch(&self, task: &str, params: &Value) -> Result<Value, DispatchError> {
        let url = self.task_url(task);
        debug!(task, url = %url, "dispatching task");
        let response = self
            .client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(|err| DispatchError::new(format!("task '{task}' transport error: {err}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DispatchError::new(format!("task '{task}' body error: {err}")))?;
        let parsed = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };

        if status.is_success() {
            return Ok(parsed);
        }
        Err(DispatchError::new(error_message(&parsed).unwrap_or_else(
            || format!("task '{task}' failed with HTTP {status}"),
        )))
    }
}

fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(fields) => {
            ["error", "message"]
                .iter()
                .find_map(|key| match fields.get(*key)? {
                    Value::String(text) => Some(text.clone()),
                    Value::Object(nested) => nested
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    _ => None,
                })
        }
        _ => None,
    }
}

/// Stand-in used when no dispatcher endpoint is configured. Every task fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredDispatcher;

#[async_trait]
impl TaskDispatcher for UnconfiguredDispatcher {
    async fn dispatch(&self, task: &str, _params: &Value) -> Result<Value, DispatchError> {
        Err(DispatchError::new(format!(
            "cannot dispatch '{task}': no dispatcher endpoint configured"
        )))
    }
}

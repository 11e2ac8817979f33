//! Operation executors: the HTTP boundary of the coordinator.
//!
//! The coordinator drives any [`OperationExecutor`]; the real one wraps a
//! reqwest client and maps each action kind onto the fleet API's endpoints.
//! Tests substitute fakes.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::OperationError;
use crate::request::{ActionKind, OperationRequest};

/// Performs the actual remote call for an operation request.
///
/// Implementations must convert every failure into an [`OperationError`];
/// the coordinator turns those into terminal `failed` states.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, request: &OperationRequest) -> Result<Value, OperationError>;
}

/// Executor backed by the fleet server's JSON HTTP API.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &OperationRequest) -> String {
        let segment = request.resource.path_segment();
        match request.kind() {
            ActionKind::Scan => format!("{}/scan", self.base_url),
            ActionKind::Delete => format!("{}/{}", self.base_url, segment),
            ActionKind::StatusUpdate => format!("{}/{}/bulk-status", self.base_url, segment),
            ActionKind::GroupAssign => format!("{}/websites/bulk-group", self.base_url),
            ActionKind::Schedule => format!("{}/scan-schedules/bulk", self.base_url),
            ActionKind::TypeUpdate => format!("{}/{}/bulk-type", self.base_url, segment),
            ActionKind::CategoryUpdate => {
                format!("{}/{}/bulk-category", self.base_url, segment)
            }
        }
    }
}

#[async_trait]
impl OperationExecutor for HttpExecutor {
    async fn execute(&self, request: &OperationRequest) -> Result<Value, OperationError> {
        let url = self.url_for(request);
        let method = if request.kind() == ActionKind::Delete {
            Method::DELETE
        } else {
            Method::POST
        };
        tracing::debug!(%method, %url, "sending operation request");

        let response = self
            .client
            .request(method, url.as_str())
            .json(&request.body())
            .send()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        if status.is_success() {
            if text.trim().is_empty() {
                // 204 and friends: success with no body.
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return serde_json::from_str(&text)
                .map_err(|e| OperationError::Network(format!("malformed response body: {}", e)));
        }

        if status.as_u16() == 422 {
            return Err(OperationError::ServerValidation {
                field_errors: parse_field_errors(&text),
            });
        }

        Err(OperationError::Api {
            status: status.as_u16(),
            message: message_from_body(&text, status.canonical_reason().unwrap_or("error")),
        })
    }
}

/// Field-level messages from a 422 body. Accepts both `{"errors": {field:
/// [msgs]}}` and a bare `{field: [msgs]}` mapping.
fn parse_field_errors(body: &str) -> BTreeMap<String, Vec<String>> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return BTreeMap::new(),
    };
    let mapping = value.get("errors").unwrap_or(&value);
    let mut out = BTreeMap::new();
    if let Some(fields) = mapping.as_object() {
        for (field, messages) in fields {
            let list: Vec<String> = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|m| m.as_str().map(String::from))
                    .collect(),
                Value::String(single) => vec![single.clone()],
                _ => continue,
            };
            if !list.is_empty() {
                out.insert(field.clone(), list);
            }
        }
    }
    out
}

fn message_from_body(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Wraps an executor with a deadline; a timeout is surfaced as an ordinary
/// network failure, which the coordinator treats like any other.
pub struct WithTimeout<E> {
    inner: E,
    timeout: Duration,
}

impl<E> WithTimeout<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<E: OperationExecutor> OperationExecutor for WithTimeout<E> {
    async fn execute(&self, request: &OperationRequest) -> Result<Value, OperationError> {
        match tokio::time::timeout(self.timeout, self.inner.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(OperationError::Network(format!(
                "request timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

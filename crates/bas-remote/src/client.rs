// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST client for the remote red-team automation service.
//!
//! The adapter talks to the service through the [`OperationClient`] trait so
//! tests can substitute an in-memory fake; [`HttpOperationClient`] is the
//! reqwest-backed implementation.

use crate::RemoteError;
use async_trait::async_trait;
use bas_config::RemoteSettings;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::debug;

/// Index name the REST API files operations under.
pub const OPERATIONS_INDEX: &str = "operations";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One remote operation snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation identifier.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Remote lifecycle state (`running`, `finished`, `cleanup`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Activity links recorded so far.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chain: Vec<Link>,
    /// Every other field the service returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One discrete recorded activity of an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Link identifier.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Every other field the service returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

impl Operation {
    /// Decode a response body. A list response yields its first element.
    pub fn from_response(value: Value) -> Result<Self, RemoteError> {
        let value = match value {
            Value::Array(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| RemoteError::Malformed("empty operation list".into()))?,
            other => other,
        };
        serde_json::from_value(value).map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    /// Identifier, or a malformed-response error when absent.
    pub fn require_id(&self) -> Result<&str, RemoteError> {
        self.id
            .as_deref()
            .ok_or_else(|| RemoteError::Malformed("operation response has no id".into()))
    }
}

/// Async operations the adapter needs from the remote service.
#[async_trait]
pub trait OperationClient: Send + Sync {
    /// Submit a new operation. The payload's `index` is forced to `operations`.
    async fn create_operation(&self, payload: Value) -> Result<Operation, RemoteError>;

    /// Move an operation to `state` (e.g. `running`, `finished`).
    async fn set_operation_state(
        &self,
        operation_id: &str,
        state: &str,
    ) -> Result<Value, RemoteError>;

    /// Fetch an operation with its link chain.
    async fn get_operation(&self, operation_id: &str) -> Result<Operation, RemoteError>;

    /// Fetch the detail of one link.
    async fn link_detail(&self, link_id: &str) -> Result<Value, RemoteError>;

    /// Delete an operation.
    async fn delete_operation(&self, operation_id: &str) -> Result<Value, RemoteError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<Value, RemoteError>;

    /// The operation's link chain.
    async fn operation_links(&self, operation_id: &str) -> Result<Vec<Link>, RemoteError> {
        Ok(self.get_operation(operation_id).await?.chain)
    }
}

/// reqwest-backed [`OperationClient`].
#[derive(Debug, Clone)]
pub struct HttpOperationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOperationClient {
    /// Build a client from settings.
    ///
    /// Fails with [`RemoteError::Unavailable`] when remote integration is
    /// disabled.
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        if !settings.enabled {
            return Err(RemoteError::Unavailable(
                "remote integration is disabled in configuration".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .default_headers(default_headers(settings)?)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .connect_timeout(settings.healthcheck_timeout())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: settings.api_base().to_string(),
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Unavailable(format!("request timed out: {path}"))
            } else {
                RemoteError::Unavailable(format!("unable to reach {}: {e}", self.base_url))
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("failed reading response body: {e}")))?;
        let payload = || safe_json(&bytes);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Authentication {
                status: status.as_u16(),
                payload: payload(),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                path: path.to_string(),
                payload: payload(),
            });
        }
        if status == StatusCode::NO_CONTENT || bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(payload())
    }
}

fn safe_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(bytes) }))
}

/// Headers sent on every request: JSON content negotiation plus `KEY` and a
/// bearer token when an API key is configured.
pub fn default_headers(settings: &RemoteSettings) -> Result<HeaderMap, RemoteError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        let invalid =
            |_| RemoteError::Unavailable("api key contains invalid header characters".into());
        headers.insert(
            HeaderName::from_static("key"),
            HeaderValue::from_str(key).map_err(invalid)?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?,
        );
    }
    Ok(headers)
}

#[async_trait]
impl OperationClient for HttpOperationClient {
    async fn create_operation(&self, payload: Value) -> Result<Operation, RemoteError> {
        let mut payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(RemoteError::Malformed(format!(
                    "operation payload must be an object, got {other}"
                )));
            }
        };
        payload.insert("index".into(), json!(OPERATIONS_INDEX));
        debug!(
            target: "bas.remote",
            payload = %serde_json::Value::Object(payload.clone()),
            "creating remote operation"
        );
        let body = self
            .request(Method::PUT, "/api/rest", Some(Value::Object(payload)))
            .await?;
        Operation::from_response(body)
    }

    async fn set_operation_state(
        &self,
        operation_id: &str,
        state: &str,
    ) -> Result<Value, RemoteError> {
        debug!(target: "bas.remote", operation_id, state, "updating remote operation state");
        let body = json!({ "index": OPERATIONS_INDEX, "id": operation_id, "state": state });
        self.request(Method::POST, "/api/rest", Some(body)).await
    }

    async fn get_operation(&self, operation_id: &str) -> Result<Operation, RemoteError> {
        let body = json!({ "index": OPERATIONS_INDEX, "id": operation_id });
        let value = self.request(Method::POST, "/api/rest", Some(body)).await?;
        Operation::from_response(value)
    }

    async fn link_detail(&self, link_id: &str) -> Result<Value, RemoteError> {
        self.request(Method::GET, &format!("/api/v2/links/{link_id}"), None)
            .await
    }

    async fn delete_operation(&self, operation_id: &str) -> Result<Value, RemoteError> {
        debug!(target: "bas.remote", operation_id, "deleting remote operation");
        let body = json!({ "index": OPERATIONS_INDEX, "id": operation_id });
        self.request(Method::DELETE, "/api/rest", Some(body)).await
    }

    async fn ping(&self) -> Result<Value, RemoteError> {
        debug!(target: "bas.remote", base_url = %self.base_url, "pinging remote service");
        self.request(Method::GET, "/api/v2/agents", None).await
    }
}

//! Single HTTP exchange with the remote API
//!
//! The executor performs exactly one request per call and never retries on
//! its own. It turns the outcome into raw bytes, a decoded value, or a
//! classified [`Error`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, debug_span, Instrument};

use crate::classify::classify;
use crate::client::ClientConfig;
use crate::error::{Error, Result};

const JSON: &str = "application/json";

/// One logical request: operation name, method, path and optional body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Name used in logs and errors, e.g. `list_instances`
    pub operation: String,
    pub method: Method,
    /// Path relative to the configured base URL
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(operation: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, Method::GET, path)
    }

    pub fn delete(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, Method::DELETE, path)
    }

    pub fn post<B: Serialize>(
        operation: impl Into<String>,
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self> {
        Self::new(operation, Method::POST, path).with_json(body)
    }

    pub fn put<B: Serialize>(
        operation: impl Into<String>,
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self> {
        Self::new(operation, Method::PUT, path).with_json(body)
    }

    /// Attach a body, serializing it to JSON
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|source| Error::Encode {
            operation: self.operation.clone(),
            source,
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Issues single requests over a shared connection pool
///
/// Immutable after construction; clones share the pool and credentials.
#[derive(Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: Arc<str>,
    token: Arc<str>,
    request_timeout: Duration,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RequestExecutor {
    /// Build the HTTP client and its connection pool
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            token: Arc::from(config.token.as_str()),
            request_timeout: config.request_timeout,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Perform one exchange and return the raw response body
    ///
    /// Transport failures become [`Error::Network`]; statuses >= 400 are
    /// classified into [`Error::Api`].
    pub async fn send(&self, request: &ApiRequest) -> Result<Bytes> {
        let span = debug_span!(
            "api_request",
            operation = %request.operation,
            method = %request.method,
            path = %request.path,
        );

        async {
            let started = Instant::now();
            let mut builder = self
                .http
                .request(request.method.clone(), self.url_for(&request.path))
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, JSON)
                .header(ACCEPT, JSON)
                .timeout(self.request_timeout);

            if let Some(body) = &request.body {
                let payload = serde_json::to_vec(body).map_err(|source| Error::Encode {
                    operation: request.operation.clone(),
                    source,
                })?;
                builder = builder.body(payload);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::network(&request.operation, e))?;

            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            let body = response
                .bytes()
                .await
                .map_err(|e| Error::network(&request.operation, e))?;

            debug!(
                status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );

            if status >= 400 {
                return Err(Error::Api(classify(status, &body, retry_after.as_deref())));
            }
            Ok(body)
        }
        .instrument(span)
        .await
    }

    /// Perform one exchange and decode the JSON body into `T`
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            operation: request.operation.clone(),
            source,
        })
    }

    /// Perform one exchange and discard the body
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<()> {
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    fn executor(base_url: &str) -> RequestExecutor {
        let config = ClientConfig::new(base_url, "secret-token");
        RequestExecutor::new(&config).unwrap()
    }

    #[test]
    fn test_url_join() {
        let executor = executor("https://api.example.test/v4/");
        assert_eq!(
            executor.url_for("/linode/instances"),
            "https://api.example.test/v4/linode/instances"
        );
        assert_eq!(
            executor.url_for("volumes?page=2"),
            "https://api.example.test/v4/volumes?page=2"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", executor("https://api.example.test/v4"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_request_constructors() {
        #[derive(Serialize)]
        struct CreateVolume<'a> {
            label: &'a str,
            size: u32,
        }

        let get = ApiRequest::get("list_volumes", "/volumes");
        assert_eq!(get.method, Method::GET);
        assert!(get.body.is_none());

        let delete = ApiRequest::delete("delete_volume", "/volumes/7");
        assert_eq!(delete.method, Method::DELETE);

        let post = ApiRequest::post(
            "create_volume",
            "/volumes",
            &CreateVolume {
                label: "data",
                size: 20,
            },
        )
        .unwrap();
        assert_eq!(post.method, Method::POST);
        assert_eq!(
            post.body,
            Some(serde_json::json!({"label": "data", "size": 20}))
        );
    }

    #[test]
    fn test_unserializable_body_is_encode_error() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let mut body = HashMap::new();
        body.insert(vec![1u8], "value");

        let err = ApiRequest::put("update_tags", "/tags", &body).unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
        assert!(!err.is_retryable());
    }
}

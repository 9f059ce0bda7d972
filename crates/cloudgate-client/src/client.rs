//! Retrying client: the boundary every resource call goes through

use std::fmt;
use std::future::Future;
use std::time::Duration;

use cloudgate_core::retry::{RetryContext, RetryExecutorBuilder, TracingObserver};
use cloudgate_core::types::{NetworkConfig, RetryConfig, RuntimeConfig};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result, TaxonomyPredicate};
use crate::executor::{ApiRequest, RequestExecutor};

/// Settings a [`Client`] is built from
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    /// Timeout of each individual attempt
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    /// Retry policy used when a call does not pass its own
    pub retry: RetryConfig,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    /// Default network and retry settings for the given endpoint
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let network = NetworkConfig::default();
        Self {
            base_url: base_url.into(),
            token: token.into(),
            request_timeout: network.request_timeout(),
            connect_timeout: network.connect_timeout(),
            user_agent: network.user_agent.clone(),
            pool_max_idle_per_host: network.pool_max_idle_per_host,
            pool_idle_timeout: network.pool_idle_timeout(),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        let network = &runtime.network;
        Self {
            base_url: runtime.api.base_url.clone(),
            token: runtime.api.token.clone(),
            request_timeout: network.request_timeout(),
            connect_timeout: network.connect_timeout(),
            user_agent: network.user_agent.clone(),
            pool_max_idle_per_host: network.pool_max_idle_per_host,
            pool_idle_timeout: network.pool_idle_timeout(),
            retry: runtime.retry.clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::invalid_config("API token must not be empty"));
        }

        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::invalid_config(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_config(format!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::invalid_config("request timeout must be positive"));
        }

        self.retry.validate()?;
        Ok(())
    }
}

/// Client for the remote API
///
/// Cheap to clone; clones share the connection pool. Any number of
/// orchestrated calls may run on one client at the same time.
#[derive(Debug, Clone)]
pub struct Client {
    executor: RequestExecutor,
    retry: RetryConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let executor = RequestExecutor::new(&config)?;
        Ok(Self {
            executor,
            retry: config.retry,
        })
    }

    pub fn from_runtime(runtime: &RuntimeConfig) -> Result<Self> {
        Self::new(ClientConfig::from_runtime(runtime))
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Run `op` under the retry policy, classifying failures with the taxonomy
    ///
    /// Returns the value of the first successful attempt, the last error when
    /// attempts run out or the error is not retryable, or
    /// [`Error::Cancelled`] when `ctx` stops the call. An invalid `retry`
    /// is rejected with [`Error::Config`] before any attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        ctx: &RetryContext,
        retry: &RetryConfig,
        op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry.validate()?;
        RetryExecutorBuilder::new()
            .with_config(retry.clone())
            .with_predicate(TaxonomyPredicate)
            .with_observer(TracingObserver::new(operation))
            .build()
            .execute(ctx, op)
            .await
            .map_err(|err| Error::from_retry(operation, err))
    }

    /// Send `request` with the default retry policy and decode the response
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        ctx: &RetryContext,
        request: &ApiRequest,
    ) -> Result<T> {
        self.fetch_with(ctx, request, &self.retry).await
    }

    pub async fn fetch_with<T: DeserializeOwned>(
        &self,
        ctx: &RetryContext,
        request: &ApiRequest,
        retry: &RetryConfig,
    ) -> Result<T> {
        let executor = &self.executor;
        self.execute(&request.operation, ctx, retry, move || {
            executor.fetch::<T>(request)
        })
        .await
    }

    /// Send `request` with the default retry policy, ignoring the body
    pub async fn dispatch(&self, ctx: &RetryContext, request: &ApiRequest) -> Result<()> {
        self.dispatch_with(ctx, request, &self.retry).await
    }

    pub async fn dispatch_with(
        &self,
        ctx: &RetryContext,
        request: &ApiRequest,
        retry: &RetryConfig,
    ) -> Result<()> {
        let executor = &self.executor;
        self.execute(&request.operation, ctx, retry, move || {
            executor.dispatch(request)
        })
        .await
    }
}

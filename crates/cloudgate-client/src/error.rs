//! Error taxonomy for the remote API
//!
//! Every failure surfaced by the client is one of a closed set of kinds:
//! a classified API rejection, a transport failure, an explicitly retryable
//! wrapper, or one of the local failures (decode, encode, cancellation,
//! configuration, generic). `Error::is_retryable` is the single place that
//! decides which of them the retry loop may recover from.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use cloudgate_core::retry::{CancelReason, RetryError, RetryPredicate};
use thiserror::Error;

use crate::classify::{
    is_authentication_error, is_forbidden_error, is_rate_limit_error, is_server_error,
};

/// Result type alias using cloudgate-client's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by transport and generic errors
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A rejection reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    /// Request field the API blamed, when the error envelope names one
    pub field: Option<String>,
    /// Parsed `Retry-After` hint of a 429 response
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            field: None,
            retry_after: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_authentication(&self) -> bool {
        is_authentication_error(self.status_code)
    }

    pub fn is_forbidden(&self) -> bool {
        is_forbidden_error(self.status_code)
    }

    pub fn is_rate_limit(&self) -> bool {
        is_rate_limit_error(self.status_code)
    }

    pub fn is_server_error(&self) -> bool {
        is_server_error(self.status_code)
    }

    /// Rate limits and server errors are retryable; everything else is not
    pub fn is_retryable(&self) -> bool {
        if self.is_rate_limit() || self.is_server_error() {
            return true;
        }
        // Unreachable for today's status ranges: 401/403 never match the checks above.
        if self.is_authentication() || self.is_forbidden() {
            return false;
        }
        false
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "API error {} ({}): {}",
                self.status_code, field, self.message
            ),
            None => write!(f, "API error {}: {}", self.status_code, self.message),
        }
    }
}

impl StdError for ApiError {}

/// Errors produced by the request layer
#[derive(Error, Debug)]
pub enum Error {
    /// The remote API answered with status >= 400
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The exchange failed below HTTP (connect, DNS, timeout, broken body)
    #[error("{operation}: network error: {source}")]
    Network {
        operation: String,
        #[source]
        source: BoxError,
    },

    /// A failure the caller explicitly marked as worth retrying
    #[error("retryable: {source}")]
    Retryable {
        #[source]
        source: Box<Error>,
        retry_after: Option<Duration>,
    },

    /// A success response did not match the expected shape
    #[error("{operation}: failed to decode response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be serialized
    #[error("{operation}: failed to encode request body: {source}")]
    Encode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller cancelled the call or its deadline passed
    #[error("{operation}: {reason} after {attempts} attempts{}", last_error_suffix(.last_error))]
    Cancelled {
        operation: String,
        attempts: u32,
        reason: CancelReason,
        last_error: Option<Box<Error>>,
    },

    /// The client was constructed with unusable settings
    #[error("Invalid client configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Config(#[from] cloudgate_core::Error),

    /// Any other failure, kept as-is
    #[error("{context}: {source}")]
    Other {
        context: String,
        #[source]
        source: BoxError,
    },
}

fn last_error_suffix(last_error: &Option<Box<Error>>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

impl Error {
    pub fn network(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn retryable(source: Error, retry_after: Option<Duration>) -> Self {
        Self::Retryable {
            source: Box::new(source),
            retry_after,
        }
    }

    pub fn other(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Other {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Collapse the outcome of an orchestrated call into one error
    ///
    /// Exhausted and non-retryable calls yield the last error unchanged.
    /// Cancellation is wrapped with the attempt count and the last failure.
    pub fn from_retry(operation: &str, err: RetryError<Error>) -> Self {
        match err {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                source
            }
            RetryError::Cancelled {
                attempts,
                reason,
                last_error,
            } => Self::Cancelled {
                operation: operation.to_string(),
                attempts,
                reason,
                last_error: last_error.map(Box::new),
            },
        }
    }

    /// Whether the retry loop may try the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Retryable { .. } => true,
            Error::Api(api) => api.is_retryable(),
            Error::Network { .. } => true,
            Error::Other { .. } => self.is_network_error() || self.is_timeout_error(),
            Error::Decode { .. }
            | Error::Encode { .. }
            | Error::Cancelled { .. }
            | Error::InvalidConfig { .. }
            | Error::Config(_) => false,
        }
    }

    /// Transport-level failure, looking one level into generic wrappers
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Retryable { source, .. } => {
                matches!(**source, Error::Network { .. })
            }
            Error::Other { source, .. } => one_level(&**source).any(is_transport_cause),
            _ => false,
        }
    }

    /// Timeout, looking one level into generic wrappers
    pub fn is_timeout_error(&self) -> bool {
        match self {
            Error::Network { source, .. } | Error::Other { source, .. } => {
                one_level(&**source).any(is_timeout_cause)
            }
            Error::Retryable { source, .. } => match &**source {
                Error::Network { source, .. } => one_level(&**source).any(is_timeout_cause),
                _ => false,
            },
            _ => false,
        }
    }

    /// HTTP status of an API rejection
    pub fn status_code(&self) -> Option<u16> {
        self.api().map(|api| api.status_code)
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            Error::Retryable { source, .. } => source.api(),
            _ => None,
        }
    }

    /// Suggested wait before retrying, if the failure carries one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api(api) => api.retry_after,
            Error::Retryable {
                source,
                retry_after,
            } => retry_after.or_else(|| source.retry_after()),
            _ => None,
        }
    }
}

/// The error itself followed by its direct source
fn one_level<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::once(err).chain(err.source())
}

fn is_timeout_cause(err: &(dyn StdError + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<reqwest::Error>() {
        return err.is_timeout();
    }
    if let Some(err) = err.downcast_ref::<io::Error>() {
        return err.kind() == io::ErrorKind::TimedOut;
    }
    err.is::<tokio::time::error::Elapsed>()
}

fn is_transport_cause(err: &(dyn StdError + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<reqwest::Error>() {
        return err.is_connect() || err.is_timeout() || err.is_request();
    }
    if let Some(err) = err.downcast_ref::<io::Error>() {
        return matches!(
            err.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::AddrNotAvailable
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::TimedOut
                | io::ErrorKind::UnexpectedEof
        );
    }
    err.is::<tokio::time::error::Elapsed>()
}

/// Retry predicate backed by [`Error::is_retryable`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxonomyPredicate;

impl RetryPredicate<Error> for TaxonomyPredicate {
    fn should_retry(&self, error: &Error) -> bool {
        error.is_retryable()
    }
}

//! Error types for API calls.
//!
//! Every failure surfaced by the client is a single [`Error`] value whose
//! [`ErrorKind`] is drawn from a closed set. Callers dispatch with `match` on
//! [`Error::kind`] rather than downcasting, and every error carries a stable
//! machine code, a human-readable message and a remediation hint.

use crate::graphql::GraphqlErrorItem;
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// The category of an [`Error`].
///
/// # Examples
///
/// ```
/// use quire::{Error, ErrorKind};
///
/// fn describe(err: &Error) -> &'static str {
///     match err.kind() {
///         ErrorKind::RateLimit { .. } => "slow down",
///         ErrorKind::Server { .. } | ErrorKind::Network | ErrorKind::Timeout { .. } => "try again",
///         ErrorKind::Authentication | ErrorKind::Permission => "check credentials",
///         _ => "fix the request",
///     }
/// }
///
/// assert_eq!(describe(&Error::not_found("no such project")), "fix the request");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The request never produced an HTTP response (DNS, connect, reset, ...).
    Network,

    /// The attempt did not complete within the effective timeout.
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The request was malformed (HTTP 400, or rejected before sending).
    Validation,

    /// The API key is missing or was rejected (HTTP 401).
    Authentication,

    /// The API key lacks permission for the operation (HTTP 403).
    Permission,

    /// The addressed resource does not exist (HTTP 404).
    NotFound,

    /// The server is throttling this client (HTTP 429).
    RateLimit {
        /// Absolute instant after which a retry is permitted, when advertised.
        retry_after: Option<SystemTime>,
    },

    /// The server failed to handle the request (HTTP 500/502/503/504).
    Server {
        /// The HTTP status code.
        status: u16,
    },

    /// A GraphQL request returned a non-empty `errors` array.
    Graphql {
        /// Every error reported by the server.
        errors: Vec<GraphqlErrorItem>,
        /// The query text that was sent.
        query: String,
        /// The variables that were sent.
        variables: Option<serde_json::Value>,
    },

    /// Any failure that fits no other category.
    Unknown {
        /// The HTTP status code, when the failure came from a response.
        status: Option<u16>,
    },
}

impl ErrorKind {
    /// Returns the stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::Timeout { .. } => "timeout_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::Permission => "permission_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimit { .. } => "rate_limit_exceeded",
            ErrorKind::Server { .. } => "server_error",
            ErrorKind::Graphql { .. } => "graphql_error",
            ErrorKind::Unknown { .. } => "unknown_error",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network",
            ErrorKind::Timeout { .. } => "Timeout",
            ErrorKind::Validation => "Validation",
            ErrorKind::Authentication => "Authentication",
            ErrorKind::Permission => "Permission",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::RateLimit { .. } => "RateLimit",
            ErrorKind::Server { .. } => "Server",
            ErrorKind::Graphql { .. } => "GraphQL",
            ErrorKind::Unknown { .. } => "Unknown",
        }
    }
}

/// Diagnostic detail about the attempt that produced an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// HTTP method of the request.
    pub method: String,
    /// Fully resolved request URL.
    pub url: String,
    /// Server-assigned request id, when the response carried one.
    pub request_id: Option<String>,
    /// Wall-clock time the error was observed.
    pub timestamp: SystemTime,
    /// Time spent on the logical call so far, across all attempts.
    pub duration: Duration,
    /// Zero-based attempt index (equal to the number of retries performed).
    pub retry_count: u32,
}

impl ErrorContext {
    /// Creates a context stamped with the current time.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            request_id: None,
            timestamp: SystemTime::now(),
            duration: Duration::ZERO,
            retry_count: 0,
        }
    }

    /// Sets the accumulated duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the attempt index.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Sets the server request id.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// The error type for every client operation.
///
/// # Examples
///
/// ```no_run
/// use quire::{Client, ErrorKind};
///
/// # async fn example() -> Result<(), quire::Error> {
/// let client = Client::builder().api_key("qk_live_123").build()?;
///
/// match client.get::<serde_json::Value>("/v1/projects/missing").await {
///     Ok(project) => println!("{project}"),
///     Err(err) if matches!(err.kind(), ErrorKind::NotFound) => {
///         eprintln!("{} ({})", err, err.suggestion());
///     }
///     Err(err) => return Err(err),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    details: Option<serde_json::Value>,
    context: Option<Box<ErrorContext>>,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            context: None,
            source: None,
        }
    }

    /// A transport failure wrapping its underlying cause.
    pub fn network(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::new(ErrorKind::Network, message).with_source(cause)
    }

    /// An attempt that exceeded `timeout`.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout { timeout },
            format!("Request timed out after {}ms", timeout.as_millis()),
        )
    }

    /// A malformed request.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A missing or rejected credential.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// A request the credential may not perform.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// A request for a resource that does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// A throttled request.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<SystemTime>) -> Self {
        Self::new(ErrorKind::RateLimit { retry_after }, message)
    }

    /// A server-side failure.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server { status }, message)
    }

    /// A GraphQL response carrying an `errors` array.
    pub fn graphql(
        errors: Vec<GraphqlErrorItem>,
        query: impl Into<String>,
        variables: Option<serde_json::Value>,
    ) -> Self {
        let message = match errors.first() {
            Some(first) if errors.len() == 1 => format!("GraphQL error: {}", first.message),
            Some(first) => format!(
                "GraphQL error: {} (and {} more)",
                first.message,
                errors.len() - 1
            ),
            None => "GraphQL error".to_string(),
        };
        Self::new(
            ErrorKind::Graphql {
                errors,
                query: query.into(),
                variables,
            },
            message,
        )
    }

    /// A failure that fits no other category.
    pub fn unknown(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown { status }, message)
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches the execution context.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the stable machine-readable code.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns structured details, if any.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Returns the execution context, if the error came from a request.
    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_deref()
    }

    /// Returns the server request id, if one was reported.
    pub fn request_id(&self) -> Option<&str> {
        self.context.as_ref()?.request_id.as_deref()
    }

    /// Returns the HTTP status code, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Validation if self.context.is_some() => Some(400),
            ErrorKind::Authentication if self.context.is_some() => Some(401),
            ErrorKind::Permission if self.context.is_some() => Some(403),
            ErrorKind::NotFound if self.context.is_some() => Some(404),
            ErrorKind::RateLimit { .. } => Some(429),
            ErrorKind::Server { status } => Some(*status),
            ErrorKind::Unknown { status } => *status,
            _ => None,
        }
    }

    /// Returns the instant after which a rate-limited request may be retried.
    pub fn retry_after(&self) -> Option<SystemTime> {
        match &self.kind {
            ErrorKind::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns an actionable suggestion for resolving this error.
    pub fn suggestion(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Network => "Check your network connection and the configured base URL.",
            ErrorKind::Timeout { .. } => {
                "Increase the timeout or retry later; the server may be under heavy load."
            }
            ErrorKind::Validation => "Check the request parameters against the API reference.",
            ErrorKind::Authentication => {
                "Verify your API key, or generate a new one from the dashboard."
            }
            ErrorKind::Permission => "Ask a project owner to grant your key access.",
            ErrorKind::NotFound => "Check that the resource id is correct and was not deleted.",
            ErrorKind::RateLimit { .. } => "Wait for the rate limit window to reset before retrying.",
            ErrorKind::Server { .. } => "Retry later; contact support if the problem persists.",
            ErrorKind::Graphql { .. } => "Inspect the GraphQL errors and fix the query or variables.",
            ErrorKind::Unknown { .. } => "Retry later; contact support with the request id.",
        }
    }

    /// Returns `true` if repeating the request could succeed.
    ///
    /// Network failures, timeouts, rate limits and server errors are
    /// retryable. Whether a retry is actually attempted also depends on the
    /// request method; see [`crate::retry`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network
                | ErrorKind::Timeout { .. }
                | ErrorKind::RateLimit { .. }
                | ErrorKind::Server { .. }
        )
    }

    /// Converts this error into a plain record for logging and telemetry.
    pub fn to_record(&self) -> ErrorRecord {
        let mut causes = Vec::new();
        let mut next = StdError::source(self);
        while let Some(cause) = next {
            causes.push(cause.to_string());
            next = cause.source();
        }

        ErrorRecord {
            kind: self.kind.name(),
            code: self.code(),
            message: self.message.clone(),
            status: self.status(),
            details: self.details.clone(),
            suggestion: self.suggestion(),
            context: self.context.as_deref().map(ContextRecord::from),
            causes,
        }
    }
}

/// A serializable snapshot of an [`Error`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Variant name, e.g. `"RateLimit"`.
    pub kind: &'static str,
    /// Stable machine code, e.g. `"rate_limit_exceeded"`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// HTTP status, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Remediation hint.
    pub suggestion: &'static str,
    /// Request context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRecord>,
    /// Display strings of the underlying cause chain, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

/// Serializable form of [`ErrorContext`].
#[derive(Debug, Clone, Serialize)]
pub struct ContextRecord {
    /// HTTP method.
    pub method: String,
    /// Request URL with secret query values masked.
    pub url: String,
    /// Server-assigned request id, when one was returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 7231 HTTP-date.
    pub timestamp: String,
    /// Wall time across all attempts.
    pub duration_ms: u64,
    /// Retries taken before the final outcome.
    pub retry_count: u32,
}

impl From<&ErrorContext> for ContextRecord {
    fn from(context: &ErrorContext) -> Self {
        Self {
            method: context.method.clone(),
            url: context.url.clone(),
            request_id: context.request_id.clone(),
            timestamp: httpdate::fmt_http_date(context.timestamp),
            duration_ms: u64::try_from(context.duration.as_millis()).unwrap_or(u64::MAX),
            retry_count: context.retry_count,
        }
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;

//! Maps failed HTTP responses to typed errors.
//!
//! Classification depends only on the status code, the response headers and
//! (optionally) the response body, so it is deterministic and easy to test
//! without a server.

use crate::error::{Error, ErrorContext};
use http::{HeaderMap, StatusCode};
use std::time::{Duration, SystemTime};

const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "request-id"];

/// Classifies a non-2xx response.
///
/// | Status | Kind |
/// |---|---|
/// | 400 | `Validation` |
/// | 401 | `Authentication` |
/// | 403 | `Permission` |
/// | 404 | `NotFound` |
/// | 429 | `RateLimit` (with `retry-after`) |
/// | 500, 502, 503, 504 | `Server` |
/// | anything else | `Unknown` |
///
/// If the body is a JSON object with a string `message` (or `error`) field,
/// it replaces the default message; a `details` field becomes the error
/// details. The request id header, when present, is recorded on the context.
///
/// # Examples
///
/// ```
/// use quire::{classify, ErrorContext, ErrorKind};
/// use http::{HeaderMap, StatusCode};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "30".parse().unwrap());
///
/// let err = classify(
///     StatusCode::TOO_MANY_REQUESTS,
///     &headers,
///     None,
///     ErrorContext::new("GET", "https://api.quire.dev/v1/projects"),
/// );
/// assert!(matches!(err.kind(), ErrorKind::RateLimit { retry_after: Some(_) }));
/// ```
pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&str>,
    context: ErrorContext,
) -> Error {
    let context = context.with_request_id(request_id(headers));
    let body = body.and_then(parse_error_body);
    let server_message = body.as_ref().and_then(|b| b.message.clone());

    let message = |default: &str| server_message.clone().unwrap_or_else(|| default.to_string());

    let error = match status.as_u16() {
        400 => Error::validation(message("The request was invalid")),
        401 => Error::authentication(message("Invalid API key")),
        403 => Error::permission(message("Insufficient permissions for this operation")),
        404 => Error::not_found(message("The requested resource does not exist")),
        429 => Error::rate_limit(
            message("Rate limit exceeded"),
            parse_retry_after(headers).map(|delay| SystemTime::now() + delay),
        ),
        code @ (500 | 502 | 503 | 504) => {
            Error::server(code, message(&format!("Server error (HTTP {code})")))
        }
        code => Error::unknown(
            Some(code),
            message(&format!("Unexpected response (HTTP {code})")),
        ),
    };

    let error = match body.and_then(|b| b.details) {
        Some(details) => error.with_details(details),
        None => error,
    };

    error.with_context(context)
}

/// Returns the server-assigned request id, if the response carried one.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok())
        .map(str::to_owned)
}

/// Parses the `Retry-After` header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date_time = httpdate::parse_http_date(header).ok()?;
    Some(
        date_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

struct ErrorBody {
    message: Option<String>,
    details: Option<serde_json::Value>,
}

fn parse_error_body(body: &str) -> Option<ErrorBody> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let message = ["message", "error"]
        .iter()
        .find_map(|key| object.get(*key)?.as_str())
        .map(str::to_owned);
    let details = object.get("details").filter(|d| !d.is_null()).cloned();

    Some(ErrorBody { message, details })
}

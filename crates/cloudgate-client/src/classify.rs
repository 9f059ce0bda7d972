//! Mapping of HTTP error responses onto [`ApiError`]

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;

pub fn is_authentication_error(status: u16) -> bool {
    status == 401
}

pub fn is_forbidden_error(status: u16) -> bool {
    status == 403
}

pub fn is_rate_limit_error(status: u16) -> bool {
    status == 429
}

/// True for the half-open range [500, 600)
pub fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}

/// `{ "errors": [ { "field"?: string, "reason": string }, ... ] }`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Turn an error response into an [`ApiError`]
///
/// The first entry of the API's error envelope supplies the message and
/// field when present. Otherwise the message is picked by status. A 429 also
/// carries the parsed `Retry-After` header, which is mentioned in the
/// canned message.
pub fn classify(status: u16, body: &[u8], retry_after: Option<&str>) -> ApiError {
    let retry_after = if is_rate_limit_error(status) {
        retry_after.and_then(|value| parse_retry_after(value, Utc::now()))
    } else {
        None
    };

    let mut error = match envelope_entry(body) {
        Some((message, field)) => {
            let error = ApiError::new(status, message);
            match field {
                Some(field) => error.with_field(field),
                None => error,
            }
        }
        None => ApiError::new(status, canned_message(status, retry_after)),
    };
    error.retry_after = retry_after;
    error
}

fn envelope_entry(body: &[u8]) -> Option<(String, Option<String>)> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    let first = envelope.errors.into_iter().next()?;
    let reason = first.reason.filter(|r| !r.trim().is_empty())?;
    let field = first.field.filter(|f| !f.trim().is_empty());
    Some((reason, field))
}

fn canned_message(status: u16, retry_after: Option<Duration>) -> String {
    if is_authentication_error(status) {
        "authentication failed: the API token is missing, invalid or expired".to_string()
    } else if is_forbidden_error(status) {
        "access forbidden: the API token lacks permission for this operation".to_string()
    } else if is_rate_limit_error(status) {
        match retry_after {
            Some(wait) => format!(
                "rate limit exceeded: retry after {}",
                format_wait(wait)
            ),
            None => "rate limit exceeded: too many requests".to_string(),
        }
    } else if is_server_error(status) {
        format!("server error: the API failed to handle the request (status {})", status)
    } else {
        format!("request failed with status {}", status)
    }
}

fn format_wait(wait: Duration) -> String {
    let mut secs = wait.as_secs();
    if wait.subsec_nanos() > 0 {
        secs += 1;
    }
    if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{} seconds", secs)
    }
}

/// Obsolete HTTP-date forms: RFC 850 and asctime
const LEGACY_HTTP_DATES: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parse a `Retry-After` value relative to `now`
///
/// Accepts delta-seconds or an HTTP date in any of its three forms. Dates in
/// the past and values in none of these forms yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = parse_http_date(value)?;
    if at <= now {
        return None;
    }
    at.signed_duration_since(now).to_std().ok()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    LEGACY_HTTP_DATES
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

//! Map fetch failures onto retry kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

/// Classify a reqwest transport error for retry decisions.
pub fn classify_transport(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return ErrorKind::Connection;
    }
    if let Some(status) = e.status() {
        return classify_http_status(status.as_u16());
    }
    ErrorKind::Other
}

pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Transport(te) => classify_transport(te),
        FetchError::Status(code) => classify_http_status(*code),
    }
}

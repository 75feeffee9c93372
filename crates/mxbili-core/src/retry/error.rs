//! Transport-level failure of a single metadata request.

use std::fmt;

/// Error returned by one attempt of a metadata fetch.
/// Kept separate from the resolver's error so attempts can be classified
/// before the final outcome is decided.
#[derive(Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout, body read).
    Transport(reqwest::Error),
    /// The server answered with a non-2xx status.
    Status(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "{}", e),
            FetchError::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Status(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e)
    }
}

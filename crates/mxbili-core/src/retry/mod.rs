//! Retry and backoff for metadata lookups.
//!
//! Only the poster resolver retries. The proxy forwards each request exactly
//! once and reports upstream failures to its client as they happen.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status, classify_transport};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

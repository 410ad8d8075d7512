//! Retry and backoff policy for package downloads.
//!
//! Classifies curl and HTTP failures (timeouts, throttling, connection
//! resets) and decides exponential backoff so a flaky mirror does not abort
//! the whole install.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

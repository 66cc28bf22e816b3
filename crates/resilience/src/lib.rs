//! Retry and Backoff
//!
//! Every call that leaves the process (remote registry, attestation sink)
//! runs under a per-attempt timeout and a bounded exponential backoff.

mod retry;

pub use retry::{retry, RetryPolicy, RetryableError};

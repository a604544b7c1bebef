//! HTTP access to the license server: one-shot execution, typed errors and
//! retry with backoff.

mod error;
mod executor;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{decode_body, status_error, ApiError};
pub use executor::{encode_component, HttpExecutor, RequestAttempt, RequestOptions};
pub use retry::RetryPolicy;

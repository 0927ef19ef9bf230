//! Error types surfaced by the interceptors.
//!
//! Only identifier generation can fail inside this crate. Errors returned by
//! handlers and invokers are never wrapped; they pass through untouched.

use thiserror::Error;
use tonic::Status;

/// The identifier generator could not produce a new ID.
#[derive(Debug, Error)]
pub enum IdError {
    /// The OS entropy source refused to hand out random bytes.
    #[error("entropy source unavailable")]
    Entropy(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Identifier generation failed before the handler could run.
///
/// Displays as `new uuid error: <cause>`. The underlying [`IdError`] is kept
/// as the error source.
#[derive(Debug, Error)]
#[error("new uuid error: {0}")]
pub struct NewIdError(#[source] pub IdError);

/// Lets tonic report a failed ID assignment as the call's status.
impl From<NewIdError> for Status {
    fn from(err: NewIdError) -> Self {
        Status::internal(err.to_string())
    }
}

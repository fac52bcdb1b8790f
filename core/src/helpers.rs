//! Turn `Result`-returning calls into envelopes.
//!
//! `afetch` normalizes a single call, `mfetch` runs several at once and
//! reports each outcome at the position of the operation that produced it.

use std::error::Error;
use std::future::Future;

use futures::future::join_all;
use tracing::debug;

use crate::envelope::{ErrorStatus, ResponseEnvelope, Status};
use crate::error::ApiError;

type BoxError = Box<dyn Error + Send + Sync>;

/// Await `call` and always produce an envelope.
///
/// A success envelope passes through. A failed envelope keeps its status
/// and message but loses its payload. An `Err` holding an [`ApiError`]
/// keeps the error's status and message; any other error becomes
/// `500 "An unknown error occurred"`.
pub async fn afetch<T, E, F>(call: F) -> ResponseEnvelope<T>
where
    F: Future<Output = Result<ResponseEnvelope<T>, E>>,
    E: Into<BoxError>,
{
    match call.await {
        Ok(envelope) => match envelope.status() {
            Status::Success => envelope,
            Status::Error(status) => ResponseEnvelope::failure(status, envelope.message()),
        },
        Err(err) => {
            let err: BoxError = err.into();
            match err.downcast::<ApiError>() {
                Ok(api_error) => (*api_error).into_envelope(),
                Err(other) => {
                    debug!(error = %other, "afetch caught a non-API error");
                    ApiError::unknown().into_envelope()
                }
            }
        }
    }
}

/// Run every operation concurrently and collect one envelope per operation,
/// in input order.
///
/// All operations are started before any is awaited. An operation that
/// fails yields `{status: "error", message, data: null}` at its index; the
/// others are unaffected.
pub async fn mfetch<T, E, I, F, Fut>(operations: I) -> Vec<ResponseEnvelope<T>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseEnvelope<T>, E>>,
    E: Into<BoxError>,
{
    let started: Vec<_> = operations
        .into_iter()
        .map(|operation| settle(operation()))
        .collect();
    join_all(started).await
}

async fn settle<T, E, Fut>(call: Fut) -> ResponseEnvelope<T>
where
    Fut: Future<Output = Result<ResponseEnvelope<T>, E>>,
    E: Into<BoxError>,
{
    match call.await {
        Ok(envelope) => envelope,
        Err(err) => {
            let err: BoxError = err.into();
            let message = match err.downcast::<ApiError>() {
                Ok(api_error) => api_error.message().to_string(),
                Err(other) => other.to_string(),
            };
            debug!(%message, "mfetch operation failed");
            ResponseEnvelope::failure(ErrorStatus::Generic, message)
        }
    }
}

//! Axum handlers. Core operations are blocking, so every handler hops onto
//! `spawn_blocking` and maps [`Error`] onto an HTTP status.

pub mod index;
pub mod search;

use axum::http::StatusCode;

use crate::error::Error;

pub type ApiError = (StatusCode, String);

impl From<Error> for (StatusCode, String) {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::IndexNotReady => StatusCode::CONFLICT,
            Error::Configuration(_) => StatusCode::BAD_REQUEST,
            Error::RetrievalUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::FileRead { .. }
            | Error::Parse { .. }
            | Error::BatchInsertion { .. }
            | Error::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, err.to_string())
    }
}

/// Run a blocking core call and map its error.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task failed: {e}")))?
        .map_err(ApiError::from)
}

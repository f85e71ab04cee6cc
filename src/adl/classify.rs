//! Error classification for remote calls
//!
//! Every remote call's outcome passes through [`classify`] exactly once. No
//! other code looks at raw status codes.

use serde::de::DeserializeOwned;
use tracing::error;

use super::wire::RemoteExceptionEnvelope;
use crate::error::{BackendError, RemoteError, Result};
use crate::transport::{Operation, RawResponse, TransportError};

/// Exception raised when the path does not exist
pub(crate) const FILE_NOT_FOUND_EXCEPTION: &str = "FileNotFoundException";
/// Exception raised when an append offset does not match the file length
pub(crate) const BAD_OFFSET_EXCEPTION: &str = "BadOffsetException";

/// How to interpret a failed response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorBody {
    /// Decode the `RemoteException` payload for callers that branch on it
    Structured,
    /// Map the HTTP status through the generic table
    Status,
}

pub(crate) fn classify(
    op: Operation,
    path: &str,
    outcome: std::result::Result<RawResponse, TransportError>,
    decode: ErrorBody,
) -> Result<RawResponse> {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            return Err(BackendError::Transient(format!("{} {}: {}", op, path, e)));
        }
    };

    if response.is_success() {
        return Ok(response);
    }

    match decode {
        ErrorBody::Structured => match parse_remote_error(&response) {
            Ok(remote) => Err(BackendError::Remote(remote)),
            Err(e) => {
                error!(
                    "cannot parse error: {} {} {} {} {}: {}",
                    op,
                    path,
                    response.request_id.as_deref().unwrap_or("-"),
                    response.status,
                    response.response_id.as_deref().unwrap_or("-"),
                    e
                );
                Err(BackendError::Transient(format!(
                    "{} {}: unparsable error body ({})",
                    op, path, response.status
                )))
            }
        },
        ErrorBody::Status => {
            let context = format!("{} {} ({})", op, path, response.status);
            match BackendError::from_status(response.status, context.clone()) {
                Some(e) => Err(e),
                None => {
                    error!(
                        "{} {} {} {} {}",
                        op,
                        path,
                        response.request_id.as_deref().unwrap_or("-"),
                        response.status,
                        response.response_id.as_deref().unwrap_or("-")
                    );
                    Err(BackendError::InvalidArgument(context))
                }
            }
        }
    }
}

fn parse_remote_error(response: &RawResponse) -> std::result::Result<RemoteError, String> {
    let body = response
        .body
        .as_bytes()
        .ok_or_else(|| "error body was not buffered".to_string())?;
    let envelope: RemoteExceptionEnvelope =
        serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let exception = envelope.remote_exception;

    Ok(RemoteError {
        status: response.status,
        exception: exception.exception,
        message: exception.message,
        java_class_name: exception.java_class_name,
        request_id: response.request_id.clone(),
        response_id: response.response_id.clone(),
    })
}

/// Decode a successful JSON response body
pub(crate) async fn decode_json<T: DeserializeOwned>(
    op: Operation,
    response: RawResponse,
) -> Result<T> {
    let body = response
        .body
        .into_bytes()
        .await
        .map_err(|e| BackendError::Transient(format!("{}: reading body: {}", op, e)))?;
    serde_json::from_slice(&body)
        .map_err(|e| BackendError::Transient(format!("{}: unparsable response body: {}", op, e)))
}

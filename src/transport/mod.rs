//! Narrow transport seam between the backend algorithms and the remote
//! filesystem API.
//!
//! The backend builds [`AdlRequest`]s and hands them to a [`Transport`]; the
//! transport returns the raw status and body without interpreting either.
//! All error interpretation happens in the backend's classifier.

pub mod http;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use thiserror::Error;

pub use http::HttpTransport;

/// Header carrying request/response correlation ids
pub const REQUEST_ID_HEADER: &str = "x-ms-request-id";

/// Remote filesystem operations used by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetFileStatus,
    ListStatus,
    Create,
    Append,
    Open,
    Delete,
    Rename,
    Mkdirs,
}

impl Operation {
    /// Value of the `op` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetFileStatus => "GETFILESTATUS",
            Operation::ListStatus => "LISTSTATUS",
            Operation::Create => "CREATE",
            Operation::Append => "APPEND",
            Operation::Open => "OPEN",
            Operation::Delete => "DELETE",
            Operation::Rename => "RENAME",
            Operation::Mkdirs => "MKDIRS",
        }
    }

    pub fn method(&self) -> reqwest::Method {
        match self {
            Operation::GetFileStatus | Operation::ListStatus | Operation::Open => {
                reqwest::Method::GET
            }
            Operation::Create | Operation::Rename | Operation::Mkdirs => reqwest::Method::PUT,
            Operation::Append => reqwest::Method::POST,
            Operation::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flush semantics for CREATE and APPEND
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlag {
    /// Persist data, keep the stream (and lease) open
    Data,
    /// Persist data and release the lease
    Close,
}

impl SyncFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFlag::Data => "DATA",
            SyncFlag::Close => "CLOSE",
        }
    }
}

/// A single remote call
#[derive(Debug, Clone)]
pub struct AdlRequest {
    pub op: Operation,
    /// Remote path, relative to the filesystem root
    pub path: String,
    /// Query parameters besides `op` and `api-version`
    pub params: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl AdlRequest {
    pub fn new(op: Operation, path: impl Into<String>) -> Self {
        Self {
            op,
            path: path.into(),
            params: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Look up a query parameter
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Stream of body chunks for a successful read
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Response body. Error responses are always buffered.
pub enum Body {
    Bytes(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// Collect the whole body
    pub async fn into_bytes(self) -> Result<Bytes, TransportError> {
        match self {
            Body::Bytes(b) => Ok(b),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Buffered contents, if the body is not a stream
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Bytes(b) => Some(b),
            Body::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

/// Raw response as received from the remote
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    /// Correlation id sent with the request
    pub request_id: Option<String>,
    /// Correlation id returned by the server
    pub response_id: Option<String>,
    pub content_type: Option<String>,
    pub body: Body,
}

impl RawResponse {
    /// Buffered response with the given status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            request_id: None,
            response_id: None,
            content_type: None,
            body: Body::Bytes(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any response was received
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("credential provider failed: {0}")]
    Credential(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Issues remote calls. Implementations must be safe for concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: AdlRequest) -> Result<RawResponse, TransportError>;
}

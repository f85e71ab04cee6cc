//! Scripted in-memory transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{AdlRequest, Operation, RawResponse, Transport, TransportError};

type Handler = Box<dyn Fn(&AdlRequest) -> Result<RawResponse, TransportError> + Send + Sync>;

/// Transport that records every request and answers from a routing closure
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<AdlRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&AdlRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<AdlRequest> {
        self.requests.lock().clone()
    }

    /// Requests for one operation, in order
    pub fn requests_for(&self, op: Operation) -> Vec<AdlRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.op == op)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: AdlRequest) -> Result<RawResponse, TransportError> {
        let response = (self.handler)(&request);
        self.requests.lock().push(request);
        response
    }
}

pub fn ok_json(value: Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(200, value.to_string()))
}

pub fn ok_empty() -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(200, ""))
}

pub fn boolean(result: bool) -> Result<RawResponse, TransportError> {
    ok_json(json!({ "boolean": result }))
}

pub fn status(code: u16) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(code, ""))
}

pub fn remote_exception(code: u16, exception: &str) -> Result<RawResponse, TransportError> {
    let body = json!({
        "RemoteException": {
            "exception": exception,
            "message": format!("{} raised by test", exception),
            "javaClassName": format!("com.example.{}", exception),
        }
    });
    Ok(RawResponse::new(code, body.to_string()))
}

pub fn file_status(suffix: &str, kind: &str, length: u64) -> Value {
    json!({
        "pathSuffix": suffix,
        "type": kind,
        "length": length,
        "modificationTime": 1_500_000_000_123u64,
        "permission": "644",
    })
}

pub fn list_status(entries: Vec<Value>) -> Result<RawResponse, TransportError> {
    ok_json(json!({ "FileStatuses": { "FileStatus": entries } }))
}

pub fn get_status(entry: Value) -> Result<RawResponse, TransportError> {
    ok_json(json!({ "FileStatus": entry }))
}

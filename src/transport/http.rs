//! reqwest-based transport speaking the WebHDFS-style REST layout of the
//! data lake filesystem API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, Url};
use tracing::debug;
use uuid::Uuid;

use super::{AdlRequest, Body, Operation, RawResponse, Transport, TransportError, REQUEST_ID_HEADER};
use crate::auth::CredentialProvider;
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// REST API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2016-11-01";

/// HTTP transport for a single data lake account
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_version: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url` (e.g. `https://account.azuredatalakestore.net`)
    pub fn new(
        base_url: &str,
        api_version: impl Into<String>,
        timeout: Option<Duration>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Config(format!("Invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Config(format!(
                "Base url cannot carry a path: {}",
                base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_version: api_version.into(),
            credentials,
        })
    }

    /// Create a transport from resolved backend configuration
    pub fn from_config(
        config: &BackendConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Self::new(
            &config.base_url(),
            config.api_version.clone(),
            config.request_timeout,
            credentials,
        )
    }

    fn url(&self, request: &AdlRequest) -> std::result::Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::Other(format!("bad base url {}", self.base_url)))?;
            segments.pop_if_empty().push("webhdfs").push("v1");
            let mut pushed = false;
            for segment in request.path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
                pushed = true;
            }
            if !pushed {
                // root of the filesystem: /webhdfs/v1/
                segments.push("");
            }
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("op", request.op.as_str())
                .append_pair("api-version", &self.api_version);
            match request.op {
                Operation::Create | Operation::Append => {
                    query.append_pair("write", "true");
                }
                Operation::Open => {
                    query.append_pair("read", "true");
                }
                _ => {}
            }
            for (name, value) in &request.params {
                query.append_pair(name, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: AdlRequest) -> std::result::Result<RawResponse, TransportError> {
        let url = self.url(&request)?;
        let request_id = Uuid::new_v4().to_string();
        let op = request.op;
        let method = op.method();

        debug!("{} {} {}", op, url, request_id);

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, &request_id);

        let token = self
            .credentials
            .token()
            .await
            .map_err(|e| TransportError::Credential(e.to_string()))?;
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        if method == Method::PUT || method == Method::POST {
            builder = builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(request.body);
        }

        let response = builder.send().await?;

        let status = response.status();
        let response_id = header_value(response.headers(), REQUEST_ID_HEADER);
        let content_type = header_value(response.headers(), CONTENT_TYPE.as_str());

        debug!(
            "{} {} {} {} {}",
            op,
            url,
            request_id,
            status,
            response_id.as_deref().unwrap_or("-")
        );

        let body = if op == Operation::Open && status.is_success() {
            Body::Stream(Box::pin(response.bytes_stream().map_err(TransportError::from)))
        } else {
            Body::Bytes(response.bytes().await?)
        };

        Ok(RawResponse {
            status: status.as_u16(),
            request_id: Some(request_id),
            response_id,
            content_type,
            body,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

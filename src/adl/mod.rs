//! Data lake backend
//!
//! Exposes the blob capability contract over a hierarchical, lease-based
//! remote filesystem. The remote has real directories, single-writer append
//! streams guarded by leases, and no atomic replace or multipart upload, so
//! listing, multipart uploads and batch deletes are emulated on top of plain
//! directory and append calls.

mod classify;
mod delete;
mod listing;
mod multipart;
mod wire;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::auth::CredentialProvider;
use crate::backend::{
    BlobBackend, BlobItem, ByteStream, Capabilities, CopyBlobInput, GetBlobInput, GetBlobOutput,
    HeadBlobOutput, ListBlobsInput, ListBlobsOutput, MultipartCommit, PutBlobInput,
};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::transport::{
    AdlRequest, Body, HttpTransport, Operation, RawResponse, SyncFlag, Transport,
};

use self::classify::{classify, decode_json, ErrorBody, FILE_NOT_FOUND_EXCEPTION};
use self::wire::{BooleanResult, FileStatusResult};

/// Name reported in the capability descriptor and stamped on commit handles
pub const BACKEND_NAME: &str = "adl";

/// The single hierarchical separator
pub const DELIMITER: char = '/';

/// Endpoint scheme identifying this backend
pub const ENDPOINT_SCHEME: &str = "adl://";

/// Whether an endpoint string addresses a data lake account
pub fn is_adl_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with(ENDPOINT_SCHEME)
}

/// Data lake backend. Immutable after construction.
pub struct AdlBackend {
    transport: Arc<dyn Transport>,
    account: String,
    /// Root prefix all keys are joined under; not a real container
    bucket: String,
    file_mode: u32,
    dir_mode: u32,
    capabilities: Capabilities,
}

impl AdlBackend {
    /// Create a backend talking HTTP to the configured account
    pub fn new(config: &BackendConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let transport = HttpTransport::from_config(config, credentials)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a backend over an arbitrary transport
    pub fn with_transport(config: &BackendConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            account: config.account.clone(),
            bucket: config.bucket.clone(),
            file_mode: config.file_mode,
            dir_mode: config.dir_mode,
            capabilities: Capabilities {
                no_parallel_multipart: true,
                dir_blob: true,
                name: BACKEND_NAME,
            },
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Map a logical key to the remote path
    pub fn path(&self, key: &str) -> String {
        let key = key.trim_start_matches(DELIMITER);
        if self.bucket.is_empty() {
            key.to_string()
        } else if key.is_empty() {
            self.bucket.clone()
        } else {
            format!("{}{}{}", self.bucket, DELIMITER, key)
        }
    }

    /// Issue one remote call and classify its outcome
    async fn call(&self, request: AdlRequest, decode: ErrorBody) -> Result<RawResponse> {
        let op = request.op;
        let path = request.path.clone();
        let outcome = self.transport.send(request).await;
        classify(op, &path, outcome, decode)
    }

    async fn call_json<T: DeserializeOwned>(&self, request: AdlRequest, decode: ErrorBody) -> Result<T> {
        let op = request.op;
        let response = self.call(request, decode).await?;
        decode_json(op, response).await
    }

    async fn mkdir(&self, dir: &str) -> Result<()> {
        let path = self.path(dir);
        debug!("mkdir: key={} path={} mode={:o}", dir, path, self.dir_mode);

        let request = AdlRequest::new(Operation::Mkdirs, path.clone())
            .param("permission", permission(self.dir_mode));
        let result: BooleanResult = self
            .call_json(request, ErrorBody::Structured)
            .await
            .map_err(BackendError::into_status_error)?;
        if !result.boolean {
            return Err(BackendError::AlreadyExists(path));
        }
        Ok(())
    }
}

/// Permission bits as the remote expects them: octal with a leading zero
fn permission(mode: u32) -> String {
    format!("0{:o}", mode)
}

/// File session id for a conditional read: the tag's first 16 bytes
fn file_session_id(tag: &str) -> Uuid {
    let mut raw = [0u8; 16];
    let len = tag.len().min(raw.len());
    raw[..len].copy_from_slice(&tag.as_bytes()[..len]);
    Uuid::from_bytes(raw)
}

#[async_trait]
impl BlobBackend for AdlBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn init(&self, key: &str) -> Result<()> {
        let request = AdlRequest::new(Operation::GetFileStatus, self.path(key));
        match self.call(request, ErrorBody::Structured).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_remote_exception(FILE_NOT_FOUND_EXCEPTION) => Ok(()),
            Err(e) => Err(e.into_status_error()),
        }
    }

    async fn head_blob(&self, key: &str) -> Result<HeadBlobOutput> {
        let path = self.path(key);
        trace!("head_blob: key={} path={}", key, path);

        let request = AdlRequest::new(Operation::GetFileStatus, path);
        let result: FileStatusResult = self.call_json(request, ErrorBody::Status).await?;
        let status = result.file_status;

        Ok(HeadBlobOutput {
            item: status.to_item(key),
            content_type: None,
            is_dir_blob: status.is_dir(),
        })
    }

    async fn list_blobs(&self, input: &ListBlobsInput) -> Result<ListBlobsOutput> {
        self.list(input).await
    }

    async fn delete_blob(&self, key: &str) -> Result<()> {
        self.delete_one(key).await
    }

    async fn delete_blobs(&self, keys: Vec<String>) -> Result<()> {
        self.delete_many(keys).await
    }

    async fn rename_blob(&self, source: &str, destination: &str) -> Result<()> {
        let from = self.path(source);
        let to = self.path(destination);
        debug!("rename_blob: {} -> {}", from, to);

        let request = AdlRequest::new(Operation::Rename, from.clone())
            .param("destination", format!("{}{}", DELIMITER, to))
            .param("renameoptions", "OVERWRITE");
        let result: BooleanResult = self.call_json(request, ErrorBody::Status).await?;

        // false means the source is missing or a directory was renamed onto a
        // file; the caller rules out the latter
        if !result.boolean {
            return Err(BackendError::NotFound(from));
        }
        Ok(())
    }

    async fn copy_blob(&self, input: &CopyBlobInput) -> Result<()> {
        Err(BackendError::NotSupported(format!(
            "server-side copy {} -> {}",
            input.source, input.destination
        )))
    }

    async fn get_blob(&self, input: &GetBlobInput) -> Result<GetBlobOutput> {
        let path = self.path(&input.key);
        trace!(
            "get_blob: key={} path={} start={} count={}",
            input.key,
            path,
            input.start,
            input.count
        );

        let mut request = AdlRequest::new(Operation::Open, path);
        if input.count != 0 {
            request = request.param("length", input.count);
        }
        if input.start != 0 {
            request = request.param("offset", input.start);
        }
        if let Some(tag) = &input.if_match {
            request = request.param("filesessionid", file_session_id(tag));
        }

        let response = self.call(request, ErrorBody::Status).await?;
        let content_type = response.content_type.clone();
        let body: ByteStream = match response.body {
            Body::Bytes(bytes) => {
                let chunk: Result<Bytes> = Ok(bytes);
                Box::pin(futures::stream::once(futures::future::ready(chunk)))
            }
            Body::Stream(stream) => Box::pin(
                stream.map_err(|e| BackendError::Transient(format!("reading body: {}", e))),
            ),
        };

        Ok(GetBlobOutput {
            head: HeadBlobOutput {
                item: BlobItem::key_only(input.key.clone()),
                content_type,
                is_dir_blob: false,
            },
            body,
        })
    }

    async fn put_blob(&self, input: PutBlobInput) -> Result<()> {
        if input.dir_blob {
            return self.mkdir(&input.key).await;
        }

        let path = self.path(&input.key);
        debug!("put_blob: key={} path={} size={}", input.key, path, input.body.len());

        let request = AdlRequest::new(Operation::Create, path)
            .param("overwrite", true)
            .param("syncFlag", SyncFlag::Close.as_str())
            .param("permission", permission(self.file_mode))
            .body(input.body);
        self.call(request, ErrorBody::Status).await?;
        Ok(())
    }

    async fn multipart_begin(&self, key: &str) -> Result<MultipartCommit> {
        self.begin_upload(key).await
    }

    async fn multipart_add(
        &self,
        commit: &mut MultipartCommit,
        body: Bytes,
        size: u64,
    ) -> Result<()> {
        self.add_part(commit, body, size).await
    }

    async fn multipart_commit(&self, commit: &MultipartCommit) -> Result<()> {
        self.commit_upload(commit).await
    }

    async fn multipart_abort(&self, commit: &MultipartCommit) -> Result<()> {
        self.abort_upload(commit).await
    }

    async fn multipart_expire(&self, _older_than: SystemTime) -> Result<()> {
        Err(BackendError::NotSupported(
            "uploads hold no server-side state to expire".to_string(),
        ))
    }

    async fn make_bucket(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(BackendError::InvalidArgument(
                "no bucket configured".to_string(),
            ));
        }
        self.mkdir("").await
    }

    async fn remove_bucket(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(BackendError::InvalidArgument(
                "no bucket configured".to_string(),
            ));
        }

        let path = self.path("");
        debug!("remove_bucket: path={}", path);

        let request = AdlRequest::new(Operation::Delete, path.clone()).param("recursive", false);
        let result: BooleanResult = self.call_json(request, ErrorBody::Status).await?;
        if !result.boolean {
            return Err(BackendError::NotFound(path));
        }
        Ok(())
    }
}

//! Blob-storage capability contract
//!
//! This is the surface the virtual filesystem layer programs against. Every
//! backend (this crate ships the data lake one) exposes object-store style
//! get/put/list/delete/rename/multipart semantics, whatever the remote
//! system actually provides underneath.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;

/// Static backend descriptor the consumer adapts its behavior to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Multipart parts must be added one at a time, in order
    pub no_parallel_multipart: bool,
    /// Directories are real entries, so placeholder objects are expected
    pub dir_blob: bool,
    /// Backend name
    pub name: &'static str,
}

/// A listing row for a single object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobItem {
    /// Logical key (directory objects end with the delimiter)
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

impl BlobItem {
    /// Row with a key only, for synthesized directory objects
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }
}

/// A synthesized "virtual directory" row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPrefix {
    /// Prefix including the trailing delimiter
    pub prefix: String,
}

impl BlobPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadBlobOutput {
    pub item: BlobItem,
    pub content_type: Option<String>,
    pub is_dir_blob: bool,
}

/// Listing request
///
/// `delimiter == None` requests a full recursive flat listing, which cannot
/// be resumed and therefore rejects continuation tokens.
#[derive(Debug, Clone, Default)]
pub struct ListBlobsInput {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Best-effort hint, see the listing engine
    pub max_keys: Option<u32>,
    pub start_after: Option<String>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListBlobsOutput {
    pub prefixes: Vec<BlobPrefix>,
    pub items: Vec<BlobItem>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GetBlobInput {
    pub key: String,
    /// First byte to read; 0 reads from the start
    pub start: u64,
    /// Bytes to read; 0 reads to the end
    pub count: u64,
    pub if_match: Option<String>,
}

/// Stream type for object bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub struct GetBlobOutput {
    pub head: HeadBlobOutput,
    pub body: ByteStream,
}

#[derive(Debug, Clone, Default)]
pub struct PutBlobInput {
    pub key: String,
    pub body: Bytes,
    /// Create a directory placeholder instead of an object
    pub dir_blob: bool,
}

#[derive(Debug, Clone)]
pub struct CopyBlobInput {
    pub source: String,
    pub destination: String,
}

/// Caller-held handle for an in-progress multipart upload
///
/// Owned exclusively by the caller between begin and commit/abort. The
/// backend mutates the appended-size bookkeeping in place on every add.
/// Only the backend that issued a handle may be given it back.
#[derive(Debug)]
pub struct MultipartCommit {
    /// Remote path of the object being written
    pub key: String,
    /// Upload id (the lease token for append-emulated uploads)
    pub upload_id: String,
    pub(crate) backend: &'static str,
    pub(crate) appended: u64,
}

impl MultipartCommit {
    pub(crate) fn new(backend: &'static str, key: String, upload_id: String) -> Self {
        Self {
            key,
            upload_id,
            backend,
            appended: 0,
        }
    }

    /// Cumulative declared size of all parts added so far
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Name of the backend that issued this handle
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

/// Core capability contract for blob backends
///
/// Each call runs to completion before returning; concurrency comes only
/// from callers issuing several operations at once.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Get backend capabilities
    fn capabilities(&self) -> &Capabilities;

    /// Root prefix all keys live under (empty if none)
    fn bucket(&self) -> &str;

    /// Startup existence check. Absence of `key` is not an error.
    async fn init(&self, key: &str) -> Result<()>;

    async fn head_blob(&self, key: &str) -> Result<HeadBlobOutput>;

    async fn list_blobs(&self, input: &ListBlobsInput) -> Result<ListBlobsOutput>;

    async fn delete_blob(&self, key: &str) -> Result<()>;

    /// Delete a batch, stopping at the first failure
    async fn delete_blobs(&self, keys: Vec<String>) -> Result<()>;

    async fn rename_blob(&self, source: &str, destination: &str) -> Result<()>;

    async fn copy_blob(&self, input: &CopyBlobInput) -> Result<()>;

    async fn get_blob(&self, input: &GetBlobInput) -> Result<GetBlobOutput>;

    async fn put_blob(&self, input: PutBlobInput) -> Result<()>;

    async fn multipart_begin(&self, key: &str) -> Result<MultipartCommit>;

    /// Append one part. `size` is the declared part size.
    async fn multipart_add(&self, commit: &mut MultipartCommit, body: Bytes, size: u64)
        -> Result<()>;

    async fn multipart_commit(&self, commit: &MultipartCommit) -> Result<()>;

    /// Release the upload. Parts already added are not discarded.
    async fn multipart_abort(&self, commit: &MultipartCommit) -> Result<()>;

    /// Clean up stale uploads older than `older_than`
    async fn multipart_expire(&self, older_than: SystemTime) -> Result<()>;

    async fn make_bucket(&self) -> Result<()>;

    async fn remove_bucket(&self) -> Result<()>;
}

//! Multipart uploads emulated with a lease and sequential appends.
//!
//! Begin creates an empty object while taking a lease. Each part is appended
//! at the running offset, and commit closes the stream to release the lease.
//! There is no rollback: abort only releases the lease and keeps any bytes
//! already appended.

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use super::classify::{ErrorBody, BAD_OFFSET_EXCEPTION};
use super::{permission, AdlBackend, BACKEND_NAME};
use crate::backend::MultipartCommit;
use crate::error::{BackendError, Result};
use crate::transport::{AdlRequest, Operation, SyncFlag};

/// Lease carried by a handle this backend issued.
///
/// Panics on a handle from another backend: that is a caller bug, never a
/// runtime condition.
fn lease_of(commit: &MultipartCommit) -> Result<Uuid> {
    if commit.backend != BACKEND_NAME {
        panic!(
            "Incorrect commit handle: issued by {}, given to {}",
            commit.backend, BACKEND_NAME
        );
    }
    Uuid::parse_str(&commit.upload_id).map_err(|e| {
        BackendError::InvalidArgument(format!("upload id {}: {}", commit.upload_id, e))
    })
}

/// Append to a leased stream
fn append(path: &str, lease: Uuid, offset: Option<u64>, flag: SyncFlag, body: Bytes) -> AdlRequest {
    let mut request = AdlRequest::new(Operation::Append, path)
        .param("syncFlag", flag.as_str())
        .param("leaseid", lease)
        .param("filesessionid", lease);
    if let Some(offset) = offset {
        request = request.param("offset", offset);
    }
    request.body(body)
}

impl AdlBackend {
    pub(crate) async fn begin_upload(&self, key: &str) -> Result<MultipartCommit> {
        let path = self.path(key);
        let lease = Uuid::new_v4();
        debug!("multipart_begin: key={} path={} lease={}", key, path, lease);

        let request = AdlRequest::new(Operation::Create, path.clone())
            .param("overwrite", true)
            .param("syncFlag", SyncFlag::Data.as_str())
            .param("leaseid", lease)
            .param("permission", permission(self.file_mode));
        self.call(request, ErrorBody::Status).await?;

        Ok(MultipartCommit::new(BACKEND_NAME, path, lease.to_string()))
    }

    pub(crate) async fn add_part(
        &self,
        commit: &mut MultipartCommit,
        body: Bytes,
        size: u64,
    ) -> Result<()> {
        let lease = lease_of(commit)?;
        let end = commit.appended.checked_add(size).ok_or_else(|| {
            BackendError::InvalidArgument(format!(
                "part of {} bytes overflows upload of {} at {}",
                size, commit.key, commit.appended
            ))
        })?;
        commit.appended = end;
        let offset = end - size;

        debug!(
            "multipart_add: path={} offset={} size={}",
            commit.key, offset, size
        );

        let request = append(&commit.key, lease, Some(offset), SyncFlag::Data, body);
        let err = match self.call(request, ErrorBody::Structured).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        if err.is_not_found() {
            // payload too large, or another writer broke the lease
            return Err(BackendError::InvalidArgument(format!(
                "append to {} at {}: {}",
                commit.key, offset, err
            )));
        }

        if err.is_remote_exception(BAD_OFFSET_EXCEPTION) {
            // the append may have landed with only the reply lost; a clean
            // close at the expected end proves it did
            let close = append(&commit.key, lease, Some(end), SyncFlag::Close, Bytes::new());
            match self.call(close, ErrorBody::Structured).await {
                Ok(_) => {
                    warn!(
                        "multipart_add: {} reported bad offset {} but data is at {}",
                        commit.key, offset, end
                    );
                    return Ok(());
                }
                Err(close_err) => {
                    debug!("multipart_add: close at {} failed: {}", end, close_err);
                }
            }
        }

        Err(err.into_status_error())
    }

    pub(crate) async fn commit_upload(&self, commit: &MultipartCommit) -> Result<()> {
        let lease = lease_of(commit)?;
        debug!(
            "multipart_commit: path={} size={}",
            commit.key, commit.appended
        );

        let request = append(
            &commit.key,
            lease,
            Some(commit.appended),
            SyncFlag::Close,
            Bytes::new(),
        );
        match self.call(request, ErrorBody::Status).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                // deleted or lease broken after the data was appended
                warn!("multipart_commit: {} vanished before close: {}", commit.key, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn abort_upload(&self, commit: &MultipartCommit) -> Result<()> {
        let lease = lease_of(commit)?;
        debug!("multipart_abort: path={}", commit.key);

        let request = append(&commit.key, lease, None, SyncFlag::Close, Bytes::new());
        self.call(request, ErrorBody::Status).await?;
        Ok(())
    }
}

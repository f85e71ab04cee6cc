//! Single and batch deletes.
//!
//! The remote refuses to delete a non-empty directory without the recursive
//! flag, and this backend never sends it. A batch is therefore deleted
//! children first.

use tracing::debug;

use super::classify::ErrorBody;
use super::wire::BooleanResult;
use super::{AdlBackend, DELIMITER};
use crate::error::{BackendError, Result};
use crate::transport::{AdlRequest, Operation};

/// Number of path components, ignoring a trailing delimiter
fn depth(key: &str) -> usize {
    key.trim_end_matches(DELIMITER).split(DELIMITER).count()
}

/// Sort keys deepest first, ties broken lexicographically
pub(crate) fn deletion_order(keys: &mut [String]) {
    keys.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));
}

impl AdlBackend {
    pub(crate) async fn delete_one(&self, key: &str) -> Result<()> {
        let path = self.path(key.trim_end_matches(DELIMITER));
        debug!("delete_blob: key={} path={}", key, path);

        let request = AdlRequest::new(Operation::Delete, path.clone()).param("recursive", false);
        let result: BooleanResult = self.call_json(request, ErrorBody::Status).await?;
        if !result.boolean {
            return Err(BackendError::NotFound(path));
        }
        Ok(())
    }

    pub(crate) async fn delete_many(&self, mut keys: Vec<String>) -> Result<()> {
        deletion_order(&mut keys);
        debug!("delete_blobs: {} keys", keys.len());

        for key in &keys {
            self.delete_one(key).await?;
        }
        Ok(())
    }
}

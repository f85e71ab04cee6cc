//! JSON payloads exchanged with the data lake REST API

use std::time::{Duration, SystemTime};

use serde::Deserialize;

use crate::backend::BlobItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum FileKind {
    File,
    Directory,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileStatus {
    #[serde(default)]
    pub length: u64,
    /// Name relative to the listed path; empty when the listed path is a file
    #[serde(default)]
    pub path_suffix: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub modification_time: Option<i64>,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        let millis = u64::try_from(self.modification_time?).ok()?;
        SystemTime::UNIX_EPOCH.checked_add(Duration::from_millis(millis))
    }

    pub fn to_item(&self, key: impl Into<String>) -> BlobItem {
        BlobItem {
            key: key.into(),
            size: self.length,
            last_modified: self.last_modified(),
        }
    }
}

/// GETFILESTATUS response
#[derive(Debug, Deserialize)]
pub(crate) struct FileStatusResult {
    #[serde(rename = "FileStatus")]
    pub file_status: FileStatus,
}

/// LISTSTATUS response
#[derive(Debug, Deserialize)]
pub(crate) struct FileStatusesResult {
    #[serde(rename = "FileStatuses")]
    pub file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    pub file_status: Vec<FileStatus>,
}

/// DELETE / RENAME / MKDIRS response: whether the operation took effect
#[derive(Debug, Deserialize)]
pub(crate) struct BooleanResult {
    pub boolean: bool,
}

/// Error body
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteExceptionEnvelope {
    #[serde(rename = "RemoteException")]
    pub remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteException {
    #[serde(alias = "Exception")]
    pub exception: String,
    #[serde(default, alias = "Message")]
    pub message: String,
    #[serde(default, rename = "javaClassName", alias = "JavaClassName")]
    pub java_class_name: String,
}

//! Flat and delimited listing emulated over a directory tree.
//!
//! The remote only lists one directory at a time. A delimited listing is a
//! single directory call; a flat listing walks the whole subtree depth-first
//! using an explicit stack, so output order matches a pre-order traversal
//! and tree depth never grows the call stack.

use std::vec;

use tracing::{debug, trace};

use super::wire::{FileStatus, FileStatusesResult};
use super::classify::ErrorBody;
use super::{AdlBackend, DELIMITER};
use crate::backend::{BlobItem, BlobPrefix, ListBlobsInput, ListBlobsOutput};
use crate::error::{BackendError, Result};
use crate::transport::{AdlRequest, Operation};

/// A directory whose children are still being emitted
struct Frame {
    /// Directory key without trailing delimiter
    dir: String,
    entries: vec::IntoIter<FileStatus>,
}

/// Accumulated output of one listing call
struct Listing {
    recursive: bool,
    /// Remaining key budget. Advisory only: the walk is never cut short.
    remaining: Option<u32>,
    out: ListBlobsOutput,
}

impl Listing {
    fn charge(&mut self, fetched: usize) {
        if let Some(remaining) = self.remaining.as_mut() {
            let was = *remaining;
            *remaining = remaining.saturating_sub(u32::try_from(fetched).unwrap_or(u32::MAX));
            if was > 0 && *remaining == 0 {
                debug!("listing exceeded max_keys, continuing walk");
            }
        }
    }

    /// Emit the rows a directory call contributes before its children, and
    /// return the frame for the children (`None` if `path` named a file).
    fn open(&mut self, path: &str, entries: Vec<FileStatus>) -> Option<Frame> {
        if !path.is_empty() {
            if let [only] = entries.as_slice() {
                if only.path_suffix.is_empty() {
                    // a path ending in the delimiter cannot name a file
                    if !path.ends_with(DELIMITER) {
                        self.out.items.push(only.to_item(path));
                    }
                    return None;
                }
            }

            if !self.recursive {
                if path.ends_with(DELIMITER) {
                    // the directory object itself
                    self.out.items.push(BlobItem::key_only(path));
                } else {
                    self.out
                        .prefixes
                        .push(BlobPrefix::new(format!("{}{}", path, DELIMITER)));
                }
            }
        }

        self.charge(entries.len());

        Some(Frame {
            dir: path.trim_end_matches(DELIMITER).to_string(),
            entries: entries.into_iter(),
        })
    }
}

fn child_key(dir: &str, suffix: &str) -> String {
    if dir.is_empty() {
        suffix.to_string()
    } else {
        format!("{}{}{}", dir, DELIMITER, suffix)
    }
}

impl AdlBackend {
    pub(crate) async fn list(&self, input: &ListBlobsInput) -> Result<ListBlobsOutput> {
        let recursive = match input.delimiter.as_deref() {
            None => {
                // a tree walk cannot be resumed mid-traversal
                if input.continuation_token.is_some() || input.start_after.is_some() {
                    return Err(BackendError::NotSupported(
                        "flat listing cannot resume from a marker".to_string(),
                    ));
                }
                true
            }
            Some(d) if d.len() == 1 && d.starts_with(DELIMITER) => false,
            Some(other) => {
                return Err(BackendError::NotSupported(format!(
                    "listing delimiter {:?}",
                    other
                )));
            }
        };

        let prefix = input.prefix.as_deref().unwrap_or("");
        trace!(
            "list_blobs: prefix={} recursive={} max_keys={:?}",
            prefix,
            recursive,
            input.max_keys
        );

        let entries = match self.list_status(prefix).await {
            Ok(entries) => entries,
            Err(BackendError::NotFound(_)) => return Ok(ListBlobsOutput::default()),
            Err(e) => return Err(e),
        };

        let mut listing = Listing {
            recursive,
            remaining: input.max_keys,
            out: ListBlobsOutput::default(),
        };

        let mut stack: Vec<Frame> = listing.open(prefix, entries).into_iter().collect();

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.entries.next() else {
                stack.pop();
                continue;
            };
            let key = child_key(&frame.dir, &entry.path_suffix);

            if !entry.is_dir() {
                listing.out.items.push(entry.to_item(key));
            } else if recursive {
                // flat listings carry directory objects, never prefixes
                listing
                    .out
                    .items
                    .push(entry.to_item(format!("{}{}", key, DELIMITER)));
                let children = self.list_status(&key).await?;
                if let Some(child) = listing.open(&key, children) {
                    stack.push(child);
                }
            } else {
                listing
                    .out
                    .prefixes
                    .push(BlobPrefix::new(format!("{}{}", key, DELIMITER)));
            }
        }

        Ok(listing.out)
    }

    async fn list_status(&self, key: &str) -> Result<Vec<FileStatus>> {
        let request = AdlRequest::new(Operation::ListStatus, self.path(key));
        let result: FileStatusesResult = self.call_json(request, ErrorBody::Status).await?;
        Ok(result.file_statuses.file_status)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::adl::classify::FILE_NOT_FOUND_EXCEPTION;
    use crate::adl::tests::backend_with;
    use crate::backend::BlobBackend;
    use crate::transport::mock::{self, file_status};

    /// Directory tree keyed by remote path
    fn tree() -> HashMap<&'static str, Vec<serde_json::Value>> {
        let mut dirs = HashMap::new();
        dirs.insert(
            "",
            vec![file_status("d", "DIRECTORY", 0), file_status("top", "FILE", 1)],
        );
        dirs.insert(
            "d",
            vec![file_status("a", "FILE", 10), file_status("b", "DIRECTORY", 0)],
        );
        dirs.insert(
            "d/b",
            vec![file_status("c", "FILE", 20), file_status("e", "DIRECTORY", 0)],
        );
        dirs.insert("d/b/e", vec![]);
        dirs.insert("d/a", vec![file_status("", "FILE", 10)]);
        dirs
    }

    fn tree_backend() -> (AdlBackend, std::sync::Arc<crate::transport::mock::MockTransport>) {
        let dirs = tree();
        backend_with("", move |req| {
            let path = req.path.trim_end_matches('/');
            match dirs.get(path) {
                Some(entries) => mock::list_status(entries.clone()),
                None => mock::remote_exception(404, FILE_NOT_FOUND_EXCEPTION),
            }
        })
    }

    fn keys(out: &ListBlobsOutput) -> (Vec<&str>, Vec<&str>) {
        (
            out.prefixes.iter().map(|p| p.prefix.as_str()).collect(),
            out.items.iter().map(|i| i.key.as_str()).collect(),
        )
    }

    fn delimited(prefix: &str) -> ListBlobsInput {
        ListBlobsInput {
            prefix: Some(prefix.to_string()),
            delimiter: Some("/".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_delimited_listing_does_not_recurse() {
        let (b, t) = tree_backend();
        let out = b.list_blobs(&delimited("d/")).await.unwrap();
        let (prefixes, items) = keys(&out);

        assert_eq!(prefixes, vec!["d/b/"]);
        assert_eq!(items, vec!["d/", "d/a"]);
        assert_eq!(items.iter().filter(|k| **k == "d/a").count(), 1);
        assert_eq!(t.requests().len(), 1);
        assert!(!out.is_truncated);
    }

    #[tokio::test]
    async fn test_delimited_listing_without_trailing_delimiter() {
        let (b, _) = tree_backend();
        let out = b.list_blobs(&delimited("d")).await.unwrap();
        let (prefixes, items) = keys(&out);

        assert_eq!(prefixes, vec!["d/", "d/b/"]);
        assert_eq!(items, vec!["d/a"]);
    }

    #[tokio::test]
    async fn test_root_listing_synthesizes_nothing() {
        let (b, _) = tree_backend();
        let out = b.list_blobs(&delimited("")).await.unwrap();
        let (prefixes, items) = keys(&out);

        assert_eq!(prefixes, vec!["d/"]);
        assert_eq!(items, vec!["top"]);
    }

    #[tokio::test]
    async fn test_flat_listing_walks_depth_first() {
        let (b, t) = tree_backend();
        let out = b
            .list_blobs(&ListBlobsInput {
                prefix: Some("d".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let (prefixes, items) = keys(&out);

        assert!(prefixes.is_empty());
        assert_eq!(items, vec!["d/a", "d/b/", "d/b/c", "d/b/e/"]);
        assert_eq!(out.items[2].size, 20);

        let listed: Vec<String> = t.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(listed, vec!["d", "d/b", "d/b/e"]);
    }

    #[tokio::test]
    async fn test_flat_listing_every_directory_has_one_item() {
        let (b, _) = tree_backend();
        let out = b.list_blobs(&ListBlobsInput::default()).await.unwrap();
        let (prefixes, items) = keys(&out);

        assert!(prefixes.is_empty());
        assert_eq!(items, vec!["d/", "d/a", "d/b/", "d/b/c", "d/b/e/", "top"]);
        for dir in ["d/", "d/b/", "d/b/e/"] {
            assert_eq!(items.iter().filter(|k| **k == dir).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_file_prefix_is_single_item() {
        let (b, t) = tree_backend();
        let out = b.list_blobs(&delimited("d/a")).await.unwrap();
        let (prefixes, items) = keys(&out);

        assert!(prefixes.is_empty());
        assert_eq!(items, vec!["d/a"]);
        assert_eq!(out.items[0].size, 10);
        assert_eq!(t.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_file_prefix_with_trailing_delimiter_is_not_a_file() {
        let (b, _) = tree_backend();
        let out = b.list_blobs(&delimited("d/a/")).await.unwrap();
        assert!(out.items.is_empty());
        assert!(out.prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_prefix_is_empty() {
        let (b, _) = tree_backend();
        let out = b.list_blobs(&delimited("nope")).await.unwrap();
        assert!(out.items.is_empty());
        assert!(out.prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_nested_errors_propagate() {
        let (b, _) = backend_with("", |req| match req.path.as_str() {
            "d" => mock::list_status(vec![file_status("gone", "DIRECTORY", 0)]),
            _ => mock::status(500),
        });
        let err = b
            .list_blobs(&ListBlobsInput {
                prefix: Some("d".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_flat_listing_rejects_markers() {
        let (b, t) = tree_backend();
        for input in [
            ListBlobsInput {
                start_after: Some("a".to_string()),
                ..Default::default()
            },
            ListBlobsInput {
                continuation_token: Some("t".to_string()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                b.list_blobs(&input).await,
                Err(BackendError::NotSupported(_))
            ));
        }
        assert!(t.requests().is_empty());
    }

    #[tokio::test]
    async fn test_delimited_listing_ignores_markers() {
        let (b, _) = tree_backend();
        let mut input = delimited("d/");
        input.start_after = Some("d/a".to_string());
        let out = b.list_blobs(&input).await.unwrap();
        assert_eq!(out.items.len(), 2);
    }

    #[tokio::test]
    async fn test_other_delimiters_unsupported() {
        let (b, _) = tree_backend();
        let mut input = delimited("d");
        input.delimiter = Some("|".to_string());
        assert!(matches!(
            b.list_blobs(&input).await,
            Err(BackendError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_max_keys_is_advisory() {
        let (b, _) = tree_backend();
        let out = b
            .list_blobs(&ListBlobsInput {
                max_keys: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.items.len(), 6);
        assert!(!out.is_truncated);
    }

    #[test]
    fn test_budget_saturates() {
        let mut listing = Listing {
            recursive: true,
            remaining: Some(3),
            out: ListBlobsOutput::default(),
        };
        listing.charge(2);
        assert_eq!(listing.remaining, Some(1));
        listing.charge(5);
        assert_eq!(listing.remaining, Some(0));
    }
}

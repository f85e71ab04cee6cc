//! datalake-blob: object-store semantics over a hierarchical data lake
//!
//! This library adapts a lease-based, directory-oriented data lake REST API
//! to a flat blob-storage contract (get/put/list/delete/rename/multipart),
//! for consumption by a virtual filesystem layer.
//!
//! # Architecture
//!
//! - **Backend contract**: the `BlobBackend` trait and its request/response
//!   types, shared by every storage backend.
//! - **Data lake backend**: `AdlBackend`, which maps keys to remote paths,
//!   emulates flat listing, multipart uploads and batch deletes on top of
//!   directory and append calls, and classifies remote failures.
//! - **Transport**: the narrow `Transport` seam the backend issues calls
//!   through, with an HTTP implementation.
//! - **Auth**: injected bearer-token providers.
//!
//! # Example
//!
//! ```no_run
//! use datalake_blob::config::Config;
//! use datalake_blob::{AdlBackend, BlobBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file(&"config.yaml".into())?;
//! let backend = AdlBackend::new(&config.backend, config.backend.credentials())?;
//!
//! backend.init("").await?;
//! let head = backend.head_blob("reports/2024.csv").await?;
//! println!("{} bytes", head.item.size);
//! # Ok(())
//! # }
//! ```

pub mod adl;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod transport;

pub use adl::AdlBackend;
pub use backend::BlobBackend;
pub use error::{BackendError, Result};

//! Credential provider abstractions for the data lake API
//!
//! The backend never acquires or refreshes credentials itself. A provider is
//! injected at construction and asked for a bearer token before every
//! request:
//! - Static tokens (pre-obtained or long-lived)
//! - Anonymous access (local emulators, tests)

pub mod static_token;

use async_trait::async_trait;
use std::error::Error as StdError;

pub use static_token::{AnonymousProvider, StaticTokenProvider};

/// Supplies the authorization token attached to remote calls.
///
/// Returns `Ok(Some(token))` if a bearer token should be sent,
/// `Ok(None)` if the request goes out unauthenticated,
/// or `Err` if the token could not be obtained.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>>;
}

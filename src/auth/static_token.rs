//! Fixed credential providers.
//!
//! Neither provider validates or refreshes anything. A static token will
//! eventually expire; refreshing it is the job of whoever supplies it.

use async_trait::async_trait;
use std::error::Error as StdError;

use super::CredentialProvider;

/// A provider that returns the same bearer token for every request.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>> {
        Ok(Some(self.token.clone()))
    }
}

/// A provider that sends no authorization header.
#[derive(Debug, Default)]
pub struct AnonymousProvider;

#[async_trait]
impl CredentialProvider for AnonymousProvider {
    async fn token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>> {
        Ok(None)
    }
}

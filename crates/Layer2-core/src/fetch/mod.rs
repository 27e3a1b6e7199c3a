//! Fetch layer - 네트워크 전송 추상화
//!
//! Resolvers only see `Fetcher`. Non-OK statuses come back as ordinary
//! responses; turning them into tier failures is the caller's business.
//!
//! - `HttpFetcher`: reqwest transport
//! - `StaticFetcher`: canned responses, records every request

mod http;
mod stub;

pub use http::HttpFetcher;
pub use stub::StaticFetcher;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tally_foundation::{Error, Result};
use url::Url;

/// Whether a request may carry the configured token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Omit,
    Include,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub credentials: Credentials,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            credentials: Credentials::Omit,
        }
    }

    pub fn with_credentials(mut self) -> Self {
        self.credentials = Credentials::Include;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl FetchResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// 2xx
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of an OK response, `Error::Http` otherwise
    pub fn text(self) -> Result<String> {
        if !self.is_ok() {
            return Err(Error::http(self.status, self.url));
        }
        Ok(self.body)
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Fetch-like transport
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Transport failures are `Error::Network`; any status is a response
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

//! reqwest transport

use super::{Credentials, FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use reqwest::Client;
use tally_foundation::{Error, HttpConfig, Result};
use tracing::{debug, warn};

/// Production `Fetcher`
pub struct HttpFetcher {
    client: Client,
    token: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        debug!("GET {}", request.url);

        let mut builder = self.client.get(request.url.clone());
        if request.credentials == Credentials::Include {
            if let Some(token) = &self.token {
                builder = builder.bearer_auth(token);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        if status == 403 || status == 429 {
            warn!("Access denied or rate limited ({}) for {}", status, url);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(FetchResponse { status, url, body })
    }
}

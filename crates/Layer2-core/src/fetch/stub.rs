//! Canned-response transport for offline use and tests

use super::{FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tally_foundation::{Error, Result};
use tracing::trace;

#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail(String),
}

/// `Fetcher` serving fixed responses keyed by exact URL
///
/// Unknown URLs answer 404. Every request is recorded in order.
#[derive(Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<FetchRequest>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.set_response(url, status, body);
        self
    }

    /// 200 with `body`
    pub fn ok(self, url: &str, body: impl Into<String>) -> Self {
        self.respond(url, 200, body)
    }

    /// Transport failure
    pub fn fail(self, url: &str, message: impl Into<String>) -> Self {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Fail(message.into()));
        self
    }

    /// Change a route after construction
    pub fn set_response(&self, url: &str, status: u16, body: impl Into<String>) {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.into(),
            },
        );
    }

    /// Requested URLs in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }

    pub fn recorded(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        trace!("stub GET {}", request.url);
        let url = request.url.to_string();
        self.requests.lock().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let route = self.routes.lock().get(&url).cloned();
        match route {
            Some(Route::Respond { status, body }) => Ok(FetchResponse::new(url, status, body)),
            Some(Route::Fail(message)) => Err(Error::Network(message)),
            None => Ok(FetchResponse::new(url, 404, "Not Found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> FetchRequest {
        FetchRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_routes_and_recording() {
        let fetcher = StaticFetcher::new()
            .ok("https://github.com/a", "hello")
            .fail("https://github.com/b", "connection reset");

        let a = fetcher.fetch(get("https://github.com/a")).await.unwrap();
        assert_eq!(a.text().unwrap(), "hello");

        let b = fetcher.fetch(get("https://github.com/b")).await;
        assert!(matches!(b, Err(Error::Network(_))));

        let c = fetcher.fetch(get("https://github.com/c")).await.unwrap();
        assert_eq!(c.status, 404);

        assert_eq!(
            fetcher.requests(),
            vec!["https://github.com/a", "https://github.com/b", "https://github.com/c"]
        );
        assert_eq!(fetcher.count_for("https://github.com/a"), 1);
    }

    #[test]
    fn test_set_response_after_construction() {
        let fetcher = StaticFetcher::new();
        fetcher.set_response("https://github.com/a", 500, "oops");
        let response =
            tokio_test::block_on(fetcher.fetch(get("https://github.com/a"))).unwrap();
        assert_eq!(response.status, 500);
        assert!(response.text().is_err());
    }
}

//! Metadata Resolver - 엔트리 메타데이터 계산
//!
//! Two fallback chains, memoized through the shared `TtlCache`:
//!
//! ```text
//! file:  same-origin raw ─► alternate raw host ─► rendered page ─► Unavailable
//! dir:   listing API ─────► rendered page (links, then rows) ───► Unavailable
//! ```
//!
//! Every fetch goes through the shared `ConcurrencyLimiter`. Concurrent
//! resolutions of one key attach to a single in-flight computation, which
//! is dropped from the in-flight map once it settles.

mod directory;
mod file;

use crate::classify::{Classifier, EntryKind};
use crate::fetch::{FetchRequest, Fetcher};
use crate::target::{cache_key, Endpoints};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tally_foundation::{ConcurrencyLimiter, Result, SelectorConfig, TtlCache};
use tracing::debug;
use url::Url;

/// Default TTL for `Unavailable` results
pub const DEFAULT_UNAVAILABLE_TTL: Duration = Duration::from_secs(60);

/// Cache key prefix for file targets
pub const FILE_PREFIX: &str = "file";

/// Cache key prefix for directory targets
pub const DIR_PREFIX: &str = "dir";

/// Outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CountResult {
    Lines(u64),
    ChildCount(u64),
    Unavailable,
}

impl CountResult {
    pub fn is_available(&self) -> bool {
        !matches!(self, CountResult::Unavailable)
    }
}

type InFlight = Shared<BoxFuture<'static, CountResult>>;

/// Shared resolver handle; clones share cache, limiter and in-flight map
#[derive(Clone)]
pub struct MetadataResolver {
    inner: Arc<ResolverInner>,
}

pub(crate) struct ResolverInner {
    endpoints: Endpoints,
    fetcher: Arc<dyn Fetcher>,
    limiter: ConcurrencyLimiter,
    cache: Arc<TtlCache<CountResult>>,
    classifier: Arc<Classifier>,
    selectors: SelectorConfig,
    unavailable_ttl: Duration,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl MetadataResolver {
    /// Resolver with default selectors and `Unavailable` TTL
    pub fn new(
        endpoints: Endpoints,
        fetcher: Arc<dyn Fetcher>,
        limiter: ConcurrencyLimiter,
        cache: Arc<TtlCache<CountResult>>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Self::builder(endpoints, fetcher, limiter, cache, classifier).build()
    }

    pub fn builder(
        endpoints: Endpoints,
        fetcher: Arc<dyn Fetcher>,
        limiter: ConcurrencyLimiter,
        cache: Arc<TtlCache<CountResult>>,
        classifier: Arc<Classifier>,
    ) -> ResolverBuilder {
        ResolverBuilder {
            endpoints,
            fetcher,
            limiter,
            cache,
            classifier,
            selectors: SelectorConfig::default(),
            unavailable_ttl: DEFAULT_UNAVAILABLE_TTL,
        }
    }

    /// Resolve by entry kind; `Unknown` is never resolved
    pub async fn resolve(&self, kind: EntryKind, href: &str) -> CountResult {
        match kind {
            EntryKind::File => self.resolve_file(href).await,
            EntryKind::Directory | EntryKind::ParentLink => self.resolve_directory(href).await,
            EntryKind::Unknown => CountResult::Unavailable,
        }
    }

    /// Line count of a file target
    pub async fn resolve_file(&self, href: &str) -> CountResult {
        self.resolve_keyed(FILE_PREFIX, href).await
    }

    /// Direct-child count of a directory target
    pub async fn resolve_directory(&self, href: &str) -> CountResult {
        self.resolve_keyed(DIR_PREFIX, href).await
    }

    /// Keys with a computation currently running
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn cache(&self) -> &Arc<TtlCache<CountResult>> {
        &self.inner.cache
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.inner.limiter
    }

    async fn resolve_keyed(&self, prefix: &'static str, href: &str) -> CountResult {
        let url = match self.inner.endpoints.resolve(href) {
            Ok(url) => url,
            Err(e) => {
                debug!("Unresolvable target {:?}: {}", href, e);
                return CountResult::Unavailable;
            }
        };
        let key = cache_key(prefix, &url);

        let computation = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(shared) = in_flight.get(&key) {
                debug!("Joining in-flight resolution for {}", key);
                shared.clone()
            } else if let Some(cached) = self.inner.cache.get(&key) {
                debug!("Cache hit for {}", key);
                return cached;
            } else {
                let shared = ResolverInner::compute(Arc::clone(&self.inner), prefix, url, key.clone())
                    .boxed()
                    .shared();
                in_flight.insert(key, shared.clone());
                shared
            }
        };

        computation.await
    }
}

/// Builder for `MetadataResolver`
pub struct ResolverBuilder {
    endpoints: Endpoints,
    fetcher: Arc<dyn Fetcher>,
    limiter: ConcurrencyLimiter,
    cache: Arc<TtlCache<CountResult>>,
    classifier: Arc<Classifier>,
    selectors: SelectorConfig,
    unavailable_ttl: Duration,
}

impl ResolverBuilder {
    /// Selectors for rendered-page tiers
    pub fn selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = selectors;
        self
    }

    /// TTL for `Unavailable` results, capped by the cache default
    pub fn unavailable_ttl(mut self, ttl: Duration) -> Self {
        self.unavailable_ttl = ttl;
        self
    }

    pub fn build(self) -> MetadataResolver {
        MetadataResolver {
            inner: Arc::new(ResolverInner {
                endpoints: self.endpoints,
                fetcher: self.fetcher,
                limiter: self.limiter,
                cache: self.cache,
                classifier: self.classifier,
                selectors: self.selectors,
                unavailable_ttl: self.unavailable_ttl,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl ResolverInner {
    async fn compute(self: Arc<Self>, prefix: &'static str, url: Url, key: String) -> CountResult {
        let result = if prefix == FILE_PREFIX {
            self.count_file(&url).await
        } else {
            self.count_directory(&url).await
        };

        let ttl = match result {
            CountResult::Unavailable => self.unavailable_ttl.min(self.cache.default_ttl()),
            _ => self.cache.default_ttl(),
        };
        // Cache before leaving the in-flight map so late joiners see it
        self.cache.set_with_ttl(&key, result, ttl);
        self.in_flight.lock().remove(&key);
        result
    }

    /// GET through the limiter; non-OK statuses become `Error::Http`
    async fn fetch_text(&self, request: FetchRequest) -> Result<String> {
        let fetcher = Arc::clone(&self.fetcher);
        self.limiter
            .schedule(move || async move { fetcher.fetch(request).await?.text() })
            .await
    }

    /// GET through the limiter, decoding an OK body as JSON
    async fn fetch_json(&self, request: FetchRequest) -> Result<Value> {
        let fetcher = Arc::clone(&self.fetcher);
        self.limiter
            .schedule(move || async move { fetcher.fetch(request).await?.json::<Value>() })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_result_wire_format() {
        assert_eq!(
            serde_json::to_string(&CountResult::Lines(3)).unwrap(),
            r#"{"kind":"lines","value":3}"#
        );
        assert_eq!(
            serde_json::to_string(&CountResult::Unavailable).unwrap(),
            r#"{"kind":"unavailable"}"#
        );
        let parsed: CountResult = serde_json::from_str(r#"{"kind":"childCount","value":2}"#).unwrap();
        assert_eq!(parsed, CountResult::ChildCount(2));
    }

    #[test]
    fn test_availability() {
        assert!(CountResult::Lines(0).is_available());
        assert!(!CountResult::Unavailable.is_available());
    }
}

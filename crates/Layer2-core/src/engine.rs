//! Engine - 컴포지션 루트
//!
//! One cache, one limiter, one classifier, one resolver and one decorator
//! per host page. Everything is built from `TallyConfig` unless injected.

use crate::classify::Classifier;
use crate::decorate::{Decorator, RunSummary, ScanReport};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::host::HostPage;
use crate::resolve::{CountResult, MetadataResolver};
use crate::target::Endpoints;
use std::sync::Arc;
use tally_foundation::{
    CacheStats, Clock, ConcurrencyLimiter, Error, LimiterSnapshot, MemorySessionStore, Result,
    SessionStore, SystemClock, TallyConfig, TtlCache, TtlCacheBuilder,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Assembled engine for one host page
pub struct Engine {
    config: TallyConfig,
    limiter: ConcurrencyLimiter,
    cache: Arc<TtlCache<CountResult>>,
    resolver: MetadataResolver,
    decorator: Decorator,
}

impl Engine {
    pub fn builder(config: TallyConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub async fn scan(&self) -> ScanReport {
        self.decorator.scan().await
    }

    pub async fn run(&self, shutdown: CancellationToken) -> RunSummary {
        self.decorator.run(shutdown).await
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn decorator(&self) -> &Decorator {
        &self.decorator
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn limiter_snapshot(&self) -> LimiterSnapshot {
        self.limiter.snapshot()
    }
}

/// Builder for `Engine`; the host page is the only required part
pub struct EngineBuilder {
    config: TallyConfig,
    page: Option<Arc<dyn HostPage>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    session: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    pub fn new(config: TallyConfig) -> Self {
        Self {
            config,
            page: None,
            fetcher: None,
            session: None,
            clock: None,
        }
    }

    pub fn page(mut self, page: Arc<dyn HostPage>) -> Self {
        self.page = Some(page);
        self
    }

    /// Defaults to `HttpFetcher`
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Defaults to an in-memory store
    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        let page = self
            .page
            .ok_or_else(|| Error::Config("engine needs a host page".to_string()))?;

        let endpoints = Endpoints::from_config(&config)?;
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&config.http)?),
        };
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let limiter = ConcurrencyLimiter::new(config.limiter.max_concurrent);
        let cache: Arc<TtlCache<CountResult>> = Arc::new(
            TtlCacheBuilder::new(session)
                .namespace(config.cache.namespace.clone())
                .default_ttl(config.cache.ttl())
                .clock(clock)
                .build(),
        );
        let classifier = Arc::new(Classifier::new(config.classifier.clone()));

        let resolver = MetadataResolver::builder(
            endpoints,
            fetcher,
            limiter.clone(),
            Arc::clone(&cache),
            Arc::clone(&classifier),
        )
        .selectors(config.selectors.clone())
        .unavailable_ttl(config.cache.unavailable_ttl())
        .build();

        let decorator = Decorator::new(page, classifier, resolver.clone(), config.scheduler.clone());

        debug!(
            "Engine ready (max {} concurrent, ttl {:?})",
            limiter.limit(),
            config.cache.ttl()
        );

        Ok(Engine {
            config,
            limiter,
            cache,
            resolver,
            decorator,
        })
    }
}

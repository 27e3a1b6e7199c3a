//! tally-core: Listing Metadata Engine
//!
//! Layer2 - 디렉토리 목록 페이지에 메타데이터 배지 부착
//!
//! # 주요 모듈
//!
//! - `lines`: 줄 수 계산
//! - `target`: href 해석, 캐시 키, 저장소 좌표
//! - `host`: HostPage / HostNode 추상화 + HTML 스냅샷 어댑터
//! - `classify`: 엔트리 종류 판별
//! - `fetch`: Fetcher 추상화 (reqwest / stub)
//! - `resolve`: 파일/디렉토리 fallback 체인
//! - `decorate`: 배지 부착 + 트리거 루프
//! - `engine`: 컴포지션 루트
//!
//! # 사용 예시
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally_core::{Engine, HtmlPage};
//! use tally_foundation::TallyConfig;
//!
//! let config = TallyConfig::load()?;
//! let page = Arc::new(HtmlPage::parse(url, &html, config.selectors.clone()));
//! let engine = Engine::builder(config).page(page.clone()).build()?;
//!
//! let report = engine.scan().await;
//! for node in page.nodes() {
//!     println!("{:?}", node.badge());
//! }
//! ```

pub mod classify;
pub mod decorate;
pub mod engine;
pub mod fetch;
pub mod host;
pub mod lines;
pub mod resolve;
pub mod target;

// Re-exports: Engine
pub use engine::{Engine, EngineBuilder};

// Re-exports: Host
pub use host::{
    group_thousands, parse_listing_document, rendered_line_count, Anchor, Badge, HostNode,
    HostPage, HtmlNode, HtmlPage, ListingDocument,
};

// Re-exports: Classifier
pub use classify::{Classifier, Entry, EntryKind};

// Re-exports: Fetch
pub use fetch::{Credentials, FetchRequest, FetchResponse, Fetcher, HttpFetcher, StaticFetcher};

// Re-exports: Resolver
pub use resolve::{CountResult, MetadataResolver, ResolverBuilder, DEFAULT_UNAVAILABLE_TTL};

// Re-exports: Decoration
pub use decorate::{badge_for, DecorationState, Decorator, RunSummary, ScanReport};

// Re-exports: Target
pub use lines::count_lines;
pub use target::{is_listing_location, Endpoints, RepoCoordinates, View};

//! # tally-foundation
//!
//! Foundation layer for tally:
//! - Error: 공통 에러 타입
//! - Config: 통합 설정 (TallyConfig)
//! - Storage: JsonStore (설정), SessionStore (durable cache tier)
//! - Cache: 2단계 TTL 캐시 (memory + session)
//! - Limiter: FIFO 동시 실행 제한
//! - Event: 호스트 페이지 변경 알림 (ChangeFeed)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  tally-core (classifier, resolver, decorator)           │
//! │          │               │               │              │
//! │          ▼               ▼               ▼              │
//! │      TtlCache    ConcurrencyLimiter   ChangeFeed        │
//! │          │                                              │
//! │          ▼                                              │
//! │   SessionStore (memory / json file)                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod limiter;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    CacheSettings, ClassifierConfig, HttpConfig, LimiterConfig, SchedulerConfig, SelectorConfig,
    TallyConfig, ENV_MAX_CONCURRENT, ENV_TOKEN, TALLY_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonSessionStore, JsonStore, MemorySessionStore, SessionStore};

// ============================================================================
// Cache (캐시 시스템)
// ============================================================================
pub use cache::{CacheStats, TtlCache, TtlCacheBuilder, DEFAULT_NAMESPACE, DEFAULT_TTL};

// ============================================================================
// Clock
// ============================================================================
pub use clock::{duration_ms, Clock, ManualClock, SystemClock};

// ============================================================================
// Limiter (동시 실행 제한)
// ============================================================================
pub use limiter::{ConcurrencyLimiter, LimiterSnapshot, DEFAULT_MAX_CONCURRENT};

// ============================================================================
// Event (변경 알림)
// ============================================================================
pub use event::{ChangeFeed, ListenerHandle, PageEvent, Subscription};

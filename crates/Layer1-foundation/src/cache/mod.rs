//! # tally Cache
//!
//! Two-tier TTL cache shared by every resolver.
//!
//! ```text
//! get(key) ──▶ Memory tier ──hit──▶ value
//!                  │ miss
//!                  ▼
//!              Session tier ──live hit──▶ back-fill memory ──▶ value
//!                  │ miss / expired / store failure
//!                  ▼
//!                absent
//! ```
//!
//! ## Modules
//!
//! - [`two_level`] - `TtlCache` and its builder

pub mod two_level;

pub use two_level::{CacheStats, TtlCache, TtlCacheBuilder, DEFAULT_NAMESPACE, DEFAULT_TTL};

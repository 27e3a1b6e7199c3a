//! Storage module for tally
//!
//! - `json`: JSON - 범용 파일 저장/로드 (설정)
//! - `session`: 세션 범위 key/value 저장소 (durable cache tier)

mod json;
mod session;

// JSON Storage (범용)
pub use json::JsonStore;

// Session Storage (durable cache tier)
pub use session::{JsonSessionStore, MemorySessionStore, SessionStore};

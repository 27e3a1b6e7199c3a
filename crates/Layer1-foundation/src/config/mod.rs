//! Config - 통합 설정 관리
//!
//! - `tally.rs` - TallyConfig 통합 설정 (global + project + env)

mod tally;

pub use tally::{
    CacheSettings, ClassifierConfig, HttpConfig, LimiterConfig, SchedulerConfig, SelectorConfig,
    TallyConfig, ENV_MAX_CONCURRENT, ENV_TOKEN, TALLY_CONFIG_FILE,
};

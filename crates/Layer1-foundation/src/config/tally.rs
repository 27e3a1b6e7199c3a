//! Tally Config - 통합 설정
//!
//! 엔드포인트, 캐시, 리미터, 스케줄러, 셀렉터 설정을 하나로 관리

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const TALLY_CONFIG_FILE: &str = "tally.json";

/// Environment override for the limiter size
pub const ENV_MAX_CONCURRENT: &str = "TALLY_MAX_CONCURRENT";

/// Environment source of the bearer token
pub const ENV_TOKEN: &str = "TALLY_TOKEN";

const MAX_CONCURRENCY_CAP: usize = 32;

// ============================================================================
// Tally Config (통합)
// ============================================================================

/// tally 통합 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Origin of the listing site (`https://github.com`)
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Alternate raw-content host
    #[serde(default = "default_raw_host")]
    pub raw_host: String,

    /// Structured listing API base
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub limiter: LimiterConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            raw_host: default_raw_host(),
            api_base: default_api_base(),
            limiter: LimiterConfig::default(),
            cache: CacheSettings::default(),
            scheduler: SchedulerConfig::default(),
            http: HttpConfig::default(),
            selectors: SelectorConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl TallyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드, then environment overrides
    pub fn load() -> Result<Self> {
        let mut stores = Vec::new();
        if let Ok(global) = JsonStore::global() {
            stores.push(global);
        }
        if let Ok(project) = JsonStore::current_project() {
            stores.push(project);
        }

        let mut config = Self::load_from(&stores)?;
        config.apply_env();
        Ok(config)
    }

    /// Merge `tally.json` from each store in order; later stores win key by key
    pub fn load_from(stores: &[JsonStore]) -> Result<Self> {
        let mut merged = Value::Object(Default::default());
        for store in stores {
            if let Some(layer) = store.load_optional::<Value>(TALLY_CONFIG_FILE)? {
                debug!("Loaded config layer from {}", store.base_dir().display());
                merge_json(&mut merged, layer);
            }
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Apply `TALLY_MAX_CONCURRENT` and `TALLY_TOKEN` if set
    pub fn apply_env(&mut self) {
        let raw = std::env::var(ENV_MAX_CONCURRENT).ok();
        self.limiter.max_concurrent =
            parse_max_concurrent(raw.as_deref(), self.limiter.max_concurrent);

        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                self.http.token = Some(token.trim().to_string());
            }
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.limiter.max_concurrent = max.clamp(1, MAX_CONCURRENCY_CAP);
        self
    }

    pub fn ttl_secs(mut self, secs: u64) -> Self {
        self.cache.ttl_secs = secs;
        self
    }
}

/// Deep merge: objects merge recursively, everything else is replaced
fn merge_json(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_max_concurrent(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_CONCURRENCY_CAP)
}

// ============================================================================
// Sections
// ============================================================================

/// 리미터 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// 캐시 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// TTL for `Unavailable` results
    #[serde(default = "default_unavailable_ttl_secs")]
    pub unavailable_ttl_secs: u64,

    /// Session store key prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            unavailable_ttl_secs: default_unavailable_ttl_secs(),
            namespace: default_namespace(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn unavailable_ttl(&self) -> Duration {
        Duration::from_secs(self.unavailable_ttl_secs)
    }
}

/// 스케줄러 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Late-render retries after initial load (0 disables)
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            retry_max: default_retry_max(),
        }
    }
}

impl SchedulerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// HTTP 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bearer token for credentialed requests; never written back to disk
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            token: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// CSS selectors used to find the listing in a host document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    /// Main content scopes, first match wins
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// File-list containers inside the scope, first match wins
    #[serde(default = "default_containers")]
    pub containers: Vec<String>,

    /// Row queries inside the container, first non-empty wins
    #[serde(default = "default_rows")]
    pub rows: Vec<String>,

    /// Rendered-document regions that never hold entries
    #[serde(default = "default_prose")]
    pub prose: Vec<String>,

    /// Per-line table rows on a rendered file page
    #[serde(default = "default_line_rows")]
    pub line_rows: Vec<String>,

    /// Code cell within a per-line row
    #[serde(default = "default_line_cells")]
    pub line_cells: Vec<String>,

    /// Single preformatted blocks on a rendered file page
    #[serde(default = "default_preformatted")]
    pub preformatted: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            containers: default_containers(),
            rows: default_rows(),
            prose: default_prose(),
            line_rows: default_line_rows(),
            line_cells: default_line_cells(),
            preformatted: default_preformatted(),
        }
    }
}

/// Link scoring and kind markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Href fragments of file links
    #[serde(default = "default_file_link_patterns")]
    pub file_link_patterns: Vec<String>,

    /// Href fragments of directory links
    #[serde(default = "default_directory_link_patterns")]
    pub directory_link_patterns: Vec<String>,

    /// Classes of a row's primary link
    #[serde(default = "default_primary_classes")]
    pub primary_classes: Vec<String>,

    /// Kind markers below are compared whole against a label's trailing
    /// `(...)` group (or the whole label), hint values and link classes
    #[serde(default = "default_parent_markers")]
    pub parent_markers: Vec<String>,

    #[serde(default = "default_file_markers")]
    pub file_markers: Vec<String>,

    #[serde(default = "default_directory_markers")]
    pub directory_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            file_link_patterns: default_file_link_patterns(),
            directory_link_patterns: default_directory_link_patterns(),
            primary_classes: default_primary_classes(),
            parent_markers: default_parent_markers(),
            file_markers: default_file_markers(),
            directory_markers: default_directory_markers(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_version() -> u32 {
    1
}

fn default_origin() -> String {
    "https://github.com".to_string()
}

fn default_raw_host() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_unavailable_ttl_secs() -> u64 {
    60
}

fn default_namespace() -> String {
    "tally:".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_retry_max() -> u32 {
    14
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("tally/{}", env!("CARGO_PKG_VERSION"))
}

fn default_scopes() -> Vec<String> {
    strings(&[
        "turbo-frame#repo-content-turbo-frame",
        "#repo-content-pjax-container",
        "main",
        "div[data-testid=\"repository-content\"]",
        "div.repository-content",
    ])
}

fn default_containers() -> Vec<String> {
    strings(&[
        "section[aria-labelledby=\"files\"]",
        "div[aria-labelledby=\"files\"]",
        "[data-testid=\"filesystem-browser\"]",
        "div[data-test-selector=\"files-container\"]",
        "div[role=\"treegrid\"]",
        "table[role=\"grid\"]",
        "div.js-navigation-container",
    ])
}

fn default_rows() -> Vec<String> {
    strings(&[
        "div[role=\"row\"][data-test-selector=\"tree-row\"]",
        "div[role=\"row\"].react-directory-row",
        "div[role=\"rowgroup\"] > div[role=\"row\"]",
        "[role=\"row\"]",
        "div.js-navigation-container > div.js-navigation-item",
        "div.Box > div.Box-row",
        "tbody tr",
    ])
}

fn default_prose() -> Vec<String> {
    strings(&["#readme", "article.markdown-body"])
}

fn default_line_rows() -> Vec<String> {
    strings(&[
        "table.js-file-line-container tr",
        "table.highlight tr",
        "[data-testid=\"code-lines-container\"] [data-line-number]",
    ])
}

fn default_line_cells() -> Vec<String> {
    strings(&["td.blob-code", "td.js-file-line"])
}

fn default_preformatted() -> Vec<String> {
    strings(&["textarea#read-only-cursor-text-area", "pre"])
}

fn default_file_link_patterns() -> Vec<String> {
    strings(&["/blob/"])
}

fn default_directory_link_patterns() -> Vec<String> {
    strings(&["/tree/"])
}

fn default_primary_classes() -> Vec<String> {
    strings(&["js-navigation-open", "Link--primary"])
}

fn default_parent_markers() -> Vec<String> {
    strings(&[
        "parent directory",
        "go to parent directory",
        "parent-directory",
        "up-tree",
    ])
}

fn default_file_markers() -> Vec<String> {
    strings(&["(file)"])
}

fn default_directory_markers() -> Vec<String> {
    strings(&["(directory)", "folder", "(submodule)"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TallyConfig::default();
        assert_eq!(config.limiter.max_concurrent, 4);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.scheduler.debounce(), Duration::from_millis(200));
        assert_eq!(config.scheduler.retry_max, 14);
        assert_eq!(config.origin, "https://github.com");
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: TallyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TallyConfig::default());
    }

    #[test]
    fn test_camel_case_fields() {
        let config: TallyConfig = serde_json::from_str(
            r#"{"rawHost": "https://raw.example.com", "cache": {"ttlSecs": 60}}"#,
        )
        .unwrap();
        assert_eq!(config.raw_host, "https://raw.example.com");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.unavailable_ttl_secs, 60);
        assert_eq!(config.cache.namespace, "tally:");
    }

    #[test]
    fn test_project_overrides_global_key_by_key() {
        let global_dir = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();

        std::fs::write(
            global_dir.path().join(TALLY_CONFIG_FILE),
            r#"{"limiter": {"maxConcurrent": 8}, "cache": {"ttlSecs": 30, "namespace": "g:"}}"#,
        )
        .unwrap();
        std::fs::write(
            project_dir.path().join(TALLY_CONFIG_FILE),
            r#"{"cache": {"ttlSecs": 10}}"#,
        )
        .unwrap();

        let config = TallyConfig::load_from(&[
            JsonStore::new(global_dir.path()),
            JsonStore::new(project_dir.path()),
        ])
        .unwrap();

        assert_eq!(config.limiter.max_concurrent, 8);
        assert_eq!(config.cache.ttl_secs, 10);
        assert_eq!(config.cache.namespace, "g:");
    }

    #[test]
    fn test_load_from_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = TallyConfig::load_from(&[JsonStore::new(dir.path())]).unwrap();
        assert_eq!(config, TallyConfig::default());
    }

    #[test]
    fn test_parse_max_concurrent() {
        assert_eq!(parse_max_concurrent(None, 4), 4);
        assert_eq!(parse_max_concurrent(Some(" 6 "), 4), 6);
        assert_eq!(parse_max_concurrent(Some("0"), 4), 1);
        assert_eq!(parse_max_concurrent(Some("999"), 4), MAX_CONCURRENCY_CAP);
        assert_eq!(parse_max_concurrent(Some("lots"), 4), 4);
        assert_eq!(parse_max_concurrent(Some(""), 4), 4);
    }

    #[test]
    fn test_token_not_serialized() {
        let mut config = TallyConfig::default();
        config.http.token = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}

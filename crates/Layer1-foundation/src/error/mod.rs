//! Error types for tally
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tally 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 네트워크 관련 (tier failures)
    // ========================================================================
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    // ========================================================================
    // 분류 / 해석
    // ========================================================================
    #[error("Ambiguous entry: {0}")]
    Classification(String),

    #[error("All tiers exhausted for {0}")]
    Exhausted(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that advance a resolver to its next fallback tier
    pub fn is_tier_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Http { .. } | Error::Parse(_) | Error::Json(_)
        )
    }

    /// Non-OK response helper
    pub fn http(status: u16, url: impl Into<String>) -> Self {
        Error::Http {
            status,
            url: url.into(),
        }
    }

    /// Rate limiting and auth failures are ordinary tier failures, but worth
    /// calling out in logs.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::Http { status, .. } if matches!(*status, 401 | 403 | 429))
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_failures() {
        assert!(Error::Network("reset".into()).is_tier_failure());
        assert!(Error::http(404, "https://example.com/x").is_tier_failure());
        assert!(Error::Parse("no pre".into()).is_tier_failure());
        assert!(!Error::Config("bad".into()).is_tier_failure());
        assert!(!Error::Internal("oops".into()).is_tier_failure());
    }

    #[test]
    fn test_access_denied() {
        assert!(Error::http(429, "u").is_access_denied());
        assert!(Error::http(403, "u").is_access_denied());
        assert!(!Error::http(500, "u").is_access_denied());
    }

    #[test]
    fn test_http_display() {
        let err = Error::http(404, "https://example.com/raw/x");
        assert_eq!(err.to_string(), "HTTP 404 for https://example.com/raw/x");
    }
}

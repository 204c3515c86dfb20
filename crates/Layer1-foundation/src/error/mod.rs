//! Error types for Fieldkit
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fieldkit 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 사용자 입력 관련
    // ========================================================================
    /// Bad or missing arguments, unknown plugin. Surfaced before any
    /// plugin code runs.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    /// A plugin factory failed or produced a malformed descriptor. Logged
    /// and skipped at registration; never propagated past one plugin.
    #[error("Plugin load error: {0}")]
    PluginLoad(String),

    /// A process plugin violated the stdio protocol (unparseable JSON,
    /// wrong exit semantics).
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ========================================================================
    // 인증 관련
    // ========================================================================
    #[error("Authentication error: {0}")]
    Auth(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 변환 에러
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // 내부 에러
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 사용자 입력 문제인지 확인 (스택 트레이스 없이 한 줄 메시지로 처리)
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_) | Error::InvalidInput(_) | Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_classification() {
        assert!(Error::Usage("bad flag".into()).is_usage());
        assert!(Error::NotFound("plugin".into()).is_usage());
        assert!(!Error::Internal("boom".into()).is_usage());
    }

    #[test]
    fn test_display_one_line() {
        let err = Error::Auth("token expired".into());
        assert_eq!(err.to_string(), "Authentication error: token expired");
    }
}

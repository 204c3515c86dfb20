//! Fieldkit Config - 사용자 설정
//!
//! ~/.config/fieldkit/config.toml 을 로드합니다.
//! 파일이 없으면 기본값을 사용하고, FIELDKIT_CONFIG 환경변수로 경로를
//! 재정의할 수 있습니다.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 설정 파일 경로 재정의용 환경변수
pub const CONFIG_ENV_VAR: &str = "FIELDKIT_CONFIG";

/// Fieldkit 설정 디렉토리 (~/.config/fieldkit)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldkit")
}

/// Fieldkit 사용자 설정
///
/// 알려진 키 외의 항목은 `extra`로 수집되어 플러그인의 ExecutionContext
/// config 맵으로 그대로 전달됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldkitConfig {
    /// 인증 토큰을 출력하는 외부 명령 (stdout 한 줄)
    pub auth_command: Vec<String>,

    /// 인증 명령 타임아웃 (초)
    pub auth_timeout_secs: u64,

    /// 프로세스 플러그인 실행 타임아웃 (초, 0 = 무제한)
    pub run_timeout_secs: u64,

    /// 설치 시 introspection 타임아웃 (초)
    pub introspect_timeout_secs: u64,

    /// 취소 시 자식 프로세스 종료 유예 시간 (초)
    pub kill_grace_secs: u64,

    /// 그 외 자유 형식 설정 (플러그인으로 전달)
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

impl Default for FieldkitConfig {
    fn default() -> Self {
        Self {
            auth_command: vec!["fieldctl".into(), "auth".into(), "token".into()],
            auth_timeout_secs: 30,
            run_timeout_secs: 0,
            introspect_timeout_secs: 10,
            kill_grace_secs: 5,
            extra: HashMap::new(),
        }
    }
}

impl FieldkitConfig {
    /// 표준 해석 순서로 설정 로드
    ///
    /// 1. FIELDKIT_CONFIG 환경변수 경로
    /// 2. ~/.config/fieldkit/config.toml
    /// 3. 기본값 (파일 없음)
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_from(Path::new(&path));
        }

        let default_path = config_dir().join("config.toml");
        if default_path.exists() {
            return Self::load_from(&default_path);
        }

        Ok(Self::default())
    }

    /// 명시적 경로에서 설정 로드
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config at {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// extra 설정을 JSON 맵으로 변환 (ExecutionContext 전달용)
    pub fn extra_as_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.extra
            .iter()
            .filter_map(|(k, v)| {
                serde_json::to_value(v).ok().map(|json| (k.clone(), json))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FieldkitConfig::default();
        assert_eq!(config.auth_command[0], "fieldctl");
        assert_eq!(config.introspect_timeout_secs, 10);
        assert_eq!(config.run_timeout_secs, 0);
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
auth_command = ["echo", "token"]
run_timeout_secs = 120

[registry]
url = "https://internal.example.com"
"#,
        )
        .unwrap();

        let config = FieldkitConfig::load_from(&path).unwrap();
        assert_eq!(config.auth_command, vec!["echo", "token"]);
        assert_eq!(config.run_timeout_secs, 120);
        // 알려지지 않은 키는 extra로 수집
        assert!(config.extra.contains_key("registry"));

        let json = config.extra_as_json();
        assert_eq!(json["registry"]["url"], "https://internal.example.com");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = FieldkitConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

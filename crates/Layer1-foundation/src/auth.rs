//! Auth - 인증 토큰 공급자
//!
//! 플러그인 실행에 필요한 bearer 토큰을 외부 identity CLI에서 가져옵니다.
//! 토큰 획득 방식 자체는 외부 협력자이며, 여기서는 인터페이스와 기본
//! 구현(명령 실행)만 제공합니다.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// 토큰 공급자 인터페이스
///
/// Dispatcher는 requires_auth = true 인 플러그인을 실행하기 직전에만
/// 이 인터페이스를 호출합니다.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Bearer 토큰 반환. 획득 불가 시 Error::Auth.
    async fn token(&self) -> Result<String>;
}

// ============================================================================
// CommandTokenProvider - 외부 명령 실행
// ============================================================================

/// 설정된 외부 명령을 실행해 stdout에서 토큰을 읽는 공급자
pub struct CommandTokenProvider {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandTokenProvider {
    /// 새 공급자 생성
    ///
    /// `command`는 argv 형식 (예: ["fieldctl", "auth", "token"]).
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl TokenProvider for CommandTokenProvider {
    async fn token(&self) -> Result<String> {
        let program = self.command.first().ok_or_else(|| {
            Error::Config("auth_command is empty; set it in config.toml".to_string())
        })?;

        if which::which(program).is_err() {
            return Err(Error::Auth(format!(
                "'{}' is not installed. Install it and authenticate, or set \
                 auth_command in {}/config.toml",
                program,
                crate::config::config_dir().display()
            )));
        }

        debug!("Fetching auth token via {:?}", self.command);

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .args(&self.command[1..])
                .output(),
        )
        .await
        .map_err(|_| {
            Error::Auth(format!(
                "'{}' timed out after {}s",
                program,
                self.timeout.as_secs()
            ))
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Auth(format!(
                "'{}' failed. Run '{} auth login' first. Error: {}",
                program,
                program,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ============================================================================
// StaticTokenProvider - 고정 토큰 (테스트 및 CI용)
// ============================================================================

/// 고정 문자열을 반환하는 공급자
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

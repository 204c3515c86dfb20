//! Execution Context - 호출 단위 실행 컨텍스트
//!
//! 인증 토큰, 설정, 진행률 보고, 취소 신호를 하나로 묶어 run에 전달합니다.
//! Dispatcher가 호출 직전에 생성하고 호출이 끝나면 폐기합니다.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 진행률 보고 콜백 (fraction 0.0~1.0, message)
pub type ProgressSink = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// 플러그인 실행 컨텍스트
#[derive(Clone)]
pub struct ExecutionContext {
    /// 사전 해석된 인증 토큰 (requires_auth=false면 빈 문자열)
    pub auth_token: String,

    /// 자유 형식 설정 맵
    pub config: Map<String, Value>,

    /// 진행률 콜백
    progress: ProgressSink,

    /// 취소 토큰 (level-triggered)
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// 빈 컨텍스트 생성 (토큰 없음, 진행률 무시)
    pub fn new() -> Self {
        Self {
            auth_token: String::new(),
            config: Map::new(),
            progress: Arc::new(|_, _| {}),
            cancel: CancellationToken::new(),
        }
    }

    /// 인증 토큰 설정
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    /// 설정 맵 설정
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// 진행률 콜백 설정
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    /// 취소 토큰 설정
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // ========================================================================
    // 플러그인 측 API
    // ========================================================================

    /// 진행률 보고
    ///
    /// fraction은 [0, 1]로 클램프됩니다. 비단조 보정(뒤로 가는 값)도
    /// 그대로 전달합니다.
    pub fn progress(&self, fraction: f64, message: &str) {
        (self.progress)(fraction.clamp(0.0, 1.0), message);
    }

    /// 취소 요청 여부 확인
    ///
    /// 협조적 취소: 컨텍스트가 플러그인 코드를 중단시키지 않습니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 취소 토큰 핸들 (select! 등 비동기 대기용)
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

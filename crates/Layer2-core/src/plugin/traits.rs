//! Plugin traits - 핵심 플러그인 인터페이스
//!
//! 모든 전달 메커니즘(native, process)이 동일한 호출 계약을 따릅니다.

use super::capability::CapabilityDescriptor;
use super::context::ExecutionContext;
use async_trait::async_trait;
use fieldkit_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 플러그인 run에 전달되는 인자 맵 (capability 이름 → 타입 있는 값)
pub type ArgValues = Map<String, Value>;

// ============================================================================
// RunStatus / RunOutcome - 실행 결과
// ============================================================================

/// 실행 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// 성공
    Success,
    /// 실패
    Failure,
    /// 부분 성공
    Partial,
    /// 사용자 취소
    Cancelled,
}

/// 모든 플러그인 run이 반환하는 결과
///
/// 생성 이후 변경되지 않습니다. stdio 프로토콜의 터미널 JSON 객체와
/// 동일하게 직렬화됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// 전체 결과
    pub status: RunStatus,

    /// 사람이 읽는 한 줄 요약
    #[serde(default)]
    pub summary: String,

    /// 구조화된 출력 (JSON 직렬화 가능)
    #[serde(default)]
    pub data: Map<String, Value>,

    /// 산출물 이름 → 파일 경로
    #[serde(default)]
    pub artifacts: std::collections::BTreeMap<String, String>,
}

impl RunOutcome {
    /// 성공 결과 생성
    pub fn success(summary: impl Into<String>) -> Self {
        Self::with_status(RunStatus::Success, summary)
    }

    /// 실패 결과 생성
    pub fn failure(summary: impl Into<String>) -> Self {
        Self::with_status(RunStatus::Failure, summary)
    }

    /// 취소 결과 생성
    pub fn cancelled(summary: impl Into<String>) -> Self {
        Self::with_status(RunStatus::Cancelled, summary)
    }

    /// 상태 지정 생성
    pub fn with_status(status: RunStatus, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            data: Map::new(),
            artifacts: std::collections::BTreeMap::new(),
        }
    }

    /// 구조화된 출력 추가
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// 산출물 추가
    pub fn with_artifact(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.artifacts.insert(name.into(), path.into());
        self
    }
}

// ============================================================================
// PluginDescriptor - 플러그인 메타데이터
// ============================================================================

/// 플러그인 메타데이터와 capability 스키마
///
/// 이름이 곧 식별자입니다. introspection 캐시에 그대로 직렬화되며,
/// stdio 프로토콜의 introspection 응답 형식과 동일합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// 고유 이름 (레지스트리 키)
    pub name: String,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// semver 버전 문자열
    pub version: String,

    /// 인증 토큰 필요 여부
    #[serde(default)]
    pub requires_auth: bool,

    /// 선언된 파라미터 목록
    #[serde(rename = "params", default)]
    pub capabilities: Vec<CapabilityDescriptor>,
}

impl PluginDescriptor {
    /// 새 descriptor 생성
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: version.into(),
            requires_auth: false,
            capabilities: Vec::new(),
        }
    }

    /// 설명 설정
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 인증 필요로 설정
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// capability 추가
    pub fn with_capability(mut self, cap: CapabilityDescriptor) -> Self {
        self.capabilities.push(cap);
        self
    }

    /// 구조적 적합성 검사
    ///
    /// 등록 시 한 번 수행됩니다. 위반하는 플러그인은 로그 후 제외되며
    /// 다른 플러그인에 영향을 주지 않습니다.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::PluginLoad("plugin with empty name".to_string()));
        }

        if !is_semver_like(&self.version) {
            return Err(Error::PluginLoad(format!(
                "plugin '{}' has invalid version '{}'",
                self.name, self.version
            )));
        }

        for cap in &self.capabilities {
            cap.validate().map_err(|e| {
                Error::PluginLoad(format!("plugin '{}': {}", self.name, e))
            })?;
        }

        Ok(())
    }
}

/// "1", "1.2", "1.2.3" 형태의 버전 문자열인지 확인
fn is_semver_like(version: &str) -> bool {
    let core = version.split(['-', '+']).next().unwrap_or("");
    if core.is_empty() {
        return false;
    }
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() <= 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

// ============================================================================
// ToolPlugin - 모든 플러그인이 구현하는 인터페이스
// ============================================================================

/// 플러그인 트레이트
///
/// Native adapter는 이 트레이트를 직접 구현하고, Process adapter는
/// 캐시된 descriptor를 감싸 동일한 계약을 제공합니다.
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    /// 플러그인 descriptor 반환 (capability 목록 포함)
    fn descriptor(&self) -> PluginDescriptor;

    /// 플러그인 실행
    ///
    /// `args`의 값은 선언된 타입으로 이미 강제 변환되어 있습니다.
    /// 취소는 협조적입니다: 긴 루프에서 `ctx.is_cancelled()`를 주기적으로
    /// 확인해야 합니다.
    async fn run(&self, args: ArgValues, ctx: &ExecutionContext) -> Result<RunOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::capability::ValueKind;

    #[test]
    fn test_descriptor_validate() {
        let descriptor = PluginDescriptor::new("scan", "1.2.3")
            .with_description("Scan things")
            .with_capability(
                CapabilityDescriptor::new("org", "Target org").required(),
            );
        assert!(descriptor.validate().is_ok());

        assert!(PluginDescriptor::new("", "1.0.0").validate().is_err());
        assert!(PluginDescriptor::new("x", "not a version")
            .validate()
            .is_err());
    }

    #[test]
    fn test_descriptor_rejects_bad_capability() {
        let descriptor = PluginDescriptor::new("scan", "1.0.0").with_capability(
            CapabilityDescriptor::new("mode", "")
                .required()
                .with_default("fast"),
        );
        let err = descriptor.validate().unwrap_err();
        assert!(err.to_string().contains("scan"));
    }

    #[test]
    fn test_semver_like() {
        assert!(is_semver_like("1"));
        assert!(is_semver_like("1.0"));
        assert!(is_semver_like("1.0.3"));
        assert!(is_semver_like("1.0.0-rc.1"));
        assert!(!is_semver_like(""));
        assert!(!is_semver_like("one.two"));
        assert!(!is_semver_like("1.0.0.0"));
    }

    #[test]
    fn test_outcome_protocol_round_trip() {
        let raw = r#"{"status":"partial","summary":"3 of 5","data":{"count":3},"artifacts":{"report":"/tmp/r.csv"}}"#;
        let outcome: RunOutcome = serde_json::from_str(raw).unwrap();
        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.data["count"], 3);
        assert_eq!(outcome.artifacts["report"], "/tmp/r.csv");
    }

    #[test]
    fn test_descriptor_protocol_shape() {
        let raw = r#"{"name":"probe","description":"d","version":"1.0.0","requires_auth":false,"params":[]}"#;
        let descriptor: PluginDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.name, "probe");
        assert!(descriptor.capabilities.is_empty());

        // params 필드명으로 다시 직렬화
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("params").is_some());
    }

    #[test]
    fn test_capability_kinds_preserved() {
        let descriptor = PluginDescriptor::new("t", "1.0.0")
            .with_capability(CapabilityDescriptor::new("n", "").with_kind(ValueKind::Float));
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: PluginDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}

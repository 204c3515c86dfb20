//! Capability Descriptor - 플러그인 파라미터 선언
//!
//! CLI 인자 생성과 스키마 생성이 공유하는 선언적 파라미터 스키마입니다.
//! CLI나 전송 계층에 종속된 타입을 포함하지 않습니다.

use fieldkit_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ValueKind - 파라미터 값 타입
// ============================================================================

/// Capability 값 타입
///
/// stdio 프로토콜의 "type" 필드와 동일하게 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 문자열 (기본)
    #[default]
    Str,
    /// 정수
    Int,
    /// 실수
    Float,
    /// 불리언 (CLI에서는 presence flag)
    Bool,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

// ============================================================================
// CapabilityDescriptor - 단일 파라미터 선언
// ============================================================================

/// 플러그인이 선언하는 하나의 타입 있는 입력 파라미터
///
/// 불변식:
/// - required이면 default가 없어야 함
/// - allowed_values가 있으면 default는 그 안에 포함되어야 함
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// 파라미터 이름 (CLI 플래그 --name, JSON 키)
    pub name: String,

    /// 도움말 텍스트
    #[serde(default)]
    pub description: String,

    /// 값 타입
    #[serde(rename = "type", default)]
    pub value_kind: ValueKind,

    /// 필수 여부
    #[serde(default)]
    pub required: bool,

    /// 기본값 (required가 아닐 때만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// 허용되는 값 목록
    #[serde(rename = "choices", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl CapabilityDescriptor {
    /// 새 descriptor 생성 (str, optional)
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value_kind: ValueKind::Str,
            required: false,
            default: None,
            allowed_values: None,
        }
    }

    /// 값 타입 설정
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = kind;
        self
    }

    /// 필수로 설정
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// 기본값 설정
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// 허용 값 목록 설정
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// 불변식 검사
    ///
    /// 등록 시 한 번 수행되며, 위반 시 해당 플러그인은 제외됩니다.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::PluginLoad("capability with empty name".to_string()));
        }

        if self.required && self.default.is_some() {
            return Err(Error::PluginLoad(format!(
                "capability '{}' is required but declares a default",
                self.name
            )));
        }

        if let (Some(default), Some(allowed)) = (&self.default, &self.allowed_values) {
            let as_text = match default {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !allowed.contains(&as_text) {
                return Err(Error::PluginLoad(format!(
                    "capability '{}' default '{}' is not in allowed values [{}]",
                    self.name,
                    as_text,
                    allowed.join(", ")
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Schema - 비-CLI 표현
// ============================================================================

/// Descriptor 목록을 JSON Schema 형태의 객체로 변환
///
/// 원격 서비스 프런트엔드가 wire 스키마로 재사용할 수 있습니다.
pub fn schema_object(capabilities: &[CapabilityDescriptor]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for cap in capabilities {
        let mut prop = serde_json::Map::new();
        prop.insert(
            "type".to_string(),
            Value::String(
                match cap.value_kind {
                    ValueKind::Str => "string",
                    ValueKind::Int => "integer",
                    ValueKind::Float => "number",
                    ValueKind::Bool => "boolean",
                }
                .to_string(),
            ),
        );
        if !cap.description.is_empty() {
            prop.insert(
                "description".to_string(),
                Value::String(cap.description.clone()),
            );
        }
        if let Some(default) = &cap.default {
            prop.insert("default".to_string(), default.clone());
        }
        if let Some(allowed) = &cap.allowed_values {
            prop.insert(
                "enum".to_string(),
                Value::Array(allowed.iter().cloned().map(Value::String).collect()),
            );
        }
        if cap.required {
            required.push(Value::String(cap.name.clone()));
        }
        properties.insert(cap.name.clone(), Value::Object(prop));
    }

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

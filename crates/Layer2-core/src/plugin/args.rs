//! Argument coercion - 문자열 입력을 타입 있는 값으로 변환
//!
//! CapabilityDescriptor 목록 하나로 CLI 인자 표면과 이 변환 함수를
//! 모두 만들 수 있습니다. 변환은 전송 방식과 무관하게 문자열 맵을
//! 받습니다.

use super::capability::{CapabilityDescriptor, ValueKind};
use super::traits::ArgValues;
use fieldkit_foundation::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// 문자열 입력 맵을 선언된 타입의 값 맵으로 변환
///
/// 규칙:
/// - bool capability는 presence flag: 입력에 있으면 true로 파싱, 없으면
///   선언된 default (없으면 false)
/// - 필수 값 누락, allowed_values 위반, 파싱 실패, 선언되지 않은 키는
///   모두 Error::Usage — 플러그인이 호출되기 전에 실패합니다
/// - optional인데 입력도 default도 없으면 결과 맵에서 생략
pub fn coerce_args(
    capabilities: &[CapabilityDescriptor],
    input: &HashMap<String, String>,
) -> Result<ArgValues> {
    // 선언되지 않은 키 거부
    for key in input.keys() {
        if !capabilities.iter().any(|c| &c.name == key) {
            return Err(Error::Usage(format!("unknown argument '--{}'", key)));
        }
    }

    let mut values = ArgValues::new();

    for cap in capabilities {
        match input.get(&cap.name) {
            Some(raw) => {
                let value = coerce_one(cap, raw)?;
                check_allowed(cap, raw)?;
                values.insert(cap.name.clone(), value);
            }
            None => {
                if cap.required {
                    return Err(Error::Usage(format!(
                        "missing required argument '--{}'",
                        cap.name
                    )));
                }
                match (&cap.default, cap.value_kind) {
                    (Some(default), _) => {
                        values.insert(cap.name.clone(), default.clone());
                    }
                    // bool은 항상 값이 있어야 함: 기본 false
                    (None, ValueKind::Bool) => {
                        values.insert(cap.name.clone(), Value::Bool(false));
                    }
                    (None, _) => {}
                }
            }
        }
    }

    Ok(values)
}

/// 단일 값을 선언된 타입으로 파싱
fn coerce_one(cap: &CapabilityDescriptor, raw: &str) -> Result<Value> {
    match cap.value_kind {
        ValueKind::Str => Ok(Value::String(raw.to_string())),
        ValueKind::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| usage(cap, raw, "an integer")),
        ValueKind::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| usage(cap, raw, "a number")),
        ValueKind::Bool => match raw {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(usage(cap, raw, "a boolean")),
        },
    }
}

/// allowed_values 위반 검사
fn check_allowed(cap: &CapabilityDescriptor, raw: &str) -> Result<()> {
    if let Some(allowed) = &cap.allowed_values {
        if !allowed.iter().any(|a| a == raw) {
            return Err(Error::Usage(format!(
                "invalid value '{}' for '--{}' (choose from: {})",
                raw,
                cap.name,
                allowed.join(", ")
            )));
        }
    }
    Ok(())
}

fn usage(cap: &CapabilityDescriptor, raw: &str, expected: &str) -> Error {
    Error::Usage(format!(
        "invalid value '{}' for '--{}': expected {}",
        raw, cap.name, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new("org", "Target org").required(),
            CapabilityDescriptor::new("limit", "Max items")
                .with_kind(ValueKind::Int)
                .with_default(10),
            CapabilityDescriptor::new("ratio", "Sample ratio").with_kind(ValueKind::Float),
            CapabilityDescriptor::new("verbose", "Verbose output").with_kind(ValueKind::Bool),
            CapabilityDescriptor::new("mode", "Mode").with_allowed_values(["fast", "full"]),
        ]
    }

    fn input(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_coerce_typed_output() {
        let values = coerce_args(
            &caps(),
            &input(&[
                ("org", "acme"),
                ("limit", "42"),
                ("ratio", "0.5"),
                ("verbose", "true"),
                ("mode", "fast"),
            ]),
        )
        .unwrap();

        assert_eq!(values["org"], "acme");
        assert_eq!(values["limit"], 42);
        assert_eq!(values["ratio"], 0.5);
        assert_eq!(values["verbose"], true);
        assert_eq!(values["mode"], "fast");
    }

    #[test]
    fn test_missing_required_names_capability() {
        let err = coerce_args(&caps(), &input(&[])).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("--org"));
    }

    #[test]
    fn test_defaults_applied() {
        let values = coerce_args(&caps(), &input(&[("org", "acme")])).unwrap();
        assert_eq!(values["limit"], 10); // 선언된 default
        assert_eq!(values["verbose"], false); // bool은 기본 false
        assert!(values.get("ratio").is_none()); // default 없는 optional은 생략
        assert!(values.get("mode").is_none());
    }

    #[test]
    fn test_allowed_values_violation() {
        let err =
            coerce_args(&caps(), &input(&[("org", "a"), ("mode", "turbo")])).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("fast, full"));
    }

    #[test]
    fn test_bad_int_is_usage_error() {
        let err =
            coerce_args(&caps(), &input(&[("org", "a"), ("limit", "many")])).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("--limit"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err =
            coerce_args(&caps(), &input(&[("org", "a"), ("bogus", "x")])).unwrap_err();
        assert!(err.to_string().contains("--bogus"));
    }

    #[test]
    fn test_bool_flag_explicit_true() {
        let cap = vec![CapabilityDescriptor::new("force", "Force")
            .with_kind(ValueKind::Bool)
            .with_default(true)];
        let values = coerce_args(&cap, &input(&[])).unwrap();
        assert_eq!(values["force"], true); // 명시적 default true 존중
    }
}

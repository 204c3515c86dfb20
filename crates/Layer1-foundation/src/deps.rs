//! Deps - 외부 바이너리 존재 확인
//!
//! 플러그인이 요구하는 CLI 도구가 실행 경로에 있는지 검사합니다.
//! 시스템 의존성 설치기의 idempotence 판정에도 사용됩니다.

use std::path::PathBuf;

/// 단일 외부 도구 검사 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    /// 도구 이름
    pub name: String,

    /// 실행 경로에 존재하는지 여부
    pub available: bool,

    /// 확인된 경로 (존재할 때만)
    pub path: Option<PathBuf>,
}

/// 바이너리가 실행 경로에 있는지 확인
pub fn binary_on_path(name: &str) -> bool {
    which::which(name).is_ok()
}

/// 필요한 도구 목록을 일괄 검사
pub fn check_dependencies(required: &[&str]) -> Vec<DependencyCheck> {
    required
        .iter()
        .map(|name| {
            let path = which::which(name).ok();
            DependencyCheck {
                name: (*name).to_string(),
                available: path.is_some(),
                path,
            }
        })
        .collect()
}

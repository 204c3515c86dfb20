//! System Dependencies - 플러그인의 외부 바이너리 의존성 설치
//!
//! 플러그인 레지스트리에 선언된 비-Rust 바이너리 의존성을 설치합니다.
//! manager 이름 → 설치 함수 매핑으로 전략을 등록하며, 새 manager 추가는
//! INSTALLERS 테이블에 한 줄 추가로 끝납니다.
//!
//! 실패 정책은 모든 단계에서 warn-and-continue입니다: 툴체인 부재나
//! 다운로드 실패는 수동 설치 명령을 담은 메시지와 함께 비치명적으로
//! 기록되고, 플러그인 설치 자체는 계속 성공합니다.

mod release;

use fieldkit_foundation::binary_on_path;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::process::Command;
use tracing::{debug, info, warn};

// ============================================================================
// SystemDepSpec / SystemDepResult
// ============================================================================

/// 플러그인 하나의 외부 바이너리 의존성 선언
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemDepSpec {
    /// 설치 전략 이름 ("go" | "npm" | "github-release")
    pub manager: String,

    /// go/npm: 설치 명령에 그대로 전달되는 패키지 참조
    #[serde(default)]
    pub package: String,

    /// 실행 경로에서 확인할 바이너리 이름
    pub binary: String,

    /// github-release 전용: "owner/repo"
    #[serde(default)]
    pub repo: Option<String>,

    /// github-release 전용: 릴리스 태그
    #[serde(default)]
    pub tag: Option<String>,

    /// github-release 전용: `{os}`/`{arch}` 자리표시자를 포함한 asset 이름
    #[serde(default)]
    pub asset: Option<String>,

    /// github-release 전용: 설치 디렉터리
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
}

pub(crate) fn default_install_dir() -> PathBuf {
    PathBuf::from("~/.local/bin")
}

/// `~/` 접두사를 홈 디렉터리로 확장
pub(crate) fn expand_home(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// 의존성 하나의 설치 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepStatus {
    /// 바이너리가 이미 경로에 있어 아무것도 하지 않음
    AlreadyInstalled,
    /// 새로 설치됨
    Installed,
    /// 설치 실패 (비치명적)
    Failed,
}

/// 의존성 하나의 설치 결과
#[derive(Debug, Clone)]
pub struct SystemDepResult {
    pub spec: SystemDepSpec,
    pub status: DepStatus,
    /// 실패 시 수동 설치 명령을 포함한 안내 메시지
    pub message: Option<String>,
}

impl SystemDepResult {
    fn ok(spec: &SystemDepSpec, status: DepStatus) -> Self {
        Self {
            spec: spec.clone(),
            status,
            message: None,
        }
    }

    fn failed(spec: &SystemDepSpec, message: impl Into<String>) -> Self {
        Self {
            spec: spec.clone(),
            status: DepStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.status != DepStatus::Failed
    }
}

// ============================================================================
// 설치 전략 테이블
// ============================================================================

type InstallFuture<'a> = Pin<Box<dyn Future<Output = SystemDepResult> + Send + 'a>>;
type InstallFn = for<'a> fn(&'a SystemDepSpec) -> InstallFuture<'a>;

fn install_go_boxed(spec: &SystemDepSpec) -> InstallFuture<'_> {
    Box::pin(install_go(spec))
}

fn install_npm_boxed(spec: &SystemDepSpec) -> InstallFuture<'_> {
    Box::pin(install_npm(spec))
}

fn install_release_boxed(spec: &SystemDepSpec) -> InstallFuture<'_> {
    Box::pin(release::install_github_release(spec))
}

/// manager 이름 → 설치 함수
const INSTALLERS: &[(&str, InstallFn)] = &[
    ("go", install_go_boxed),
    ("npm", install_npm_boxed),
    ("github-release", install_release_boxed),
];

/// 지원되는 manager 이름 목록
pub fn supported_managers() -> Vec<&'static str> {
    INSTALLERS.iter().map(|(name, _)| *name).collect()
}

// ============================================================================
// 진입점
// ============================================================================

/// 의존성 목록 설치
///
/// 멱등: 바이너리가 이미 경로에 있으면 설치 동작을 전혀 수행하지
/// 않습니다. 개별 실패는 결과에 기록되고 나머지는 계속 진행됩니다.
pub async fn install_system_deps(specs: &[SystemDepSpec]) -> Vec<SystemDepResult> {
    let mut results = Vec::with_capacity(specs.len());

    for spec in specs {
        if binary_on_path(&spec.binary) {
            debug!("Dependency '{}' already on PATH, skipping", spec.binary);
            results.push(SystemDepResult::ok(spec, DepStatus::AlreadyInstalled));
            continue;
        }

        let result = match INSTALLERS.iter().find(|(name, _)| *name == spec.manager) {
            Some((_, install)) => install(spec).await,
            None => SystemDepResult::failed(
                spec,
                format!(
                    "unknown manager '{}' (supported: {})",
                    spec.manager,
                    supported_managers().join(", ")
                ),
            ),
        };

        match result.status {
            DepStatus::Failed => warn!(
                "Failed to install dependency '{}': {}",
                spec.binary,
                result.message.as_deref().unwrap_or("unknown error")
            ),
            _ => info!("Installed dependency '{}'", spec.binary),
        }
        results.push(result);
    }

    results
}

// ============================================================================
// CLI 기반 설치 (go / npm)
// ============================================================================

/// 외부 CLI로 설치를 수행하는 공통 경로
///
/// CLI 자체가 없으면 다운로드를 시도하지 않고 not_found_msg를 그대로
/// 결과에 싣습니다.
async fn install_via_cli(
    spec: &SystemDepSpec,
    cli_tool: &str,
    args: &[&str],
    not_found_msg: String,
) -> SystemDepResult {
    if !binary_on_path(cli_tool) {
        return SystemDepResult::failed(spec, not_found_msg);
    }

    let output = match Command::new(cli_tool).args(args).output().await {
        Ok(output) => output,
        Err(e) => {
            return SystemDepResult::failed(spec, format!("failed to run {}: {}", cli_tool, e))
        }
    };

    if output.status.success() {
        return SystemDepResult::ok(spec, DepStatus::Installed);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!(
            "{} exited with code {}",
            cli_tool,
            output.status.code().unwrap_or(-1)
        )
    } else {
        stderr
    };
    SystemDepResult::failed(spec, message)
}

/// `go install`로 Go 바이너리 설치
async fn install_go(spec: &SystemDepSpec) -> SystemDepResult {
    install_via_cli(
        spec,
        "go",
        &["install", &spec.package],
        format!(
            "Go runtime not found. Install Go from https://go.dev/dl/ \
             then re-run: go install {}",
            spec.package
        ),
    )
    .await
}

/// `npm install -g`로 Node.js 패키지 설치
async fn install_npm(spec: &SystemDepSpec) -> SystemDepResult {
    install_via_cli(
        spec,
        "npm",
        &["install", "-g", &spec.package],
        format!(
            "npm not found. Install Node.js from https://nodejs.org/ \
             then re-run: npm install -g {}",
            spec.package
        ),
    )
    .await
}

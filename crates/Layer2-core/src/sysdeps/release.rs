//! GitHub Release 설치 전략
//!
//! 빌드된 바이너리를 GitHub Releases에서 내려받습니다.
//! `gh release download`를 먼저 시도하고 (인증을 알아서 처리),
//! 실패하면 GITHUB_TOKEN을 사용하는 REST API로 폴백합니다.

use super::{expand_home, DepStatus, SystemDepResult, SystemDepSpec};
use fieldkit_foundation::binary_on_path;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const GITHUB_API: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// github-release 전략 진입점
pub(super) async fn install_github_release(spec: &SystemDepSpec) -> SystemDepResult {
    let (repo, tag, asset) = match (&spec.repo, &spec.tag, &spec.asset) {
        (Some(repo), Some(tag), Some(asset)) => (repo, tag, asset),
        _ => {
            return SystemDepResult::failed(
                spec,
                "github-release spec is missing repo, tag, or asset",
            )
        }
    };

    let install_dir = expand_home(&spec.install_dir);
    if let Err(e) = tokio::fs::create_dir_all(&install_dir).await {
        return SystemDepResult::failed(
            spec,
            format!("cannot create {}: {}", install_dir.display(), e),
        );
    }

    let asset_name = resolve_asset_name(asset);
    let binary_path = install_dir.join(&spec.binary);

    if let Some(result) = try_gh_download(spec, repo, tag, &asset_name, &install_dir, &binary_path).await
    {
        return result;
    }
    try_api_download(spec, repo, tag, &asset_name, &binary_path).await
}

/// asset 템플릿의 `{os}`/`{arch}` 자리표시자를 현재 플랫폼으로 치환
fn resolve_asset_name(template: &str) -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    template.replace("{os}", os).replace("{arch}", arch)
}

/// gh CLI로 다운로드 시도. gh가 없거나 실패하면 None (API 폴백).
async fn try_gh_download(
    spec: &SystemDepSpec,
    repo: &str,
    tag: &str,
    asset_name: &str,
    install_dir: &Path,
    binary_path: &Path,
) -> Option<SystemDepResult> {
    if !binary_on_path("gh") {
        return None;
    }

    let output = Command::new("gh")
        .args([
            "release",
            "download",
            tag,
            "--repo",
            repo,
            "--pattern",
            asset_name,
            "--dir",
        ])
        .arg(install_dir)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!(
            "gh release download failed, falling back to API: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let downloaded = install_dir.join(asset_name);
    if downloaded.exists() && downloaded != binary_path {
        tokio::fs::rename(&downloaded, binary_path).await.ok()?;
    }

    if binary_path.exists() {
        if let Err(e) = mark_executable(binary_path) {
            return Some(SystemDepResult::failed(spec, e.to_string()));
        }
        return Some(SystemDepResult::ok(spec, DepStatus::Installed));
    }
    None
}

/// GitHub REST API로 다운로드 (GITHUB_TOKEN이 있으면 Bearer 인증)
async fn try_api_download(
    spec: &SystemDepSpec,
    repo: &str,
    tag: &str,
    asset_name: &str,
    binary_path: &Path,
) -> SystemDepResult {
    let client = reqwest::Client::new();
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();

    let mut request = client
        .get(format!("{}/repos/{}/releases/tags/{}", GITHUB_API, repo, tag))
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", API_VERSION)
        .header("User-Agent", "fieldkit");
    if !token.is_empty() {
        request = request.bearer_auth(&token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return SystemDepResult::failed(spec, e.to_string()),
    };

    if !response.status().is_success() {
        let code = response.status().as_u16();
        let mut msg = format!("GitHub API error {} for {}@{}", code, repo, tag);
        match code {
            401 | 403 => msg.push_str(" — set GITHUB_TOKEN or run `gh auth login`"),
            404 => msg.push_str(" — release not found (check repo/tag and access)"),
            _ => {}
        }
        return SystemDepResult::failed(spec, msg);
    }

    let release: Release = match response.json().await {
        Ok(release) => release,
        Err(e) => return SystemDepResult::failed(spec, e.to_string()),
    };

    let Some(asset) = release.assets.iter().find(|a| a.name == asset_name) else {
        return SystemDepResult::failed(
            spec,
            format!(
                "No asset matching '{}' found in {}@{}. Available: {}",
                asset_name,
                repo,
                tag,
                release
                    .assets
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );
    };

    let mut download = client
        .get(&asset.browser_download_url)
        .header("User-Agent", "fieldkit");
    if !token.is_empty() {
        download = download.bearer_auth(&token);
    }

    let bytes = match download.send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return SystemDepResult::failed(spec, e.to_string()),
        },
        Err(e) => return SystemDepResult::failed(spec, e.to_string()),
    };

    if let Err(e) = tokio::fs::write(binary_path, &bytes).await {
        return SystemDepResult::failed(spec, e.to_string());
    }
    if let Err(e) = mark_executable(binary_path) {
        return SystemDepResult::failed(spec, e.to_string());
    }
    SystemDepResult::ok(spec, DepStatus::Installed)
}

/// 실행 권한 부여
fn mark_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

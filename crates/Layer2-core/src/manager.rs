//! Plugin Manager - 레지스트리 기반 플러그인 설치/갱신/제거
//!
//! plugins-registry.yaml에 선언된 플러그인을 관리합니다. 해석 순서:
//!
//! 1. 명시적 경로 (테스트/CI)
//! 2. FIELDKIT_PLUGIN_REGISTRY 환경 변수
//! 3. ~/.config/fieldkit/plugins-registry.yaml (사용자 오버라이드)
//! 4. 바이너리에 포함된 기본 레지스트리
//!
//! Native 플러그인은 fieldkit에 컴파일되어 있으므로 설치는 시스템
//! 의존성 프로비저닝만 수행하고, 제거는 거부합니다. Binary 플러그인은
//! 다운로드 → introspection → 캐시 기록 순서로 설치합니다.

use crate::plugin::cache::{BinaryPluginCache, CachedProcessPlugin};
use crate::plugin::process::{ProcessPlugin, ProcessRuntimeConfig};
use crate::sysdeps::{
    default_install_dir, expand_home, install_system_deps, SystemDepResult, SystemDepSpec,
};
use fieldkit_foundation::{binary_on_path, config_dir, Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 레지스트리 경로 환경 변수
pub const REGISTRY_ENV_VAR: &str = "FIELDKIT_PLUGIN_REGISTRY";

/// 사용자 레지스트리 파일 이름
pub const REGISTRY_FILE: &str = "plugins-registry.yaml";

/// 바이너리에 포함된 기본 레지스트리
const BUNDLED_REGISTRY: &str = include_str!("../data/plugins-registry.yaml");

// ============================================================================
// 레지스트리 스키마
// ============================================================================

/// 플러그인 전달 방식 (레지스트리 선언)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    #[default]
    Native,
    Binary,
}

/// binary 플러그인의 다운로드 출처
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinarySource {
    /// "owner/repo"
    pub repo: String,

    /// 릴리스 태그
    pub tag: String,

    /// `{os}`/`{arch}` 자리표시자를 포함한 asset 이름
    pub asset: String,

    /// 바이너리 이름 (기본: 플러그인 이름)
    #[serde(default)]
    pub binary: Option<String>,

    /// 설치 디렉터리
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
}

/// 레지스트리의 플러그인 항목 하나
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub plugin_type: PluginType,

    #[serde(default)]
    pub tags: Vec<String>,

    /// 느슨하게 파싱되는 시스템 의존성 목록
    #[serde(default)]
    pub system_deps: Vec<serde_yaml::Value>,

    /// plugin_type=binary일 때 필수
    #[serde(default)]
    pub binary_source: Option<BinarySource>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    plugins: BTreeMap<String, RegistryEntry>,
}

/// system_deps 항목 파싱
///
/// 잘못된 항목은 경고 후 건너뜁니다. manager 이름의 유효성은 설치
/// 시점에 검사됩니다.
pub fn parse_system_deps(entry: &RegistryEntry) -> Vec<SystemDepSpec> {
    entry
        .system_deps
        .iter()
        .filter_map(|raw| match serde_yaml::from_value(raw.clone()) {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!("Skipping malformed system_deps entry: {}", e);
                None
            }
        })
        .collect()
}

// ============================================================================
// InstallReport
// ============================================================================

/// 플러그인 설치 결과
///
/// 시스템 의존성 실패는 warn-and-continue이므로 여기 기록만 되고
/// 설치 자체는 성공합니다.
#[derive(Debug)]
pub struct InstallReport {
    pub name: String,
    pub dep_results: Vec<SystemDepResult>,
}

impl InstallReport {
    /// 수동 조치가 필요한 의존성 실패 목록
    pub fn warnings(&self) -> Vec<&SystemDepResult> {
        self.dep_results.iter().filter(|r| !r.success()).collect()
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 레지스트리 기반 플러그인 관리자
pub struct PluginManager {
    registry: BTreeMap<String, RegistryEntry>,
    cache: BinaryPluginCache,
    runtime: ProcessRuntimeConfig,
}

impl PluginManager {
    /// 표준 해석 순서로 생성
    pub fn new(cache: BinaryPluginCache, runtime: ProcessRuntimeConfig) -> Self {
        Self {
            registry: load_registry(None),
            cache,
            runtime,
        }
    }

    /// 명시적 레지스트리 경로로 생성 (테스트/CI)
    pub fn with_registry_path(
        path: impl Into<PathBuf>,
        cache: BinaryPluginCache,
        runtime: ProcessRuntimeConfig,
    ) -> Self {
        Self {
            registry: load_registry(Some(&path.into())),
            cache,
            runtime,
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 레지스트리의 플러그인 목록 (이름순, 선택적 태그 필터)
    pub fn list_available(&self, tag_filter: Option<&str>) -> Vec<(&str, &RegistryEntry)> {
        self.registry
            .iter()
            .filter(|(_, entry)| match tag_filter {
                Some(tag) => entry.tags.iter().any(|t| t == tag),
                None => true,
            })
            .map(|(name, entry)| (name.as_str(), entry))
            .collect()
    }

    /// 설치 여부 확인
    ///
    /// native는 바이너리에 포함되므로 항상 설치 상태입니다.
    pub async fn is_installed(&self, name: &str, entry: &RegistryEntry) -> bool {
        match entry.plugin_type {
            PluginType::Native => true,
            PluginType::Binary => self.cache.get(name).await.is_some(),
        }
    }

    fn resolve(&self, name: &str) -> Result<&RegistryEntry> {
        self.registry.get(name).ok_or_else(|| {
            let available: Vec<&str> = self.registry.keys().map(String::as_str).collect();
            if available.is_empty() {
                Error::NotFound(format!("plugin '{}' not found in registry", name))
            } else {
                Error::NotFound(format!(
                    "plugin '{}' not found in registry (available: {})",
                    name,
                    available.join(", ")
                ))
            }
        })
    }

    // ========================================================================
    // 설치
    // ========================================================================

    /// 플러그인 설치
    ///
    /// 시스템 의존성 실패는 보고서에 경고로 남고 설치는 성공합니다.
    /// binary 플러그인의 다운로드/introspection 실패만 에러입니다.
    pub async fn install(&self, name: &str) -> Result<InstallReport> {
        let entry = self.resolve(name)?;
        info!("Installing plugin '{}'", name);

        match entry.plugin_type {
            PluginType::Native => {
                let specs = parse_system_deps(entry);
                let dep_results = install_system_deps(&specs).await;
                Ok(InstallReport {
                    name: name.to_string(),
                    dep_results,
                })
            }
            PluginType::Binary => self.install_binary(name, entry).await,
        }
    }

    async fn install_binary(&self, name: &str, entry: &RegistryEntry) -> Result<InstallReport> {
        let source = entry.binary_source.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!("binary plugin '{}' has no binary_source", name))
        })?;

        let binary = source.binary.clone().unwrap_or_else(|| name.to_string());
        let binary_path = expand_home(&source.install_dir).join(&binary);

        let mut dep_results = Vec::new();
        if binary_path.exists() || binary_on_path(&binary) {
            debug!("Binary '{}' already present, skipping download", binary);
        } else {
            let spec = SystemDepSpec {
                manager: "github-release".to_string(),
                package: format!("{}@{}", source.repo, source.tag),
                binary: binary.clone(),
                repo: Some(source.repo.clone()),
                tag: Some(source.tag.clone()),
                asset: Some(source.asset.clone()),
                install_dir: source.install_dir.clone(),
            };

            let result = install_system_deps(&[spec]).await.remove(0);
            if !result.success() {
                return Err(Error::PluginLoad(format!(
                    "failed to install '{}': {}",
                    binary,
                    result.message.as_deref().unwrap_or("unknown error")
                )));
            }
            dep_results.push(result);
        }

        // introspection은 설치 시점에 한 번만
        let descriptor =
            ProcessPlugin::introspect(&binary_path, self.runtime.introspect_timeout).await?;

        self.cache
            .insert(
                name,
                CachedProcessPlugin {
                    binary_path,
                    descriptor,
                    installed_at: chrono::Utc::now(),
                },
            )
            .await?;

        Ok(InstallReport {
            name: name.to_string(),
            dep_results,
        })
    }

    // ========================================================================
    // 제거 / 갱신
    // ========================================================================

    /// 플러그인 제거
    ///
    /// 시스템 의존성은 공유될 수 있으므로 제거하지 않습니다.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let entry = self.resolve(name)?;

        match entry.plugin_type {
            PluginType::Native => Err(Error::InvalidInput(format!(
                "plugin '{}' is built into fieldkit and cannot be removed",
                name
            ))),
            PluginType::Binary => {
                let source = entry.binary_source.as_ref();
                let binary = source
                    .and_then(|s| s.binary.clone())
                    .unwrap_or_else(|| name.to_string());
                let install_dir = source
                    .map(|s| s.install_dir.clone())
                    .unwrap_or_else(default_install_dir);
                let binary_path = expand_home(&install_dir).join(&binary);

                if binary_path.exists() {
                    tokio::fs::remove_file(&binary_path).await?;
                    info!("Removed {:?}", binary_path);
                } else {
                    warn!("Binary not found at {:?}", binary_path);
                }

                self.cache.remove(name).await?;
                Ok(())
            }
        }
    }

    /// 플러그인 갱신
    ///
    /// binary는 제거 후 재설치, native는 의존성 재프로비저닝입니다.
    pub async fn update(&self, name: &str) -> Result<InstallReport> {
        let entry = self.resolve(name)?;

        if entry.plugin_type == PluginType::Binary {
            if let Err(e) = self.remove(name).await {
                warn!("Could not remove old version of '{}': {}", name, e);
            }
        }
        self.install(name).await
    }

    /// 레지스트리의 모든 플러그인 갱신
    pub async fn update_all(&self) -> Vec<(String, Result<InstallReport>)> {
        let names: Vec<String> = self.registry.keys().cloned().collect();
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = self.update(&name).await;
            results.push((name, result));
        }
        results
    }
}

// ============================================================================
// 레지스트리 로딩
// ============================================================================

/// 해석 순서에 따라 레지스트리 YAML을 읽고 파싱
///
/// 파일 부재나 파싱 실패는 경고 후 빈 레지스트리로 처리합니다.
fn load_registry(explicit: Option<&Path>) -> BTreeMap<String, RegistryEntry> {
    let content = match registry_content(explicit) {
        Some(content) => content,
        None => return BTreeMap::new(),
    };

    match serde_yaml::from_str::<RegistryFile>(&content) {
        Ok(file) => file.plugins,
        Err(e) => {
            warn!("Error loading plugin registry: {}", e);
            BTreeMap::new()
        }
    }
}

fn registry_content(explicit: Option<&Path>) -> Option<String> {
    if let Some(path) = explicit {
        return match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(_) => {
                warn!("Registry not found at {:?}", path);
                None
            }
        };
    }

    if let Ok(env_path) = std::env::var(REGISTRY_ENV_VAR) {
        let path = PathBuf::from(env_path);
        return match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(_) => {
                warn!("{} path not found: {:?}", REGISTRY_ENV_VAR, path);
                None
            }
        };
    }

    let user_path = config_dir().join(REGISTRY_FILE);
    if let Ok(content) = std::fs::read_to_string(&user_path) {
        return Some(content);
    }

    Some(BUNDLED_REGISTRY.to_string())
}

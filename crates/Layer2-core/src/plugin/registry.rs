//! Plugin Registry - 이름 기반 플러그인 레지스트리
//!
//! 전달 메커니즘(native, process)과 무관하게 하나의 이름 공간으로
//! 플러그인을 노출합니다. Discovery 순서:
//!
//! 1. Native 테이블 (컴파일 타임 등록)
//! 2. Introspection 캐시의 프로세스 플러그인
//!
//! 이름 충돌 시 먼저 발견된 쪽이 이기고 나중 것은 경고 후 제외됩니다.
//! 즉 native가 같은 이름의 process 플러그인을 가립니다.

use super::cache::CachedProcessPlugin;
use super::process::{ProcessPlugin, ProcessRuntimeConfig};
use super::traits::{PluginDescriptor, ToolPlugin};
use fieldkit_foundation::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// 등록 항목
// ============================================================================

/// 플러그인 전달 메커니즘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSource {
    /// 바이너리에 컴파일되어 같은 프로세스에서 실행
    Native,
    /// stdio 프로토콜로 통신하는 외부 바이너리
    Process,
}

impl std::fmt::Display for PluginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Process => write!(f, "binary"),
        }
    }
}

/// 레지스트리에 등록된 플러그인
pub struct RegisteredPlugin {
    pub plugin: Arc<dyn ToolPlugin>,
    pub source: PluginSource,
}

/// Native 플러그인 생성 함수
pub type PluginFactory = Box<dyn Fn() -> Result<Arc<dyn ToolPlugin>> + Send + Sync>;

/// 컴파일 타임 native 플러그인 테이블
pub type NativePluginTable = Vec<PluginFactory>;

// ============================================================================
// PluginRegistry
// ============================================================================

/// 이름 → 플러그인 레지스트리
///
/// Discovery 중의 개별 플러그인 오류(팩토리 실패, descriptor 위반)는
/// 해당 플러그인만 제외하고 계속 진행합니다.
pub struct PluginRegistry {
    plugins: BTreeMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    /// 빈 레지스트리 생성
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Native 테이블과 introspection 캐시에서 레지스트리 구성
    pub fn discover(
        native_table: &NativePluginTable,
        cached: &BTreeMap<String, CachedProcessPlugin>,
        runtime: &ProcessRuntimeConfig,
    ) -> Self {
        let mut registry = Self::new();

        for factory in native_table {
            match factory() {
                Ok(plugin) => registry.register(plugin, PluginSource::Native),
                Err(e) => warn!("Skipping native plugin: {}", e),
            }
        }

        for entry in cached.values() {
            let plugin = ProcessPlugin::from_cache(entry, runtime.clone());
            registry.register(Arc::new(plugin), PluginSource::Process);
        }

        debug!("Registry ready: {} plugins", registry.len());
        registry
    }

    /// 플러그인 등록
    ///
    /// descriptor 검증에 실패하거나 이름이 이미 있으면 경고 후 제외.
    pub fn register(&mut self, plugin: Arc<dyn ToolPlugin>, source: PluginSource) {
        let descriptor = plugin.descriptor();

        if let Err(e) = descriptor.validate() {
            warn!("Skipping plugin: {}", e);
            return;
        }

        if let Some(existing) = self.plugins.get(&descriptor.name) {
            warn!(
                "Duplicate plugin name '{}': keeping {} plugin, dropping {} one",
                descriptor.name, existing.source, source
            );
            return;
        }

        debug!("Registered {} plugin '{}'", source, descriptor.name);
        self.plugins
            .insert(descriptor.name, RegisteredPlugin { plugin, source });
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 이름으로 조회
    pub fn get(&self, name: &str) -> Option<&RegisteredPlugin> {
        self.plugins.get(name)
    }

    /// 등록 여부
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// 이름순으로 정렬된 descriptor 목록
    pub fn list(&self) -> Vec<(PluginDescriptor, PluginSource)> {
        self.plugins
            .values()
            .map(|r| (r.plugin.descriptor(), r.source))
            .collect()
    }

    /// 등록된 플러그인 수
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

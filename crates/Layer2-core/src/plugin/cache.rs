//! Introspection Cache - 프로세스 플러그인 캐시
//!
//! 설치 시점에 한 번 수행한 introspection 결과를 JSON으로 보관합니다.
//! 시작할 때마다 바이너리를 다시 호출하지 않고 이 파일만 읽습니다.
//! 쓰기는 임시 파일 + rename으로 원자적으로 수행되어, 쓰는 도중
//! 크래시가 나도 다음 시작의 읽기가 손상되지 않습니다.

use super::traits::PluginDescriptor;
use chrono::{DateTime, Utc};
use fieldkit_foundation::{config_dir, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// 캐시 파일 이름
pub const CACHE_FILE: &str = "binary-plugins.json";

/// 캐시에 보관되는 단일 프로세스 플러그인 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProcessPlugin {
    /// 설치된 바이너리 경로
    pub binary_path: PathBuf,

    /// introspection으로 얻은 descriptor
    pub descriptor: PluginDescriptor,

    /// 캐시 갱신 시각
    pub installed_at: DateTime<Utc>,
}

/// 프로세스 플러그인 캐시 파일 핸들
pub struct BinaryPluginCache {
    path: PathBuf,
}

impl BinaryPluginCache {
    /// 명시적 경로로 생성 (테스트용)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 기본 위치 (~/.config/fieldkit/binary-plugins.json)
    pub fn default_location() -> Self {
        Self::new(config_dir().join(CACHE_FILE))
    }

    /// 캐시 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // 읽기 / 쓰기
    // ========================================================================

    /// 전체 캐시 로드
    ///
    /// 파일이 없으면 빈 맵. 손상된 파일은 경고 후 빈 맵으로 취급해
    /// 시작을 막지 않습니다.
    pub async fn load(&self) -> BTreeMap<String, CachedProcessPlugin> {
        if !self.path.exists() {
            return BTreeMap::new();
        }

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read plugin cache at {:?}: {}", self.path, e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Corrupted plugin cache at {:?}: {}", self.path, e);
                BTreeMap::new()
            }
        }
    }

    /// 전체 캐시 저장 (write-temp-then-rename)
    pub async fn save(&self, cache: &BTreeMap<String, CachedProcessPlugin>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(cache)?;
        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));

        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Wrote plugin cache: {:?} ({} entries)", self.path, cache.len());
        Ok(())
    }

    // ========================================================================
    // 항목 단위 조작
    // ========================================================================

    /// 항목 추가 또는 갱신 (설치 시 호출)
    pub async fn insert(&self, name: &str, entry: CachedProcessPlugin) -> Result<()> {
        let mut cache = self.load().await;
        cache.insert(name.to_string(), entry);
        self.save(&cache).await
    }

    /// 항목 제거. 존재했으면 true.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let mut cache = self.load().await;
        let existed = cache.remove(name).is_some();
        if existed {
            self.save(&cache).await?;
        }
        Ok(existed)
    }

    /// 항목 조회
    pub async fn get(&self, name: &str) -> Option<CachedProcessPlugin> {
        self.load().await.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(version: &str) -> CachedProcessPlugin {
        CachedProcessPlugin {
            binary_path: PathBuf::from("/usr/local/bin/probe"),
            descriptor: PluginDescriptor::new("probe", version)
                .with_description("A probe"),
            installed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryPluginCache::new(temp.path().join("binary-plugins.json"));

        cache.insert("probe", entry("1.0.0")).await.unwrap();

        let loaded = cache.load().await;
        assert_eq!(loaded.len(), 1);
        // 바이너리 재호출 없이 동일한 descriptor 복원
        assert_eq!(loaded["probe"].descriptor.version, "1.0.0");
        assert_eq!(loaded["probe"].descriptor.name, "probe");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryPluginCache::new(temp.path().join("nope.json"));
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_file_is_empty_not_panic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("binary-plugins.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = BinaryPluginCache::new(path);
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryPluginCache::new(temp.path().join("binary-plugins.json"));

        cache.insert("probe", entry("1.0.0")).await.unwrap();
        assert!(cache.remove("probe").await.unwrap());
        assert!(!cache.remove("probe").await.unwrap());
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryPluginCache::new(temp.path().join("binary-plugins.json"));
        cache.insert("probe", entry("1.0.0")).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

//! End-to-end: 설치 → discovery → 실행 흐름 통합 테스트
//!
//! 외부 바이너리 플러그인은 셸 스크립트로 대체합니다.

#![cfg(unix)]

use async_trait::async_trait;
use fieldkit_core::manager::PluginManager;
use fieldkit_core::plugin::registry::NativePluginTable;
use fieldkit_core::{
    coerce_args, ArgValues, BinaryPluginCache, CapabilityDescriptor, ExecutionContext,
    PluginDescriptor, PluginRegistry, PluginSource, ProcessRuntimeConfig, RunOutcome, RunStatus,
    ToolPlugin,
};
use fieldkit_foundation::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// --introspect와 --execute에 모두 응답하는 가짜 플러그인 바이너리
fn fake_probe_script() -> &'static str {
    r#"case "$1" in
  --introspect)
    echo '{"name":"probe","description":"External probe","version":"1.0.0","requires_auth":false,"params":[{"name":"target","description":"Target host","type":"str","required":true}]}'
    ;;
  --execute)
    echo '{"progress":0.5,"message":"half"}' >&2
    echo '{"progress":1.0,"message":"done"}' >&2
    echo '{"status":"success","summary":"probed","data":{"args":'"$2"'},"artifacts":{}}'
    ;;
esac"#
}

struct Hello;

#[async_trait]
impl ToolPlugin for Hello {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("hello", "0.1.0")
            .with_description("Say hello")
            .with_capability(CapabilityDescriptor::new("name", "Who to greet").required())
    }

    async fn run(&self, args: ArgValues, _ctx: &ExecutionContext) -> Result<RunOutcome> {
        let name = args["name"].as_str().unwrap_or("world");
        Ok(RunOutcome::success(format!("hello {}", name)))
    }
}

fn registry_yaml(install_dir: &Path) -> String {
    format!(
        r#"
plugins:
  probe:
    description: External probe
    plugin_type: binary
    binary_source:
      repo: acme/probe
      tag: v1.0.0
      asset: "probe-{{os}}-{{arch}}"
      install_dir: "{}"
"#,
        install_dir.display()
    )
}

#[tokio::test]
async fn test_install_then_discover_then_run() {
    let temp = TempDir::new().unwrap();
    let install_dir = temp.path().join("bin");
    std::fs::create_dir_all(&install_dir).unwrap();
    write_script(&install_dir, "probe", fake_probe_script());

    let registry_path = temp.path().join("plugins-registry.yaml");
    std::fs::write(&registry_path, registry_yaml(&install_dir)).unwrap();
    let cache_path = temp.path().join("binary-plugins.json");

    // 설치: introspection 결과가 캐시에 기록됨
    let mgr = PluginManager::with_registry_path(
        &registry_path,
        BinaryPluginCache::new(&cache_path),
        ProcessRuntimeConfig::default(),
    );
    mgr.install("probe").await.unwrap();

    // Discovery: 캐시만 읽고 바이너리를 다시 호출하지 않음
    let cached = BinaryPluginCache::new(&cache_path).load().await;
    let native: NativePluginTable = vec![Box::new(|| Ok(Arc::new(Hello) as Arc<dyn ToolPlugin>))];
    let registry = PluginRegistry::discover(&native, &cached, &ProcessRuntimeConfig::default());

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("hello").unwrap().source, PluginSource::Native);
    assert_eq!(registry.get("probe").unwrap().source, PluginSource::Process);

    // 실행: 문자열 입력 → 타입 강제 → run → 진행률 + 결과
    let probe = registry.get("probe").unwrap();
    let descriptor = probe.plugin.descriptor();
    let input: HashMap<String, String> =
        [("target".to_string(), "10.0.0.1".to_string())].into();
    let args = coerce_args(&descriptor.capabilities, &input).unwrap();

    let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let ctx = ExecutionContext::new()
        .with_progress(Arc::new(move |f, _| seen_clone.lock().unwrap().push(f)));

    let outcome = probe.plugin.run(args, &ctx).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.summary, "probed");
    assert_eq!(outcome.data["args"]["target"], "10.0.0.1");
    assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
}

#[tokio::test]
async fn test_native_plugin_runs_through_registry() {
    let native: NativePluginTable = vec![Box::new(|| Ok(Arc::new(Hello) as Arc<dyn ToolPlugin>))];
    let registry = PluginRegistry::discover(
        &native,
        &Default::default(),
        &ProcessRuntimeConfig::default(),
    );

    let hello = registry.get("hello").unwrap();
    let input: HashMap<String, String> = [("name".to_string(), "field".to_string())].into();
    let args = coerce_args(&hello.plugin.descriptor().capabilities, &input).unwrap();

    let outcome = hello
        .plugin
        .run(args, &ExecutionContext::new())
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.summary, "hello field");
}

#[tokio::test]
async fn test_reinstall_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let install_dir = temp.path().join("bin");
    std::fs::create_dir_all(&install_dir).unwrap();
    write_script(&install_dir, "probe", fake_probe_script());

    let registry_path = temp.path().join("plugins-registry.yaml");
    std::fs::write(&registry_path, registry_yaml(&install_dir)).unwrap();
    let cache_path = temp.path().join("binary-plugins.json");

    let mgr = PluginManager::with_registry_path(
        &registry_path,
        BinaryPluginCache::new(&cache_path),
        ProcessRuntimeConfig::default(),
    );

    // 바이너리가 이미 있으므로 두 번째 설치도 다운로드 없이 성공
    mgr.install("probe").await.unwrap();
    let report = mgr.install("probe").await.unwrap();
    assert!(report.warnings().is_empty());

    let cached = BinaryPluginCache::new(&cache_path).load().await;
    assert_eq!(cached.len(), 1);
}

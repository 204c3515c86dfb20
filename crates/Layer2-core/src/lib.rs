//! # fieldkit-core
//!
//! Core runtime for Fieldkit:
//! - Plugin: 플러그인 계약, native/process 어댑터, 레지스트리
//! - Sysdeps: 플러그인의 외부 바이너리 의존성 설치 (go/npm/github-release)
//! - Manager: plugins-registry.yaml 기반 설치/갱신/제거

pub mod manager;
pub mod plugin;
pub mod sysdeps;

// ============================================================================
// Plugin
// ============================================================================
pub use plugin::{
    coerce_args, ArgValues, BinaryPluginCache, CachedProcessPlugin, CapabilityDescriptor,
    ExecutionContext, PluginDescriptor, PluginRegistry, PluginSource, ProcessPlugin,
    ProcessRuntimeConfig, ProgressSink, RunOutcome, RunStatus, ToolPlugin, ValueKind,
};

// ============================================================================
// Sysdeps
// ============================================================================
pub use sysdeps::{
    install_system_deps, supported_managers, DepStatus, SystemDepResult, SystemDepSpec,
};

// ============================================================================
// Manager
// ============================================================================
pub use manager::{
    parse_system_deps, BinarySource, InstallReport, PluginManager, PluginType, RegistryEntry,
    REGISTRY_ENV_VAR, REGISTRY_FILE,
};

//! # fieldkit-foundation
//!
//! Foundation layer for Fieldkit:
//! - Error: 에러 타입 중앙 관리 (Usage, PluginLoad, Protocol, Auth, ...)
//! - Config: 사용자 설정 로드 (~/.config/fieldkit/config.toml)
//! - Auth: 토큰 공급자 인터페이스 (외부 identity CLI 연동)
//! - Deps: 실행 경로의 외부 바이너리 존재 확인

pub mod auth;
pub mod config;
pub mod deps;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{config_dir, FieldkitConfig};

// ============================================================================
// Auth
// ============================================================================
pub use auth::{CommandTokenProvider, StaticTokenProvider, TokenProvider};

// ============================================================================
// Deps
// ============================================================================
pub use deps::{binary_on_path, check_dependencies, DependencyCheck};

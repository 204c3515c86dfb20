//! Plugin Runtime - 플러그인 계약과 전달 메커니즘
//!
//! 모든 플러그인은 ToolPlugin 하나의 계약을 따릅니다:
//!
//! - **Native**: 바이너리에 컴파일되어 같은 프로세스에서 실행
//! - **Process**: stdio JSON 프로토콜을 말하는 외부 바이너리
//!
//! Registry가 두 출처를 하나의 이름 공간으로 합치고, CLI는 출처를
//! 구분하지 않고 동일하게 호출합니다.

pub mod args;
pub mod cache;
pub mod capability;
pub mod context;
pub mod process;
pub mod registry;
pub mod traits;

pub use args::coerce_args;
pub use cache::{BinaryPluginCache, CachedProcessPlugin, CACHE_FILE};
pub use capability::{schema_object, CapabilityDescriptor, ValueKind};
pub use context::{ExecutionContext, ProgressSink};
pub use process::{
    ProcessPlugin, ProcessRuntimeConfig, EXECUTE_FLAG, INTROSPECT_FLAG,
};
pub use registry::{
    NativePluginTable, PluginFactory, PluginRegistry, PluginSource, RegisteredPlugin,
};
pub use traits::{ArgValues, PluginDescriptor, RunOutcome, RunStatus, ToolPlugin};

//! Builtin native plugins
//!
//! Plugins compiled into the fieldkit binary. They run in-process and
//! cannot be removed with `fieldkit plugin remove`.

use async_trait::async_trait;
use fieldkit_core::plugin::registry::NativePluginTable;
use fieldkit_core::{
    ArgValues, CapabilityDescriptor, ExecutionContext, PluginDescriptor, RunOutcome, RunStatus,
    ToolPlugin,
};
use fieldkit_foundation::{check_dependencies, Result};
use std::sync::Arc;

/// Compile-time registration table of native plugins
pub fn native_table() -> NativePluginTable {
    vec![Box::new(|| Ok(Arc::new(Doctor) as Arc<dyn ToolPlugin>))]
}

/// Checks that external tools fieldkit relies on are on PATH.
struct Doctor;

/// Tools the dependency installer shells out to
const BASE_TOOLS: &[&str] = &["go", "npm", "gh"];

#[async_trait]
impl ToolPlugin for Doctor {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("doctor", env!("CARGO_PKG_VERSION"))
            .with_description("Check that external tools fieldkit relies on are available")
            .with_capability(CapabilityDescriptor::new(
                "tools",
                "Comma-separated list of extra binaries to check",
            ))
    }

    async fn run(&self, args: ArgValues, ctx: &ExecutionContext) -> Result<RunOutcome> {
        let mut names: Vec<String> = BASE_TOOLS.iter().map(|t| t.to_string()).collect();
        if let Some(extra) = args.get("tools").and_then(|v| v.as_str()) {
            names.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            );
        }

        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let checks = check_dependencies(&refs);

        let total = checks.len();
        let mut lines = Vec::with_capacity(total);
        let mut missing = Vec::new();
        for (i, check) in checks.iter().enumerate() {
            ctx.progress((i + 1) as f64 / total as f64, &check.name);
            match &check.path {
                Some(path) => lines.push(format!("✓ {} ({})", check.name, path.display())),
                None => {
                    lines.push(format!("✗ {} (not found)", check.name));
                    missing.push(check.name.clone());
                }
            }
        }

        let status = if missing.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        let summary = format!("{} of {} tools available", total - missing.len(), total);

        Ok(RunOutcome::with_status(status, summary)
            .with_data("output", lines.join("\n"))
            .with_data("missing", missing))
    }
}

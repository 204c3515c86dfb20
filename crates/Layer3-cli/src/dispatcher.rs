//! Plugin dispatch - turns descriptors into clap commands and runs plugins
//!
//! Every registered plugin becomes `fieldkit <name> [flags]`. The flag
//! surface is generated from the plugin's capability list, so native and
//! process plugins get identical treatment.

use crate::progress;
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use fieldkit_core::{
    coerce_args, ExecutionContext, PluginDescriptor, PluginRegistry, RunOutcome, RunStatus,
    ValueKind,
};
use fieldkit_foundation::{CommandTokenProvider, FieldkitConfig, TokenProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Build the clap subcommand for one plugin
pub fn plugin_command(descriptor: &PluginDescriptor) -> Command {
    let mut cmd = Command::new(descriptor.name.clone())
        .about(descriptor.description.clone())
        .version(descriptor.version.clone());

    for cap in &descriptor.capabilities {
        let mut arg = Arg::new(cap.name.clone())
            .long(cap.name.clone())
            .help(cap.description.clone());

        if cap.value_kind == ValueKind::Bool {
            // bool capabilities are presence flags
            arg = arg.action(ArgAction::SetTrue);
        } else {
            arg = arg
                .action(ArgAction::Set)
                .value_name(value_name(cap.value_kind))
                .required(cap.required);
            if let Some(allowed) = &cap.allowed_values {
                arg = arg.value_parser(PossibleValuesParser::new(allowed.clone()));
            }
            if let Some(default) = &cap.default {
                // shown in help only; coercion applies the actual default
                arg = arg.help(format!(
                    "{} [default: {}]",
                    cap.description,
                    default_display(default)
                ));
            }
        }
        cmd = cmd.arg(arg);
    }
    cmd
}

fn value_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Str => "STRING",
        ValueKind::Int => "INT",
        ValueKind::Float => "FLOAT",
        ValueKind::Bool => "BOOL",
    }
}

fn default_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collect raw string inputs from parsed matches
fn collect_input(descriptor: &PluginDescriptor, matches: &ArgMatches) -> HashMap<String, String> {
    let mut input = HashMap::new();
    for cap in &descriptor.capabilities {
        if cap.value_kind == ValueKind::Bool {
            if matches.get_flag(&cap.name) {
                input.insert(cap.name.clone(), "true".to_string());
            }
        } else if let Some(value) = matches.get_one::<String>(&cap.name) {
            input.insert(cap.name.clone(), value.clone());
        }
    }
    input
}

/// Run one plugin invocation end to end and return the process exit code
///
/// Exit codes: 0 success, 1 failure, 2 partial/usage, 130 cancelled.
pub async fn dispatch(
    name: &str,
    matches: &ArgMatches,
    registry: &PluginRegistry,
    config: &FieldkitConfig,
) -> i32 {
    let Some(registered) = registry.get(name) else {
        eprintln!("Error: unknown command '{}'", name);
        return 2;
    };

    let descriptor = registered.plugin.descriptor();
    let input = collect_input(&descriptor, matches);
    let args = match coerce_args(&descriptor.capabilities, &input) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    // Ctrl-C requests cooperative cancellation; a second Ctrl-C kills us
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling... (Ctrl-C again to force quit)");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });
    }

    let mut ctx = ExecutionContext::new()
        .with_config(config.extra_as_json())
        .with_progress(progress::stderr_sink())
        .with_cancel(cancel);

    // Token is resolved only for plugins that declare they need it
    if descriptor.requires_auth {
        let provider = CommandTokenProvider::new(
            config.auth_command.clone(),
            Duration::from_secs(config.auth_timeout_secs),
        );
        match provider.token().await {
            Ok(token) => ctx = ctx.with_auth_token(token),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }

    debug!("Dispatching '{}'", name);
    let plugin = Arc::clone(&registered.plugin);
    let plugin_name = name.to_string();
    let handle = tokio::spawn(async move { plugin.run(args, &ctx).await });

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            if e.is_usage() {
                eprintln!("Error: {}", e);
                return 2;
            }
            RunOutcome::failure(format!("'{}' failed: {}", plugin_name, e))
        }
        // a panicking plugin must not take the CLI down with it
        Err(e) => RunOutcome::failure(format!("'{}' crashed: {}", plugin_name, e)),
    };

    print_outcome(&outcome);
    exit_code(outcome.status)
}

/// Render a RunOutcome for the terminal
///
/// Plugins that produce a full text body put it in data["output"]; it is
/// preferred over the one-line summary.
fn print_outcome(outcome: &RunOutcome) {
    if let Some(output) = outcome.data.get("output").and_then(|v| v.as_str()) {
        println!("{}", output);
    } else if !outcome.summary.is_empty() {
        match outcome.status {
            RunStatus::Success => println!("✓ {}", outcome.summary),
            RunStatus::Partial => println!("⚠ {}", outcome.summary),
            RunStatus::Failure => eprintln!("✗ {}", outcome.summary),
            RunStatus::Cancelled => eprintln!("{}", outcome.summary),
        }
    }

    if !outcome.artifacts.is_empty() {
        println!("\nArtifacts:");
        for (name, path) in &outcome.artifacts {
            println!("  {}: {}", name, path);
        }
    }
}

fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Success => 0,
        RunStatus::Failure => 1,
        RunStatus::Partial => 2,
        RunStatus::Cancelled => 130,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_core::{CapabilityDescriptor, ToolPlugin};

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new("scan", "1.0.0")
            .with_description("Scan a site")
            .with_capability(CapabilityDescriptor::new("org", "Target org").required())
            .with_capability(
                CapabilityDescriptor::new("limit", "Max items")
                    .with_kind(ValueKind::Int)
                    .with_default(10),
            )
            .with_capability(
                CapabilityDescriptor::new("verbose", "Verbose output").with_kind(ValueKind::Bool),
            )
            .with_capability(
                CapabilityDescriptor::new("mode", "Mode").with_allowed_values(["fast", "full"]),
            )
    }

    #[test]
    fn test_flags_generated_from_capabilities() {
        let cmd = plugin_command(&descriptor());
        let matches = cmd
            .try_get_matches_from([
                "scan", "--org", "acme", "--verbose", "--mode", "fast",
            ])
            .unwrap();

        let input = collect_input(&descriptor(), &matches);
        assert_eq!(input["org"], "acme");
        assert_eq!(input["verbose"], "true");
        assert_eq!(input["mode"], "fast");
        assert!(!input.contains_key("limit"));
    }

    #[test]
    fn test_missing_required_is_clap_error() {
        let cmd = plugin_command(&descriptor());
        assert!(cmd.try_get_matches_from(["scan"]).is_err());
    }

    #[test]
    fn test_allowed_values_enforced_by_clap() {
        let cmd = plugin_command(&descriptor());
        assert!(cmd
            .try_get_matches_from(["scan", "--org", "a", "--mode", "turbo"])
            .is_err());
    }

    #[test]
    fn test_absent_bool_flag_not_in_input() {
        let cmd = plugin_command(&descriptor());
        let matches = cmd.try_get_matches_from(["scan", "--org", "a"]).unwrap();
        let input = collect_input(&descriptor(), &matches);
        // absent flag is left to coercion, which applies the default
        assert!(!input.contains_key("verbose"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(RunStatus::Success), 0);
        assert_eq!(exit_code(RunStatus::Failure), 1);
        assert_eq!(exit_code(RunStatus::Partial), 2);
        assert_eq!(exit_code(RunStatus::Cancelled), 130);
    }

    struct Hello;

    #[async_trait::async_trait]
    impl ToolPlugin for Hello {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor::new("hello", "1.0.0").with_description("Say hello")
        }

        async fn run(
            &self,
            _args: fieldkit_core::ArgValues,
            _ctx: &ExecutionContext,
        ) -> fieldkit_foundation::Result<RunOutcome> {
            Ok(RunOutcome::success("hello"))
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_registered_plugin() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Hello), fieldkit_core::PluginSource::Native);

        let matches = plugin_command(&Hello.descriptor())
            .try_get_matches_from(["hello"])
            .unwrap();
        let code = dispatch("hello", &matches, &registry, &FieldkitConfig::default()).await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_plugin_is_usage_error() {
        let registry = PluginRegistry::new();
        let matches = Command::new("ghost").try_get_matches_from(["ghost"]).unwrap();
        let code = dispatch("ghost", &matches, &registry, &FieldkitConfig::default()).await;
        assert_eq!(code, 2);
    }
}

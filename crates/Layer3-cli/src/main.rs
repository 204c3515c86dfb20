//! Fieldkit CLI - Main entry point
//!
//! Every registered plugin shows up as `fieldkit <plugin> [flags]`,
//! next to the static `plugin` management subcommand.

mod builtin;
mod dispatcher;
mod plugin_cmd;
mod progress;

use clap::{Arg, ArgAction, Command};
use fieldkit_core::plugin::registry::PluginRegistry;
use fieldkit_core::{BinaryPluginCache, ProcessRuntimeConfig};
use fieldkit_foundation::FieldkitConfig;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // logging must come up before anything else can warn
    let debug = std::env::args().any(|arg| arg == "--debug");
    init_logging(debug);

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let config = FieldkitConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        FieldkitConfig::default()
    });
    let runtime = runtime_config(&config);

    // Discovery reads the introspection cache only; installed process
    // plugins are never re-invoked at startup.
    let cached = BinaryPluginCache::default_location().load().await;
    let registry = PluginRegistry::discover(&builtin::native_table(), &cached, &runtime);

    let matches = build_cli(&registry).get_matches();

    match matches.subcommand() {
        Some(("version", _)) => {
            println!("{}", version_report(&registry));
            0
        }
        Some(("plugin", sub)) => plugin_cmd::run(sub, runtime).await,
        Some((name, sub)) => dispatcher::dispatch(name, sub, &registry, &config).await,
        None => 2,
    }
}

/// Root command: static management surface + one subcommand per plugin
fn build_cli(registry: &PluginRegistry) -> Command {
    let mut root = Command::new("fieldkit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Field-engineering tool plugins")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(plugin_cmd::command())
        .subcommand(Command::new("version").about("Show fieldkit version"));

    // Reserved names are never handed to plugins
    const RESERVED: &[&str] = &["plugin", "version", "help"];
    for (descriptor, _) in registry.list() {
        if RESERVED.contains(&descriptor.name.as_str()) {
            tracing::warn!(
                "Plugin '{}' shadows a builtin command, skipping",
                descriptor.name
            );
            continue;
        }
        root = root.subcommand(dispatcher::plugin_command(&descriptor));
    }
    root
}

/// Host version plus one line per registered plugin
fn version_report(registry: &PluginRegistry) -> String {
    let mut lines = vec![format!("fieldkit {}", env!("CARGO_PKG_VERSION"))];
    for (descriptor, _) in registry.list() {
        lines.push(format!("  {:<20} {}", descriptor.name, descriptor.version));
    }
    lines.join("\n")
}

fn init_logging(debug: bool) {
    let log_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn runtime_config(config: &FieldkitConfig) -> ProcessRuntimeConfig {
    ProcessRuntimeConfig {
        // 0 means unlimited
        run_timeout: (config.run_timeout_secs > 0)
            .then(|| Duration::from_secs(config.run_timeout_secs)),
        introspect_timeout: Duration::from_secs(config.introspect_timeout_secs),
        kill_grace: Duration::from_secs(config.kill_grace_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_includes_plugin_subcommands() {
        let mut registry = PluginRegistry::new();
        for factory in builtin::native_table() {
            registry.register(factory().unwrap(), fieldkit_core::PluginSource::Native);
        }

        let cli = build_cli(&registry);
        let names: Vec<&str> = cli.get_subcommands().map(|c| c.get_name()).collect();
        assert!(names.contains(&"plugin"));
        assert!(names.contains(&"doctor"));
    }

    #[test]
    fn test_version_report_lists_plugin_versions() {
        let mut registry = PluginRegistry::new();
        for factory in builtin::native_table() {
            registry.register(factory().unwrap(), fieldkit_core::PluginSource::Native);
        }

        let report = version_report(&registry);
        let mut lines = report.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("fieldkit {}", env!("CARGO_PKG_VERSION"))
        );
        // one line per plugin: name padded to 20, then its version
        let doctor = lines.find(|l| l.contains("doctor")).unwrap();
        assert_eq!(
            doctor,
            format!("  {:<20} {}", "doctor", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_runtime_config_zero_timeout_is_unlimited() {
        let mut config = FieldkitConfig::default();
        config.run_timeout_secs = 0;
        assert!(runtime_config(&config).run_timeout.is_none());

        config.run_timeout_secs = 90;
        assert_eq!(
            runtime_config(&config).run_timeout,
            Some(Duration::from_secs(90))
        );
    }
}

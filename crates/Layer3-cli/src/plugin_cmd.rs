//! `fieldkit plugin` - plugin management subcommands

use clap::{Arg, ArgAction, ArgMatches, Command};
use fieldkit_core::{
    parse_system_deps, BinaryPluginCache, DepStatus, InstallReport, PluginManager, PluginType,
    ProcessRuntimeConfig,
};

/// Build the `plugin` subcommand tree
pub fn command() -> Command {
    let strict = Arg::new("strict")
        .long("strict")
        .action(ArgAction::SetTrue)
        .help("Fail when a system dependency cannot be installed");

    Command::new("plugin")
        .about("Manage fieldkit plugins")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("list")
                .about("List plugins available in the registry")
                .arg(Arg::new("tag").long("tag").help("Filter by tag"))
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Show sources and system dependencies"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Install a plugin from the registry")
                .arg(Arg::new("name").required(true).help("Plugin name"))
                .arg(strict.clone()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed plugin")
                .arg(Arg::new("name").required(true).help("Plugin name")),
        )
        .subcommand(
            Command::new("update")
                .about("Update installed plugins")
                .arg(
                    Arg::new("name")
                        .required_unless_present("all")
                        .help("Plugin name"),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("name")
                        .help("Update every plugin in the registry"),
                )
                .arg(strict),
        )
}

/// Run a `plugin` subcommand and return the process exit code
pub async fn run(matches: &ArgMatches, runtime: ProcessRuntimeConfig) -> i32 {
    let manager = PluginManager::new(BinaryPluginCache::default_location(), runtime);

    match matches.subcommand() {
        Some(("list", m)) => list(&manager, m).await,
        Some(("install", m)) => install(&manager, m).await,
        Some(("remove", m)) => remove(&manager, m).await,
        Some(("update", m)) => update(&manager, m).await,
        _ => 2,
    }
}

async fn list(manager: &PluginManager, matches: &ArgMatches) -> i32 {
    let tag = matches.get_one::<String>("tag").map(String::as_str);
    let verbose = matches.get_flag("verbose");

    let plugins = manager.list_available(tag);
    if plugins.is_empty() {
        println!("No plugins available in registry");
        return 0;
    }

    println!("Available plugins (✓ = installed):\n");
    for (name, entry) in plugins {
        let installed = manager.is_installed(name, entry).await;
        let marker = if installed { "✓" } else { " " };
        let kind = match entry.plugin_type {
            PluginType::Native => "native",
            PluginType::Binary => "binary",
        };
        let desc = if entry.description.is_empty() {
            "No description"
        } else {
            &entry.description
        };
        println!("  {} {:<20} {} [{}]", marker, name, desc, kind);

        if verbose {
            if let Some(source) = &entry.binary_source {
                println!("    Repo:    {}", source.repo);
                println!("    Tag:     {}", source.tag);
            }
            if !entry.tags.is_empty() {
                println!("    Tags:    {}", entry.tags.join(", "));
            }
            let specs = parse_system_deps(entry);
            if !specs.is_empty() {
                println!("    System deps:");
                for spec in specs {
                    println!("      {:<20} ({}) {}", spec.binary, spec.manager, spec.package);
                }
            }
            println!();
        }
    }
    0
}

async fn install(manager: &PluginManager, matches: &ArgMatches) -> i32 {
    let name = matches.get_one::<String>("name").unwrap();
    let strict = matches.get_flag("strict");

    println!("Installing plugin '{}'...", name);
    match manager.install(name).await {
        Ok(report) => finish_install(name, &report, strict),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Print the install report and decide the exit code
fn finish_install(name: &str, report: &InstallReport, strict: bool) -> i32 {
    for result in &report.dep_results {
        match result.status {
            DepStatus::AlreadyInstalled => {
                println!("  {}: already installed, skipping", result.spec.binary)
            }
            DepStatus::Installed => {
                println!("  {}: installed via {}", result.spec.binary, result.spec.manager)
            }
            DepStatus::Failed => {}
        }
    }

    let warnings = report.warnings();
    if !warnings.is_empty() {
        println!(
            "\nWarning: '{}' installed but these system deps need manual setup:",
            name
        );
        for result in &warnings {
            println!(
                "  {} ({}): {}",
                result.spec.binary, result.spec.manager, result.spec.package
            );
            if let Some(message) = &result.message {
                for line in message.lines() {
                    println!("    {}", line);
                }
            }
        }
        println!("\nThe plugin is installed but may not function until the above are resolved.");
        if strict {
            eprintln!("\nError: system dependency installation failed (--strict mode)");
            return 1;
        }
    }

    println!("\n✓ Plugin '{}' installed successfully", name);
    println!("\nUsage: fieldkit {} --help", name);
    0
}

async fn remove(manager: &PluginManager, matches: &ArgMatches) -> i32 {
    let name = matches.get_one::<String>("name").unwrap();

    println!("Removing plugin '{}'...", name);
    match manager.remove(name).await {
        Ok(()) => {
            println!("\n✓ Plugin '{}' removed", name);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn update(manager: &PluginManager, matches: &ArgMatches) -> i32 {
    let strict = matches.get_flag("strict");

    if matches.get_flag("all") {
        let results = manager.update_all().await;
        if results.is_empty() {
            println!("No plugins in registry to update");
            return 0;
        }

        let mut failed = Vec::new();
        for (name, result) in &results {
            match result {
                Ok(report) => {
                    if finish_install(name, report, strict) != 0 {
                        failed.push(name.clone());
                    }
                }
                Err(e) => {
                    eprintln!("Error updating '{}': {}", name, e);
                    failed.push(name.clone());
                }
            }
            println!();
        }

        if failed.is_empty() {
            println!("✓ All plugins updated successfully");
            0
        } else {
            eprintln!("✗ Failed to update: {}", failed.join(", "));
            1
        }
    } else {
        let name = matches.get_one::<String>("name").unwrap();
        println!("Updating plugin '{}'...", name);
        match manager.update(name).await {
            Ok(report) => finish_install(name, &report, strict),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    }
}

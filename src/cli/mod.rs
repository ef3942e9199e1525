// src/cli/mod.rs

pub mod invoke;

use crate::constants::{RESERVED_SECTION, TOKENS_COMMAND};
use crate::core::context::ToolContext;
use crate::core::dimensions::{Dimension, DimensionSelector};
use crate::core::resolver::{self, TokenMap};
use crate::core::tokens::TokenRegistry;
use crate::core::{config_loader, filters, paths, registrar};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::collections::BTreeMap;

/// Runs one full invocation: load, validate, resolve, dispatch.
///
/// The pipeline is linear and re-derived from scratch every time:
/// document -> tokens -> dimensions -> filters -> steps -> handoff.
pub fn run(argv: Vec<String>) -> Result<()> {
    let explicit_root = prescan_workspace_root(&argv);
    let workspace_root = paths::find_workspace_root(explicit_root.as_deref())?;
    log::debug!("Workspace root: {}", workspace_root.display());

    let document = config_loader::load_document(&workspace_root)?;
    let repo = config_loader::repo_section(&document)?;
    let token_set = TokenRegistry::from_document(&workspace_root, &repo)?.build();
    let dimensions = resolver::resolve_dimensions(&token_set)?;
    let candidates = registrar::candidate_sections(&document);

    let matches = build_command(&dimensions, &candidates).get_matches_from(argv);
    let cli_dims = explicit_dimensions(&matches, &dimensions);

    // Everything below is validated before any step executes.
    let selector = DimensionSelector::new(dimensions, &repo.defaults, &cli_dims)?;
    filters::validate_document(&document, selector.dimensions())?;
    let tokens = TokenMap::with_selections(&token_set, selector.selections());
    let resolved = tokens
        .resolved()
        .context("Invalid token configuration")?;
    let effective =
        filters::resolve_document(&document, selector.dimensions(), selector.selections())?;
    let registration = registrar::register_tools(&effective);

    let ctx = ToolContext {
        workspace_root,
        tokens,
        selections: selector.selections().clone(),
    };

    match matches.subcommand() {
        Some((TOKENS_COMMAND, _)) if !candidates.iter().any(|c| c == TOKENS_COMMAND) => {
            print_tokens(&resolved, &ctx.selections);
            Ok(())
        }
        Some((name, sub_matches)) => invoke::run_tool(
            name,
            &registration,
            &ctx,
            &cli_dims,
            sub_matches.get_flag("dry-run"),
        ),
        None => Ok(()),
    }
}

/// `--workspace-root` must be known before clap parses, because the document
/// it points at defines the dimension flags and subcommands of the parser
/// itself. The generated self-invocation token passes it the same way.
fn prescan_workspace_root(argv: &[String]) -> Option<String> {
    let mut args = argv.iter();
    while let Some(arg) = args.next() {
        if arg == "--workspace-root" {
            return args.next().cloned();
        }
        if let Some(value) = arg.strip_prefix("--workspace-root=") {
            return Some(value.to_string());
        }
    }
    None
}

/// Builds the dynamic command tree: one global flag per declared dimension,
/// one subcommand per steps-bearing section, plus the `tokens` introspection
/// command when no section shadows it.
fn build_command(dimensions: &[Dimension], candidates: &[String]) -> Command {
    let mut command = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Configuration-driven command runner for this workspace")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("workspace-root")
                .long("workspace-root")
                .value_name("DIR")
                .help("Workspace root containing repokit.toml")
                .hide(true)
                .global(true),
        );

    for dimension in dimensions {
        command = command.arg(
            Arg::new(dimension.name.clone())
                .long(dimension.name.replace('_', "-"))
                .value_name("VALUE")
                .global(true)
                .help(format!(
                    "{} selection (auto-detected by default; one of: {})",
                    dimension.name,
                    dimension.allowed.join(", ")
                )),
        );
    }

    for name in candidates {
        command = command.subcommand(
            Command::new(name.clone())
                .about(format!("Run the '{name}' steps from repokit.toml"))
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print resolved commands without executing them"),
                ),
        );
    }

    if !candidates.iter().any(|c| c == TOKENS_COMMAND) {
        command = command.subcommand(
            Command::new(TOKENS_COMMAND)
                .about("Print resolved tokens and dimension selections")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .hide(true),
                ),
        );
    }

    command
}

/// Dimension values the user passed explicitly on the command line. No
/// dimension flag carries a default, so presence means explicit.
fn explicit_dimensions(
    matches: &ArgMatches,
    dimensions: &[Dimension],
) -> BTreeMap<String, String> {
    dimensions
        .iter()
        .filter_map(|dimension| {
            matches
                .get_one::<String>(&dimension.name)
                .map(|value| (dimension.name.clone(), value.clone()))
        })
        .collect()
}

fn print_tokens(resolved: &BTreeMap<String, String>, selections: &BTreeMap<String, String>) {
    if !selections.is_empty() {
        println!("{}", "dimensions".bold());
        for (name, value) in selections {
            println!("  {} = {}", name.cyan(), value.green());
        }
        println!();
    }
    println!("{}", RESERVED_SECTION.bold());
    for (name, value) in resolved {
        println!("  {} = {}", name.cyan(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> Vec<Dimension> {
        vec![Dimension {
            name: "build_type".to_string(),
            allowed: vec!["Debug".to_string(), "Release".to_string()],
        }]
    }

    #[test]
    fn test_prescan_finds_separate_form() {
        let argv = vec![
            "repokit".to_string(),
            "--workspace-root".to_string(),
            "/ws".to_string(),
            "build".to_string(),
        ];
        assert_eq!(prescan_workspace_root(&argv).as_deref(), Some("/ws"));
    }

    #[test]
    fn test_prescan_finds_equals_form() {
        let argv = vec!["repokit".to_string(), "--workspace-root=/ws".to_string()];
        assert_eq!(prescan_workspace_root(&argv).as_deref(), Some("/ws"));
    }

    #[test]
    fn test_prescan_absent() {
        let argv = vec!["repokit".to_string(), "build".to_string()];
        assert_eq!(prescan_workspace_root(&argv), None);
    }

    #[test]
    fn test_command_tree_has_sections_and_tokens() {
        let command = build_command(&dims(), &["build".to_string()]);
        let names: Vec<_> = command
            .get_subcommands()
            .map(|sub| sub.get_name().to_string())
            .collect();
        assert!(names.contains(&"build".to_string()));
        assert!(names.contains(&TOKENS_COMMAND.to_string()));
    }

    #[test]
    fn test_section_named_tokens_shadows_the_builtin() {
        let command = build_command(&dims(), &[TOKENS_COMMAND.to_string()]);
        let count = command
            .get_subcommands()
            .filter(|sub| sub.get_name() == TOKENS_COMMAND)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_dimension_flag_is_global_and_explicit() {
        let command = build_command(&dims(), &["build".to_string()]);
        let matches = command
            .try_get_matches_from(["repokit", "build", "--build-type", "Release"])
            .unwrap();
        let explicit = explicit_dimensions(&matches, &dims());
        assert_eq!(explicit.get("build_type").map(String::as_str), Some("Release"));
    }

    #[test]
    fn test_unpassed_dimension_is_not_explicit() {
        let command = build_command(&dims(), &["build".to_string()]);
        let matches = command.try_get_matches_from(["repokit", "build"]).unwrap();
        assert!(explicit_dimensions(&matches, &dims()).is_empty());
    }

    fn workspace(document: &str) -> (tempfile::TempDir, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("repokit.toml"), document).unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        (dir, vec!["repokit".to_string(), "--workspace-root".to_string(), root])
    }

    #[test]
    fn test_full_pipeline_dry_run() {
        let (_guard, mut argv) = workspace(
            r#"
            [repo.tokens]
            build_root = "_build"
            platform = ["linux-x64", "windows-x64", "macos-arm64"]
            build_type = ["Debug", "Release"]
            build_dir = { value = "{build_root}/{platform}/{build_type}", path = true }

            [build]
            steps = ["cmake --build {build_dir}"]
            "steps@windows-x64" = ["cmake --build {build_dir} --config {build_type}"]
            "#,
        );
        argv.extend(
            ["--platform", "linux-x64", "--build-type", "Release", "build", "--dry-run"]
                .map(String::from),
        );
        run(argv).unwrap();
    }

    #[test]
    fn test_cyclic_tokens_are_fatal_before_any_step() {
        let (_guard, mut argv) = workspace(
            r#"
            [repo.tokens]
            a = "{b}"
            b = "{a}"

            [build]
            steps = ["echo {a}"]
            "#,
        );
        argv.extend(["build", "--dry-run"].map(String::from));
        let err = run(argv).unwrap_err();
        assert!(format!("{err:#}").contains("Circular token reference"));
    }

    #[test]
    fn test_invalid_filter_is_fatal_even_for_other_sections() {
        let (_guard, mut argv) = workspace(
            r#"
            [repo.tokens]
            platform = ["linux-x64"]

            [package]
            "steps@freebsd-x64" = ["tar"]

            [build]
            steps = ["make"]
            "#,
        );
        argv.extend(["build", "--dry-run"].map(String::from));
        let err = run(argv).unwrap_err();
        assert!(format!("{err:#}").contains("freebsd-x64"));
    }

    #[test]
    fn test_dry_run_flag_parses() {
        let command = build_command(&dims(), &["build".to_string()]);
        let matches = command
            .try_get_matches_from(["repokit", "build", "--dry-run"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("dry-run"));
    }
}

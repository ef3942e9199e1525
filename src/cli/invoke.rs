// src/cli/invoke.rs

use crate::core::context::ToolContext;
use crate::core::registrar::Registration;
use crate::models::ResolvedStep;
use crate::system::executor;
use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use std::collections::BTreeMap;

/// Compiles and runs (or previews) one registered section.
pub fn run_tool(
    name: &str,
    registration: &Registration,
    ctx: &ToolContext,
    cli_dims: &BTreeMap<String, String>,
    dry_run: bool,
) -> Result<()> {
    let Some(tool) = registration.find(name) else {
        // A candidate that did not survive registration reports its own
        // validation error; a candidate whose steps vanished under the
        // current selection is simply not runnable right now.
        if let Some(error) = registration.rejection(name) {
            bail!("Section '{name}' is invalid: {error}");
        }
        bail!("Section '{name}' has no steps for the current dimension selection.");
    };

    let steps = tool
        .compile(ctx, cli_dims)
        .map_err(|e| anyhow!("Could not compile section '{name}': {e}"))?;

    if dry_run {
        preview(&steps);
        return Ok(());
    }

    for step in &steps {
        println!("{} {}", "→".blue(), step.command.green());
        executor::execute_step(step, &ctx.workspace_root)?;
    }
    Ok(())
}

/// Renders exactly the command text that execution would dispatch. The steps
/// come from the same `compile` call as a real run, so the preview is
/// byte-identical by construction.
fn preview(steps: &[ResolvedStep]) {
    let total = steps.len();
    for (position, step) in steps.iter().enumerate() {
        log::info!("Would run [{}/{}]: {}", position + 1, total, step.command);
        if let Some(cwd) = &step.cwd {
            log::info!("  cwd: {cwd}");
        }
        if let Some(script) = &step.env_script {
            log::info!("  env_script: {script}");
        }
        for entry in &step.env {
            log::info!("  env: {entry}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registrar;
    use crate::core::resolver::TokenMap;
    use crate::core::tokens::TokenRegistry;
    use std::path::{Path, PathBuf};

    fn context() -> ToolContext {
        let set = TokenRegistry::new(Path::new("/ws")).build();
        ToolContext {
            workspace_root: PathBuf::from("/ws"),
            tokens: TokenMap::with_selections(&set, &BTreeMap::new()),
            selections: BTreeMap::new(),
        }
    }

    #[test]
    fn test_unknown_section_is_reported() {
        let registration = Registration::default();
        let err = run_tool("ghost", &registration, &context(), &BTreeMap::new(), true)
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_rejected_section_reports_its_validation_error() {
        let effective: toml::Table =
            toml::from_str("[bad]\nsteps = [{ cwd = \"/tmp\" }]\n").unwrap();
        let registration = registrar::register_tools(&effective);
        let err = run_tool("bad", &registration, &context(), &BTreeMap::new(), true)
            .unwrap_err();
        assert!(err.to_string().contains("missing the 'command' key"));
    }

    #[test]
    fn test_dry_run_compiles_without_executing() {
        let effective: toml::Table =
            toml::from_str("[build]\nsteps = [\"surely-not-a-real-binary {workspace_root}\"]\n")
                .unwrap();
        let registration = registrar::register_tools(&effective);
        // Dry-run succeeds even though the command could never execute.
        run_tool("build", &registration, &context(), &BTreeMap::new(), true).unwrap();
    }
}

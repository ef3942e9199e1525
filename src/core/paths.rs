// src/core/paths.rs

use crate::constants::CONFIG_FILENAME;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Workspace root '{path}' does not exist or is not accessible.")]
    WorkspaceNotFound { path: String },
    #[error("Could not expand workspace root '{template}': {reason}")]
    Expansion { template: String, reason: String },
    #[error("Could not determine the current directory: {0}")]
    CurrentDir(std::io::Error),
}

/// Normalizes a path to forward slashes. Substituted values end up inside
/// shell command lines, where backslashes do not survive word splitting.
pub fn posix_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Determines the workspace root for this invocation.
///
/// An explicit `--workspace-root` value wins after `~`/env-var expansion.
/// Otherwise the ancestors of the current directory are searched for a
/// `repokit.toml`; when none is found the current directory itself is used,
/// which yields an empty document and a CLI with only built-in commands.
pub fn find_workspace_root(explicit: Option<&str>) -> Result<PathBuf, PathError> {
    if let Some(raw) = explicit {
        let expanded = shellexpand::full(raw).map_err(|e| PathError::Expansion {
            template: raw.to_string(),
            reason: e.to_string(),
        })?;
        let path = dunce::canonicalize(expanded.as_ref()).map_err(|_| {
            PathError::WorkspaceNotFound {
                path: expanded.into_owned(),
            }
        })?;
        return Ok(path);
    }

    let cwd = std::env::current_dir().map_err(PathError::CurrentDir)?;
    let cwd = dunce::simplified(&cwd).to_path_buf();
    let mut candidate: &Path = &cwd;
    loop {
        if candidate.join(CONFIG_FILENAME).is_file() {
            return Ok(candidate.to_path_buf());
        }
        match candidate.parent() {
            Some(parent) => candidate = parent,
            None => return Ok(cwd),
        }
    }
}

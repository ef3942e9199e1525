// src/core/config_loader.rs

use crate::constants::{CONFIG_FILENAME, LOCAL_CONFIG_FILENAME, RESERVED_SECTION};
use crate::models::RepoSection;
use std::fs;
use std::path::Path;
use thiserror::Error;
use toml::Table;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing TOML in '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid '[repo]' section: {source}")]
    InvalidReservedSection {
        #[source]
        source: toml::de::Error,
    },
}

/// Loads the workspace document: `repokit.toml` with the optional
/// `repokit.local.toml` overlay deep-merged on top.
///
/// A missing base document yields an empty table (the CLI then exposes only
/// built-in commands); an overlay without a base document is ignored.
pub fn load_document(workspace_root: &Path) -> Result<Table, ConfigError> {
    let base_path = workspace_root.join(CONFIG_FILENAME);
    if !base_path.is_file() {
        return Ok(Table::new());
    }
    let mut document = read_table(&base_path)?;

    let local_path = workspace_root.join(LOCAL_CONFIG_FILENAME);
    if local_path.is_file() {
        let overlay = read_table(&local_path)?;
        deep_merge(&mut document, overlay);
    }

    Ok(document)
}

/// Extracts the typed `[repo]` section from the raw document.
pub fn repo_section(document: &Table) -> Result<RepoSection, ConfigError> {
    match document.get(RESERVED_SECTION) {
        None => Ok(RepoSection::default()),
        Some(value) => value
            .clone()
            .try_into()
            .map_err(|source| ConfigError::InvalidReservedSection { source }),
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.display().to_string(),
        source,
    })
}

/// Merges `overlay` into `base`: tables merge recursively, every other value
/// (including arrays) is replaced by the overlay.
fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

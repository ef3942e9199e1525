// src/core/steps.rs

use crate::core::resolver::TokenMap;
use crate::core::tokens::TokenError;
use crate::models::{ResolvedStep, Step};
use thiserror::Error;
use toml::Value;

/// The closed key set of a structured step entry.
const STEP_KEYS: [&str; 4] = ["command", "cwd", "env_script", "env"];

#[derive(Error, Debug)]
pub enum StepError {
    #[error("'steps' of section '{section}' must be an array.")]
    NotAnArray { section: String },
    #[error("Step {index} of section '{section}' is missing the 'command' key.")]
    MissingCommand { section: String, index: usize },
    #[error(
        "Step {index} of section '{section}' has unknown key '{key}'. Allowed keys: command, cwd, env_script, env."
    )]
    UnknownStepKey {
        section: String,
        index: usize,
        key: String,
    },
    #[error("Step {index} of section '{section}': {reason}")]
    InvalidStep {
        section: String,
        index: usize,
        reason: &'static str,
    },
}

/// Normalizes the raw `steps` value of a section. A bare string is shorthand
/// for a command-only step; a table is checked against the closed key set.
pub fn normalize(section: &str, raw: &Value) -> Result<Vec<Step>, StepError> {
    let entries = raw.as_array().ok_or_else(|| StepError::NotAnArray {
        section: section.to_string(),
    })?;
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| normalize_entry(section, position + 1, entry))
        .collect()
}

fn normalize_entry(section: &str, index: usize, entry: &Value) -> Result<Step, StepError> {
    let table = match entry {
        Value::String(command) => {
            return Ok(Step {
                command: command.clone(),
                ..Default::default()
            });
        }
        Value::Table(table) => table,
        _ => {
            return Err(StepError::InvalidStep {
                section: section.to_string(),
                index,
                reason: "a step must be a string or a table",
            });
        }
    };

    for key in table.keys() {
        if !STEP_KEYS.contains(&key.as_str()) {
            return Err(StepError::UnknownStepKey {
                section: section.to_string(),
                index,
                key: key.clone(),
            });
        }
    }

    let command = match table.get("command") {
        Some(Value::String(command)) => command.clone(),
        Some(_) => {
            return Err(StepError::InvalidStep {
                section: section.to_string(),
                index,
                reason: "'command' must be a string",
            });
        }
        None => {
            return Err(StepError::MissingCommand {
                section: section.to_string(),
                index,
            });
        }
    };

    let cwd = optional_string(table.get("cwd"), section, index, "'cwd' must be a string")?;
    let env_script = optional_string(
        table.get("env_script"),
        section,
        index,
        "'env_script' must be a string",
    )?;

    let env = match table.get("env") {
        None => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|item| match item {
                Value::String(entry) => Ok(entry.clone()),
                _ => Err(StepError::InvalidStep {
                    section: section.to_string(),
                    index,
                    reason: "'env' must be an array of \"KEY=VALUE\" strings",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(StepError::InvalidStep {
                section: section.to_string(),
                index,
                reason: "'env' must be an array of \"KEY=VALUE\" strings",
            });
        }
    };

    Ok(Step {
        command,
        cwd,
        env_script,
        env,
    })
}

fn optional_string(
    value: Option<&Value>,
    section: &str,
    index: usize,
    reason: &'static str,
) -> Result<Option<String>, StepError> {
    match value {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(StepError::InvalidStep {
            section: section.to_string(),
            index,
            reason,
        }),
    }
}

/// Substitutes every placeholder of a step. The env script's *path* is
/// resolved; its contents are opaque to this layer.
pub fn resolve(step: &Step, tokens: &TokenMap) -> Result<ResolvedStep, TokenError> {
    Ok(ResolvedStep {
        command: tokens.expand(&step.command)?,
        cwd: step.cwd.as_deref().map(|cwd| tokens.expand(cwd)).transpose()?,
        env_script: step
            .env_script
            .as_deref()
            .map(|script| tokens.expand(script))
            .transpose()?,
        env: step
            .env
            .iter()
            .map(|entry| tokens.expand(entry))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

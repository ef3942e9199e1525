// src/core/registrar.rs

use crate::constants::{FILTER_MARKER, RESERVED_SECTION, STEPS_KEY};
use crate::core::context::ToolContext;
use crate::core::steps::{self, StepError};
use crate::core::tokens::TokenError;
use crate::models::{ResolvedStep, Step};
use std::collections::BTreeMap;
use toml::{Table, Value};

/// A validated, runnable section. Descriptors form a closed set produced by
/// one pass over the effective document; every descriptor exposes the same
/// contract: a name, the uniform option surface (dimension flags plus
/// `--dry-run`, attached by the CLI layer), and `compile`.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub help: String,
    /// The section's effective (post-filter) mapping.
    pub section: Table,
    pub steps: Vec<Step>,
}

/// The outcome of the registration pass: valid descriptors plus the sections
/// that were rejected, with the reason, so an explicit invocation of a broken
/// section can still report its own error.
#[derive(Debug, Default)]
pub struct Registration {
    pub tools: Vec<ToolDescriptor>,
    pub skipped: Vec<(String, StepError)>,
}

impl Registration {
    pub fn find(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn rejection(&self, name: &str) -> Option<&StepError> {
        self.skipped
            .iter()
            .find(|(section, _)| section == name)
            .map(|(_, error)| error)
    }
}

/// Names of sections in the *raw* document that would become subcommands:
/// every non-reserved table with a `steps` or `steps@...` key. Used to build
/// the CLI surface before any dimension is selected.
pub fn candidate_sections(document: &Table) -> Vec<String> {
    document
        .iter()
        .filter(|(name, _)| name.as_str() != RESERVED_SECTION)
        .filter(|(_, value)| value.as_table().is_some_and(has_steps_key))
        .map(|(name, _)| name.clone())
        .collect()
}

fn has_steps_key(section: &Table) -> bool {
    section.keys().any(|key| {
        key.split_once(FILTER_MARKER)
            .map_or(key.as_str(), |(base, _)| base)
            == STEPS_KEY
    })
}

/// One validation pass over the effective document. A section that fails step
/// validation is logged and skipped; it never prevents other sections from
/// registering.
pub fn register_tools(effective: &Table) -> Registration {
    let mut registration = Registration::default();
    for (name, value) in effective {
        if name == RESERVED_SECTION {
            continue;
        }
        let Some(section) = value.as_table() else {
            continue;
        };
        let Some(raw_steps) = section.get(STEPS_KEY) else {
            continue;
        };
        match steps::normalize(name, raw_steps) {
            Ok(normalized) => registration.tools.push(ToolDescriptor {
                name: name.clone(),
                help: format!("Run the '{name}' steps from repokit.toml"),
                section: section.clone(),
                steps: normalized,
            }),
            Err(error) => {
                log::warn!("Section '{name}' skipped: {error}");
                registration.skipped.push((name.clone(), error));
            }
        }
    }
    registration
}

impl ToolDescriptor {
    /// Compiles the section into executable steps.
    ///
    /// Option precedence before substitution: resolved tokens (built-ins,
    /// auto-detected dimensions) < scalar values from the section's own
    /// mapping < explicit CLI flags. The merged values are injected into the
    /// token map, so every option is itself referenceable as a token.
    pub fn compile(
        &self,
        ctx: &ToolContext,
        cli_overrides: &BTreeMap<String, String>,
    ) -> Result<Vec<ResolvedStep>, TokenError> {
        let mut overrides = BTreeMap::new();
        for (key, value) in &self.section {
            if key == STEPS_KEY {
                continue;
            }
            if let Some(scalar) = scalar_text(value) {
                overrides.insert(key.clone(), scalar);
            }
        }
        for (name, value) in cli_overrides {
            overrides.insert(name.clone(), value.clone());
        }

        let tokens = ctx.tokens.with_overrides(overrides);
        self.steps
            .iter()
            .map(|step| steps::resolve(step, &tokens))
            .collect()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Integer(number) => Some(number.to_string()),
        Value::Float(number) => Some(number.to_string()),
        Value::Boolean(flag) => Some(flag.to_string()),
        Value::Datetime(stamp) => Some(stamp.to_string()),
        Value::Table(_) | Value::Array(_) => None,
    }
}

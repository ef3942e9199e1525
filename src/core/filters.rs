// src/core/filters.rs

use crate::constants::{FILTER_MARKER, FILTER_SEPARATOR, NEGATION_PREFIX};
use crate::core::dimensions::Dimension;
use std::collections::BTreeMap;
use thiserror::Error;
use toml::{Table, Value};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid filter '{key}': {reason}")]
    InvalidFilter { key: String, reason: SpecParseError },
    #[error(
        "Ambiguous filters for key '{key}': '@{left}' and '@{right}' both match with equal specificity."
    )]
    AmbiguousFilter {
        key: String,
        left: String,
        right: String,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpecParseError {
    #[error("the base key is missing")]
    MissingBaseKey,
    #[error("the filter spec is empty")]
    EmptySpec,
    #[error("empty component in the filter spec")]
    EmptyComponent,
    #[error("'{0}' is not a value of any declared dimension")]
    UnknownLiteral(String),
    #[error("'{literal}' belongs to more than one dimension ('{first}' and '{second}')")]
    AmbiguousLiteral {
        literal: String,
        first: String,
        second: String,
    },
}

/// One `(dimension, value)` condition of a filter spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterComponent {
    pub dimension: String,
    pub value: String,
    pub negated: bool,
}

/// A parsed `@filterspec`: an ordered list of components, each owned by
/// exactly one declared dimension. Parsing is the only place the textual
/// grammar is interpreted; matching and specificity work on the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub components: Vec<FilterComponent>,
}

impl FilterSpec {
    /// Parses `spec` (the text after `@`) against the declared dimensions.
    pub fn parse(spec: &str, dimensions: &[Dimension]) -> Result<Self, SpecParseError> {
        if spec.trim().is_empty() {
            return Err(SpecParseError::EmptySpec);
        }
        let mut components = Vec::new();
        for part in spec.split(FILTER_SEPARATOR) {
            let part = part.trim();
            if part.is_empty() {
                return Err(SpecParseError::EmptyComponent);
            }
            let (negated, literal) = match part.strip_prefix(NEGATION_PREFIX) {
                Some(rest) => (true, rest),
                None => (false, part),
            };
            if literal.is_empty() {
                return Err(SpecParseError::EmptyComponent);
            }

            let mut owners = dimensions
                .iter()
                .filter(|d| d.allowed.iter().any(|v| v == literal));
            let owner = owners
                .next()
                .ok_or_else(|| SpecParseError::UnknownLiteral(literal.to_string()))?;
            if let Some(second) = owners.next() {
                return Err(SpecParseError::AmbiguousLiteral {
                    literal: literal.to_string(),
                    first: owner.name.clone(),
                    second: second.name.clone(),
                });
            }

            components.push(FilterComponent {
                dimension: owner.name.clone(),
                value: literal.to_string(),
                negated,
            });
        }
        Ok(Self { components })
    }

    /// Number of components. More components is more specific.
    pub fn specificity(&self) -> usize {
        self.components.len()
    }

    /// True iff every component holds under the frozen selections.
    pub fn matches(&self, selections: &BTreeMap<String, String>) -> bool {
        self.components.iter().all(|component| {
            match selections.get(&component.dimension) {
                Some(selected) => (selected == &component.value) != component.negated,
                None => false,
            }
        })
    }
}

/// Validates every `@` key in the document, at any nesting depth, against the
/// declared dimensions. This runs unconditionally at load time: a variant
/// that would never be selected in this run still fails here.
pub fn validate_document(document: &Table, dimensions: &[Dimension]) -> Result<(), FilterError> {
    validate_table(document, dimensions)
}

fn validate_table(table: &Table, dimensions: &[Dimension]) -> Result<(), FilterError> {
    for (key, value) in table {
        if let Some((base, spec)) = key.split_once(FILTER_MARKER) {
            if base.is_empty() {
                return Err(FilterError::InvalidFilter {
                    key: key.clone(),
                    reason: SpecParseError::MissingBaseKey,
                });
            }
            FilterSpec::parse(spec, dimensions).map_err(|reason| FilterError::InvalidFilter {
                key: key.clone(),
                reason,
            })?;
        }
        validate_value(value, dimensions)?;
    }
    Ok(())
}

fn validate_value(value: &Value, dimensions: &[Dimension]) -> Result<(), FilterError> {
    match value {
        Value::Table(table) => validate_table(table, dimensions),
        Value::Array(array) => array
            .iter()
            .try_for_each(|item| validate_value(item, dimensions)),
        _ => Ok(()),
    }
}

/// Computes the effective document for the frozen selections: in every table,
/// each group of `base`/`base@spec` siblings collapses to the single best
/// match, recursively.
pub fn resolve_document(
    document: &Table,
    dimensions: &[Dimension],
    selections: &BTreeMap<String, String>,
) -> Result<Table, FilterError> {
    resolve_table(document, dimensions, selections)
}

fn resolve_table(
    table: &Table,
    dimensions: &[Dimension],
    selections: &BTreeMap<String, String>,
) -> Result<Table, FilterError> {
    // spec text and parsed form per matching variant, grouped by base key
    let mut matching: BTreeMap<&str, Vec<(&str, FilterSpec, &Value)>> = BTreeMap::new();
    let mut plain: Vec<(&str, &Value)> = Vec::new();

    for (key, value) in table {
        match key.split_once(FILTER_MARKER) {
            Some((base, spec)) => {
                if base.is_empty() {
                    return Err(FilterError::InvalidFilter {
                        key: key.clone(),
                        reason: SpecParseError::MissingBaseKey,
                    });
                }
                let parsed = FilterSpec::parse(spec, dimensions).map_err(|reason| {
                    FilterError::InvalidFilter {
                        key: key.clone(),
                        reason,
                    }
                })?;
                if parsed.matches(selections) {
                    matching.entry(base).or_default().push((spec, parsed, value));
                }
            }
            None => plain.push((key, value)),
        }
    }

    let mut winners: BTreeMap<&str, &Value> = BTreeMap::new();
    for (base, candidates) in matching {
        if let Some(winner) = pick_winner(base, &candidates)? {
            winners.insert(base, winner);
        }
    }

    let mut out = Table::new();
    for (key, value) in plain {
        let chosen = winners.remove(key).unwrap_or(value);
        out.insert(
            key.to_string(),
            resolve_value(chosen, dimensions, selections)?,
        );
    }
    // Variants with no unfiltered sibling still produce the key when matched.
    for (key, value) in winners {
        out.insert(
            key.to_string(),
            resolve_value(value, dimensions, selections)?,
        );
    }
    Ok(out)
}

/// Most specific match wins; an equal-specificity tie is fatal, never broken
/// by an implicit ordering.
fn pick_winner<'a>(
    base: &str,
    candidates: &[(&str, FilterSpec, &'a Value)],
) -> Result<Option<&'a Value>, FilterError> {
    let mut best: Option<(&str, usize, &'a Value)> = None;
    let mut tied_with: Option<&str> = None;
    for (spec, parsed, value) in candidates {
        let specificity = parsed.specificity();
        match best {
            Some((_, top, _)) if specificity < top => {}
            Some((_, top, _)) if specificity == top => tied_with = Some(*spec),
            _ => {
                best = Some((*spec, specificity, *value));
                tied_with = None;
            }
        }
    }
    match (best, tied_with) {
        (Some((left, _, _)), Some(right)) => Err(FilterError::AmbiguousFilter {
            key: base.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }),
        (Some((_, _, value)), None) => Ok(Some(value)),
        (None, _) => Ok(None),
    }
}

fn resolve_value(
    value: &Value,
    dimensions: &[Dimension],
    selections: &BTreeMap<String, String>,
) -> Result<Value, FilterError> {
    match value {
        Value::Table(table) => Ok(Value::Table(resolve_table(table, dimensions, selections)?)),
        Value::Array(array) => {
            let items = array
                .iter()
                .map(|item| resolve_value(item, dimensions, selections))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        other => Ok(other.clone()),
    }
}

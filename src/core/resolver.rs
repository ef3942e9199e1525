// src/core/resolver.rs

use crate::core::dimensions::Dimension;
use crate::core::paths::posix_path;
use crate::core::tokens::{TokenError, TokenSet};
use crate::models::TokenKind;
use std::collections::{BTreeMap, BTreeSet};

/// A flat substitution environment. Every value is stored raw; expansion is
/// depth-first with a visited stack, so cycles are reported with their full
/// chain and escaped braces (`{{`/`}}`) survive as literals.
///
/// Path-kind names are normalized to forward slashes *after* substitution,
/// never before: a substituted value may itself contain backslashes.
#[derive(Debug, Clone)]
pub struct TokenMap {
    raw: BTreeMap<String, String>,
    path_kind: BTreeSet<String>,
    builtins: BTreeSet<String>,
}

impl TokenMap {
    /// Builds the selection-aware substitution map: scalar and path tokens
    /// keep their raw value, each list token is replaced by its selected
    /// value.
    pub fn with_selections(set: &TokenSet, selections: &BTreeMap<String, String>) -> Self {
        Self::build(set, Some(selections))
    }

    /// Builds the pre-selection map used to resolve list-token elements:
    /// list tokens are absent, so referencing one is an unresolved
    /// placeholder.
    pub fn scalars_only(set: &TokenSet) -> Self {
        Self::build(set, None)
    }

    fn build(set: &TokenSet, selections: Option<&BTreeMap<String, String>>) -> Self {
        let mut raw = BTreeMap::new();
        let mut path_kind = BTreeSet::new();
        let mut builtins = BTreeSet::new();
        for (name, def) in set.defs() {
            match def.kind {
                TokenKind::List => {
                    if let Some(value) = selections.and_then(|s| s.get(name)) {
                        raw.insert(name.clone(), value.clone());
                    }
                }
                TokenKind::Scalar | TokenKind::Path => {
                    raw.insert(name.clone(), def.raw().unwrap_or_default().to_string());
                }
            }
            if def.kind == TokenKind::Path {
                path_kind.insert(name.clone());
            }
            if def.is_builtin {
                builtins.insert(name.clone());
            }
        }
        Self {
            raw,
            path_kind,
            builtins,
        }
    }

    /// Returns a map with extra raw values layered on top, for the per-tool
    /// option merge. Built-in names are never overridable; offending entries
    /// are dropped with a warning.
    pub fn with_overrides(&self, overrides: BTreeMap<String, String>) -> Self {
        let mut merged = self.clone();
        for (name, value) in overrides {
            if self.builtins.contains(&name) {
                log::warn!("'{name}' is a reserved token and cannot be overridden.");
                continue;
            }
            merged.raw.insert(name, value);
        }
        merged
    }

    /// Expands every `{name}` placeholder in `template` to a fixed point.
    pub fn expand(&self, template: &str) -> Result<String, TokenError> {
        self.expand_internal(template, &mut Vec::new())
    }

    /// Resolves the full flat map: every token name to its final text, with
    /// path normalization applied. This is also the load-time validation of
    /// the token reference graph; cycles and missing references surface here.
    pub fn resolved(&self) -> Result<BTreeMap<String, String>, TokenError> {
        self.raw
            .keys()
            .map(|name| {
                let value = self.resolve_name(name, &mut Vec::new())?;
                Ok((name.clone(), value))
            })
            .collect()
    }

    fn expand_internal(
        &self,
        template: &str,
        stack: &mut Vec<String>,
    ) -> Result<String, TokenError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        loop {
            let Some(pos) = rest.find(['{', '}']) else {
                out.push_str(rest);
                return Ok(out);
            };
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{{") {
                out.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                out.push('}');
                rest = after;
            } else if let Some(after) = tail.strip_prefix('}') {
                // A lone closing brace is literal text.
                out.push('}');
                rest = after;
            } else {
                let Some(close) = tail.find('}') else {
                    return Err(TokenError::UnbalancedBraces(template.to_string()));
                };
                let name = &tail[1..close];
                out.push_str(&self.resolve_name(name, stack)?);
                rest = &tail[close + 1..];
            }
        }
    }

    fn resolve_name(&self, name: &str, stack: &mut Vec<String>) -> Result<String, TokenError> {
        if let Some(position) = stack.iter().position(|entry| entry == name) {
            let mut chain: Vec<&str> = stack[position..].iter().map(String::as_str).collect();
            chain.push(name);
            return Err(TokenError::CyclicToken {
                chain: chain.join(" -> "),
            });
        }
        let raw = self
            .raw
            .get(name)
            .ok_or_else(|| TokenError::UnresolvedToken(name.to_string()))?;

        stack.push(name.to_string());
        let expanded = self.expand_internal(raw, stack)?;
        stack.pop();

        // Substitute first, then normalize: the substituted value might
        // itself need normalization.
        if self.path_kind.contains(name) {
            Ok(posix_path(&expanded))
        } else {
            Ok(expanded)
        }
    }
}

/// Resolves the declared dimensions from the token set: every list token with
/// a non-empty value set becomes a selectable axis, with placeholders inside
/// its elements substituted before the set is used anywhere.
pub fn resolve_dimensions(set: &TokenSet) -> Result<Vec<Dimension>, TokenError> {
    let scalars = TokenMap::scalars_only(set);
    let mut dimensions = Vec::new();
    for (name, def) in set.defs() {
        if def.kind != TokenKind::List || def.values.is_empty() {
            continue;
        }
        let allowed = def
            .values
            .iter()
            .map(|element| scalars.expand(element))
            .collect::<Result<Vec<_>, _>>()?;
        dimensions.push(Dimension {
            name: name.clone(),
            allowed,
        });
    }
    Ok(dimensions)
}

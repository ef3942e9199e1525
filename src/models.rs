// src/models.rs

use serde::Deserialize;
use std::collections::BTreeMap;

// --- `repokit.toml` MODELS (What is read from the configuration document) ---

/// The deserialized `[repo]` section of the document. Only needs `Deserialize`;
/// it is never written back. Unknown keys are tolerated so framework-level
/// flags can be added without breaking older binaries.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RepoSection {
    /// User token declarations (`[repo.tokens]`).
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenValue>,
    /// Explicit per-dimension default selections (`[repo.defaults]`).
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// A token value as written in `[repo.tokens]`. Uses `untagged` for flexible
/// syntax: a plain string, an ordered list (a dimension), or an extended table
/// with a `path` flag.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TokenValue {
    List(Vec<String>),
    Extended(ExtendedToken),
    Simple(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtendedToken {
    pub value: String,
    #[serde(default)]
    pub path: bool,
}

// --- TOKEN REGISTRY MODELS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A plain text value.
    Scalar,
    /// A text value normalized to forward slashes after substitution.
    Path,
    /// An ordered value set selectable as a CLI dimension.
    List,
}

/// A registered token definition. Scalar and path tokens carry exactly one
/// raw value; list tokens carry the full ordered value set.
#[derive(Debug, Clone)]
pub struct TokenDef {
    pub kind: TokenKind,
    pub values: Vec<String>,
    pub is_builtin: bool,
}

impl TokenDef {
    pub fn scalar(raw: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Scalar,
            values: vec![raw.into()],
            is_builtin: false,
        }
    }

    pub fn path(raw: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Path,
            values: vec![raw.into()],
            is_builtin: false,
        }
    }

    pub fn list(values: Vec<String>) -> Self {
        Self {
            kind: TokenKind::List,
            values,
            is_builtin: false,
        }
    }

    pub fn builtin(raw: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Scalar,
            values: vec![raw.into()],
            is_builtin: true,
        }
    }

    /// The single raw value of a scalar or path token.
    pub fn raw(&self) -> Option<&str> {
        match self.kind {
            TokenKind::List => None,
            TokenKind::Scalar | TokenKind::Path => self.values.first().map(String::as_str),
        }
    }
}

// --- STEP MODELS ---

/// One unit of work before placeholder substitution. The shorthand string form
/// in the document fills only `command`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub command: String,
    pub cwd: Option<String>,
    pub env_script: Option<String>,
    /// `KEY=VALUE` entries in declared order. Duplicates are kept; the
    /// executor applies them in order so later entries win.
    pub env: Vec<String>,
}

/// A `Step` with every placeholder fully substituted, ready for handoff to the
/// executor. Final and immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub command: String,
    pub cwd: Option<String>,
    pub env_script: Option<String>,
    pub env: Vec<String>,
}

// src/core/tokens.rs

use crate::core::paths::posix_path;
use crate::models::{RepoSection, TokenDef, TokenValue};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

lazy_static! {
    // Token names share the placeholder grammar: word characters only.
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("'{0}' is a reserved built-in token and cannot be redeclared.")]
    ReservedName(String),
    #[error("Token '{0}' is declared more than once.")]
    DuplicateToken(String),
    #[error("'{0}' is not a valid token name.")]
    InvalidName(String),
    #[error("Circular token reference: {chain}")]
    CyclicToken { chain: String },
    #[error("Unresolved placeholder '{{{0}}}'.")]
    UnresolvedToken(String),
    #[error("Unbalanced '{{' in template '{0}'.")]
    UnbalancedBraces(String),
}

/// Mutable registry of token definitions. Built-ins are seeded at
/// construction and can never be redeclared; `build()` freezes the registry
/// into the immutable [`TokenSet`] consumed by the resolver.
#[derive(Debug)]
pub struct TokenRegistry {
    defs: BTreeMap<String, TokenDef>,
}

/// The immutable view of all registered tokens. List tokens still carry their
/// full ordered value set at this stage; selection happens later.
#[derive(Debug, Clone)]
pub struct TokenSet {
    defs: BTreeMap<String, TokenDef>,
}

impl TokenRegistry {
    /// Creates a registry seeded with the built-in tokens derived from the
    /// host platform and the workspace root.
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            defs: builtin_defs(workspace_root),
        }
    }

    /// Creates a registry and registers every `[repo.tokens]` declaration.
    pub fn from_document(workspace_root: &Path, repo: &RepoSection) -> Result<Self, TokenError> {
        let mut registry = Self::new(workspace_root);
        for (name, value) in &repo.tokens {
            let def = match value {
                TokenValue::Simple(raw) => TokenDef::scalar(raw.clone()),
                TokenValue::List(values) => TokenDef::list(values.clone()),
                TokenValue::Extended(ext) if ext.path => TokenDef::path(ext.value.clone()),
                TokenValue::Extended(ext) => TokenDef::scalar(ext.value.clone()),
            };
            registry.register(name, def)?;
        }
        Ok(registry)
    }

    /// Registers a user token. Built-in names are reserved regardless of the
    /// definition's value; re-registering a user token is a duplicate.
    pub fn register(&mut self, name: &str, def: TokenDef) -> Result<(), TokenError> {
        if !NAME_RE.is_match(name) {
            return Err(TokenError::InvalidName(name.to_string()));
        }
        match self.defs.get(name) {
            Some(existing) if existing.is_builtin => {
                return Err(TokenError::ReservedName(name.to_string()));
            }
            Some(_) => return Err(TokenError::DuplicateToken(name.to_string())),
            None => {}
        }
        self.defs.insert(name.to_string(), def);
        Ok(())
    }

    /// Freezes the registry.
    pub fn build(self) -> TokenSet {
        TokenSet { defs: self.defs }
    }
}

impl TokenSet {
    pub fn defs(&self) -> &BTreeMap<String, TokenDef> {
        &self.defs
    }

    pub fn get(&self, name: &str) -> Option<&TokenDef> {
        self.defs.get(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.defs.get(name).is_some_and(|d| d.is_builtin)
    }
}

/// Built-in tokens computed from the host environment. These are reserved and
/// never accept overrides from the document.
fn builtin_defs(workspace_root: &Path) -> BTreeMap<String, TokenDef> {
    let is_windows = cfg!(target_os = "windows");
    let is_macos = cfg!(target_os = "macos");

    let workspace = posix_path(&workspace_root.to_string_lossy());
    let exe = std::env::current_exe()
        .map(|p| posix_path(&dunce::simplified(&p).to_string_lossy()))
        .unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
    let framework_root = Path::new(&exe)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let self_invocation = format!("\"{exe}\" --workspace-root \"{{workspace_root}}\"");

    let mut defs = BTreeMap::new();
    let mut builtin = |name: &str, raw: String| {
        defs.insert(name.to_string(), TokenDef::builtin(raw));
    };
    builtin("workspace_root", workspace);
    builtin("repokit", self_invocation);
    builtin("framework_root", framework_root);
    builtin("exe_ext", if is_windows { ".exe" } else { "" }.to_string());
    builtin("shell_ext", if is_windows { ".cmd" } else { ".sh" }.to_string());
    builtin(
        "lib_ext",
        if is_windows {
            ".dll"
        } else if is_macos {
            ".dylib"
        } else {
            ".so"
        }
        .to_string(),
    );
    builtin("path_sep", if is_windows { ";" } else { ":" }.to_string());
    defs
}

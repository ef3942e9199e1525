// src/core/context.rs

use crate::core::resolver::TokenMap;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Immutable per-invocation context threaded through every component that
/// compiles or runs steps. Replaces any process-wide state: everything a tool
/// needs travels in this value.
#[derive(Debug)]
pub struct ToolContext {
    pub workspace_root: PathBuf,
    /// Selection-aware substitution environment.
    pub tokens: TokenMap,
    /// Frozen `(dimension, selected value)` pairs.
    pub selections: BTreeMap<String, String>,
}

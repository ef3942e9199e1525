// src/constants.rs

/// The name of the main configuration document at the workspace root.
pub const CONFIG_FILENAME: &str = "repokit.toml";

/// The name of the optional, uncommitted overlay merged on top of the document.
pub const LOCAL_CONFIG_FILENAME: &str = "repokit.local.toml";

/// The reserved section holding token declarations and framework flags.
pub const RESERVED_SECTION: &str = "repo";

/// The key that makes a section runnable (possibly suffixed with `@filter`).
pub const STEPS_KEY: &str = "steps";

/// Marker between a base key and its filter spec (`steps@linux-x64`).
pub const FILTER_MARKER: char = '@';

/// Separator between components inside a filter spec (`steps@linux-x64,Release`).
pub const FILTER_SEPARATOR: char = ',';

/// Prefix negating a single filter component (`steps@!windows-x64`).
pub const NEGATION_PREFIX: char = '!';

/// Dimension names with dedicated auto-detection.
pub const PLATFORM_DIMENSION: &str = "platform";
pub const BUILD_TYPE_DIMENSION: &str = "build_type";

/// Name of the built-in introspection subcommand.
pub const TOKENS_COMMAND: &str = "tokens";

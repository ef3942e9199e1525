// src/core/dimensions.rs

use crate::constants::{BUILD_TYPE_DIMENSION, PLATFORM_DIMENSION};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DimensionError {
    #[error("Invalid value '{value}' for dimension '{dimension}'. Allowed: {allowed}.")]
    InvalidValue {
        dimension: String,
        value: String,
        allowed: String,
    },
}

/// A list-kind token used as a CLI-selectable axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    /// Ordered allowed values, already placeholder-resolved.
    pub allowed: Vec<String>,
}

/// Holds the frozen `(dimension, selected value)` set for this invocation.
///
/// Selection precedence per dimension: auto-detection (or the first declared
/// value) < `[repo.defaults]` < an explicit CLI flag. Explicit values outside
/// the allowed set are fatal; an out-of-set auto-detection falls back to the
/// first declared value so invariant 4 holds on every host.
#[derive(Debug)]
pub struct DimensionSelector {
    dimensions: Vec<Dimension>,
    selections: BTreeMap<String, String>,
}

impl DimensionSelector {
    pub fn new(
        dimensions: Vec<Dimension>,
        config_defaults: &BTreeMap<String, String>,
        cli_overrides: &BTreeMap<String, String>,
    ) -> Result<Self, DimensionError> {
        for name in config_defaults.keys() {
            if !dimensions.iter().any(|d| &d.name == name) {
                log::debug!("[repo.defaults] entry '{name}' does not name a declared dimension.");
            }
        }

        let mut selections = BTreeMap::new();
        for dimension in &dimensions {
            let explicit = cli_overrides
                .get(&dimension.name)
                .or_else(|| config_defaults.get(&dimension.name));
            let mut value = match explicit {
                Some(value) => value.clone(),
                None => auto_detect(dimension),
            };
            if dimension.name == BUILD_TYPE_DIMENSION {
                value = normalize_build_type(&value);
            }
            if !dimension.allowed.contains(&value) {
                if explicit.is_some() {
                    return Err(DimensionError::InvalidValue {
                        dimension: dimension.name.clone(),
                        value,
                        allowed: dimension.allowed.join(", "),
                    });
                }
                value = dimension.allowed.first().cloned().unwrap_or_default();
            }
            selections.insert(dimension.name.clone(), value);
        }

        Ok(Self {
            dimensions,
            selections,
        })
    }

    /// The selected value for a dimension, if declared.
    pub fn select(&self, name: &str) -> Option<&str> {
        self.selections.get(name).map(String::as_str)
    }

    /// The full frozen `(name, value)` set consumed by the filter engine.
    pub fn selections(&self) -> &BTreeMap<String, String> {
        &self.selections
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }
}

fn auto_detect(dimension: &Dimension) -> String {
    match dimension.name.as_str() {
        PLATFORM_DIMENSION => host_platform(),
        BUILD_TYPE_DIMENSION => "Debug".to_string(),
        _ => dimension.allowed.first().cloned().unwrap_or_default(),
    }
}

/// The host platform identifier in `os-arch` form (`linux-x64`,
/// `macos-arm64`, `windows-x64`, ...).
pub fn host_platform() -> String {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{}-{}", std::env::consts::OS, arch)
}

/// Normalizes a build type to CMake casing; unknown values pass through.
pub fn normalize_build_type(value: &str) -> String {
    match value.to_ascii_lowercase().as_str() {
        "debug" => "Debug".to_string(),
        "release" => "Release".to_string(),
        "relwithdebinfo" => "RelWithDebInfo".to_string(),
        "minsizerel" => "MinSizeRel".to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> Vec<Dimension> {
        vec![
            Dimension {
                name: "platform".to_string(),
                allowed: vec![
                    "linux-x64".to_string(),
                    "windows-x64".to_string(),
                    "macos-arm64".to_string(),
                ],
            },
            Dimension {
                name: "build_type".to_string(),
                allowed: vec!["Debug".to_string(), "Release".to_string()],
            },
        ]
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cli_override_selects() {
        let selector =
            DimensionSelector::new(dims(), &map(&[]), &map(&[("platform", "windows-x64")]))
                .unwrap();
        assert_eq!(selector.select("platform"), Some("windows-x64"));
    }

    #[test]
    fn test_out_of_set_cli_value_is_fatal() {
        let err =
            DimensionSelector::new(dims(), &map(&[]), &map(&[("platform", "beos-x64")]))
                .unwrap_err();
        let DimensionError::InvalidValue {
            dimension, value, ..
        } = err;
        assert_eq!(dimension, "platform");
        assert_eq!(value, "beos-x64");
    }

    #[test]
    fn test_out_of_set_config_default_is_fatal() {
        let result =
            DimensionSelector::new(dims(), &map(&[("build_type", "Profiling")]), &map(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_beats_config_default() {
        let selector = DimensionSelector::new(
            dims(),
            &map(&[("build_type", "Debug")]),
            &map(&[("build_type", "Release")]),
        )
        .unwrap();
        assert_eq!(selector.select("build_type"), Some("Release"));
    }

    #[test]
    fn test_config_default_beats_auto_detect() {
        let selector =
            DimensionSelector::new(dims(), &map(&[("build_type", "Release")]), &map(&[]))
                .unwrap();
        assert_eq!(selector.select("build_type"), Some("Release"));
    }

    #[test]
    fn test_build_type_auto_detects_to_debug() {
        let selector = DimensionSelector::new(dims(), &map(&[]), &map(&[])).unwrap();
        assert_eq!(selector.select("build_type"), Some("Debug"));
    }

    #[test]
    fn test_build_type_is_normalized_before_validation() {
        let selector =
            DimensionSelector::new(dims(), &map(&[]), &map(&[("build_type", "release")]))
                .unwrap();
        assert_eq!(selector.select("build_type"), Some("Release"));
    }

    #[test]
    fn test_unknown_dimension_auto_detects_to_first_value() {
        let custom = vec![Dimension {
            name: "toolchain".to_string(),
            allowed: vec!["gcc".to_string(), "clang".to_string()],
        }];
        let selector = DimensionSelector::new(custom, &map(&[]), &map(&[])).unwrap();
        assert_eq!(selector.select("toolchain"), Some("gcc"));
    }

    #[test]
    fn test_out_of_set_auto_detection_falls_back_to_first_value() {
        // A platform set that cannot match the host forces the fallback.
        let narrow = vec![Dimension {
            name: "platform".to_string(),
            allowed: vec!["imaginary-arch".to_string()],
        }];
        let selector = DimensionSelector::new(narrow, &map(&[]), &map(&[])).unwrap();
        assert_eq!(selector.select("platform"), Some("imaginary-arch"));
    }

    #[test]
    fn test_selections_are_exposed_for_all_dimensions() {
        let selector = DimensionSelector::new(dims(), &map(&[]), &map(&[])).unwrap();
        assert_eq!(selector.selections().len(), 2);
    }

    #[test]
    fn test_normalize_build_type_mapping() {
        assert_eq!(normalize_build_type("debug"), "Debug");
        assert_eq!(normalize_build_type("RELEASE"), "Release");
        assert_eq!(normalize_build_type("relwithdebinfo"), "RelWithDebInfo");
        assert_eq!(normalize_build_type("minsizerel"), "MinSizeRel");
        assert_eq!(normalize_build_type("Custom"), "Custom");
    }

    #[test]
    fn test_host_platform_shape() {
        let platform = host_platform();
        assert!(platform.contains('-'), "expected os-arch form: {platform}");
    }
}

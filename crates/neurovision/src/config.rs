//! Configuration for a NeuroVision engine.
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! yields a working configuration. A project may carry a
//! `.neurovision.yaml` at its root:
//!
//! ```yaml
//! scan:
//!   ignore: ["generated/**"]
//!   max_file_size: 524288
//! resolution:
//!   case_insensitive: true
//! telemetry:
//!   annotation_capacity: 100
//! impact:
//!   max_hops: 6
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::impact::ConfidencePolicy;

/// Name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".neurovision.yaml";

/// Environment variable overriding `telemetry.annotation_capacity`.
pub const ENV_ANNOTATION_CAPACITY: &str = "NEUROVISION_ANNOTATION_CAPACITY";

/// Environment variable overriding `impact.max_hops`.
pub const ENV_MAX_HOPS: &str = "NEUROVISION_MAX_HOPS";

/// Default per-node annotation log capacity.
pub const DEFAULT_ANNOTATION_CAPACITY: usize = 50;

/// Default size limit for scanned files (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File scanner settings
    pub scan: ScanConfig,
    /// Reference resolution settings
    pub resolution: ResolutionConfig,
    /// Telemetry bridge settings
    pub telemetry: TelemetryConfig,
    /// Defaults applied to impact queries
    pub impact: ImpactDefaults,
}

/// File scanner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Extra glob patterns, matched against paths relative to the root
    pub ignore: Vec<String>,
    /// Maximum directory depth below the root (`None` = unlimited)
    pub max_depth: Option<usize>,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Files larger than this many bytes are skipped with a warning
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Reference resolution settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Match reference paths against project files ignoring ASCII case
    pub case_insensitive: bool,
}

/// Telemetry bridge settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Maximum annotations retained per node
    pub annotation_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            annotation_capacity: DEFAULT_ANNOTATION_CAPACITY,
        }
    }
}

/// Defaults for impact queries that do not set their own limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImpactDefaults {
    /// Hop limit (`None` = unbounded)
    pub max_hops: Option<u32>,
    /// Witness paths reported per node
    pub max_paths: usize,
    /// Confidence scoring parameters
    pub confidence: ConfidencePolicy,
}

impl Default for ImpactDefaults {
    fn default() -> Self {
        Self {
            max_hops: None,
            max_paths: 1,
            confidence: ConfidencePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// it is not valid YAML for this structure.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `explicit` if given, else the project's `.neurovision.yaml` if it
    /// exists, else defaults. Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but is invalid, or if
    /// an environment override does not parse.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if an override is present but malformed.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_ANNOTATION_CAPACITY) {
            self.telemetry.annotation_capacity = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_ANNOTATION_CAPACITY} must be a positive integer, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_HOPS) {
            self.impact.max_hops = Some(raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_MAX_HOPS} must be a non-negative integer, got '{raw}'"))
            })?);
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.telemetry.annotation_capacity == 0 {
            return Err(Error::Config(
                "telemetry.annotation_capacity must be at least 1".to_string(),
            ));
        }
        if self.impact.max_paths == 0 {
            return Err(Error::Config(
                "impact.max_paths must be at least 1".to_string(),
            ));
        }
        self.impact.confidence.validate().map_err(Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.telemetry.annotation_capacity, 50);
        assert!(!config.resolution.case_insensitive);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let yaml = "scan:\n  ignore: [\"gen/**\"]\nimpact:\n  max_hops: 3\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.scan.ignore, vec!["gen/**".to_string()]);
        assert_eq!(config.scan.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.impact.max_hops, Some(3));
        assert_eq!(config.impact.max_paths, 1);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "scan:\n  depth: 3\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_rejects_zero_capacity() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "telemetry:\n  annotation_capacity: 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("annotation_capacity"));
    }

    #[test]
    fn discover_reads_project_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "resolution:\n  case_insensitive: true\n",
        )
        .unwrap();

        let config = Config::discover(temp.path(), None).unwrap();
        assert!(config.resolution.case_insensitive);
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_ANNOTATION_CAPACITY, "7"), (ENV_MAX_HOPS, " 2 ")]);
        let mut config = Config::default();

        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.telemetry.annotation_capacity, 7);
        assert_eq!(config.impact.max_hops, Some(2));
    }

    #[test]
    fn malformed_override_is_a_config_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_MAX_HOPS).then(|| "many".to_string())
        });
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains(ENV_MAX_HOPS)));
    }
}

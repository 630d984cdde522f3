//! Configuration management for reelforge.
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. Supports TOML configuration files with `[pool]`,
//! `[stages]`, `[refine]`, `[models]`, `[stagger]`, `[llm]`, `[validator]`,
//! and `[output]` sections.

mod discovery;
mod model;

pub use discovery::{CONFIG_RELATIVE_PATH, discover_config_file};
pub use model::*;

use std::path::Path;

use reelforge_utils::error::ConfigError;
use reelforge_utils::types::Severity;

impl Config {
    /// Load configuration with the standard precedence chain.
    ///
    /// If `overrides.config_path` is set, that file must exist; otherwise the
    /// nearest `.reelforge/config.toml` found by walking upward from the
    /// current directory is used, falling back to built-in defaults when no
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a missing explicit path, a parse failure, or
    /// a value that fails validation.
    pub fn discover(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = match &overrides.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(path)?
            }
            None => match discover_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` when the file cannot be read or decoded.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(size) = overrides.pool_size {
            self.pool.size = size;
        }
        if let Some(max) = overrides.max_iterations {
            self.refine.max_iterations = max;
        }
        if let Some(dir) = &overrides.output_dir {
            self.output.dir = dir.clone();
        }
        if let Some(tiers) = &overrides.tiers {
            self.models.tiers = tiers.clone();
        }
    }

    /// Validate value ranges. Called by `discover`; exposed for callers that
    /// build a `Config` programmatically.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pool.size".to_string(),
                reason: "worker pool must hold at least one permit".to_string(),
            });
        }
        if self.refine.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "refine.max_iterations".to_string(),
                reason: "at least one generation pass is required".to_string(),
            });
        }
        if self.models.tiers.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "models.tiers".to_string(),
                reason: "tier ladder must name at least one model".to_string(),
            });
        }
        if self.stages.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "stages.timeout_secs".to_string(),
                reason: "stage timeout must be non-zero".to_string(),
            });
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "llm.request_timeout_secs".to_string(),
                reason: "request timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout for a named stage, honoring per-stage overrides.
    #[must_use]
    pub fn stage_timeout_secs(&self, stage: &str) -> u64 {
        self.stages
            .timeouts
            .get(stage)
            .copied()
            .unwrap_or(self.stages.timeout_secs)
    }

    /// The minimum finding severity that forces another refinement pass.
    #[must_use]
    pub fn blocking_severity(&self) -> Severity {
        self.refine.blocking_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let cfg_dir = dir.join(".reelforge");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        let path = cfg_dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.pool.size >= 1);
        assert!(!config.models.tiers.is_empty());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let overrides = CliOverrides {
            config_path: Some(std::path::PathBuf::from("/nonexistent/config.toml")),
            ..CliOverrides::default()
        };
        match Config::discover(&overrides) {
            Err(ConfigError::NotFound { path }) => assert!(path.contains("nonexistent")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[pool]
size = 2

[refine]
max_iterations = 3
blocking_severity = "warning"

[models]
tiers = ["pro", "flash", "lite"]

[stagger]
base_delay_ms = 500
jitter_ms = 100
"#,
        );

        let overrides = CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        };
        let config = Config::discover(&overrides).unwrap();
        assert_eq!(config.pool.size, 2);
        assert_eq!(config.refine.max_iterations, 3);
        assert_eq!(config.blocking_severity(), Severity::Warning);
        assert_eq!(config.models.tiers, vec!["pro", "flash", "lite"]);
        assert_eq!(config.stagger.base_delay_ms, 500);
    }

    #[test]
    fn cli_overrides_beat_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[pool]\nsize = 2\n");

        let overrides = CliOverrides {
            config_path: Some(path),
            pool_size: Some(8),
            max_iterations: Some(1),
            ..CliOverrides::default()
        };
        let config = Config::discover(&overrides).unwrap();
        assert_eq!(config.pool.size, 8);
        assert_eq!(config.refine.max_iterations, 1);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[pool]\nsize = 0\n");
        let overrides = CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        };
        match Config::discover(&overrides) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "pool.size"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn empty_tier_ladder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[models]\ntiers = []\n");
        let overrides = CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        };
        assert!(matches!(
            Config::discover(&overrides),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn per_stage_timeout_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[stages]
timeout_secs = 300

[stages.timeouts]
analysis = 120
"#,
        );
        let overrides = CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        };
        let config = Config::discover(&overrides).unwrap();
        assert_eq!(config.stage_timeout_secs("analysis"), 120);
        assert_eq!(config.stage_timeout_secs("architecture"), 300);
    }
}

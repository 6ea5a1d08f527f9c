//! `dashcheck.toml` loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use dashcheck_common::{ConfigOverrides, ScenarioConfig};
use dashcheck_e2e::{ScenarioRegistry, TargetConfig};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dashcheck.toml";

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory searched recursively for scenario files
    pub scenarios_dir: PathBuf,

    /// Where `results.json` and failure screenshots go
    pub output_dir: PathBuf,

    /// Scenarios run at the same time
    pub concurrency: usize,

    /// Applied to every scenario before its own `config` section
    pub defaults: ConfigOverrides,

    /// Values for `${NAME}` placeholders in scenario files
    pub variables: HashMap<String, String>,

    /// Application to start before running
    pub target: Option<TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("dashcheck-results"),
            concurrency: 4,
            defaults: ConfigOverrides::default(),
            variables: HashMap::new(),
            target: None,
        }
    }
}

impl Config {
    /// Read `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?;

        // Relative directories are relative to the config file
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.scenarios_dir = rebase(base, &config.scenarios_dir);
            config.output_dir = rebase(base, &config.output_dir);
        }
        Ok(config)
    }

    /// Scenario defaults: built-in values, then `[defaults]`
    ///
    /// A configured target supplies the base URL unless `[defaults]` sets one.
    pub fn scenario_defaults(&self) -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        if let Some(target) = &self.target {
            config.base_url = target.base_url.clone();
        }
        self.defaults.apply(&mut config);
        config
    }

    /// Load and register every scenario under `scenarios_dir`
    pub fn load_registry(&self) -> Result<ScenarioRegistry> {
        let mut registry = ScenarioRegistry::new();
        registry
            .load_dir(&self.scenarios_dir, &self.scenario_defaults(), &self.variables)
            .with_context(|| {
                format!("failed to load scenarios from {}", self.scenarios_dir.display())
            })?;
        Ok(registry)
    }
}

fn rebase(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashcheck_common::FailurePolicy;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
scenarios_dir = "journeys"
concurrency = 2

[defaults]
default_timeout_ms = 8000
failure_policy = "best_effort"

[variables]
ADMIN_EMAIL = "admin@example.com"

[target]
command = ["npm", "run", "dev"]
base_url = "http://localhost:4000"
"#;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("dashcheck.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_sections_and_rebases_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashcheck.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scenarios_dir, dir.path().join("journeys"));
        assert_eq!(config.output_dir, dir.path().join("dashcheck-results"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.variables["ADMIN_EMAIL"], "admin@example.com");

        let defaults = config.scenario_defaults();
        assert_eq!(defaults.base_url, "http://localhost:4000");
        assert_eq!(defaults.default_timeout_ms, 8000);
        assert_eq!(defaults.failure_policy, FailurePolicy::BestEffort);
    }

    #[test]
    fn defaults_base_url_beats_target() {
        let config = Config {
            defaults: ConfigOverrides {
                base_url: Some("http://staging.test".into()),
                ..Default::default()
            },
            target: Some(TargetConfig::default()),
            ..Default::default()
        };
        assert_eq!(config.scenario_defaults().base_url, "http://staging.test");
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashcheck.toml");
        std::fs::write(&path, "concurrency = \"many\"").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("dashcheck.toml"));
    }

    #[test]
    fn registry_loads_with_variables() {
        let dir = TempDir::new().unwrap();
        let scenarios = dir.path().join("scenarios");
        std::fs::create_dir(&scenarios).unwrap();
        std::fs::write(
            scenarios.join("login.yaml"),
            "name: login\nsteps:\n  - action: fill\n    locator: \"label=Email\"\n    value: ${ADMIN_EMAIL}\n",
        )
        .unwrap();

        let mut config = Config {
            scenarios_dir: scenarios,
            ..Default::default()
        };
        assert!(config.load_registry().is_err());

        config
            .variables
            .insert("ADMIN_EMAIL".into(), "admin@example.com".into());
        let registry = config.load_registry().unwrap();
        assert_eq!(registry.names(), vec!["login"]);
    }
}

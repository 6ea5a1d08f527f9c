//! Scenarios: named step sequences with assertions and configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::assertion::Assertion;
use crate::error::{Error, Result};
use crate::interpolate::interpolate_value;
use crate::step::{retry, Backoff, Step};
use crate::types::{ConfigOverrides, ScenarioConfig};

/// One end-to-end UI test case
///
/// Scenarios are immutable once built and can be run any number of times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    name: String,
    description: String,
    tags: Vec<String>,
    steps: Vec<Step>,
    assertions: Vec<Assertion>,
    config: ScenarioConfig,
}

impl Scenario {
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Parse a scenario from YAML, applying its config section over `defaults`
    pub fn from_yaml(yaml: &str, defaults: &ScenarioConfig) -> Result<Self> {
        let file: ScenarioFile = serde_yaml::from_str(yaml)?;
        file.into_scenario(defaults)
    }

    /// Load a scenario file, substituting `${VAR}` placeholders in its strings
    pub fn from_file(
        path: &Path,
        defaults: &ScenarioConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let source_name = path.display().to_string();
        let load_error = |err: serde_yaml::Error| Error::Load {
            path: source_name.clone(),
            reason: err.to_string(),
        };

        let mut doc: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(load_error)?;
        interpolate_value(&mut doc, vars, &source_name)?;
        let file: ScenarioFile = serde_yaml::from_value(doc).map_err(load_error)?;
        file.into_scenario(defaults)
    }

    /// Load every `.yaml`/`.yml` scenario under `dir`, sorted by path
    pub fn load_all(
        dir: &Path,
        defaults: &ScenarioConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut scenarios = Vec::with_capacity(paths.len());
        for path in paths {
            debug!(path = %path.display(), "loading scenario");
            scenarios.push(Self::from_file(&path, defaults, vars)?);
        }
        Ok(scenarios)
    }
}

/// On-disk scenario representation
#[derive(Debug, Clone, Deserialize)]
struct ScenarioFile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    config: ConfigOverrides,
    #[serde(default)]
    steps: Vec<StepEntry>,
    #[serde(default)]
    assertions: Vec<Assertion>,
}

/// A step, or a bounded retry wrapped around one
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StepEntry {
    Retry { retry: RetryEntry },
    Plain(Step),
}

#[derive(Debug, Clone, Deserialize)]
struct RetryEntry {
    step: Step,
    max_attempts: u32,
    #[serde(default = "no_backoff")]
    backoff: Backoff,
}

fn no_backoff() -> Backoff {
    Backoff::None
}

impl ScenarioFile {
    fn into_scenario(self, defaults: &ScenarioConfig) -> Result<Scenario> {
        let mut builder = ScenarioBuilder::new(self.name)
            .description(self.description)
            .config(defaults.merged(&self.config));
        for tag in self.tags {
            builder = builder.tag(tag);
        }
        for entry in self.steps {
            builder = match entry {
                StepEntry::Plain(step) => builder.step(step),
                StepEntry::Retry { retry } => {
                    builder.retry(retry.step, retry.max_attempts, retry.backoff)
                }
            };
        }
        for assertion in self.assertions {
            builder = builder.assert(assertion);
        }
        builder.build()
    }
}

/// Fluent scenario construction
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    description: String,
    tags: Vec<String>,
    steps: Vec<Step>,
    assertions: Vec<Assertion>,
    config: ScenarioConfig,
    errors: Vec<String>,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            steps: Vec::new(),
            assertions: Vec::new(),
            config: ScenarioConfig::default(),
            errors: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn config(mut self, config: ScenarioConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Append a step as `max_attempts` explicit attempts
    pub fn retry(mut self, step: Step, max_attempts: u32, backoff: Backoff) -> Self {
        match retry(step, max_attempts, backoff) {
            Ok(steps) => self.steps.extend(steps),
            Err(e) => self.errors.push(e.to_string()),
        }
        self
    }

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn build(self) -> Result<Scenario> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("<unnamed>", "scenario name must not be empty"));
        }
        if let Some(reason) = self.errors.into_iter().next() {
            return Err(Error::invalid(self.name, reason));
        }
        if self.config.base_url.trim().is_empty() {
            return Err(Error::invalid(self.name, "base_url must not be empty"));
        }
        if self.config.default_timeout_ms == 0 {
            return Err(Error::invalid(self.name, "default_timeout_ms must be positive"));
        }

        Ok(Scenario {
            name: self.name,
            description: self.description,
            tags: self.tags,
            steps: self.steps,
            assertions: self.assertions,
            config: self.config,
        })
    }
}

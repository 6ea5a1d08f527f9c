//! List Command

use anyhow::Result;
use serde::Serialize;

use dashcheck_common::Scenario;

use crate::config::Config;
use crate::output::{print_list, OutputFormat, TableDisplay};

/// Scenario display wrapper for serialization
#[derive(Debug, Serialize)]
pub struct ScenarioDisplay {
    pub name: String,
    pub tags: Vec<String>,
    pub steps: usize,
    pub assertions: usize,
    pub base_url: String,
    pub description: String,
}

impl From<&Scenario> for ScenarioDisplay {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name().to_string(),
            tags: scenario.tags().to_vec(),
            steps: scenario.steps().len(),
            assertions: scenario.assertions().len(),
            base_url: scenario.config().base_url.clone(),
            description: scenario.description().to_string(),
        }
    }
}

impl TableDisplay for ScenarioDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Tags", "Steps", "Assertions", "Base URL", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(", "),
            self.steps.to_string(),
            self.assertions.to_string(),
            self.base_url.clone(),
            self.description.clone(),
        ]
    }
}

pub fn execute(config: &Config, tag: Option<&str>, format: OutputFormat) -> Result<()> {
    let registry = config.load_registry()?;
    let items: Vec<ScenarioDisplay> = registry
        .iter()
        .filter(|s| tag.map_or(true, |t| s.has_tag(t)))
        .map(ScenarioDisplay::from)
        .collect();
    print_list(&items, format);
    Ok(())
}

//! Scenario registry and suite execution

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use dashcheck_common::{Scenario, ScenarioConfig};

use crate::error::{E2eError, E2eResult};
use crate::result::{ExecutionResult, SuiteReport};
use crate::runner::ScenarioRunner;

/// Selects scenarios by name and/or tag
///
/// An empty list places no restriction; a scenario must satisfy both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    pub names: Vec<String>,
    pub tags: Vec<String>,
}

impl ScenarioFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn matches(&self, scenario: &Scenario) -> bool {
        let name_ok = self.names.is_empty() || self.names.iter().any(|n| n == scenario.name());
        let tag_ok = self.tags.is_empty() || self.tags.iter().any(|t| scenario.has_tag(t));
        name_ok && tag_ok
    }
}

/// Named scenarios, in registration order
#[derive(Debug, Default)]
pub struct ScenarioRegistry {
    scenarios: Vec<Arc<Scenario>>,
    index: HashMap<String, usize>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scenario; names are unique
    pub fn register(&mut self, scenario: Scenario) -> E2eResult<()> {
        if self.index.contains_key(scenario.name()) {
            return Err(E2eError::DuplicateScenario(scenario.name().to_string()));
        }
        self.index
            .insert(scenario.name().to_string(), self.scenarios.len());
        self.scenarios.push(Arc::new(scenario));
        Ok(())
    }

    /// Register every scenario file under `dir`
    pub fn load_dir(
        &mut self,
        dir: &Path,
        defaults: &ScenarioConfig,
        vars: &HashMap<String, String>,
    ) -> E2eResult<usize> {
        let scenarios = Scenario::load_all(dir, defaults, vars)?;
        let count = scenarios.len();
        for scenario in scenarios {
            self.register(scenario)?;
        }
        info!("Loaded {} scenario(s) from {}", count, dir.display());
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.index.get(name).map(|&i| self.scenarios[i].as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().map(|s| s.as_ref())
    }

    /// Scenarios matching `filter`, in registration order
    ///
    /// Fails if the filter names a scenario that is not registered.
    pub fn select(&self, filter: &ScenarioFilter) -> E2eResult<Vec<Arc<Scenario>>> {
        if let Some(missing) = filter.names.iter().find(|n| !self.index.contains_key(*n)) {
            return Err(E2eError::ScenarioNotFound(missing.clone()));
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    /// Run the selected scenarios, at most `concurrency` at a time
    ///
    /// Each scenario runs in its own task with its own session. Results
    /// come back in registration order regardless of completion order.
    pub async fn run_all(
        &self,
        runner: &ScenarioRunner,
        filter: &ScenarioFilter,
        concurrency: usize,
    ) -> E2eResult<SuiteReport> {
        let selected = self.select(filter)?;
        let started_at = Utc::now();
        info!(
            "Running {} scenario(s), concurrency {}",
            selected.len(),
            concurrency.max(1)
        );

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let collected: Arc<Mutex<Vec<(usize, ExecutionResult)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(selected.len())));
        let mut tasks = JoinSet::new();

        for (position, scenario) in selected.iter().cloned().enumerate() {
            let runner = runner.clone();
            let semaphore = semaphore.clone();
            let collected = collected.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = runner.run(&scenario).await;
                collected.lock().push((position, result));
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("scenario task failed: {e}");
            }
        }

        let mut collected = std::mem::take(&mut *collected.lock());
        collected.sort_by_key(|(position, _)| *position);

        // A task that panicked left no result behind
        let reported: HashSet<usize> = collected.iter().map(|(p, _)| *p).collect();
        for (position, scenario) in selected.iter().enumerate() {
            if !reported.contains(&position) {
                collected.push((
                    position,
                    ExecutionResult::not_started(
                        scenario.name(),
                        scenario.steps().len(),
                        started_at,
                        "scenario task panicked",
                    ),
                ));
            }
        }
        collected.sort_by_key(|(position, _)| *position);

        let results = collected.into_iter().map(|(_, r)| r).collect();
        let report = SuiteReport::new(runner.sessions().driver_name(), started_at, results);
        info!(
            "Scenario results: {} passed, {} failed, {} errored ({} ms)",
            report.passed,
            report.failed,
            report.errored,
            report.duration_ms()
        );
        Ok(report)
    }
}

//! Run Command

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use dashcheck_common::FailurePolicy;
use dashcheck_e2e::{
    CancellationToken, ChromiumDriver, ScenarioFilter, ScenarioRunner, SessionManager, TargetApp,
};

use crate::config::Config;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Run only the named scenario (repeatable)
    #[arg(short, long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Run only scenarios carrying the tag (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Scenarios run at the same time
    #[arg(short, long, env = "DASHCHECK_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Base URL relative navigations are joined onto
    #[arg(long, env = "DASHCHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Keep going after a failed step
    #[arg(long)]
    pub best_effort: bool,

    /// Do not start the configured target application
    #[arg(long)]
    pub no_target: bool,

    /// Browser executable
    #[arg(long, env = "DASHCHECK_CHROME_BIN")]
    pub chrome: Option<PathBuf>,

    /// Directory for results.json and screenshots
    #[arg(short, long, env = "DASHCHECK_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Fold the flags into the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.headed {
            config.defaults.headless = Some(false);
        }
        if let Some(url) = &self.base_url {
            config.defaults.base_url = Some(url.clone());
        }
        if self.best_effort {
            config.defaults.failure_policy = Some(FailurePolicy::BestEffort);
        }
        if let Some(chrome) = &self.chrome {
            config.defaults.chrome_executable = Some(chrome.clone());
        }
        if self.no_target {
            config.target = None;
        }
    }

    pub fn filter(&self) -> ScenarioFilter {
        ScenarioFilter {
            names: self.names.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Run the selected scenarios; `Ok(false)` when any did not pass
pub async fn execute(args: RunArgs, mut config: Config, format: OutputFormat) -> Result<bool> {
    args.apply(&mut config);
    let registry = config.load_registry()?;
    let filter = args.filter();

    let _target = match config.target.clone() {
        Some(target) if !target.command.is_empty() => Some(
            TargetApp::spawn(target)
                .await
                .context("failed to start the target application")?,
        ),
        _ => None,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running scenarios");
            on_interrupt.cancel();
        }
    });

    let sessions = Arc::new(SessionManager::new(Arc::new(ChromiumDriver::new())));
    let runner = ScenarioRunner::new(sessions.clone())
        .with_artifacts_dir(config.output_dir.join("screenshots"))
        .with_cancellation(cancel.clone());

    let report = registry
        .run_all(&runner, &filter, config.concurrency)
        .await
        .context("failed to run scenarios")?;

    let stats = sessions.stats();
    info!(
        acquired = stats.acquired(),
        released = stats.released(),
        "browser sessions"
    );

    let path = report
        .write_json(&config.output_dir)
        .context("failed to write results")?;

    output::print_report(&report, format);
    if !matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        output::print_info(&format!("Results written to {}", path.display()));
    }
    if cancel.is_cancelled() {
        output::print_warning("Run was interrupted");
    }
    Ok(report.all_passed())
}

//! Target application management - spawning the app under test and
//! probing it until it serves pages

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// How to start the application the scenarios drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Program and arguments, e.g. `["npm", "run", "dev"]`
    pub command: Vec<String>,

    /// Working directory for the command
    pub cwd: Option<PathBuf>,

    /// Extra environment for the command
    pub env: HashMap<String, String>,

    /// URL the app will serve
    pub base_url: String,

    /// Path probed for readiness, relative to `base_url`
    pub ready_path: String,

    /// Timeout for the app to become reachable, in milliseconds
    pub startup_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            base_url: "http://localhost:3000".to_string(),
            ready_path: "/".to_string(),
            startup_timeout_ms: 60_000,
        }
    }
}

impl TargetConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn ready_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.ready_path.trim_start_matches('/')
        )
    }
}

/// Handle to a running target application
pub struct TargetApp {
    child: Option<Child>,
    base_url: String,
}

impl TargetApp {
    /// Spawn the application and wait until it answers
    pub async fn spawn(config: TargetConfig) -> E2eResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| E2eError::TargetStartup("no command configured".to_string()))?;

        info!("Starting target application: {}", config.command.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&config.env)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::TargetStartup(format!("failed to spawn {}: {}", program, e))
        })?;

        let mut handle = TargetApp {
            child: Some(child),
            base_url: config.base_url.clone(),
        };

        if let Err(e) = wait_until_reachable(&config.ready_url(), config.startup_timeout()).await {
            handle.stop();
            return Err(e);
        }

        info!("Target is reachable at {}", handle.base_url);
        Ok(handle)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the application: SIGTERM first, then kill
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!("Stopping target application (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        if let Ok(None) = child.try_wait() {
            let _ = child.kill();
        }
        let _ = child.wait();
    }
}

impl Drop for TargetApp {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll `url` until it answers with a success status
pub async fn wait_until_reachable(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(url, attempts, "target reachable");
                return Ok(());
            }
            Ok(resp) => warn!("Readiness probe returned {}", resp.status()),
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                if !e.is_connect() {
                    warn!("Readiness probe error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout {
            return Err(E2eError::TargetUnreachable {
                url: url.to_string(),
                attempts,
            });
        }
        sleep(Duration::from_millis(250)).await;
    }
}

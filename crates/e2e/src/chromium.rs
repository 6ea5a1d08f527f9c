//! Chromium driver over the DevTools protocol
//!
//! Each session launches its own browser process against a throwaway
//! profile directory, so cookies and storage never leak between scenarios.
//! Element work is done by the embedded resolver script; the main frame is
//! evaluated in the page's default context and nested frames in an isolated
//! world, created once per frame document and reused until it goes away.
//!
//! Site isolation is switched off at launch. Cross-origin iframes then live
//! in the page's renderer and appear in its frame tree, so one page session
//! reaches every frame.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, GetFrameTreeParams, NavigateParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use dashcheck_common::{LoadState, Locator};

use crate::dom_scripts::{resolver_call, ResolverOp};
use crate::driver::{BrowserDriver, BrowserSession, ElementProbe, FrameInfo, LaunchOptions};
use crate::error::{E2eError, E2eResult};

const ISOLATED_WORLD: &str = "dashcheck";

const SITE_ISOLATION_FEATURES: &str = "IsolateOrigins,site-per-process";

/// Launches a local Chromium per session
#[derive(Debug, Default, Clone)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn launch(&self, options: &LaunchOptions) -> E2eResult<Box<dyn BrowserSession>> {
        let profile = tempfile::Builder::new()
            .prefix("dashcheck-profile-")
            .tempdir()?;
        let config = build_config(options, profile.path())?;

        let (mut browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::Launch(e.to_string()))?;
        let handler = spawn_handler(handler);

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(E2eError::Launch(e.to_string()));
            }
        };
        debug!(profile = %profile.path().display(), "chromium session started");

        Ok(Box::new(ChromiumSession {
            page,
            browser: Mutex::new(Some(browser)),
            handler,
            profile: Mutex::new(Some(profile)),
            main_frame: parking_lot::Mutex::new(None),
            worlds: parking_lot::Mutex::new(HashMap::new()),
        }))
    }
}

fn build_config(options: &LaunchOptions, profile: &Path) -> E2eResult<BrowserConfig> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: options.viewport.width,
        height: options.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: options.viewport.width >= options.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();
    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder
        .viewport(viewport)
        .request_timeout(options.request_timeout)
        .user_data_dir(profile)
        .args(frame_access_args(&options.args));

    let builder = if options.headless {
        builder
    } else {
        builder.with_head()
    };

    builder.build().map_err(E2eError::Launch)
}

/// Launch flags plus the switches that keep cross-origin frames in-process
///
/// An existing `--disable-features=` list is extended rather than repeated,
/// since Chromium only honours the last occurrence of a switch.
fn frame_access_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + 2);
    let mut merged = false;
    for arg in args {
        match arg.strip_prefix("--disable-features=") {
            Some(existing) if !merged => {
                out.push(format!("--disable-features={existing},{SITE_ISOLATION_FEATURES}"));
                merged = true;
            }
            _ => out.push(arg.clone()),
        }
    }
    if !merged {
        out.push(format!("--disable-features={SITE_ISOLATION_FEATURES}"));
    }
    if !args.iter().any(|a| a == "--disable-site-isolation-trials") {
        out.push("--disable-site-isolation-trials".to_string());
    }
    out
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                debug!("chromium handler error: {err}");
            }
        }
    })
}

fn driver_error<E: std::fmt::Display>(err: E) -> E2eError {
    E2eError::Driver(err.to_string())
}

/// One browser process with one page
pub struct ChromiumSession {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    profile: Mutex<Option<TempDir>>,
    /// Stable for the life of the tab
    main_frame: parking_lot::Mutex<Option<String>>,
    /// Isolated world execution context per nested frame
    worlds: parking_lot::Mutex<HashMap<String, i64>>,
}

/// Result of a mutating resolver operation
#[derive(Debug, Deserialize)]
struct OpOutcome {
    ok: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutcome {
    found: bool,
    #[serde(flatten)]
    probe: Option<ElementProbe>,
}

impl ChromiumSession {
    async fn main_frame_id(&self) -> E2eResult<String> {
        let cached = self.main_frame.lock().clone();
        if let Some(id) = cached {
            return Ok(id);
        }
        let id = self
            .frame_tree()
            .await?
            .into_iter()
            .find(|f| f.is_main())
            .map(|f| f.id)
            .ok_or_else(|| E2eError::Driver("page has no main frame".to_string()))?;
        *self.main_frame.lock() = Some(id.clone());
        Ok(id)
    }

    /// Execution context of the isolated world in `frame`, created on first use
    async fn isolated_world(&self, frame: &str) -> E2eResult<i64> {
        let cached = self.worlds.lock().get(frame).copied();
        if let Some(context) = cached {
            return Ok(context);
        }
        let world: CreateIsolatedWorldParams = serde_json::from_value(json!({
            "frameId": frame,
            "worldName": ISOLATED_WORLD,
            "grantUniveralAccess": true,
        }))?;
        let created = self.page.execute(world).await.map_err(driver_error)?;
        let created = serde_json::to_value(&created.result)?;
        let context = created["executionContextId"].as_i64().ok_or_else(|| {
            E2eError::Driver(format!("no execution context for frame {frame}"))
        })?;
        self.worlds.lock().insert(frame.to_string(), context);
        debug!(frame, context, "created isolated world");
        Ok(context)
    }

    /// `Runtime.evaluate`; the inner error is a failed protocol call
    async fn runtime_evaluate(
        &self,
        context: Option<i64>,
        expression: &str,
    ) -> E2eResult<Result<Value, String>> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        if let Some(context) = context {
            params["contextId"] = json!(context);
        }
        let command: EvaluateParams = serde_json::from_value(params)?;
        match self.page.execute(command).await {
            Ok(response) => Ok(Ok(serde_json::to_value(&response.result)?)),
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    /// Evaluate `expression` in `frame` and return its JSON value
    async fn evaluate_in(&self, frame: &str, expression: &str) -> E2eResult<Value> {
        if self.main_frame_id().await? == frame {
            let response = self
                .runtime_evaluate(None, expression)
                .await?
                .map_err(E2eError::Driver)?;
            return script_value(response);
        }

        let context = self.isolated_world(frame).await?;
        let response = match self.runtime_evaluate(Some(context), expression).await? {
            Ok(response) => response,
            Err(reason) => {
                // The frame navigated and its world went with the old document
                debug!(frame, %reason, "isolated world gone, recreating");
                self.worlds.lock().remove(frame);
                let fresh = self.isolated_world(frame).await?;
                self.runtime_evaluate(Some(fresh), expression)
                    .await?
                    .map_err(E2eError::Driver)?
            }
        };
        script_value(response)
    }

    async fn resolver(
        &self,
        frame: &str,
        locator: &Locator,
        op: ResolverOp,
        arg: Option<&str>,
    ) -> E2eResult<Value> {
        self.evaluate_in(frame, &resolver_call(locator, op, arg)).await
    }

    async fn act(
        &self,
        frame: &str,
        locator: &Locator,
        op: ResolverOp,
        arg: Option<&str>,
    ) -> E2eResult<()> {
        let outcome: OpOutcome = serde_json::from_value(self.resolver(frame, locator, op, arg).await?)?;
        if outcome.ok {
            Ok(())
        } else {
            Err(E2eError::ElementNotInteractable {
                locator: locator.to_string(),
                reason: outcome.reason.unwrap_or_else(|| "rejected".to_string()),
            })
        }
    }
}

fn script_value(response: Value) -> E2eResult<Value> {
    if let Some(details) = response.get("exceptionDetails") {
        let message = details["exception"]["description"]
            .as_str()
            .or_else(|| details["text"].as_str())
            .unwrap_or("script exception");
        return Err(E2eError::Driver(message.to_string()));
    }
    Ok(response["result"]["value"].clone())
}

fn collect_frames(node: &Value, parent: Option<&str>, out: &mut Vec<FrameInfo>) {
    let frame = &node["frame"];
    let Some(id) = frame["id"].as_str() else {
        return;
    };
    out.push(FrameInfo {
        id: id.to_string(),
        parent: parent.map(str::to_string),
        url: frame["url"].as_str().unwrap_or_default().to_string(),
        name: frame["name"]
            .as_str()
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    });
    if let Some(children) = node["childFrames"].as_array() {
        for child in children {
            collect_frames(child, Some(id), out);
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let command: NavigateParams = serde_json::from_value(json!({ "url": url }))?;
        let response = self.page.execute(command).await.map_err(driver_error)?;
        let response = serde_json::to_value(&response.result)?;
        match response["errorText"].as_str() {
            Some(error) if !error.is_empty() => {
                Err(E2eError::Driver(format!("navigation to {url} failed: {error}")))
            }
            _ => Ok(()),
        }
    }

    async fn frame_tree(&self) -> E2eResult<Vec<FrameInfo>> {
        let response = self
            .page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(driver_error)?;
        let response = serde_json::to_value(&response.result)?;
        let mut frames = Vec::new();
        collect_frames(&response["frameTree"], None, &mut frames);

        let live: HashSet<&str> = frames.iter().map(|f| f.id.as_str()).collect();
        self.worlds.lock().retain(|id, _| live.contains(id.as_str()));
        if let Some(main) = frames.iter().find(|f| f.is_main()) {
            *self.main_frame.lock() = Some(main.id.clone());
        }
        Ok(frames)
    }

    async fn ready_state(&self, frame: &str) -> E2eResult<LoadState> {
        let state = self.evaluate_in(frame, "document.readyState").await?;
        Ok(LoadState::from_ready_state(state.as_str().unwrap_or_default()))
    }

    async fn count(&self, frame: &str, locator: &Locator) -> E2eResult<usize> {
        let value = self.resolver(frame, locator, ResolverOp::Count, None).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn probe(&self, frame: &str, locator: &Locator) -> E2eResult<Option<ElementProbe>> {
        let value = self.resolver(frame, locator, ResolverOp::Probe, None).await?;
        let outcome: ProbeOutcome = serde_json::from_value(value)?;
        Ok(if outcome.found { outcome.probe } else { None })
    }

    async fn scroll_into_view(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.act(frame, locator, ResolverOp::ScrollIntoView, None).await
    }

    async fn fill(&self, frame: &str, locator: &Locator, value: &str) -> E2eResult<()> {
        self.act(frame, locator, ResolverOp::Fill, Some(value)).await
    }

    async fn clear(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.act(frame, locator, ResolverOp::Clear, None).await
    }

    async fn click(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.act(frame, locator, ResolverOp::Click, None).await
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> E2eResult<()> {
        self.page
            .evaluate(format!("window.scrollBy({dx}, {dy}); true"))
            .await
            .map_err(driver_error)?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.page
            .evaluate("window.location.href")
            .await
            .map_err(driver_error)?
            .into_value::<String>()
            .map_err(driver_error)
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(driver_error)
    }

    async fn close(&self) -> E2eResult<()> {
        let browser = self.browser.lock().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ()).map_err(driver_error);
                if let Err(e) = browser.wait().await {
                    warn!("waiting for chromium to exit failed: {e}");
                }
                closed
            }
            None => Ok(()),
        };
        self.handler.abort();
        // Dropping the TempDir removes the profile
        self.profile.lock().await.take();
        result
    }
}

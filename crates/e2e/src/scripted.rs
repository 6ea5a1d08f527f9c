//! In-memory browser for exercising the engine without Chromium
//!
//! A [`ScriptedSite`] maps URL paths to page models. Every launched session
//! gets its own copy of the site, so state written by one session (input
//! values, the current URL) is invisible to every other. The driver keeps
//! launch/close counters and a journal of performed actions for tests to
//! inspect.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dashcheck_common::{LoadState, Locator, Selector};

use crate::driver::{BrowserDriver, BrowserSession, ElementProbe, FrameInfo, LaunchOptions};
use crate::error::{E2eError, E2eResult};

const MAIN_FRAME: &str = "main";

/// When a frame's document finishes loading, relative to navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    After(Duration),
    Never,
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::After(Duration::ZERO)
    }
}

/// What clicking an element does
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    /// Navigate to another path on the site
    Navigate(String),
    /// Navigate, copying the value of `from` on the current page into the
    /// text of `into` on the destination page
    NavigateCarrying {
        path: String,
        from: Selector,
        into: Selector,
    },
}

/// One element in a page model
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedElement {
    selectors: Vec<Selector>,
    text: String,
    value: Option<String>,
    visible: bool,
    in_viewport: bool,
    reachable: bool,
    editable: bool,
    appears_after: Duration,
    on_click: Option<ClickEffect>,
}

impl ScriptedElement {
    pub fn new(selector: Selector) -> Self {
        Self {
            selectors: vec![selector],
            text: String::new(),
            value: None,
            visible: true,
            in_viewport: true,
            reachable: true,
            editable: false,
            appears_after: Duration::ZERO,
            on_click: None,
        }
    }

    /// An editable input with an empty value
    pub fn input(selector: Selector) -> Self {
        let mut element = Self::new(selector);
        element.value = Some(String::new());
        element.editable = true;
        element
    }

    /// Also match `selector`
    pub fn alias(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Below the fold until scrolled into view
    pub fn offscreen(mut self) -> Self {
        self.in_viewport = false;
        self
    }

    /// Outside the viewport even after scrolling
    pub fn unreachable(mut self) -> Self {
        self.in_viewport = false;
        self.reachable = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        self.selectors.iter().any(|s| s == selector)
    }
}

/// A nested frame in a page model
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFrame {
    id: String,
    parent: Option<String>,
    url: String,
    name: Option<String>,
    readiness: Readiness,
    elements: Vec<ScriptedElement>,
}

impl ScriptedFrame {
    /// A frame whose parent is the main document
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            url: url.into(),
            name: None,
            readiness: Readiness::default(),
            elements: Vec::new(),
        }
    }

    /// Nest inside another scripted frame
    pub fn inside(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn element(mut self, element: ScriptedElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// A page model served at one path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedPage {
    elements: Vec<ScriptedElement>,
    frames: Vec<ScriptedFrame>,
    readiness: Readiness,
    commit_delay: Duration,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, element: ScriptedElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn frame(mut self, frame: ScriptedFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Main document readiness
    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Delay before navigation to this page commits
    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    fn elements_in(&self, frame: &str) -> Option<&Vec<ScriptedElement>> {
        if frame == MAIN_FRAME {
            Some(&self.elements)
        } else {
            self.frames.iter().find(|f| f.id == frame).map(|f| &f.elements)
        }
    }

    fn elements_in_mut(&mut self, frame: &str) -> Option<&mut Vec<ScriptedElement>> {
        if frame == MAIN_FRAME {
            Some(&mut self.elements)
        } else {
            self.frames
                .iter_mut()
                .find(|f| f.id == frame)
                .map(|f| &mut f.elements)
        }
    }
}

/// Paths to page models
#[derive(Debug, Clone, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, ScriptedPage>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, path: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(path.into(), page);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    launches: AtomicUsize,
    closes: AtomicUsize,
    fail_launch: AtomicBool,
    fail_close: AtomicBool,
    launch_delay: Mutex<Duration>,
    journal: Mutex<Vec<String>>,
}

/// Driver producing [`ScriptedSession`]s over a shared site model
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    site: Arc<ScriptedSite>,
    counters: Arc<Counters>,
}

impl ScriptedDriver {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site: Arc::new(site),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Make every subsequent launch fail
    pub fn fail_launches(&self, fail: bool) {
        self.counters.fail_launch.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent launch take `delay` before the browser is up
    pub fn delay_launches(&self, delay: Duration) {
        *self.counters.launch_delay.lock() = delay;
    }

    /// Make every close report an error (the session is still closed)
    pub fn fail_closes(&self, fail: bool) {
        self.counters.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn launches(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Actions performed so far, as `#<session> <action>`
    pub fn journal(&self) -> Vec<String> {
        self.counters.journal.lock().clone()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn launch(&self, _options: &LaunchOptions) -> E2eResult<Box<dyn BrowserSession>> {
        if self.counters.fail_launch.load(Ordering::SeqCst) {
            return Err(E2eError::Launch("scripted launch failure".to_string()));
        }
        let delay = *self.counters.launch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let number = self.counters.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedSession {
            number,
            site: self.site.clone(),
            counters: self.counters.clone(),
            state: Mutex::new(SessionState {
                url: "about:blank".to_string(),
                page: ScriptedPage::default(),
                loaded_at: Instant::now(),
                closed: false,
            }),
        }))
    }
}

struct SessionState {
    url: String,
    page: ScriptedPage,
    loaded_at: Instant,
    closed: bool,
}

impl SessionState {
    fn elapsed(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    /// Index of the `nth` present element matching `locator` in `frame`
    fn position(&self, frame: &str, locator: &Locator) -> Option<usize> {
        let elapsed = self.elapsed();
        self.page
            .elements_in(frame)?
            .iter()
            .enumerate()
            .filter(|(_, e)| e.appears_after <= elapsed && e.matches(&locator.selector))
            .map(|(i, _)| i)
            .nth(locator.nth)
    }

    fn element(&self, frame: &str, locator: &Locator) -> Option<&ScriptedElement> {
        let index = self.position(frame, locator)?;
        self.page.elements_in(frame)?.get(index)
    }

    fn element_mut(&mut self, frame: &str, locator: &Locator) -> Option<&mut ScriptedElement> {
        let index = self.position(frame, locator)?;
        self.page.elements_in_mut(frame)?.get_mut(index)
    }

    fn readiness(&self, frame: &str) -> Option<Readiness> {
        if frame == MAIN_FRAME {
            Some(self.page.readiness)
        } else {
            self.page
                .frames
                .iter()
                .find(|f| f.id == frame)
                .map(|f| f.readiness)
        }
    }
}

/// One scripted browser session
pub struct ScriptedSession {
    number: usize,
    site: Arc<ScriptedSite>,
    counters: Arc<Counters>,
    state: Mutex<SessionState>,
}

impl ScriptedSession {
    fn record(&self, entry: impl AsRef<str>) {
        self.counters
            .journal
            .lock()
            .push(format!("#{} {}", self.number, entry.as_ref()));
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.state.lock().closed {
            Err(E2eError::Driver("session is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn page_for(&self, url: &str) -> ScriptedPage {
        let path = reqwest::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        self.site.pages.get(&path).cloned().unwrap_or_default()
    }

    fn load(&self, url: String, page: ScriptedPage) {
        let mut state = self.state.lock();
        state.url = url;
        state.page = page;
        state.loaded_at = Instant::now();
    }

    fn join(&self, path: &str) -> String {
        let current = self.state.lock().url.clone();
        reqwest::Url::parse(&current)
            .and_then(|base| base.join(path))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string())
    }

    fn not_interactable(locator: &Locator, reason: &str) -> E2eError {
        E2eError::ElementNotInteractable {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    fn set_value(&self, frame: &str, locator: &Locator, value: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let element = state
            .element_mut(frame, locator)
            .ok_or_else(|| Self::not_interactable(locator, "detached"))?;
        if !element.editable {
            return Err(Self::not_interactable(locator, "not editable"));
        }
        element.value = Some(value.to_string());
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("goto {url}"));
        let page = self.page_for(url);
        if !page.commit_delay.is_zero() {
            tokio::time::sleep(page.commit_delay).await;
        }
        self.load(url.to_string(), page);
        Ok(())
    }

    async fn frame_tree(&self) -> E2eResult<Vec<FrameInfo>> {
        self.ensure_open()?;
        let state = self.state.lock();
        let mut frames = vec![FrameInfo {
            id: MAIN_FRAME.to_string(),
            parent: None,
            url: state.url.clone(),
            name: None,
        }];
        frames.extend(state.page.frames.iter().map(|f| FrameInfo {
            id: f.id.clone(),
            parent: Some(f.parent.clone().unwrap_or_else(|| MAIN_FRAME.to_string())),
            url: f.url.clone(),
            name: f.name.clone(),
        }));
        Ok(frames)
    }

    async fn ready_state(&self, frame: &str) -> E2eResult<LoadState> {
        self.ensure_open()?;
        let state = self.state.lock();
        match state.readiness(frame) {
            Some(Readiness::After(delay)) if state.elapsed() >= delay => Ok(LoadState::Load),
            Some(_) => Ok(LoadState::Loading),
            None => Err(E2eError::Driver(format!("no frame {frame}"))),
        }
    }

    async fn count(&self, frame: &str, locator: &Locator) -> E2eResult<usize> {
        self.ensure_open()?;
        let state = self.state.lock();
        let elapsed = state.elapsed();
        Ok(state
            .page
            .elements_in(frame)
            .map(|elements| {
                elements
                    .iter()
                    .filter(|e| e.appears_after <= elapsed && e.matches(&locator.selector))
                    .count()
            })
            .unwrap_or(0))
    }

    async fn probe(&self, frame: &str, locator: &Locator) -> E2eResult<Option<ElementProbe>> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(state.element(frame, locator).map(|e| ElementProbe {
            attached: true,
            visible: e.visible,
            in_viewport: e.in_viewport,
            editable: e.editable,
            text: e.text.clone(),
            value: e.value.clone(),
        }))
    }

    async fn scroll_into_view(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let element = state
            .element_mut(frame, locator)
            .ok_or_else(|| Self::not_interactable(locator, "detached"))?;
        if element.reachable {
            element.in_viewport = true;
        }
        Ok(())
    }

    async fn fill(&self, frame: &str, locator: &Locator, value: &str) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("fill {locator}"));
        self.set_value(frame, locator, value)
    }

    async fn clear(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("clear {locator}"));
        self.set_value(frame, locator, "")
    }

    async fn click(&self, frame: &str, locator: &Locator) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("click {locator}"));

        let effect = {
            let state = self.state.lock();
            let element = state
                .element(frame, locator)
                .ok_or_else(|| Self::not_interactable(locator, "detached"))?;
            if !element.visible {
                return Err(Self::not_interactable(locator, "hidden"));
            }
            match &element.on_click {
                Some(ClickEffect::Navigate(path)) => Some((path.clone(), None)),
                Some(ClickEffect::NavigateCarrying { path, from, into }) => {
                    let carried = state
                        .page
                        .elements
                        .iter()
                        .find(|e| e.matches(from))
                        .and_then(|e| e.value.clone())
                        .unwrap_or_default();
                    Some((path.clone(), Some((into.clone(), carried))))
                }
                None => None,
            }
        };

        if let Some((path, carry)) = effect {
            let url = self.join(&path);
            let mut page = self.page_for(&url);
            if let Some((into, text)) = carry {
                for element in page.elements.iter_mut().filter(|e| e.matches(&into)) {
                    element.text = text.clone();
                }
            }
            self.load(url, page);
        }
        Ok(())
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("scroll {dx},{dy}"));
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.ensure_open()?;
        Ok(self.state.lock().url.clone())
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.ensure_open()?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> E2eResult<()> {
        let first = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.record("close");
        }
        if self.counters.fail_close.load(Ordering::SeqCst) {
            return Err(E2eError::Driver("scripted close failure".to_string()));
        }
        Ok(())
    }
}

//! In-memory driver for exercising the locator engine and page flows without
//! a browser.
//!
//! The "DOM" is a set of elements keyed by id plus a map from rendered
//! selector strings to the ids they match. Actions can trigger scripted
//! effects, which is how a test makes a click navigate or reveal something.

#![allow(dead_code)]

use async_trait::async_trait;
use cartwright::diagnostics::{DiagnosticsOptions, DiagnosticsSink};
use cartwright::driver::{Driver, ElementHandle, ElementState};
use cartwright::error::BrowserError;
use cartwright::locator::{DialectSelector, LocatorEngine};
use cartwright::page::{BasePage, Timeouts};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// PNG signature, enough for a file to look like a screenshot.
pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

pub const FAST_TIMEOUTS: Timeouts = Timeouts {
    element: Duration::from_millis(200),
    optional: Duration::from_millis(100),
    state: Duration::from_millis(200),
    settle: Duration::ZERO,
};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub attached: bool,
    pub visible: bool,
    /// Becomes visible at this instant if not visible already
    pub visible_at: Option<Instant>,
    /// Leaves the DOM at this instant
    pub detached_at: Option<Instant>,
    pub text: String,
    pub value: String,
    pub attributes: HashMap<String, String>,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            attached: true,
            visible: true,
            visible_at: None,
            detached_at: None,
            text: String::new(),
            value: String::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::visible()
        }
    }

    /// Not in the DOM until an [`Effect::Attach`] fires.
    pub fn detached(self) -> Self {
        Self {
            attached: false,
            ..self
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    fn is_attached(&self) -> bool {
        self.attached && !self.detached_at.is_some_and(|at| Instant::now() >= at)
    }

    fn is_visible(&self) -> bool {
        self.is_attached()
            && (self.visible || self.visible_at.is_some_and(|at| Instant::now() >= at))
    }
}

/// Something that happens to the fake DOM when a trigger fires.
#[derive(Debug, Clone)]
pub enum Effect {
    Navigate(String),
    Show(String),
    Hide(String),
    Detach(String),
    Attach(String),
    SetText(String, String),
}

#[derive(Debug, Clone)]
pub enum Failure {
    InvalidSelector,
    Stale,
}

#[derive(Default)]
struct Dom {
    elements: HashMap<String, FakeElement>,
    selectors: HashMap<String, Vec<String>>,
    failures: HashMap<String, Failure>,
    effects: HashMap<String, Vec<Effect>>,
    locate_calls: Vec<String>,
    actions: Vec<String>,
    url: String,
    title: String,
    history: Vec<String>,
    screenshot_broken: bool,
}

impl Dom {
    fn fire(&mut self, trigger: &str) {
        let Some(effects) = self.effects.get(trigger).cloned() else {
            return;
        };
        for effect in effects {
            match effect {
                Effect::Navigate(url) => self.go(&url),
                Effect::Show(id) => self.update(&id, |e| e.visible = true),
                Effect::Hide(id) => self.update(&id, |e| e.visible = false),
                Effect::Detach(id) => self.update(&id, |e| e.attached = false),
                Effect::Attach(id) => self.update(&id, |e| e.attached = true),
                Effect::SetText(id, text) => self.update(&id, |e| e.text = text),
            }
        }
    }

    fn go(&mut self, url: &str) {
        if !self.url.is_empty() {
            let previous = std::mem::take(&mut self.url);
            self.history.push(previous);
        }
        self.url = url.to_string();
        self.fire(&format!("navigate:{}", url));
    }

    fn update(&mut self, id: &str, f: impl FnOnce(&mut FakeElement)) {
        if let Some(element) = self.elements.get_mut(id) {
            f(element);
        }
    }

    fn matches(&self, selector: &str) -> Vec<String> {
        self.selectors
            .get(selector)
            .map(|ids| {
                ids.iter()
                    .filter(|id| self.elements.get(*id).is_some_and(|e| e.is_attached()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attached(&self, handle: &ElementHandle) -> Result<&FakeElement, BrowserError> {
        match self.elements.get(handle.id()) {
            Some(element) if element.is_attached() => Ok(element),
            _ => Err(BrowserError::StaleElement(handle.id().to_string())),
        }
    }

    fn attached_mut(&mut self, handle: &ElementHandle) -> Result<&mut FakeElement, BrowserError> {
        match self.elements.get_mut(handle.id()) {
            Some(element) if element.is_attached() => Ok(element),
            _ => Err(BrowserError::StaleElement(handle.id().to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeDriver {
    dom: Mutex<Dom>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register element `id` (if new) and make `selector` match it.
    pub fn add(&self, selector: &str, id: &str, element: FakeElement) -> &Self {
        let mut dom = self.dom.lock().unwrap();
        dom.elements.entry(id.to_string()).or_insert(element);
        dom.selectors
            .entry(selector.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    /// Make `selector` also match the already registered element `id`.
    pub fn alias(&self, selector: &str, id: &str) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .selectors
            .entry(selector.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn fail(&self, selector: &str, failure: Failure) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .failures
            .insert(selector.to_string(), failure);
        self
    }

    /// Make the hidden element `id` visible `after` from now.
    pub fn reveal_after(&self, id: &str, after: Duration) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .update(id, |e| e.visible_at = Some(Instant::now() + after));
        self
    }

    /// Remove element `id` from the DOM `after` from now.
    pub fn detach_after(&self, id: &str, after: Duration) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .update(id, |e| e.detached_at = Some(Instant::now() + after));
        self
    }

    /// `trigger` is `click:<id>`, `submit:<id>` or `navigate:<url>`.
    pub fn on(&self, trigger: &str, effects: Vec<Effect>) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .effects
            .entry(trigger.to_string())
            .or_default()
            .extend(effects);
        self
    }

    pub fn set_location(&self, url: &str, title: &str) -> &Self {
        let mut dom = self.dom.lock().unwrap();
        dom.url = url.to_string();
        dom.title = title.to_string();
        self
    }

    pub fn break_screenshots(&self) -> &Self {
        self.dom.lock().unwrap().screenshot_broken = true;
        self
    }

    pub fn locate_calls(&self) -> Vec<String> {
        self.dom.lock().unwrap().locate_calls.clone()
    }

    /// Locate calls with consecutive repeats (polling) collapsed.
    pub fn selectors_tried(&self) -> Vec<String> {
        let mut calls = self.locate_calls();
        calls.dedup();
        calls
    }

    pub fn actions(&self) -> Vec<String> {
        self.dom.lock().unwrap().actions.clone()
    }

    pub fn value_of(&self, id: &str) -> String {
        self.dom
            .lock()
            .unwrap()
            .elements
            .get(id)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn url(&self) -> String {
        self.dom.lock().unwrap().url.clone()
    }

    fn lookup(&self, selector: &DialectSelector) -> Result<Vec<String>, BrowserError> {
        let key = selector.to_string();
        let mut dom = self.dom.lock().unwrap();
        dom.locate_calls.push(key.clone());
        match dom.failures.get(&key) {
            Some(Failure::InvalidSelector) => Err(BrowserError::InvalidSelector {
                selector: key,
                reason: "SyntaxError: not a valid selector".to_string(),
            }),
            Some(Failure::Stale) => Err(BrowserError::StaleElement(key)),
            None => Ok(dom.matches(&key)),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut dom = self.dom.lock().unwrap();
        dom.actions.push(format!("navigate:{}", url));
        dom.go(url);
        Ok(())
    }

    async fn locate(
        &self,
        selector: &DialectSelector,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        Ok(self.lookup(selector)?.into_iter().next().map(ElementHandle::new))
    }

    async fn locate_all(
        &self,
        selector: &DialectSelector,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        Ok(self
            .lookup(selector)?
            .into_iter()
            .map(ElementHandle::new)
            .collect())
    }

    async fn wait_for_state(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let satisfied = {
                let dom = self.dom.lock().unwrap();
                let (attached, visible) = dom
                    .elements
                    .get(handle.id())
                    .map(|e| (e.is_attached(), e.is_visible()))
                    .unwrap_or((false, false));
                state.is_satisfied_by(attached, visible)
            };
            if satisfied {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), BrowserError> {
        let mut dom = self.dom.lock().unwrap();
        dom.attached(handle)?;
        dom.actions.push(format!("click:{}", handle));
        dom.fire(&format!("click:{}", handle));
        Ok(())
    }

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        let mut dom = self.dom.lock().unwrap();
        dom.attached_mut(handle)?.value = text.to_string();
        dom.actions.push(format!("fill:{}={}", handle, text));
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        let mut dom = self.dom.lock().unwrap();
        let typed: String = text.chars().filter(|c| *c != '\n').collect();
        dom.attached_mut(handle)?.value.push_str(&typed);
        dom.actions.push(format!("type:{}={:?}", handle, text));
        if text.contains('\n') {
            dom.fire(&format!("submit:{}", handle));
        }
        Ok(())
    }

    async fn read_text(&self, handle: &ElementHandle) -> Result<String, BrowserError> {
        let dom = self.dom.lock().unwrap();
        Ok(dom.attached(handle)?.text.clone())
    }

    async fn read_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let dom = self.dom.lock().unwrap();
        Ok(dom.attached(handle)?.attributes.get(name).cloned())
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, BrowserError> {
        let dom = self.dom.lock().unwrap();
        Ok(dom.attached(handle)?.is_visible())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.dom.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.dom.lock().unwrap().title.clone())
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        let mut dom = self.dom.lock().unwrap();
        if let Some(previous) = dom.history.pop() {
            dom.url = previous;
        }
        dom.actions.push("back".to_string());
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), BrowserError> {
        if self.dom.lock().unwrap().screenshot_broken {
            return Err(BrowserError::Screenshot("capture refused".to_string()));
        }
        tokio::fs::write(path, PNG_MAGIC)
            .await
            .map_err(|e| BrowserError::Screenshot(e.to_string()))
    }
}

pub fn engine_for(driver: Arc<FakeDriver>, screenshot_dir: &Path) -> LocatorEngine {
    let driver: Arc<dyn Driver> = driver;
    let diagnostics = DiagnosticsSink::new(
        driver.clone(),
        DiagnosticsOptions {
            screenshot_dir: screenshot_dir.to_path_buf(),
            full_page: true,
        },
    );
    LocatorEngine::new(driver, diagnostics)
}

pub fn page_for(driver: Arc<FakeDriver>, screenshot_dir: &Path) -> BasePage {
    BasePage::new(engine_for(driver, screenshot_dir), FAST_TIMEOUTS)
}

/// File names in `dir`, sorted; empty when the directory does not exist.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

//! Generic page interactions built on the locator engine.
//!
//! Every operation resolves its locator set fresh, performs exactly one driver
//! action on the resulting handle and logs the action with the element name.

use crate::config::Settings;
use crate::diagnostics::{DiagnosticsOptions, DiagnosticsSink};
use crate::driver::{Driver, ElementHandle, ElementState};
use crate::error::Result;
use crate::locator::{LocatorEngine, LocatorSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts applied by [`BasePage`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Per-descriptor budget for required elements
    pub element: Duration,
    /// Per-descriptor budget for optional elements
    pub optional: Duration,
    /// Per-descriptor budget when waiting for a specific state
    pub state: Duration,
    /// Pause after actions that trigger navigation or re-rendering
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(10),
            optional: Duration::from_secs(5),
            state: Duration::from_secs(10),
            settle: Duration::from_secs(1),
        }
    }
}

impl Timeouts {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            element: settings.implicit_wait(),
            optional: settings.optional_wait(),
            state: settings.explicit_wait(),
            settle: settings.settle(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Replace the current value instead of appending to it
    pub clear_first: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self { clear_first: true }
    }
}

#[derive(Clone)]
pub struct BasePage {
    engine: LocatorEngine,
    timeouts: Timeouts,
}

impl BasePage {
    pub fn new(engine: LocatorEngine, timeouts: Timeouts) -> Self {
        Self { engine, timeouts }
    }

    /// Wire a driver session to an engine and diagnostics sink configured by `settings`.
    pub fn from_settings(driver: Arc<dyn Driver>, settings: &Settings) -> Self {
        let diagnostics = DiagnosticsSink::new(
            driver.clone(),
            DiagnosticsOptions {
                screenshot_dir: settings.screenshots_dir.clone(),
                full_page: true,
            },
        );
        let engine = LocatorEngine::new(driver, diagnostics);
        Self::new(engine, Timeouts::from_settings(settings))
    }

    pub fn engine(&self) -> &LocatorEngine {
        &self.engine
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn driver(&self) -> &Arc<dyn Driver> {
        self.engine.driver()
    }

    /// Resolve `set` to one visible element.
    pub async fn find(&self, set: &LocatorSet) -> Result<ElementHandle> {
        let resolved = self
            .engine
            .resolve(set, self.timeouts.element, ElementState::Visible)
            .await?;
        Ok(resolved.value)
    }

    /// Resolve `set` to every element matched by its first productive descriptor.
    pub async fn find_all(&self, set: &LocatorSet) -> Result<Vec<ElementHandle>> {
        let resolved = self.engine.resolve_all(set, self.timeouts.element).await?;
        log::debug!("Found {} element(s) for '{}'", resolved.value.len(), set.name());
        Ok(resolved.value)
    }

    pub async fn click(&self, set: &LocatorSet) -> Result<()> {
        let handle = self.find(set).await?;
        log::info!("Clicking on '{}'", set.name());
        self.driver().click(&handle).await?;
        Ok(())
    }

    /// Replace the value of an input.
    pub async fn fill(&self, set: &LocatorSet, text: &str) -> Result<()> {
        self.fill_with(set, text, FillOptions::default()).await
    }

    pub async fn fill_with(&self, set: &LocatorSet, text: &str, options: FillOptions) -> Result<()> {
        let handle = self.find(set).await?;
        log::info!("Filling '{}' with: '{}'", set.name(), text);
        if options.clear_first {
            self.driver().fill(&handle, text).await?;
        } else {
            self.driver().type_text(&handle, text).await?;
        }
        Ok(())
    }

    /// [`fill`](Self::fill) for credentials: the value never reaches the log.
    pub async fn fill_secret(&self, set: &LocatorSet, secret: &str) -> Result<()> {
        let handle = self.find(set).await?;
        log::info!(
            "Filling '{}' with <{} hidden characters>",
            set.name(),
            secret.chars().count()
        );
        self.driver().fill(&handle, secret).await?;
        Ok(())
    }

    /// Type keys into an element without clearing it; `"\n"` submits.
    pub async fn type_text(&self, set: &LocatorSet, text: &str) -> Result<()> {
        let handle = self.find(set).await?;
        log::info!("Typing into '{}'", set.name());
        self.driver().type_text(&handle, text).await?;
        Ok(())
    }

    pub async fn read_text(&self, set: &LocatorSet) -> Result<String> {
        let handle = self.find(set).await?;
        let text = self.driver().read_text(&handle).await?;
        log::debug!("Retrieved text from '{}': '{}'", set.name(), text);
        Ok(text)
    }

    pub async fn read_attribute(&self, set: &LocatorSet, name: &str) -> Result<Option<String>> {
        let handle = self.find(set).await?;
        let value = self.driver().read_attribute(&handle, name).await?;
        log::debug!(
            "Retrieved attribute '{}' from '{}': {:?}",
            name,
            set.name(),
            value
        );
        Ok(value)
    }

    /// Whether `set` resolves to a visible element within the optional-element timeout.
    /// Never fails and never captures diagnostics.
    pub async fn is_visible(&self, set: &LocatorSet) -> bool {
        self.is_visible_within(set, self.timeouts.optional).await
    }

    pub async fn is_visible_within(&self, set: &LocatorSet, timeout: Duration) -> bool {
        match self.engine.try_resolve(set, timeout, ElementState::Visible).await {
            Ok(resolved) => {
                let visible = self
                    .driver()
                    .is_visible(resolved.handle())
                    .await
                    .unwrap_or(false);
                log::debug!("Element '{}' visibility: {}", set.name(), visible);
                visible
            }
            Err(_) => {
                log::debug!("Element '{}' not found or not visible", set.name());
                false
            }
        }
    }

    /// Whether `set` matches an element in the DOM, visible or not.
    pub async fn is_present_within(&self, set: &LocatorSet, timeout: Duration) -> bool {
        self.engine
            .try_resolve(set, timeout, ElementState::Attached)
            .await
            .is_ok()
    }

    /// Wait for `set` to reach `state`, allowing `timeout` per descriptor.
    pub async fn wait_for_state(
        &self,
        set: &LocatorSet,
        state: ElementState,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        log::info!("Waiting for '{}' to be '{}'", set.name(), state);
        let resolved = self.engine.resolve(set, timeout, state).await?;
        Ok(resolved.value)
    }

    /// [`wait_for_state`](Self::wait_for_state) with the configured state timeout.
    pub async fn wait_for(&self, set: &LocatorSet, state: ElementState) -> Result<ElementHandle> {
        self.wait_for_state(set, state, self.timeouts.state).await
    }

    pub async fn take_screenshot(&self, name: &str) -> Result<PathBuf> {
        Ok(self.engine.diagnostics().take_screenshot(name).await?)
    }

    /// Best-effort screenshot at a flow checkpoint; failures are only logged.
    pub async fn checkpoint(&self, name: &str) -> Option<PathBuf> {
        match self.engine.diagnostics().take_screenshot(name).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Checkpoint screenshot '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Sleep for the configured settle time.
    pub async fn settle(&self) {
        self.pause(self.timeouts.settle).await;
    }

    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        log::info!("Navigating to: {}", url);
        self.driver().navigate(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let url = self.driver().current_url().await?;
        log::debug!("Current URL: {}", url);
        Ok(url)
    }

    pub async fn title(&self) -> Result<String> {
        Ok(self.driver().title().await?)
    }

    pub async fn go_back(&self) -> Result<()> {
        log::info!("Going back to previous page");
        self.driver().go_back().await?;
        Ok(())
    }

    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    // Handles obtained from `find_all` are used directly, without re-resolving.

    pub async fn click_handle(&self, handle: &ElementHandle, name: &str) -> Result<()> {
        log::info!("Clicking on '{}'", name);
        self.driver().click(handle).await?;
        Ok(())
    }

    pub async fn read_text_of(&self, handle: &ElementHandle) -> Result<String> {
        Ok(self.driver().read_text(handle).await?)
    }

    pub async fn read_attribute_of(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        Ok(self.driver().read_attribute(handle, name).await?)
    }
}

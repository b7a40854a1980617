// spider_chrome re-exports the chromiumoxide API
use super::{Driver, ElementHandle, ElementState};
use crate::config::{BrowserKind, Settings};
use crate::error::BrowserError;
use crate::locator::DialectSelector;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

type Result<T> = std::result::Result<T, BrowserError>;

/// Attribute stamped on matched elements so handles survive between calls.
const HANDLE_ATTRIBUTE: &str = "data-cascade-id";

const STATE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Finds elements for a selector spec and tags them with a stable id.
const LOCATE_JS: &str = r#"
(function (spec) {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  let found = [];
  try {
    if (spec.kind === 'xpath') {
      const snap = document.evaluate(spec.query, document, null,
        XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      for (let i = 0; i < snap.snapshotLength; i++) {
        const node = snap.snapshotItem(i);
        if (node.nodeType === Node.ELEMENT_NODE) found.push(node);
      }
    } else if (spec.kind === 'text') {
      const needle = norm(spec.text);
      found = Array.from(document.querySelectorAll('body *'))
        .filter((el) => norm(el.innerText).includes(needle))
        .filter((el) => !Array.from(el.children).some((c) => norm(c.innerText).includes(needle)));
    } else {
      found = Array.from(document.querySelectorAll(spec.query));
      if (spec.text) {
        const needle = norm(spec.text);
        found = found.filter((el) => norm(el.innerText || el.textContent).includes(needle));
      }
    }
  } catch (e) {
    return { error: String((e && e.message) || e) };
  }
  if (!spec.all) found = found.slice(0, 1);
  const ids = found.map((el) => {
    if (!el.dataset.cascadeId) {
      window.__cascadeSeq = (window.__cascadeSeq || 0) + 1;
      el.dataset.cascadeId = 'c' + window.__cascadeSeq;
    }
    return el.dataset.cascadeId;
  });
  return { ids };
})(__SPEC__)
"#;

/// Runs `__BODY__` with `el` bound to the element carrying `__ID__`.
const ELEMENT_JS: &str = r#"
(function (id) {
  const el = document.querySelector('[data-cascade-id="' + id + '"]');
  if (!el || !el.isConnected) return { stale: true, value: null };
  const value = (function () { return __BODY__; })();
  return { stale: false, value: value === undefined ? null : value };
})(__ID__)
"#;

const STATE_BODY: &str = r#"(function () {
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return style.visibility !== 'hidden' && style.display !== 'none'
    && rect.width > 0 && rect.height > 0;
})()"#;

const CLEAR_BODY: &str = r#"(function () {
  el.focus();
  if ('value' in el) el.value = '';
  el.dispatchEvent(new Event('input', { bubbles: true }));
  return true;
})()"#;

#[derive(Debug, Deserialize)]
struct LocateResult {
    #[serde(default)]
    ids: Vec<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ElementResult<T> {
    stale: bool,
    value: Option<T>,
}

/// Connection mode for the Chromium browser
pub enum ConnectionMode {
    /// Launch a local browser with a throwaway profile
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Attach to a running browser or grid node over its DevTools endpoint
    Remote(String),
}

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    temp_dir: Option<PathBuf>,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
}

impl ChromeDriver {
    /// Build a driver from run settings: remote when `grid_url` is set,
    /// otherwise a local launch. CI environments force headless + no-sandbox.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let mode = match &settings.grid_url {
            Some(url) => ConnectionMode::Remote(url.clone()),
            None => {
                let is_ci = is_ci();
                if is_ci {
                    log::info!("CI environment detected, running headless without sandbox");
                }
                let chrome_path = settings
                    .chrome_path
                    .clone()
                    .or_else(|| default_executable(settings.browser));
                ConnectionMode::Sandboxed {
                    chrome_path,
                    no_sandbox: settings.no_sandbox || is_ci,
                    headless: settings.headless || is_ci,
                }
            }
        };
        let mut driver = Self::new(mode).await?;
        driver.page_load_timeout = settings.page_load_timeout();
        Ok(driver)
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, mut handler, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile per instance keeps parallel sessions isolated
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir = std::env::temp_dir()
                    .join(format!("cartwright-{}-{}", std::process::id(), unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    BrowserError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }
                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let config = config.build().map_err(|e| {
                    BrowserError::LaunchFailed(format!(
                        "{}. Install Chrome or Chromium, or set CHROME_PATH. \
                         On Linux sandbox errors, set NO_SANDBOX=true.",
                        e
                    ))
                })?;
                log::info!("Launching browser (headless: {})", headless);
                let (browser, handler) = Browser::launch(config)
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
                (browser, handler, Some(temp_dir))
            }
            ConnectionMode::Remote(url) => {
                log::info!("Connecting to remote browser at {}", url);
                let (browser, handler) = Browser::connect(&url).await.map_err(|e| {
                    BrowserError::ConnectionFailed(format!(
                        "Failed to connect to {}. Make sure the browser exposes a DevTools endpoint: {}",
                        url, e
                    ))
                })?;
                (browser, handler, None)
            }
        };

        let handler = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = active_page(&browser).await?;
        Ok(Self {
            browser,
            page,
            temp_dir,
            handler,
            page_load_timeout: Duration::from_secs(30),
        })
    }

    /// Access to the underlying page for advanced CDP usage
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the browser connection
    pub async fn close(self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self.page.evaluate(script).await?;
        result
            .into_value()
            .map_err(|e| BrowserError::Other(format!("Unexpected script result: {}", e)))
    }

    async fn with_element<T: DeserializeOwned>(
        &self,
        handle: &ElementHandle,
        body: &str,
    ) -> Result<Option<T>> {
        let id = serde_json::to_string(handle.id())
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        let script = ELEMENT_JS.replace("__BODY__", body).replace("__ID__", &id);
        let result: ElementResult<T> = self.eval(script).await?;
        if result.stale {
            return Err(BrowserError::StaleElement(handle.id().to_string()));
        }
        Ok(result.value)
    }

    async fn run_locate(&self, selector: &DialectSelector, all: bool) -> Result<Vec<String>> {
        let spec = match selector {
            DialectSelector::Css(css) => json!({ "kind": "css", "query": css, "all": all }),
            DialectSelector::XPath(xpath) => json!({ "kind": "xpath", "query": xpath, "all": all }),
            DialectSelector::Text(text) => json!({ "kind": "text", "text": text, "all": all }),
            DialectSelector::CssWithText { css, text } => {
                json!({ "kind": "css", "query": css, "text": text, "all": all })
            }
        };
        let result: LocateResult = self
            .eval(LOCATE_JS.replace("__SPEC__", &spec.to_string()))
            .await?;
        match result.error {
            Some(reason) => Err(BrowserError::InvalidSelector {
                selector: selector.to_string(),
                reason,
            }),
            None => Ok(result.ids),
        }
    }

    async fn element(&self, handle: &ElementHandle) -> Result<chromiumoxide::element::Element> {
        self.page
            .find_element(format!("[{}='{}']", HANDLE_ATTRIBUTE, handle.id()))
            .await
            .map_err(|_| BrowserError::StaleElement(handle.id().to_string()))
    }

    async fn observe(&self, handle: &ElementHandle) -> Result<(bool, bool)> {
        match self.with_element::<bool>(handle, STATE_BODY).await {
            Ok(visible) => Ok((true, visible.unwrap_or(false))),
            Err(BrowserError::StaleElement(_)) => Ok((false, false)),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_load(&self, mut events: chromiumoxide::listeners::EventStream<EventLoadEventFired>) -> Result<()> {
        match tokio::time::timeout(self.page_load_timeout, events.next()).await {
            Ok(_) => Ok(()),
            Err(_) => Err(BrowserError::NavigationFailed(format!(
                "Timed out waiting for the page load event after {} ms",
                self.page_load_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::NavigationFailed(format!("Invalid URL {}: {}", url, e)))?;

        let events = self.page.event_listener::<EventLoadEventFired>().await?;
        let response = self.page.execute(params).await.map_err(|e| {
            if e.to_string().contains("oneshot canceled") {
                BrowserError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e))
            }
        })?;
        if let Some(error_text) = &response.result.error_text {
            return Err(BrowserError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        self.wait_for_load(events).await?;
        log::debug!("Navigation to {} completed", url);
        Ok(())
    }

    async fn locate(&self, selector: &DialectSelector) -> Result<Option<ElementHandle>> {
        let ids = self.run_locate(selector, false).await?;
        Ok(ids.into_iter().next().map(ElementHandle::new))
    }

    async fn locate_all(&self, selector: &DialectSelector) -> Result<Vec<ElementHandle>> {
        let ids = self.run_locate(selector, true).await?;
        Ok(ids.into_iter().map(ElementHandle::new).collect())
    }

    async fn wait_for_state(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (attached, visible) = self.observe(handle).await?;
            if state.is_satisfied_by(attached, visible) {
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(BrowserError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(STATE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn click(&self, handle: &ElementHandle) -> Result<()> {
        self.element(handle).await?.click().await?;
        Ok(())
    }

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        self.with_element::<bool>(handle, CLEAR_BODY).await?;
        self.type_text(handle, text).await
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        let element = self.element(handle).await?;
        element.focus().await?;
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            if !segment.is_empty() {
                element.type_str(segment).await?;
            }
            if segments.peek().is_some() {
                element.press_key("Enter").await?;
            }
        }
        Ok(())
    }

    async fn read_text(&self, handle: &ElementHandle) -> Result<String> {
        let text: Option<String> = self
            .with_element(handle, "el.innerText || el.textContent || ''")
            .await?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        let name = serde_json::to_string(name).map_err(|e| BrowserError::Other(e.to_string()))?;
        self.with_element(handle, &format!("el.getAttribute({})", name))
            .await
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool> {
        let (_, visible) = self.observe(handle).await?;
        Ok(visible)
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?
            .ok_or(BrowserError::NoPage)
    }

    async fn title(&self) -> Result<String> {
        self.page
            .get_title()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?
            .ok_or(BrowserError::NoPage)
    }

    async fn go_back(&self) -> Result<()> {
        let events = self.page.event_listener::<EventLoadEventFired>().await?;
        self.page.evaluate("history.back()").await?;
        self.wait_for_load(events).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(full_page).build();
        let bytes = self
            .page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::Screenshot(e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| BrowserError::Screenshot(format!("Failed to write {}: {}", path.display(), e)))
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.handler.abort();
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

/// First page that is not one of the browser's own pages, else a fresh one.
async fn active_page(browser: &Browser) -> Result<Page> {
    let pages = browser.pages().await?;
    for page in pages.iter() {
        if let Ok(Some(url)) = page.url().await {
            if !url.starts_with("chrome://") && !url.starts_with("edge://") {
                return Ok(page.clone());
            }
        }
    }
    if let Some(page) = pages.last() {
        return Ok(page.clone());
    }
    browser
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::Other(format!("Failed to create page: {}", e)))
}

fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "JENKINS_HOME", "CIRCLECI"]
        .iter()
        .any(|var| std::env::var(var).is_ok())
}

/// Well-known install locations for browsers chromiumoxide does not detect.
fn default_executable(kind: BrowserKind) -> Option<String> {
    let candidates: &[&str] = match kind {
        BrowserKind::Chrome | BrowserKind::Chromium => return None,
        BrowserKind::Edge => &[
            "/usr/bin/microsoft-edge",
            "/usr/bin/microsoft-edge-stable",
            "/opt/microsoft/msedge/msedge",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
            r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
        ],
    };
    candidates
        .iter()
        .find(|path| Path::new(path).exists())
        .map(|path| path.to_string())
}

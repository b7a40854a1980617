//! Browser driver capability.
//!
//! The locator engine and page layer only talk to a browser through the
//! [`Driver`] trait. [`ChromeDriver`] is the Chromium implementation; tests
//! plug in an in-memory fake.

pub mod chrome;

pub use chrome::{ChromeDriver, ConnectionMode};

use crate::error::BrowserError;
use crate::locator::DialectSelector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Opaque reference to one element of the driver's live DOM.
///
/// Valid for a single interaction only; the DOM may change between calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State an element must reach before an attempt counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
        }
    }

    /// Whether an element observed as (`attached`, `visible`) is in this state.
    pub fn is_satisfied_by(&self, attached: bool, visible: bool) -> bool {
        match self {
            ElementState::Visible => attached && visible,
            ElementState::Hidden => !attached || !visible,
            ElementState::Attached => attached,
            ElementState::Detached => !attached,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Ok(ElementState::Visible),
            "hidden" => Ok(ElementState::Hidden),
            "attached" => Ok(ElementState::Attached),
            "detached" => Ok(ElementState::Detached),
            other => Err(format!("unknown element state '{}'", other)),
        }
    }
}

/// Everything the core needs from a browser session.
///
/// One instance drives one session. Calls are made sequentially; the trait is
/// `Send + Sync` only so sessions can live on a multi-threaded runtime.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// First element matching `selector`, or `None` when nothing matches yet.
    async fn locate(&self, selector: &DialectSelector)
        -> Result<Option<ElementHandle>, BrowserError>;

    /// Every element matching `selector`, in document order.
    async fn locate_all(&self, selector: &DialectSelector)
        -> Result<Vec<ElementHandle>, BrowserError>;

    /// Wait until `handle` reaches `state`; `BrowserError::Timeout` otherwise.
    async fn wait_for_state(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn click(&self, handle: &ElementHandle) -> Result<(), BrowserError>;

    /// Replace the element's value with `text`.
    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), BrowserError>;

    /// Type `text` at the end of the current value (a `\n` submits).
    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), BrowserError>;

    async fn read_text(&self, handle: &ElementHandle) -> Result<String, BrowserError>;

    async fn read_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    async fn go_back(&self) -> Result<(), BrowserError>;

    /// Write a PNG screenshot of the page to `path`.
    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), BrowserError>;
}

use crate::locator::ResolutionAttempt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`Driver`](crate::driver::Driver) implementation.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("No page available")]
    NoPage,

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Element is no longer attached to the DOM: {0}")]
    StaleElement(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

impl BrowserError {
    /// Whether the error is expected while a live page is still settling.
    ///
    /// Transient errors are recovered by the cascade without escalation;
    /// everything else is still recorded as a failed attempt but logged louder.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::Timeout(_) | BrowserError::StaleElement(_) | BrowserError::CdpError(_)
        )
    }
}

/// Locator or settings authoring mistakes. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown locator strategy '{0}' (expected css, xpath, text or id)")]
    UnknownStrategy(String),

    #[error("Locator set for '{0}' is empty")]
    EmptyLocatorSet(String),

    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Every descriptor of a locator set failed.
#[derive(Error, Debug, Clone)]
#[error(
    "Failed to find '{element_name}' after trying {} locator strategies. Screenshot: {}{}",
    .attempts.len(),
    display_screenshot(.screenshot_path),
    summary_suffix(.attempts)
)]
pub struct ElementNotFoundError {
    pub element_name: String,
    pub attempts: Vec<ResolutionAttempt>,
    pub screenshot_path: Option<PathBuf>,
}

impl ElementNotFoundError {
    /// One line per attempt: index, selector and why it failed.
    pub fn attempts_summary(&self) -> String {
        summarize(&self.attempts)
    }
}

fn summarize(attempts: &[ResolutionAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("  {}. {} -> {}", a.index, a.selector, a.outcome))
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary_suffix(attempts: &[ResolutionAttempt]) -> String {
    if attempts.is_empty() {
        String::new()
    } else {
        format!("\n{}", summarize(attempts))
    }
}

fn display_screenshot(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<not captured>".to_string())
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    ElementNotFound(#[from] Box<ElementNotFoundError>),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Cart total ${total:.2} exceeds threshold ${threshold:.2}")]
    BudgetExceeded { total: f64, threshold: f64 },

    #[error("Could not parse a price from '{0}'")]
    PriceParse(String),

    #[error("{0}")]
    Flow(String),
}

impl Error {
    /// The element-not-found payload, if this is one.
    pub fn as_element_not_found(&self) -> Option<&ElementNotFoundError> {
        match self {
            Error::ElementNotFound(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ElementNotFoundError> for Error {
    fn from(e: ElementNotFoundError) -> Self {
        Error::ElementNotFound(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

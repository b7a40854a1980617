//! Failure diagnostics: screenshots and a structured failure record.
//!
//! Capture is best effort. A failed screenshot is logged and reported as an
//! absent path, it never replaces the error that triggered the capture.

use crate::driver::Driver;
use crate::error::BrowserError;
use crate::locator::ResolutionAttempt;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Disambiguates screenshots taken within the same second.
static SCREENSHOT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Where screenshots go and how they are taken.
#[derive(Debug, Clone)]
pub struct DiagnosticsOptions {
    pub screenshot_dir: PathBuf,
    pub full_page: bool,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("./screenshots"),
            full_page: true,
        }
    }
}

/// One line of machine-readable context written when a lookup is exhausted.
#[derive(Debug, Serialize)]
pub struct FailureRecord<'a> {
    pub event: &'static str,
    pub element: &'a str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub attempts: &'a [ResolutionAttempt],
}

#[derive(Clone)]
pub struct DiagnosticsSink {
    driver: Arc<dyn Driver>,
    options: DiagnosticsOptions,
}

impl DiagnosticsSink {
    pub fn new(driver: Arc<dyn Driver>, options: DiagnosticsOptions) -> Self {
        Self { driver, options }
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.options.screenshot_dir
    }

    /// Save a screenshot named after `name`, returning where it was written.
    pub async fn take_screenshot(&self, name: &str) -> Result<PathBuf, BrowserError> {
        tokio::fs::create_dir_all(&self.options.screenshot_dir)
            .await
            .map_err(|e| {
                BrowserError::Screenshot(format!(
                    "Failed to create screenshot directory {}: {}",
                    self.options.screenshot_dir.display(),
                    e
                ))
            })?;

        let path = claim_screenshot_path(&self.options.screenshot_dir, name, Local::now())
            .await
            .map_err(|e| {
                BrowserError::Screenshot(format!(
                    "Failed to reserve a screenshot file in {}: {}",
                    self.options.screenshot_dir.display(),
                    e
                ))
            })?;
        if let Err(e) = self.driver.screenshot(&path, self.options.full_page).await {
            // drop the empty placeholder
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        log::info!("Screenshot saved: {}", path.display());
        Ok(path)
    }

    /// Record everything known about an exhausted lookup. Never fails.
    pub async fn capture_failure(
        &self,
        element_name: &str,
        attempts: &[ResolutionAttempt],
    ) -> Option<PathBuf> {
        let screenshot = match self.take_screenshot(&format!("failed_{}", element_name)).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!(
                    "Could not capture failure screenshot for '{}': {}",
                    element_name,
                    e
                );
                None
            }
        };

        let record = FailureRecord {
            event: "element_not_found",
            element: element_name,
            timestamp: Local::now().to_rfc3339(),
            url: self.driver.current_url().await.ok(),
            title: self.driver.title().await.ok(),
            screenshot: screenshot.as_ref().map(|p| p.display().to_string()),
            attempts,
        };
        match serde_json::to_string(&record) {
            Ok(line) => log::error!("{}", line),
            Err(e) => log::warn!("Failed to serialize failure record: {}", e),
        }

        screenshot
    }
}

/// Replace everything but ASCII alphanumerics, `-` and `_` with `_`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "screenshot".to_string()
    } else {
        cleaned
    }
}

/// Create `<dir>/<sanitized name>_<YYYYMMDD_HHMMSS>.png`, suffixed with a
/// sequence number when that name is taken, and return its path.
///
/// The file is created with `create_new`, so concurrent writers racing for
/// the same name each end up with a distinct file.
pub async fn claim_screenshot_path(
    dir: &Path,
    name: &str,
    at: DateTime<Local>,
) -> io::Result<PathBuf> {
    let stem = format!("{}_{}", sanitize_name(name), at.format("%Y%m%d_%H%M%S"));
    let mut candidate = dir.join(format!("{}.png", stem));
    loop {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let seq = SCREENSHOT_SEQ.fetch_add(1, Ordering::Relaxed);
                candidate = dir.join(format!("{}_{}.png", stem, seq));
            }
            Err(e) => return Err(e),
        }
    }
}

//! Run settings and scenario test data.
//!
//! Settings come from `config/config.yaml` (optional) with environment
//! variables overriding individual keys by their upper-cased name. Test data
//! comes from `data/test_data.json`.

use crate::error::ConfigurationError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
pub const DEFAULT_TEST_DATA_PATH: &str = "data/test_data.json";

/// Every key that may be overridden from the environment.
pub const SETTING_KEYS: &[&str] = &[
    "browser",
    "headless",
    "base_url",
    "implicit_wait_ms",
    "explicit_wait_ms",
    "optional_wait_ms",
    "page_load_timeout_ms",
    "settle_ms",
    "grid_url",
    "chrome_path",
    "no_sandbox",
    "screenshots_dir",
    "logs_dir",
];

/// Browsers that speak the Chrome DevTools Protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserKind {
    #[default]
    Chrome,
    Chromium,
    Edge,
}

impl FromStr for BrowserKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "edge" | "msedge" => Ok(BrowserKind::Edge),
            _ => Err(ConfigurationError::UnsupportedBrowser(s.to_string())),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Chromium => "chromium",
            BrowserKind::Edge => "edge",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip)]
    pub browser: BrowserKind,
    pub headless: bool,
    pub base_url: String,
    /// Per-descriptor resolution timeout
    pub implicit_wait_ms: u64,
    /// Wait-for-state and page-level waits
    pub explicit_wait_ms: u64,
    /// Budget for optional elements
    pub optional_wait_ms: u64,
    pub page_load_timeout_ms: u64,
    /// Pause after navigation-triggering actions
    pub settle_ms: u64,
    /// Remote DevTools endpoint; when set no local browser is launched
    pub grid_url: Option<String>,
    pub chrome_path: Option<String>,
    pub no_sandbox: bool,
    pub screenshots_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            base_url: "https://www.ebay.com".to_string(),
            implicit_wait_ms: 10_000,
            explicit_wait_ms: 10_000,
            optional_wait_ms: 5_000,
            page_load_timeout_ms: 30_000,
            settle_ms: 1_000,
            grid_url: None,
            chrome_path: None,
            no_sandbox: false,
            screenshots_dir: PathBuf::from("screenshots"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Load from `path` (or `config/config.yaml`) and the process environment.
    ///
    /// A missing file is not an error: defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let text = read_optional(path)?;
        if text.is_none() {
            log::warn!("Config file not found: {}. Using defaults.", path.display());
        }
        Self::from_sources(text.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build settings from YAML text and an environment lookup.
    ///
    /// Environment values are parsed as YAML scalars, so `true` and `10000`
    /// keep their types.
    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut mapping = match yaml.map(serde_yaml::from_str::<Value>) {
            None => Mapping::new(),
            Some(Ok(Value::Mapping(mapping))) => mapping,
            Some(Ok(Value::Null)) => Mapping::new(),
            Some(Ok(_)) => {
                return Err(ConfigurationError::InvalidSetting {
                    key: "<root>".to_string(),
                    reason: "expected a mapping of settings".to_string(),
                })
            }
            Some(Err(e)) => {
                return Err(ConfigurationError::InvalidSetting {
                    key: "<root>".to_string(),
                    reason: e.to_string(),
                })
            }
        };

        for key in SETTING_KEYS {
            if let Some(raw) = env(&key.to_ascii_uppercase()) {
                log::debug!("Setting '{}' overridden from environment", key);
                let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
                mapping.insert(Value::String(key.to_string()), value);
            }
        }

        let browser = match mapping.remove("browser") {
            None | Some(Value::Null) => BrowserKind::default(),
            Some(Value::String(name)) => name.parse()?,
            Some(other) => {
                return Err(ConfigurationError::UnsupportedBrowser(
                    serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                ))
            }
        };

        let mut settings: Settings =
            serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| {
                ConfigurationError::InvalidSetting {
                    key: "settings".to_string(),
                    reason: e.to_string(),
                }
            })?;
        settings.browser = browser;
        settings.grid_url = settings.grid_url.filter(|url| !url.trim().is_empty());
        Ok(settings)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn explicit_wait(&self) -> Duration {
        Duration::from_millis(self.explicit_wait_ms)
    }

    pub fn optional_wait(&self) -> Duration {
        Duration::from_millis(self.optional_wait_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Inputs of the end-to-end shopping scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestData {
    pub base_url: String,
    pub search_query: String,
    pub max_price: f64,
    pub item_limit: usize,
    pub login_enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for TestData {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebay.com".to_string(),
            search_query: "shoes".to_string(),
            max_price: 220.0,
            item_limit: 5,
            login_enabled: false,
            username: None,
            password: None,
        }
    }
}

impl TestData {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_TEST_DATA_PATH));
        let text = read_optional(path)?;
        match &text {
            Some(_) => log::info!("Loading test data from: {}", path.display()),
            None => log::warn!("Test data file not found: {}. Using defaults.", path.display()),
        }
        Self::from_sources(text.as_deref(), |key| std::env::var(key).ok())
    }

    /// Parse JSON test data; credentials missing from the file fall back to
    /// `EBAY_USERNAME` / `EBAY_PASSWORD`.
    pub fn from_sources(
        json: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut data: TestData = match json {
            Some(text) => serde_json::from_str(text).map_err(|e| {
                ConfigurationError::InvalidSetting {
                    key: "test_data".to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => TestData::default(),
        };
        if data.username.as_deref().map_or(true, str::is_empty) {
            data.username = env("EBAY_USERNAME");
        }
        if data.password.as_deref().map_or(true, str::is_empty) {
            data.password = env("EBAY_PASSWORD");
        }
        if data.item_limit == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "item_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(data)
    }

    /// Username and password, if both are known.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigurationError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigurationError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod locator;
pub mod logging;
pub mod page;
pub mod pages;
pub mod scenario;

//  Re-export commonly used items
pub use config::{BrowserKind, Settings, TestData};
pub use diagnostics::{DiagnosticsOptions, DiagnosticsSink};
pub use driver::{ChromeDriver, ConnectionMode, Driver, ElementHandle, ElementState};
pub use error::{BrowserError, ConfigurationError, ElementNotFoundError, Error, Result};
pub use locator::{
    normalize, AttemptOutcome, DialectSelector, LocatorDescriptor, LocatorEngine, LocatorSet,
    ResolutionAttempt, Strategy,
};
pub use page::{BasePage, FillOptions, Timeouts};

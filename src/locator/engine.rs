//! Locator resolution engine.
//!
//! Tries the descriptors of a [`LocatorSet`] strictly in declared order and
//! stops at the first one that yields an element in the required state. Each
//! attempt has its own timeout. When the whole set is exhausted the
//! [`DiagnosticsSink`] captures a screenshot and the caller gets an
//! [`ElementNotFoundError`] carrying every attempt.

use super::descriptor::{LocatorDescriptor, LocatorSet};
use super::selector::{normalize, DialectSelector};
use crate::diagnostics::DiagnosticsSink;
use crate::driver::{Driver, ElementHandle, ElementState};
use crate::error::{BrowserError, ElementNotFoundError};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default delay between two `locate` calls inside one attempt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a single descriptor attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => f.write_str("success"),
            AttemptOutcome::Timeout => f.write_str("timeout"),
            AttemptOutcome::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Record of one descriptor tried during one resolution call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionAttempt {
    /// 1-based position in the locator set
    pub index: usize,
    pub descriptor: LocatorDescriptor,
    /// Normalized selector actually sent to the driver
    pub selector: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Successful resolution: the value plus the attempts that led to it.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    /// 1-based index of the descriptor that succeeded
    pub descriptor_index: usize,
    pub attempts: Vec<ResolutionAttempt>,
}

pub type ResolvedElement = Resolved<ElementHandle>;
pub type ResolvedElements = Resolved<Vec<ElementHandle>>;

impl ResolvedElement {
    pub fn handle(&self) -> &ElementHandle {
        &self.value
    }
}

/// Result of a single attempt, before it is turned into a log record.
enum Lookup<T> {
    Found(T),
    Timeout,
    Failed(BrowserError),
}

impl<T> Lookup<T> {
    fn from_error(error: BrowserError) -> Self {
        match error {
            BrowserError::Timeout(_) => Lookup::Timeout,
            other => Lookup::Failed(other),
        }
    }
}

/// Resolves locator sets against one driver session. Holds no per-call state.
#[derive(Clone)]
pub struct LocatorEngine {
    driver: Arc<dyn Driver>,
    diagnostics: DiagnosticsSink,
    poll_interval: Duration,
}

impl LocatorEngine {
    pub fn new(driver: Arc<dyn Driver>, diagnostics: DiagnosticsSink) -> Self {
        Self {
            driver,
            diagnostics,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn diagnostics(&self) -> &DiagnosticsSink {
        &self.diagnostics
    }

    /// Resolve `set` to one element in `state`, or fail with full diagnostics.
    pub async fn resolve(
        &self,
        set: &LocatorSet,
        timeout_per_attempt: Duration,
        state: ElementState,
    ) -> Result<ResolvedElement, ElementNotFoundError> {
        match self.try_resolve(set, timeout_per_attempt, state).await {
            Ok(resolved) => Ok(resolved),
            Err(attempts) => Err(self.exhausted(set, attempts).await),
        }
    }

    /// Like [`resolve`](Self::resolve) but returns the attempt log on
    /// exhaustion instead of capturing diagnostics.
    pub async fn try_resolve(
        &self,
        set: &LocatorSet,
        timeout_per_attempt: Duration,
        state: ElementState,
    ) -> Result<ResolvedElement, Vec<ResolutionAttempt>> {
        log::info!(
            "Searching for '{}' ({}) with {} locator(s)",
            set.name(),
            state,
            set.len()
        );
        self.cascade(set, |selector| {
            self.lookup_single(selector, state, timeout_per_attempt)
        })
        .await
    }

    /// All elements matched by the first descriptor yielding at least one.
    ///
    /// A descriptor matching zero elements is treated exactly like one that
    /// matches nothing at all: the cascade moves on.
    pub async fn resolve_all(
        &self,
        set: &LocatorSet,
        timeout_per_attempt: Duration,
    ) -> Result<ResolvedElements, ElementNotFoundError> {
        log::info!(
            "Searching for all '{}' with {} locator(s)",
            set.name(),
            set.len()
        );
        match self
            .cascade(set, |selector| self.lookup_all(selector, timeout_per_attempt))
            .await
        {
            Ok(resolved) => Ok(resolved),
            Err(attempts) => Err(self.exhausted(set, attempts).await),
        }
    }

    async fn cascade<T, F, Fut>(
        &self,
        set: &LocatorSet,
        mut lookup: F,
    ) -> Result<Resolved<T>, Vec<ResolutionAttempt>>
    where
        F: FnMut(DialectSelector) -> Fut,
        Fut: Future<Output = Lookup<T>>,
    {
        let total = set.len();
        let mut attempts = Vec::with_capacity(total);

        for (i, descriptor) in set.iter().enumerate() {
            let index = i + 1;
            let selector = normalize(descriptor);
            let rendered = selector.to_string();
            log::debug!(
                "Attempt {}/{}: trying locator '{}' for '{}'",
                index,
                total,
                rendered,
                set.name()
            );

            let started = Instant::now();
            let result = lookup(selector).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let outcome = match &result {
                Lookup::Found(_) => {
                    log::info!(
                        "SUCCESS: found '{}' using locator {}: '{}'",
                        set.name(),
                        index,
                        descriptor
                    );
                    AttemptOutcome::Success
                }
                Lookup::Timeout => {
                    log::warn!(
                        "FAILED: locator {}/{} timed out for '{}': '{}'",
                        index,
                        total,
                        set.name(),
                        descriptor
                    );
                    AttemptOutcome::Timeout
                }
                Lookup::Failed(e) if e.is_transient() => {
                    log::warn!(
                        "FAILED: locator {}/{} error for '{}': {}",
                        index,
                        total,
                        set.name(),
                        e
                    );
                    AttemptOutcome::Error(e.to_string())
                }
                Lookup::Failed(e) => {
                    log::error!(
                        "FAILED: locator {}/{} for '{}' is unusable ('{}'): {}",
                        index,
                        total,
                        set.name(),
                        descriptor,
                        e
                    );
                    AttemptOutcome::Error(e.to_string())
                }
            };

            attempts.push(ResolutionAttempt {
                index,
                descriptor: descriptor.clone(),
                selector: rendered,
                outcome,
                elapsed_ms,
            });

            if let Lookup::Found(value) = result {
                return Ok(Resolved {
                    value,
                    descriptor_index: index,
                    attempts,
                });
            }
        }

        Err(attempts)
    }

    /// Poll `locate` until something matches, then wait for `state` with
    /// whatever is left of the attempt budget.
    async fn lookup_single(
        &self,
        selector: DialectSelector,
        state: ElementState,
        timeout: Duration,
    ) -> Lookup<ElementHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.locate(&selector).await {
                Ok(Some(handle)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    return match self.driver.wait_for_state(&handle, state, remaining).await {
                        Ok(()) => Lookup::Found(handle),
                        Err(e) => Lookup::from_error(e),
                    };
                }
                Ok(None) => {}
                Err(e) => return Lookup::from_error(e),
            }
            if !self.pause_until(deadline).await {
                return Lookup::Timeout;
            }
        }
    }

    async fn lookup_all(
        &self,
        selector: DialectSelector,
        timeout: Duration,
    ) -> Lookup<Vec<ElementHandle>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.locate_all(&selector).await {
                Ok(handles) if !handles.is_empty() => return Lookup::Found(handles),
                Ok(_) => {}
                Err(e) => return Lookup::from_error(e),
            }
            if !self.pause_until(deadline).await {
                return Lookup::Timeout;
            }
        }
    }

    /// Sleep one poll interval without passing `deadline`.
    /// Returns false once the deadline has been reached.
    async fn pause_until(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let nap = self.poll_interval.min(deadline - now);
        tokio::time::sleep(nap).await;
        true
    }

    async fn exhausted(
        &self,
        set: &LocatorSet,
        attempts: Vec<ResolutionAttempt>,
    ) -> ElementNotFoundError {
        log::error!(
            "FINAL FAILURE: all {} locators failed for '{}'",
            set.len(),
            set.name()
        );
        let screenshot_path = self.diagnostics.capture_failure(set.name(), &attempts).await;
        ElementNotFoundError {
            element_name: set.name().to_string(),
            attempts,
            screenshot_path,
        }
    }
}

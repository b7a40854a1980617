//! Locator descriptors, selector normalization and the fallback engine.

pub mod descriptor;
pub mod engine;
pub mod selector;

pub use descriptor::{IntoDescriptor, LocatorDescriptor, LocatorSet, Strategy};
pub use engine::{
    AttemptOutcome, LocatorEngine, ResolutionAttempt, Resolved, ResolvedElement,
    ResolvedElements, DEFAULT_POLL_INTERVAL,
};
pub use selector::{normalize, DialectSelector};

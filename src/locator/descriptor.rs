//! Locator descriptors and ordered locator sets.

use crate::error::ConfigurationError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Selector strategy of a `(strategy, value)` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Css,
    XPath,
    Text,
    Id,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Css => "css",
            Strategy::XPath => "xpath",
            Strategy::Text => "text",
            Strategy::Id => "id",
        }
    }
}

impl FromStr for Strategy {
    type Err = ConfigurationError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "css" | "css selector" => Ok(Strategy::Css),
            "xpath" => Ok(Strategy::XPath),
            "text" => Ok(Strategy::Text),
            "id" => Ok(Strategy::Id),
            _ => Err(ConfigurationError::UnknownStrategy(tag.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of finding an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorDescriptor {
    /// A selector already written in the driver dialect (CSS, XPath, `text=`).
    Raw { selector: String },
    /// A strategy tag plus a value, normalized before use.
    Pair { strategy: Strategy, value: String },
}

impl LocatorDescriptor {
    pub fn raw(selector: impl Into<String>) -> Self {
        LocatorDescriptor::Raw {
            selector: selector.into(),
        }
    }

    /// Build a pair descriptor from a textual strategy tag.
    pub fn pair(strategy: &str, value: impl Into<String>) -> Result<Self, ConfigurationError> {
        Ok(LocatorDescriptor::Pair {
            strategy: strategy.parse()?,
            value: value.into(),
        })
    }

    pub fn with_strategy(strategy: Strategy, value: impl Into<String>) -> Self {
        LocatorDescriptor::Pair {
            strategy,
            value: value.into(),
        }
    }
}

impl fmt::Display for LocatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorDescriptor::Raw { selector } => f.write_str(selector),
            LocatorDescriptor::Pair { strategy, value } => write!(f, "({}, {})", strategy, value),
        }
    }
}

impl From<&str> for LocatorDescriptor {
    fn from(selector: &str) -> Self {
        LocatorDescriptor::raw(selector)
    }
}

/// Conversion used by [`locator_set!`](crate::locator_set) so catalogs can mix
/// raw strings and `(strategy, value)` tuples.
pub trait IntoDescriptor {
    fn into_descriptor(self) -> Result<LocatorDescriptor, ConfigurationError>;
}

impl IntoDescriptor for LocatorDescriptor {
    fn into_descriptor(self) -> Result<LocatorDescriptor, ConfigurationError> {
        Ok(self)
    }
}

impl IntoDescriptor for &str {
    fn into_descriptor(self) -> Result<LocatorDescriptor, ConfigurationError> {
        Ok(LocatorDescriptor::raw(self))
    }
}

impl IntoDescriptor for String {
    fn into_descriptor(self) -> Result<LocatorDescriptor, ConfigurationError> {
        Ok(LocatorDescriptor::raw(self))
    }
}

impl IntoDescriptor for (&str, &str) {
    fn into_descriptor(self) -> Result<LocatorDescriptor, ConfigurationError> {
        LocatorDescriptor::pair(self.0, self.1)
    }
}

/// Ordered fallback list for one logical element, most reliable first.
///
/// Never empty. The name only labels logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSet {
    name: String,
    descriptors: Vec<LocatorDescriptor>,
}

impl LocatorSet {
    pub fn new(
        name: impl Into<String>,
        descriptors: Vec<LocatorDescriptor>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if descriptors.is_empty() {
            return Err(ConfigurationError::EmptyLocatorSet(name));
        }
        Ok(Self { name, descriptors })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptors(&self) -> &[LocatorDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocatorDescriptor> {
        self.descriptors.iter()
    }
}

impl<'a> IntoIterator for &'a LocatorSet {
    type Item = &'a LocatorDescriptor;
    type IntoIter = std::slice::Iter<'a, LocatorDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Build a [`LocatorSet`] from strings and `(strategy, value)` tuples.
///
/// ```
/// let set = cartwright::locator_set!("Sign In Button", [
///     "#sgnBt",
///     "//button[contains(text(), 'Sign in')]",
///     ("css", "button#sgnBt"),
/// ])
/// .unwrap();
/// assert_eq!(set.len(), 3);
/// ```
#[macro_export]
macro_rules! locator_set {
    ($name:expr, [$($item:expr),* $(,)?]) => {
        (|| -> ::std::result::Result<$crate::locator::LocatorSet, $crate::error::ConfigurationError> {
            $crate::locator::LocatorSet::new(
                $name,
                vec![$($crate::locator::IntoDescriptor::into_descriptor($item)?),*],
            )
        })()
    };
}

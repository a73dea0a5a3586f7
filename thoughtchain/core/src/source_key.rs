//! Source Keys
//!
//! Several parallel sub-tasks can stream under the same origin (for example
//! two `WebDepartment` searches). Each needs its own segment buffer, so the
//! buffer key combines the origin with the optional task id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between origin and task id in a composite key
pub const DEFAULT_SEPARATOR: &str = "::";

/// Key identifying one independently ordered source stream
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    /// Wrap an already-composed key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin part of the key (everything before the default separator)
    ///
    /// Keys built with a custom separator are split with
    /// [`SourceKeyResolver::split`] instead.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.split(DEFAULT_SEPARATOR).0
    }

    /// Task id part of the key, if it is composite
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.split(DEFAULT_SEPARATOR).1
    }

    /// Split on the first occurrence of `separator`
    #[must_use]
    pub fn split(&self, separator: &str) -> (&str, Option<&str>) {
        match self.0.split_once(separator) {
            Some((origin, task_id)) => (origin, Some(task_id)),
            None => (&self.0, None),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Derives source keys from an origin name and optional sub-task id
#[derive(Clone, Debug)]
pub struct SourceKeyResolver {
    separator: String,
}

impl Default for SourceKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceKeyResolver {
    /// Resolver using [`DEFAULT_SEPARATOR`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    /// Resolver using a custom separator
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// The separator placed between origin and task id
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// `origin` alone, or `origin + separator + task_id` when a task id is present
    #[must_use]
    pub fn resolve(&self, origin: &str, task_id: Option<&str>) -> SourceKey {
        match task_id {
            Some(task_id) => SourceKey(format!("{origin}{}{task_id}", self.separator)),
            None => SourceKey(origin.to_string()),
        }
    }

    /// Inverse of [`Self::resolve`]: origin and task id using this separator
    #[must_use]
    pub fn split<'k>(&self, key: &'k SourceKey) -> (&'k str, Option<&'k str>) {
        key.split(&self.separator)
    }
}

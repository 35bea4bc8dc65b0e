//! AIM screen names.
//!
//! Screen names compare case-insensitively and ignore embedded spaces
//! ("Joe Bob" and "joebob" are the same account), but the original casing
//! and spacing are preserved for display.

use std::fmt;

/// An AIM screen name.
///
/// Equality and hashing use the normalized identifier; `Display` and
/// [`ScreenName::as_str`] return the name as the user typed it.
#[derive(Debug, Clone)]
pub struct ScreenName(String);

impl ScreenName {
    /// Wrap a display-form screen name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The display form, casing and spacing preserved.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalized identifier: lowercased, spaces removed.
    pub fn identifier(&self) -> String {
        self.0
            .chars()
            .filter(|c| *c != ' ')
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl PartialEq for ScreenName {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier()
    }
}

impl Eq for ScreenName {}

impl std::hash::Hash for ScreenName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identifier().hash(state);
    }
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScreenName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

//! The engine's output unit.

use serde::Serialize;

/// Rendered command-line text tagged with a type and source location.
///
/// `text` is placed on the command line verbatim; no shell escaping is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub text: String,
    pub type_tag: String,
    pub location: String,
}

impl Fragment {
    pub fn new(text: impl Into<String>, type_tag: &str, location: &str) -> Self {
        Self {
            text: text.into(),
            type_tag: type_tag.to_string(),
            location: location.to_string(),
        }
    }

    /// Inline token standing in for a contained failure: `<Kind at Location>`.
    /// Tagged with the failure's kind; located where the failing input lives.
    pub fn diagnostic(kind: &str, error_location: &str, location: &str) -> Self {
        Self::new(format!("<{} at {}>", kind, error_location), kind, location)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

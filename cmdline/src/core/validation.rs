//! Validation records shared by the render engine and the workflow graph.
//!
//! Both subsystems report through the same `{location, message}` shape so a
//! caller can surface one stream of errors and warnings per document.

use std::fmt;

use serde::Serialize;

/// Kind of recoverable problem observed while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Issue {
    TypeMismatch,
    ExpressionEvaluationError,
    UnresolvedType,
    UndeclaredField,
    Graph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    pub location: String,
    pub message: String,
    pub issue: Issue,
}

impl fmt::Display for ValidationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Errors and warnings collected for one document or render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub errors: Vec<ValidationRecord>,
    pub warnings: Vec<ValidationRecord>,
}

impl Validation {
    pub fn error(&mut self, issue: Issue, location: &str, message: impl Into<String>) {
        self.errors.push(ValidationRecord {
            location: location.to_string(),
            message: message.into(),
            issue,
        });
    }

    pub fn warning(&mut self, issue: Issue, location: &str, message: impl Into<String>) {
        self.warnings.push(ValidationRecord {
            location: location.to_string(),
            message: message.into(),
            issue,
        });
    }

    /// Append `other`, keeping its records after ours.
    pub fn merge(&mut self, other: Validation) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

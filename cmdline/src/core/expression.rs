//! Contract with the expression language used by `valueFrom` and stream bindings.
//!
//! The engine never parses expressions itself. It hands an [`Expression`] and
//! the read-only [`Context`] to an [`Evaluator`] and contains whatever error
//! comes back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::value::JobValue;

/// Expression source text and the document location it was declared at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub source: String,
    pub location: String,
}

impl Expression {
    pub fn new(source: &str, location: &str) -> Self {
        Self {
            source: source.to_string(),
            location: location.to_string(),
        }
    }
}

/// Typed, located evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {location}: {message}")]
pub struct EvaluationError {
    /// Error kind, e.g. `TypeError`. Becomes the diagnostic token's kind.
    pub kind: String,
    pub location: String,
    pub message: String,
}

impl EvaluationError {
    pub fn new(kind: &str, location: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            location: location.to_string(),
            message: message.into(),
        }
    }
}

/// Host resources exposed to expressions as `runtime.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeContext {
    pub cores: u32,
    pub ram_mb: u64,
    pub outdir: String,
    pub tmpdir: String,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self {
            cores: 1,
            ram_mb: 1024,
            outdir: ".".to_string(),
            tmpdir: "/tmp".to_string(),
        }
    }
}

/// Read-only evaluation scope threaded through one render pass.
#[derive(Debug, Clone)]
pub struct Context {
    /// Top-level job for the invocation.
    pub inputs: Arc<JobValue>,
    /// Render-scope job: the sibling array for array elements, the record
    /// mapping for record fields, otherwise the top-level job.
    pub job: Arc<JobValue>,
    /// Value currently being rendered, if any.
    pub self_value: Option<JobValue>,
    pub runtime: Arc<RuntimeContext>,
}

impl Context {
    pub fn new(inputs: JobValue, runtime: RuntimeContext) -> Self {
        let inputs = Arc::new(inputs);
        Self {
            job: Arc::clone(&inputs),
            inputs,
            self_value: None,
            runtime: Arc::new(runtime),
        }
    }

    /// Derive the scope for a nested element or field.
    pub fn scoped(&self, job: Arc<JobValue>, self_value: JobValue) -> Self {
        Self {
            inputs: Arc::clone(&self.inputs),
            job,
            self_value: Some(self_value),
            runtime: Arc::clone(&self.runtime),
        }
    }

    pub fn with_self(&self, self_value: JobValue) -> Self {
        self.scoped(Arc::clone(&self.job), self_value)
    }
}

/// Evaluates expressions against a context.
///
/// Implementations own any timeout or execution budget; the engine waits on
/// the returned future without one.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        expression: &Expression,
        context: &Context,
    ) -> Result<JobValue, EvaluationError>;
}

//! Test-only helpers for building descriptors and scripting evaluations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::expression::{Context, EvaluationError, Evaluator, Expression};
use crate::core::schema::{BindingDescriptor, InputDescriptor, PrimitiveKind, TypeDescriptor};
use crate::core::value::JobValue;

/// Boolean flag input with a prefix.
pub fn boolean_input(id: &str, prefix: &str) -> InputDescriptor {
    InputDescriptor::new(id, TypeDescriptor::boolean())
        .with_binding(BindingDescriptor::prefixed(prefix))
}

/// Integer input with a separated prefix.
pub fn int_input(id: &str, prefix: &str) -> InputDescriptor {
    InputDescriptor::new(id, TypeDescriptor::Primitive(PrimitiveKind::Int))
        .with_binding(BindingDescriptor::prefixed(prefix))
}

/// `string[]` input with a prefix and item separator.
pub fn string_array_input(id: &str, prefix: &str, item_separator: &str) -> InputDescriptor {
    InputDescriptor::new(
        id,
        TypeDescriptor::array_of(TypeDescriptor::Primitive(PrimitiveKind::String)),
    )
    .with_binding(BindingDescriptor {
        item_separator: item_separator.to_string(),
        ..BindingDescriptor::prefixed(prefix)
    })
}

/// Evaluator answering from a script instead of a real expression language.
///
/// Lookup order per call: scripted delay, scripted failure for that call
/// number, scripted outcome for the source text, then the built-in sources
/// `self` and `job`. Anything else is a `ReferenceError`.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    outcomes: HashMap<String, Result<JobValue, EvaluationError>>,
    delays: HashMap<usize, Duration>,
    failures: HashMap<usize, EvaluationError>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn with_outcome(
        mut self,
        source: &str,
        outcome: Result<JobValue, EvaluationError>,
    ) -> Self {
        self.outcomes.insert(source.to_string(), outcome);
        self
    }

    /// Delay the `call`-th evaluation (0-based, in call order).
    pub fn delay_call(mut self, call: usize, delay: Duration) -> Self {
        self.delays.insert(call, delay);
        self
    }

    /// Fail the `call`-th evaluation (0-based, in call order).
    pub fn fail_call(mut self, call: usize, error: EvaluationError) -> Self {
        self.failures.insert(call, error);
        self
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        expression: &Expression,
        context: &Context,
    ) -> Result<JobValue, EvaluationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&call) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failures.get(&call) {
            return Err(error.clone());
        }
        if let Some(outcome) = self.outcomes.get(&expression.source) {
            return outcome.clone();
        }
        match expression.source.as_str() {
            "self" => Ok(context.self_value.clone().unwrap_or_default()),
            "job" => Ok(context.job.as_ref().clone()),
            other => Err(EvaluationError::new(
                "ReferenceError",
                &expression.location,
                format!("unscripted expression {}", other),
            )),
        }
    }
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write test file");
    path
}

/// Fresh scratch directory removed on drop.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

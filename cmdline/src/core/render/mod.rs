//! Type-directed command-line rendering.
//!
//! [`Engine::render`] is the single dispatch point: it resolves the target's
//! type tag and hands off to one renderer per kind. Composite renderers
//! (array, record) call back into the dispatcher once per element or field,
//! so recursion depth is bounded by the schema's own nesting.
//!
//! Rendering is total. Every failure degrades to a [`Fragment`] (possibly a
//! `<Kind at Location>` diagnostic) plus [`Validation`] records; nothing a
//! renderer does can abort a sibling or an ancestor.

mod composite;
mod deferred;
mod leaf;

use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use tracing::{debug, warn};

use crate::core::expression::{Context, Evaluator};
use crate::core::fragment::Fragment;
use crate::core::oracle::TypeOracle;
use crate::core::schema::{ArgumentDescriptor, InputDescriptor, StreamDescriptor, TypeDescriptor};
use crate::core::validation::{Issue, Validation};
use crate::core::value::JobValue;

pub(crate) const INPUT_TAG: &str = "input";
pub(crate) const ARGUMENT_TAG: &str = "argument";
pub(crate) const NULL_TAG: &str = "null";

/// Something the dispatcher knows how to render.
#[derive(Debug, Clone, Copy)]
pub enum Target<'d> {
    Input(&'d InputDescriptor),
    Argument(&'d ArgumentDescriptor),
    Stream(&'d StreamDescriptor),
}

/// Result of one render call.
///
/// `fragment` is `None` for the null outcome (no value, nothing to place on
/// the command line), which is distinct from an empty-text fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub fragment: Option<Fragment>,
    pub validation: Validation,
}

impl Rendered {
    pub fn fragment(fragment: Fragment) -> Self {
        Self {
            fragment: Some(fragment),
            validation: Validation::default(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.fragment.as_ref().map(|f| f.text.as_str())
    }

    fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Put `earlier` records ahead of the ones already collected.
    fn prepend(mut self, mut earlier: Validation) -> Self {
        earlier.merge(std::mem::take(&mut self.validation));
        self.validation = earlier;
        self
    }
}

/// Outcome of the expression renderer: either a value for the caller to
/// format, or a finished fragment the caller must pass through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Value(JobValue),
    Fragment(Fragment),
}

/// Renders descriptors against job values.
///
/// Holds no mutable state; one engine can serve any number of concurrent
/// render calls.
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    evaluator: &'a dyn Evaluator,
    oracle: &'a dyn TypeOracle,
}

impl<'a> Engine<'a> {
    pub fn new(evaluator: &'a dyn Evaluator, oracle: &'a dyn TypeOracle) -> Self {
        Self { evaluator, oracle }
    }

    /// Render `target` to exactly one outcome.
    ///
    /// `value` overrides the lookup of `job[id]` for inputs.
    pub fn render<'s>(
        &'s self,
        target: Target<'s>,
        job: &'s JobValue,
        value: Option<&'s JobValue>,
        context: &'s Context,
    ) -> BoxFuture<'s, Rendered> {
        match target {
            Target::Input(input) => self.render_input(input, job, value, context),
            Target::Argument(argument) => self.argument(argument, job, context).boxed(),
            Target::Stream(stream) => self.stream(stream, context).boxed(),
        }
    }

    pub(crate) fn render_input<'s>(
        &'s self,
        input: &'s InputDescriptor,
        job: &'s JobValue,
        value: Option<&'s JobValue>,
        context: &'s Context,
    ) -> BoxFuture<'s, Rendered> {
        let resolved = resolve_value(input, job, value);
        debug!(id = %input.id, ty = input.ty.tag(), present = resolved.is_some(), "dispatch input");

        let pending = match (&input.ty, resolved) {
            (TypeDescriptor::Unresolved(tag), _) => return ready(unresolved(input, tag)).boxed(),
            (_, None) => return ready(null_value()).boxed(),
            (TypeDescriptor::Primitive(_) | TypeDescriptor::Enum { .. }, Some(value)) => {
                ready(leaf::primitive(input, value)).boxed()
            }
            (TypeDescriptor::Boolean { items_context }, Some(value)) => self
                .boolean(input, items_context.as_ref(), value, context)
                .boxed(),
            (TypeDescriptor::Array { items, item_binding }, Some(value)) => {
                self.array(input, items, item_binding.as_ref(), value, context)
            }
            (TypeDescriptor::Record { fields }, Some(value)) => {
                self.record(input, fields, value, context)
            }
        };

        let mismatch = resolved
            .map(|value| self.check_mismatch(input, value))
            .unwrap_or_default();
        async move { pending.await.prepend(mismatch) }.boxed()
    }

    /// Best-effort structural check. A mismatch is reported as a warning and
    /// never stops rendering.
    fn check_mismatch(&self, input: &InputDescriptor, value: &JobValue) -> Validation {
        let mut validation = Validation::default();
        if self.oracle.matches(&input.ty, value) {
            return validation;
        }
        if input
            .ty
            .items()
            .is_some_and(|items| self.oracle.matches(items, value))
        {
            return validation;
        }

        let expected = match input.ty.items() {
            Some(items) => format!("{} or {}", input.ty.tag(), items.tag()),
            None => input.ty.tag().to_string(),
        };
        warn!(id = %input.id, expected = %expected, got = value.kind_name(), "type mismatch");
        validation.warning(
            Issue::TypeMismatch,
            &input.location,
            format!(
                "mismatched value and type definition for {}: expected {}, got {}",
                input.id,
                expected,
                value.kind_name()
            ),
        );
        validation
    }
}

/// Explicit value, else `job[id]`, else absent. `null` counts as absent.
fn resolve_value<'s>(
    input: &InputDescriptor,
    job: &'s JobValue,
    value: Option<&'s JobValue>,
) -> Option<&'s JobValue> {
    value
        .filter(|v| !v.is_null())
        .or_else(|| job.get(&input.id))
        .filter(|v| !v.is_null())
}

fn null_value() -> Rendered {
    Rendered::default()
}

fn unresolved(input: &InputDescriptor, tag: &str) -> Rendered {
    warn!(id = %input.id, tag, "unresolved input type");
    let mut validation = Validation::default();
    validation.warning(
        Issue::UnresolvedType,
        &input.location,
        format!("unresolved type '{}' for {}", tag, input.id),
    );
    Rendered::fragment(Fragment::new("", NULL_TAG, &input.location)).with_validation(validation)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;
    use crate::core::expression::{EvaluationError, Expression, RuntimeContext};
    use crate::core::oracle::StructuralOracle;
    use crate::core::schema::{BindingDescriptor, PrimitiveKind, StreamKind};
    use crate::test_support::{ScriptedEvaluator, boolean_input, int_input, string_array_input};

    fn context_for(job: &JobValue) -> Context {
        Context::new(job.clone(), RuntimeContext::default())
    }

    async fn render_with(
        evaluator: &ScriptedEvaluator,
        target: Target<'_>,
        job: JobValue,
    ) -> Rendered {
        let engine = Engine::new(evaluator, &StructuralOracle);
        let context = context_for(&job);
        engine.render(target, &job, None, &context).await
    }

    #[tokio::test]
    async fn true_boolean_renders_bare_prefix() {
        let input = boolean_input("v", "-v");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"v": true})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-v"));
        assert!(rendered.validation.is_empty());
    }

    #[tokio::test]
    async fn false_boolean_renders_empty_text() {
        let input = boolean_input("v", "-v");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"v": false})),
        )
        .await;
        assert_eq!(rendered.text(), Some(""));
    }

    #[tokio::test]
    async fn primitive_joins_prefix_and_value() {
        let input = int_input("n", "-n");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"n": 5})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-n 5"));
    }

    #[tokio::test]
    async fn unseparated_prefix_is_glued() {
        let input = int_input("n", "-n").with_binding(BindingDescriptor {
            separate: false,
            ..BindingDescriptor::prefixed("-n")
        });
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"n": 5})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-n5"));
    }

    #[tokio::test]
    async fn array_uses_item_separator() {
        let input = string_array_input("i", "-i", ",");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"i": ["a", "b"]})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-i a,b"));
    }

    #[tokio::test]
    async fn file_elements_unwrap_independently() {
        let input = InputDescriptor::new(
            "reads",
            TypeDescriptor::array_of(TypeDescriptor::Primitive(PrimitiveKind::File)),
        )
        .with_binding(BindingDescriptor::prefixed("--reads"));
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"reads": [
                {"class": "File", "path": "a.fq"},
                {"class": "File", "location": "s3://bucket/b.fq"}
            ]})),
        )
        .await;
        assert_eq!(rendered.text(), Some("--reads a.fq s3://bucket/b.fq"));
        assert!(rendered.validation.is_empty());
    }

    #[tokio::test]
    async fn array_order_is_independent_of_completion_order() {
        let mut item_binding = BindingDescriptor::default();
        item_binding.value_override = Some(Expression::new("self", "doc.items"));
        let input = InputDescriptor::new(
            "flags",
            TypeDescriptor::Array {
                items: Box::new(TypeDescriptor::boolean()),
                item_binding: Some(item_binding),
            },
        )
        .with_binding(BindingDescriptor {
            item_separator: ",".to_string(),
            ..BindingDescriptor::default()
        });
        // The first element's evaluation finishes last.
        let evaluator = ScriptedEvaluator::default()
            .delay_call(0, Duration::from_millis(30))
            .delay_call(1, Duration::from_millis(1));
        let rendered = render_with(
            &evaluator,
            Target::Input(&input),
            JobValue::from(json!({"flags": [true, true, true]})),
        )
        .await;
        assert_eq!(rendered.text(), Some("true,true,true"));
    }

    #[tokio::test]
    async fn failing_element_is_contained_inline() {
        let mut item_binding = BindingDescriptor::default();
        item_binding.value_override = Some(Expression::new("self", "doc.items"));
        let input = InputDescriptor::new(
            "xs",
            TypeDescriptor::Array {
                items: Box::new(TypeDescriptor::boolean()),
                item_binding: Some(item_binding),
            },
        )
        .with_binding(BindingDescriptor {
            item_separator: ",".to_string(),
            ..BindingDescriptor::default()
        });
        let evaluator = ScriptedEvaluator::default()
            .fail_call(1, EvaluationError::new("TypeError", "step1.in[0]", "boom"));
        let rendered = render_with(
            &evaluator,
            Target::Input(&input),
            JobValue::from(json!({"xs": [true, true, true]})),
        )
        .await;
        let text = rendered.text().expect("fragment");
        let tokens: Vec<&str> = text.split(',').collect();
        assert_eq!(tokens, vec!["true", "<TypeError at step1.in[0]>", "true"]);
        assert_eq!(rendered.validation.errors.len(), 1);
        assert_eq!(rendered.validation.errors[0].location, "xs[1]");
    }

    #[tokio::test]
    async fn record_joins_present_fields_in_declared_order() {
        let mut fields = IndexMap::new();
        for name in ["x", "y"] {
            fields.insert(
                name.to_string(),
                InputDescriptor::new(name, TypeDescriptor::Primitive(PrimitiveKind::Int)),
            );
        }
        let input = InputDescriptor::new("r", TypeDescriptor::Record { fields })
            .with_binding(BindingDescriptor::prefixed("-r"));
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"r": {"y": 2, "x": 1}})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-r 1 2"));
    }

    #[tokio::test]
    async fn boolean_items_take_the_item_prefix() {
        let input = InputDescriptor::new(
            "flags",
            TypeDescriptor::Array {
                items: Box::new(TypeDescriptor::Boolean {
                    items_context: Some(BindingDescriptor::prefixed("-f")),
                }),
                item_binding: Some(BindingDescriptor::prefixed("-f")),
            },
        )
        .with_binding(BindingDescriptor {
            item_separator: ",".to_string(),
            ..BindingDescriptor::prefixed("--flags")
        });
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"flags": [true, false, true]})),
        )
        .await;
        // A false element still occupies its slot between separators.
        assert_eq!(rendered.text(), Some("--flags -f,,-f"));
        assert!(rendered.validation.is_empty());
    }

    #[tokio::test]
    async fn record_field_failure_leaves_siblings_intact() {
        let mut broken = boolean_input("b", "-b");
        broken.binding.value_override = Some(Expression::new("broken", "doc.r.b"));
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), int_input("a", "-a"));
        fields.insert("b".to_string(), broken);
        fields.insert("c".to_string(), int_input("c", "-c"));
        let input = InputDescriptor::new("r", TypeDescriptor::Record { fields })
            .with_binding(BindingDescriptor::prefixed("-r"));
        let evaluator = ScriptedEvaluator::default().with_outcome(
            "broken",
            Err(EvaluationError::new("TypeError", "doc.r.b", "not a function")),
        );
        let rendered = render_with(
            &evaluator,
            Target::Input(&input),
            JobValue::from(json!({"r": {"a": 1, "b": true, "c": 3}})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-r -a 1 <TypeError at doc.r.b> -c 3"));
        assert_eq!(rendered.validation.errors.len(), 1);
        assert_eq!(rendered.validation.errors[0].location, "b");
        assert!(rendered.validation.warnings.is_empty());
    }

    #[tokio::test]
    async fn record_reports_undeclared_fields() {
        let mut fields = IndexMap::new();
        fields.insert(
            "x".to_string(),
            InputDescriptor::new("x", TypeDescriptor::Primitive(PrimitiveKind::Int)),
        );
        let input = InputDescriptor::new("r", TypeDescriptor::Record { fields });
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"r": {"x": 1, "z": 9}})),
        )
        .await;
        assert_eq!(rendered.text(), Some("1"));
        assert_eq!(rendered.validation.warnings.len(), 1);
        assert_eq!(
            rendered.validation.warnings[0].issue,
            Issue::UndeclaredField
        );
    }

    #[tokio::test]
    async fn boolean_override_failure_renders_diagnostic() {
        let mut input = boolean_input("v", "-v");
        input.binding.value_override = Some(Expression::new("broken", "doc.v"));
        let evaluator = ScriptedEvaluator::default().with_outcome(
            "broken",
            Err(EvaluationError::new("TypeError", "step1.in[0]", "not a function")),
        );
        let rendered = render_with(
            &evaluator,
            Target::Input(&input),
            JobValue::from(json!({"v": true})),
        )
        .await;
        let fragment = rendered.fragment.expect("fragment");
        assert_eq!(fragment.text, "<TypeError at step1.in[0]>");
        assert_eq!(fragment.type_tag, "TypeError");
    }

    #[tokio::test]
    async fn missing_value_is_null_outcome() {
        let input = int_input("n", "-n");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({})),
        )
        .await;
        assert_eq!(rendered, Rendered::default());
    }

    #[tokio::test]
    async fn unresolved_type_yields_empty_null_fragment() {
        let input = InputDescriptor::new("u", TypeDescriptor::Unresolved("#Custom".to_string()));
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"u": 1})),
        )
        .await;
        let fragment = rendered.fragment.expect("fragment");
        assert_eq!(fragment.text, "");
        assert_eq!(fragment.type_tag, NULL_TAG);
        assert_eq!(rendered.validation.warnings[0].issue, Issue::UnresolvedType);
    }

    #[tokio::test]
    async fn mismatch_is_a_warning_not_a_failure() {
        let input = int_input("n", "-n");
        let rendered = render_with(
            &ScriptedEvaluator::default(),
            Target::Input(&input),
            JobValue::from(json!({"n": "five"})),
        )
        .await;
        assert_eq!(rendered.text(), Some("-n five"));
        assert_eq!(rendered.validation.warnings[0].issue, Issue::TypeMismatch);
        assert!(!rendered.validation.has_errors());
    }

    #[tokio::test]
    async fn stdin_redirect_prefixes_operator() {
        let stream = StreamDescriptor {
            kind: StreamKind::Stdin,
            expression: Expression::new("src", "doc.stdin"),
            location: "doc.stdin".to_string(),
        };
        let evaluator =
            ScriptedEvaluator::default().with_outcome("src", Ok(JobValue::from("data.txt")));
        let rendered = render_with(&evaluator, Target::Stream(&stream), JobValue::Null).await;
        assert_eq!(rendered.text(), Some("< data.txt"));
    }

    #[tokio::test]
    async fn falsy_redirect_contributes_nothing() {
        let stream = StreamDescriptor {
            kind: StreamKind::Stdout,
            expression: Expression::new("src", "doc.stdout"),
            location: "doc.stdout".to_string(),
        };
        let evaluator = ScriptedEvaluator::default().with_outcome("src", Ok(JobValue::from("")));
        let rendered = render_with(&evaluator, Target::Stream(&stream), JobValue::Null).await;
        assert_eq!(rendered.fragment, None);
    }

    #[tokio::test]
    async fn rendering_is_idempotent() {
        let input = string_array_input("i", "-i", ",");
        let job = JobValue::from(json!({"i": ["a", "b", "c"]}));
        let evaluator = ScriptedEvaluator::default();
        let first = render_with(&evaluator, Target::Input(&input), job.clone()).await;
        let second = render_with(&evaluator, Target::Input(&input), job).await;
        assert_eq!(first, second);
    }
}

//! Renderers backed by the expression evaluator: the expression renderer
//! itself, tool arguments and stream redirections.

use tracing::warn;

use crate::core::expression::{Context, Expression};
use crate::core::fragment::Fragment;
use crate::core::render::{ARGUMENT_TAG, Engine, Evaluated, INPUT_TAG, Rendered};
use crate::core::schema::{
    ArgumentDescriptor, BindingDescriptor, InputDescriptor, StreamDescriptor, TypeDescriptor,
};
use crate::core::validation::{Issue, Validation};
use crate::core::value::JobValue;

impl Engine<'_> {
    /// Evaluate `expression`. A failure is contained as a diagnostic
    /// fragment tagged with the error's kind, located at `location`.
    pub async fn expression(
        &self,
        expression: &Expression,
        context: &Context,
        location: &str,
    ) -> (Evaluated, Validation) {
        let mut validation = Validation::default();
        match self.evaluator.evaluate(expression, context).await {
            Ok(value) => (Evaluated::Value(value), validation),
            Err(err) => {
                warn!(
                    kind = %err.kind,
                    at = %err.location,
                    message = %err.message,
                    "expression failed"
                );
                validation.error(Issue::ExpressionEvaluationError, location, err.to_string());
                (
                    Evaluated::Fragment(Fragment::diagnostic(&err.kind, &err.location, location)),
                    validation,
                )
            }
        }
    }

    /// Literal text if present; otherwise the evaluated `valueFrom`, routed
    /// back through the dispatcher so structured results render by shape.
    pub(super) async fn argument(
        &self,
        argument: &ArgumentDescriptor,
        job: &JobValue,
        context: &Context,
    ) -> Rendered {
        if let Some(literal) = &argument.literal {
            return Rendered::fragment(Fragment::new(
                literal.as_str(),
                ARGUMENT_TAG,
                &argument.location,
            ));
        }
        let Some(expression) = &argument.binding.value_override else {
            return Rendered::fragment(Fragment::new(
                argument.binding.prefix(),
                ARGUMENT_TAG,
                &argument.location,
            ));
        };

        let (evaluated, validation) = self
            .expression(expression, context, &argument.location)
            .await;
        let value = match evaluated {
            Evaluated::Fragment(fragment) => {
                return Rendered {
                    fragment: Some(fragment),
                    validation,
                };
            }
            Evaluated::Value(value) => value,
        };

        let descriptor = InputDescriptor {
            id: argument.location.clone(),
            ty: TypeDescriptor::infer(&value),
            binding: BindingDescriptor {
                value_override: None,
                ..argument.binding.clone()
            },
            location: argument.location.clone(),
        };
        let mut rendered = self
            .render_input(&descriptor, job, Some(&value), context)
            .await;
        if let Some(fragment) = rendered
            .fragment
            .as_mut()
            .filter(|f| f.type_tag == INPUT_TAG)
        {
            fragment.type_tag = ARGUMENT_TAG.to_string();
        }
        let mut all = validation;
        all.merge(std::mem::take(&mut rendered.validation));
        rendered.validation = all;
        rendered
    }

    /// `< value` or `> value`; a falsy evaluation contributes nothing.
    pub(super) async fn stream(&self, stream: &StreamDescriptor, context: &Context) -> Rendered {
        let (evaluated, validation) = self
            .expression(&stream.expression, context, &stream.location)
            .await;
        let fragment = match evaluated {
            Evaluated::Fragment(fragment) => Some(fragment),
            Evaluated::Value(value) if !value.is_truthy() => None,
            Evaluated::Value(value) => {
                let target = value.unwrap_file().to_text();
                Some(Fragment::new(
                    format!("{}{}", stream.kind.operator(), target),
                    stream.kind.as_str(),
                    &stream.location,
                ))
            }
        };
        Rendered {
            fragment,
            validation,
        }
    }
}

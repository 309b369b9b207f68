//! Leaf renderers: primitives, enums and boolean flags.

use crate::core::expression::Context;
use crate::core::fragment::Fragment;
use crate::core::render::{Engine, Evaluated, INPUT_TAG, Rendered};
use crate::core::schema::{BindingDescriptor, InputDescriptor};
use crate::core::value::JobValue;

/// `prefix + separator + text(value)`, with file references replaced by
/// their identity.
pub(super) fn primitive(input: &InputDescriptor, value: &JobValue) -> Rendered {
    let binding = &input.binding;
    let text = binding.attach(binding.prefix(), &value.unwrap_file().to_text());
    Rendered::fragment(Fragment::new(text, INPUT_TAG, &input.location))
}

impl Engine<'_> {
    /// Falsy values omit the flag entirely. Truthy values emit the bare
    /// prefix, or the prefix followed by the evaluated `valueFrom`.
    pub(super) async fn boolean(
        &self,
        input: &InputDescriptor,
        items_context: Option<&BindingDescriptor>,
        value: &JobValue,
        context: &Context,
    ) -> Rendered {
        if !value.is_truthy() {
            return Rendered::fragment(Fragment::new("", INPUT_TAG, &input.location));
        }

        let prefix = items_context
            .map(BindingDescriptor::prefix)
            .unwrap_or_else(|| input.binding.prefix());

        let Some(expression) = &input.binding.value_override else {
            return Rendered::fragment(Fragment::new(prefix, INPUT_TAG, &input.location));
        };

        let scope = context.with_self(value.clone());
        let (evaluated, validation) = self.expression(expression, &scope, &input.location).await;
        let fragment = match evaluated {
            Evaluated::Fragment(fragment) => fragment,
            Evaluated::Value(result) => {
                let text = result.unwrap_file().to_text();
                Fragment::new(
                    input.binding.attach(prefix, &text),
                    INPUT_TAG,
                    &input.location,
                )
            }
        };
        Rendered {
            fragment: Some(fragment),
            validation,
        }
    }
}

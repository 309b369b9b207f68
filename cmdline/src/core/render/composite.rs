//! Composite renderers. Each element or field goes back through the
//! dispatcher; results are joined in declaration order no matter which
//! sub-evaluation completes first.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use tracing::warn;

use crate::core::expression::Context;
use crate::core::fragment::Fragment;
use crate::core::render::{Engine, INPUT_TAG, Rendered};
use crate::core::schema::{BindingDescriptor, InputDescriptor, TypeDescriptor};
use crate::core::validation::{Issue, Validation};
use crate::core::value::JobValue;

impl Engine<'_> {
    /// Render every element with the item type and item binding, joined by
    /// `itemSeparator`.
    ///
    /// Element expressions see the whole transformed sibling array (file
    /// references replaced by their paths) as their `job` and the element
    /// itself as `self`. Each element unwraps its own file reference when
    /// rendered. A non-sequence value is treated as a one-element array.
    pub(super) fn array<'s>(
        &'s self,
        input: &'s InputDescriptor,
        items: &'s TypeDescriptor,
        item_binding: Option<&'s BindingDescriptor>,
        value: &'s JobValue,
        context: &'s Context,
    ) -> BoxFuture<'s, Rendered> {
        let elements: Vec<&'s JobValue> = match value {
            JobValue::Sequence(values) => values.iter().collect(),
            single => vec![single],
        };
        let item_binding = item_binding.cloned().unwrap_or_default();

        async move {
            let transformed = elements
                .iter()
                .map(|v| v.unwrap_file().into_owned())
                .collect();
            let siblings = Arc::new(JobValue::Sequence(transformed));
            let descriptors: Vec<InputDescriptor> = (0..elements.len())
                .map(|index| InputDescriptor {
                    id: index.to_string(),
                    ty: items.clone(),
                    binding: item_binding.clone(),
                    location: format!("{}[{}]", input.location, index),
                })
                .collect();
            let scopes: Vec<Context> = elements
                .iter()
                .map(|element| context.scoped(Arc::clone(&siblings), (*element).clone()))
                .collect();

            let rendered = join_all(
                descriptors
                    .iter()
                    .zip(&elements)
                    .zip(&scopes)
                    .map(|((descriptor, element), scope)| {
                        self.render_input(descriptor, &siblings, Some(*element), scope)
                    }),
            )
            .await;

            let (parts, validation) = collect(rendered);
            joined(input, &parts, &input.binding.item_separator, validation)
        }
        .boxed()
    }

    /// Render each field present in the value, in the record's declared
    /// field order, joined by a single space.
    pub(super) fn record<'s>(
        &'s self,
        input: &'s InputDescriptor,
        fields: &'s IndexMap<String, InputDescriptor>,
        value: &'s JobValue,
        context: &'s Context,
    ) -> BoxFuture<'s, Rendered> {
        async move {
            let mut validation = Validation::default();
            let record = match value {
                JobValue::Mapping(map) => map.clone(),
                _ => IndexMap::new(),
            };
            for key in record.keys().filter(|key| !fields.contains_key(*key)) {
                warn!(id = %input.id, field = %key, "undeclared record field");
                validation.warning(
                    Issue::UndeclaredField,
                    &input.location,
                    format!("field '{}' is not declared by {}", key, input.id),
                );
            }

            let record_job = Arc::new(JobValue::Mapping(record.clone()));
            let present: Vec<(&InputDescriptor, &JobValue)> = fields
                .iter()
                .filter_map(|(name, field)| record.get(name).map(|v| (field, v)))
                .collect();
            let scopes: Vec<Context> = present
                .iter()
                .map(|(_, field_value)| {
                    context.scoped(Arc::clone(&record_job), (*field_value).clone())
                })
                .collect();

            let rendered = join_all(
                present
                    .iter()
                    .zip(&scopes)
                    .map(|((field, field_value), scope)| {
                        self.render_input(field, &record_job, Some(*field_value), scope)
                    }),
            )
            .await;

            let (parts, field_validation) = collect(rendered);
            validation.merge(field_validation);
            joined(input, &parts, " ", validation)
        }
        .boxed()
    }
}

/// Texts of the non-null outcomes, in order, with their records.
fn collect(rendered: Vec<Rendered>) -> (Vec<String>, Validation) {
    let mut validation = Validation::default();
    let mut parts = Vec::with_capacity(rendered.len());
    for outcome in rendered {
        validation.merge(outcome.validation);
        if let Some(fragment) = outcome.fragment {
            parts.push(fragment.text);
        }
    }
    (parts, validation)
}

/// A composite with nothing to show renders as empty text, so its prefix
/// does not dangle on the command line.
fn joined(
    input: &InputDescriptor,
    parts: &[String],
    separator: &str,
    validation: Validation,
) -> Rendered {
    let text = if parts.is_empty() {
        String::new()
    } else {
        input
            .binding
            .attach(input.binding.prefix(), &parts.join(separator))
    };
    Rendered {
        fragment: Some(Fragment::new(text, INPUT_TAG, &input.location)),
        validation,
    }
}

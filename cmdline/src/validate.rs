//! `cmdline validate`: static checks on a tool description.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::core::schema::{InputDescriptor, TypeDescriptor};
use crate::core::validation::{Issue, Validation};
use crate::io::document::load_tool;
use crate::tool::ToolDescription;

/// Summary of a decoded tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub version: &'static str,
    pub inputs: usize,
    pub bound_inputs: usize,
    /// Inputs whose type admits `null`.
    pub optional_inputs: usize,
    pub arguments: usize,
    pub validation: Validation,
}

pub fn validate_file(path: &Path) -> Result<ToolReport> {
    let tool = load_tool(path)?;
    Ok(validate_tool(&tool))
}

/// Report types the renderer cannot resolve. These render as empty
/// fragments, so they are warnings rather than errors.
pub fn validate_tool(tool: &ToolDescription) -> ToolReport {
    let mut validation = Validation::default();
    for input in &tool.inputs {
        check_types(&input.descriptor, &mut validation);
    }
    ToolReport {
        version: tool.version.as_str(),
        inputs: tool.inputs.len(),
        bound_inputs: tool
            .inputs
            .iter()
            .filter(|input| input.position.is_some())
            .count(),
        optional_inputs: tool.inputs.iter().filter(|input| input.optional).count(),
        arguments: tool.arguments.len(),
        validation,
    }
}

fn check_types(input: &InputDescriptor, validation: &mut Validation) {
    check_type(&input.ty, input, validation);
}

fn check_type(ty: &TypeDescriptor, input: &InputDescriptor, validation: &mut Validation) {
    match ty {
        TypeDescriptor::Unresolved(tag) => validation.warning(
            Issue::UnresolvedType,
            &input.location,
            format!("unresolved type '{}' for {}", tag, input.id),
        ),
        TypeDescriptor::Array { items, .. } => check_type(items, input, validation),
        TypeDescriptor::Record { fields } => {
            for field in fields.values() {
                check_types(field, validation);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::io::document::decode_tool;

    #[test]
    fn nested_unresolved_types_are_warned_at_their_location() {
        let tool = decode_tool(&json!({
            "inputs": [
                {"id": "ok", "type": "string?", "inputBinding": {}},
                {
                    "id": "pair",
                    "type": {"type": "record", "fields": [{"name": "x", "type": "Mystery"}]}
                }
            ]
        }))
        .expect("decode");
        let report = validate_tool(&tool);
        assert_eq!(report.inputs, 2);
        assert_eq!(report.bound_inputs, 1);
        assert_eq!(report.optional_inputs, 1);
        assert!(report.validation.errors.is_empty());
        assert_eq!(report.validation.warnings.len(), 1);
        assert_eq!(
            report.validation.warnings[0].location,
            "document.inputs[1].type.fields[0]"
        );
    }
}

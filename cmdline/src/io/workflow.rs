//! Workflow documents: dependency graph construction and validation.
//!
//! Nodes are prefixed by role (`in:`, `step:`, `out:`) so an input and a
//! step sharing an id stay distinct.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::graph::{Graph, GraphError};
use crate::core::validation::{Issue, Validation};
use crate::io::document::{DOCUMENT_ROOT, DocumentError, ensure_array, read_json, validate_schema};

const WORKFLOW_SCHEMA: &str = include_str!("../../schemas/workflow.schema.json");

/// Outcome of checking one workflow document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowReport {
    /// Topological order of graph nodes; empty when the graph is cyclic.
    pub order: Vec<String>,
    pub validation: Validation,
}

pub fn load_workflow(path: &Path) -> Result<WorkflowReport> {
    let raw = read_json(path)?;
    validate_schema(&raw, WORKFLOW_SCHEMA).with_context(|| format!("validate {}", path.display()))?;
    let report = check_workflow(&raw).with_context(|| format!("decode {}", path.display()))?;
    debug!(
        nodes = report.order.len(),
        errors = report.validation.errors.len(),
        warnings = report.validation.warnings.len(),
        "checked workflow"
    );
    Ok(report)
}

/// Build the workflow graph and report cycles and disconnection.
pub fn check_workflow(raw: &Value) -> Result<WorkflowReport, DocumentError> {
    let mut validation = Validation::default();
    let graph = build_graph(raw, &mut validation)?;
    let order = match graph.top_sort() {
        Ok(order) => order,
        Err(err @ GraphError::Cyclic) => {
            validation.error(Issue::Graph, DOCUMENT_ROOT, err.to_string());
            Vec::new()
        }
        Err(err @ GraphError::Disconnected) => {
            validation.warning(Issue::Graph, DOCUMENT_ROOT, err.to_string());
            graph.dependency_order().unwrap_or_default()
        }
    };
    Ok(WorkflowReport { order, validation })
}

fn build_graph(raw: &Value, validation: &mut Validation) -> Result<Graph, DocumentError> {
    let doc = raw.as_object().ok_or_else(|| DocumentError {
        location: DOCUMENT_ROOT.to_string(),
        message: "workflow must be an object".to_string(),
    })?;
    let mut graph = Graph::default();

    let inputs: BTreeSet<String> = ensure_array(doc.get("inputs"), "id", "type")
        .iter()
        .filter_map(|input| {
            input
                .get("id")
                .and_then(Value::as_str)
                .or_else(|| input.as_str())
        })
        .map(|id| strip_hash(id).to_string())
        .collect();
    for id in &inputs {
        graph.add_node(&format!("in:{id}"));
    }

    let steps = ensure_array(doc.get("steps"), "id", "run");
    let step_ids: BTreeSet<String> = steps
        .iter()
        .filter_map(|step| step.get("id").and_then(Value::as_str))
        .map(|id| strip_hash(id).to_string())
        .collect();
    let resolve = |source: &str| -> Option<String> {
        let source = strip_hash(source);
        if inputs.contains(source) {
            return Some(format!("in:{source}"));
        }
        let step = source
            .split_once(['/', '.'])
            .map_or(source, |(step, _)| step);
        step_ids.contains(step).then(|| format!("step:{step}"))
    };

    for (i, step) in steps.iter().enumerate() {
        let Some(id) = step.get("id").and_then(Value::as_str) else {
            return Err(DocumentError {
                location: format!("{DOCUMENT_ROOT}.steps[{i}]"),
                message: "step is missing an id".to_string(),
            });
        };
        let node = format!("step:{}", strip_hash(id));
        graph.add_node(&node);
        let raw_ports = step.get("in").or_else(|| step.get("inputs"));
        let ports = ensure_array(raw_ports, "id", "source");
        for (j, port) in ports.iter().enumerate() {
            let loc = format!("{DOCUMENT_ROOT}.steps[{i}].in[{j}]");
            for source in sources(port.get("source")) {
                match resolve(source) {
                    Some(from) => graph.add_edge(&from, &node),
                    None => {
                        validation.error(Issue::Graph, &loc, format!("Unknown source {source}"))
                    }
                }
            }
        }
    }

    let outputs = ensure_array(doc.get("outputs"), "id", "type");
    for (i, output) in outputs.iter().enumerate() {
        let loc = format!("{DOCUMENT_ROOT}.outputs[{i}]");
        let Some(id) = output.get("id").and_then(Value::as_str) else {
            return Err(DocumentError {
                location: loc,
                message: "output is missing an id".to_string(),
            });
        };
        let node = format!("out:{}", strip_hash(id));
        graph.add_node(&node);
        for source in sources(output.get("outputSource").or_else(|| output.get("source"))) {
            match resolve(source) {
                Some(from) => graph.add_edge(&from, &node),
                None => validation.error(Issue::Graph, &loc, format!("Unknown source {source}")),
            }
        }
    }

    Ok(graph)
}

fn sources(raw: Option<&Value>) -> Vec<&str> {
    match raw {
        Some(Value::String(source)) => vec![source.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn strip_hash(id: &str) -> &str {
    id.trim_start_matches('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn linear_workflow_sorts_sources_first() {
        let report = check_workflow(&json!({
            "inputs": {"reads": "File"},
            "steps": [
                {"id": "align", "in": {"fq": "reads"}, "out": ["bam"]},
                {"id": "sort", "in": [{"id": "bam", "source": "align/bam"}], "out": ["sorted"]}
            ],
            "outputs": [{"id": "result", "outputSource": "sort/sorted"}]
        }))
        .expect("check");

        assert!(report.validation.is_empty());
        assert_eq!(
            report.order,
            vec!["in:reads", "step:align", "step:sort", "out:result"]
        );
    }

    #[test]
    fn cycle_is_an_error_at_document() {
        let report = check_workflow(&json!({
            "steps": [
                {"id": "a", "in": {"x": "b/out"}},
                {"id": "b", "in": {"y": "a/out"}}
            ]
        }))
        .expect("check");

        assert!(report.order.is_empty());
        assert_eq!(report.validation.errors.len(), 1);
        assert_eq!(report.validation.errors[0].location, "document");
        assert_eq!(report.validation.errors[0].message, "Graph has cycles");
    }

    #[test]
    fn disconnected_graph_is_a_warning() {
        let report = check_workflow(&json!({
            "inputs": {"a": "string", "b": "string"},
            "steps": [
                {"id": "one", "in": {"x": "a"}},
                {"id": "two", "in": {"x": "b"}}
            ]
        }))
        .expect("check");

        assert!(report.validation.errors.is_empty());
        assert_eq!(
            report.validation.warnings[0].message,
            "Graph is not connected"
        );
        assert_eq!(report.order.len(), 4);
    }

    #[test]
    fn unknown_source_is_reported_at_step_port() {
        let report = check_workflow(&json!({
            "steps": [{"id": "a", "in": {"x": "ghost/out"}}]
        }))
        .expect("check");
        assert_eq!(
            report.validation.errors[0].location,
            "document.steps[0].in[0]"
        );
    }

    #[test]
    fn draft2_hash_ids_resolve() {
        let report = check_workflow(&json!({
            "inputs": [{"id": "#reads"}],
            "steps": [{"id": "#align", "inputs": [{"id": "#align.fq", "source": ["#reads"]}]}],
            "outputs": [{"id": "#bam", "source": ["#align.bam"]}]
        }))
        .expect("check");
        assert!(report.validation.is_empty());
        assert_eq!(report.order, vec!["in:reads", "step:align", "out:bam"]);
    }
}

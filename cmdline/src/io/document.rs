//! Tool and job document loading.
//!
//! Documents are checked against an embedded JSON Schema, then mapped into
//! the shared tagged model. Version differences (`v1.0`, `sbg:draft-2`) are
//! handled here so nothing downstream needs to know which version a
//! document was written in.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use jsonschema::Draft;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::core::expression::Expression;
use crate::core::schema::{
    ArgumentDescriptor, BindingDescriptor, InputDescriptor, PrimitiveKind, StreamDescriptor,
    StreamKind, TypeDescriptor,
};
use crate::core::value::JobValue;
use crate::tool::{DocumentVersion, ToolArgument, ToolDescription, ToolInput};

const TOOL_SCHEMA: &str = include_str!("../../schemas/tool.schema.json");

/// Root location every document path starts from.
pub const DOCUMENT_ROOT: &str = "document";

/// A document node that cannot be mapped into the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct DocumentError {
    pub location: String,
    pub message: String,
}

impl DocumentError {
    fn new(location: &str, message: impl Into<String>) -> Self {
        Self {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

/// Read, schema-check and decode a tool description.
pub fn load_tool(path: &Path) -> Result<ToolDescription> {
    let raw = read_json(path)?;
    validate_schema(&raw, TOOL_SCHEMA).with_context(|| format!("validate {}", path.display()))?;
    let tool = decode_tool(&raw).with_context(|| format!("decode {}", path.display()))?;
    debug!(
        version = tool.version.as_str(),
        inputs = tool.inputs.len(),
        arguments = tool.arguments.len(),
        "loaded tool"
    );
    Ok(tool)
}

/// Read a job document. The top level must be an object keyed by input id.
pub fn load_job(path: &Path) -> Result<JobValue> {
    let raw = read_json(path)?;
    if !raw.is_object() {
        return Err(anyhow!("job {} must be a JSON object", path.display()));
    }
    Ok(JobValue::from(raw))
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Validate a JSON instance against a JSON Schema (Draft 2020-12).
pub(crate) fn validate_schema(instance: &Value, schema_raw: &str) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_raw).context("parse embedded schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!("schema validation failed:\n- {}", messages.join("\n- ")));
    }
    Ok(())
}

/// Map a tool document into the shared model.
pub fn decode_tool(raw: &Value) -> Result<ToolDescription, DocumentError> {
    let doc = raw
        .as_object()
        .ok_or_else(|| DocumentError::new(DOCUMENT_ROOT, "tool must be an object"))?;
    let version_raw = doc.get("cwlVersion").and_then(Value::as_str);
    let version = DocumentVersion::parse(version_raw).ok_or_else(|| {
        DocumentError::new(
            &format!("{DOCUMENT_ROOT}.cwlVersion"),
            format!("unsupported version {}", version_raw.unwrap_or_default()),
        )
    })?;
    let decoder = Decoder { version };

    let base_command = match doc.get("baseCommand") {
        None => Vec::new(),
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DocumentError::new(&format!("{DOCUMENT_ROOT}.baseCommand"), "expected strings")
                })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(DocumentError::new(
                &format!("{DOCUMENT_ROOT}.baseCommand"),
                "expected a string or an array of strings",
            ));
        }
    };

    let inputs = ensure_array(doc.get("inputs"), "id", "type")
        .iter()
        .enumerate()
        .map(|(i, input)| decoder.input(input, &format!("{DOCUMENT_ROOT}.inputs[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let arguments = match doc.get("arguments") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decoder.argument(item, &format!("{DOCUMENT_ROOT}.arguments[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(DocumentError::new(
                &format!("{DOCUMENT_ROOT}.arguments"),
                "expected an array",
            ));
        }
    };

    let stdin = decoder.stream(doc.get("stdin"), StreamKind::Stdin)?;
    let stdout = decoder.stream(doc.get("stdout"), StreamKind::Stdout)?;

    Ok(ToolDescription {
        id: doc
            .get("id")
            .and_then(Value::as_str)
            .map(|id| decoder.id(id)),
        version,
        base_command,
        arguments,
        inputs,
        stdin,
        stdout,
    })
}

/// Accept both array form and map-keyed-by-id form. Map values that are not
/// objects are taken as the entry's type.
pub(crate) fn ensure_array(value: Option<&Value>, key_field: &str, type_field: &str) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, entry)| {
                let mut object = match entry {
                    Value::Object(fields) => fields.clone(),
                    other => {
                        let mut fields = Map::new();
                        fields.insert(type_field.to_string(), other.clone());
                        fields
                    }
                };
                object
                    .entry(key_field.to_string())
                    .or_insert_with(|| Value::String(key.clone()));
                Value::Object(object)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Version-specific mapping rules.
struct Decoder {
    version: DocumentVersion,
}

impl Decoder {
    fn id(&self, raw: &str) -> String {
        match self.version {
            DocumentVersion::Draft2 => raw.trim_start_matches('#').to_string(),
            DocumentVersion::V1_0 => raw.to_string(),
        }
    }

    fn input(&self, raw: &Value, loc: &str) -> Result<ToolInput, DocumentError> {
        let object = raw
            .as_object()
            .ok_or_else(|| DocumentError::new(loc, "input must be an object"))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(|id| self.id(id))
            .ok_or_else(|| DocumentError::new(loc, "input is missing an id"))?;
        let (ty, optional) = self.ty(object.get("type"), &format!("{loc}.type"))?;

        let (binding, position) = match object.get("inputBinding") {
            Some(Value::Object(binding)) => (
                self.binding(binding, &format!("{loc}.inputBinding"))?,
                Some(binding.get("position").and_then(Value::as_i64).unwrap_or(0)),
            ),
            _ => (BindingDescriptor::default(), None),
        };

        Ok(ToolInput {
            descriptor: InputDescriptor {
                id,
                ty,
                binding,
                location: loc.to_string(),
            },
            default: object.get("default").cloned().map(JobValue::from),
            position,
            optional,
        })
    }

    /// Decode a type, returning it with whether `null` was allowed.
    fn ty(
        &self,
        raw: Option<&Value>,
        loc: &str,
    ) -> Result<(TypeDescriptor, bool), DocumentError> {
        let Some(raw) = raw else {
            return Ok((TypeDescriptor::Unresolved("missing".to_string()), false));
        };
        match raw {
            Value::String(name) => Ok(self.named_type(name)),
            Value::Array(union) => {
                let optional = union.iter().any(|t| t.as_str() == Some("null"));
                let rest: Vec<&Value> = union
                    .iter()
                    .filter(|t| t.as_str() != Some("null"))
                    .collect();
                match rest.as_slice() {
                    [single] => {
                        let (ty, inner_optional) = self.ty(Some(*single), loc)?;
                        Ok((ty, optional || inner_optional))
                    }
                    _ => Ok((TypeDescriptor::Unresolved("union".to_string()), optional)),
                }
            }
            Value::Object(object) => Ok((self.complex_type(object, loc)?, false)),
            _ => Ok((TypeDescriptor::Unresolved("invalid".to_string()), false)),
        }
    }

    /// `T`, `T?`, `T[]` shorthands.
    fn named_type(&self, name: &str) -> (TypeDescriptor, bool) {
        if let Some(inner) = name.strip_suffix('?') {
            let (ty, _) = self.named_type(inner);
            return (ty, true);
        }
        if let Some(inner) = name.strip_suffix("[]") {
            let (items, _) = self.named_type(inner);
            return (TypeDescriptor::array_of(items), false);
        }
        let ty = match name {
            "boolean" => TypeDescriptor::boolean(),
            other => PrimitiveKind::parse(other)
                .map(TypeDescriptor::Primitive)
                .unwrap_or_else(|| TypeDescriptor::Unresolved(other.to_string())),
        };
        (ty, false)
    }

    fn complex_type(
        &self,
        object: &Map<String, Value>,
        loc: &str,
    ) -> Result<TypeDescriptor, DocumentError> {
        let binding = match object.get("inputBinding") {
            Some(Value::Object(binding)) => {
                Some(self.binding(binding, &format!("{loc}.inputBinding"))?)
            }
            _ => None,
        };
        match object.get("type").and_then(Value::as_str) {
            Some("array") => {
                let (items, _) = self.ty(object.get("items"), &format!("{loc}.items"))?;
                let items = match (items, &binding) {
                    (TypeDescriptor::Boolean { .. }, Some(item_binding)) => {
                        TypeDescriptor::Boolean {
                            items_context: Some(item_binding.clone()),
                        }
                    }
                    (items, _) => items,
                };
                Ok(TypeDescriptor::Array {
                    items: Box::new(items),
                    item_binding: binding,
                })
            }
            Some("record") => {
                let mut fields = IndexMap::new();
                let raw_fields = ensure_array(object.get("fields"), "name", "type");
                for (j, field) in raw_fields.iter().enumerate() {
                    let field_loc = format!("{loc}.fields[{j}]");
                    let descriptor = self.field(field, &field_loc)?;
                    fields.insert(descriptor.id.clone(), descriptor);
                }
                Ok(TypeDescriptor::Record { fields })
            }
            Some("enum") => {
                let symbols = object
                    .get("symbols")
                    .and_then(Value::as_array)
                    .ok_or_else(|| DocumentError::new(loc, "enum is missing symbols"))?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|symbol| self.id(symbol))
                    .collect();
                Ok(TypeDescriptor::Enum { symbols })
            }
            Some(other) => Ok(self.named_type(other).0),
            None => Ok(TypeDescriptor::Unresolved("object".to_string())),
        }
    }

    /// Record fields are named by `name` (or `id`) and bound by their own
    /// `inputBinding`, falling back to the binding on their type.
    fn field(&self, raw: &Value, loc: &str) -> Result<InputDescriptor, DocumentError> {
        let object = raw
            .as_object()
            .ok_or_else(|| DocumentError::new(loc, "field must be an object"))?;
        let name = object
            .get("name")
            .or_else(|| object.get("id"))
            .and_then(Value::as_str)
            .map(|name| self.id(name))
            .ok_or_else(|| DocumentError::new(loc, "field is missing a name"))?;
        let (ty, _) = self.ty(object.get("type"), &format!("{loc}.type"))?;
        let binding_raw = object.get("inputBinding").or_else(|| {
            object
                .get("type")
                .and_then(Value::as_object)
                .and_then(|ty| ty.get("inputBinding"))
        });
        let binding = match binding_raw {
            Some(Value::Object(binding)) => self.binding(binding, &format!("{loc}.inputBinding"))?,
            _ => BindingDescriptor::default(),
        };
        Ok(InputDescriptor {
            id: name,
            ty,
            binding,
            location: loc.to_string(),
        })
    }

    fn binding(
        &self,
        object: &Map<String, Value>,
        loc: &str,
    ) -> Result<BindingDescriptor, DocumentError> {
        let defaults = BindingDescriptor::default();
        Ok(BindingDescriptor {
            prefix: object
                .get("prefix")
                .and_then(Value::as_str)
                .map(str::to_string),
            separate: object
                .get("separate")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.separate),
            item_separator: object
                .get("itemSeparator")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(defaults.item_separator),
            value_override: object
                .get("valueFrom")
                .map(|raw| self.expression(raw, &format!("{loc}.valueFrom")))
                .transpose()?,
        })
    }

    fn argument(&self, raw: &Value, loc: &str) -> Result<ToolArgument, DocumentError> {
        match raw {
            Value::String(text) if !is_expression(text) => Ok(ToolArgument {
                descriptor: ArgumentDescriptor {
                    literal: Some(text.clone()),
                    binding: BindingDescriptor::default(),
                    location: loc.to_string(),
                },
                position: 0,
            }),
            Value::String(_) => Ok(ToolArgument {
                descriptor: ArgumentDescriptor {
                    literal: None,
                    binding: BindingDescriptor {
                        value_override: Some(self.expression(raw, loc)?),
                        ..BindingDescriptor::default()
                    },
                    location: loc.to_string(),
                },
                position: 0,
            }),
            Value::Object(object) => Ok(ToolArgument {
                descriptor: ArgumentDescriptor {
                    literal: None,
                    binding: self.binding(object, loc)?,
                    location: loc.to_string(),
                },
                position: object.get("position").and_then(Value::as_i64).unwrap_or(0),
            }),
            _ => Err(DocumentError::new(loc, "argument must be a string or an object")),
        }
    }

    fn stream(
        &self,
        raw: Option<&Value>,
        kind: StreamKind,
    ) -> Result<Option<StreamDescriptor>, DocumentError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let loc = format!("{DOCUMENT_ROOT}.{}", kind.as_str());
        Ok(Some(StreamDescriptor {
            kind,
            expression: self.expression(raw, &loc)?,
            location: loc,
        }))
    }

    /// Strings are kept as written. Draft-2 `{class: Expression, script}`
    /// objects are rewritten into the `$(...)` form.
    fn expression(&self, raw: &Value, loc: &str) -> Result<Expression, DocumentError> {
        match (self.version, raw) {
            (_, Value::String(source)) => Ok(Expression::new(source, loc)),
            (DocumentVersion::Draft2, Value::Object(object))
                if object.get("class").and_then(Value::as_str) == Some("Expression") =>
            {
                let script = object
                    .get("script")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DocumentError::new(loc, "expression is missing a script"))?;
                Ok(Expression::new(&draft2_script(script), loc))
            }
            (_, Value::Number(_) | Value::Bool(_)) => Ok(Expression::new(&raw.to_string(), loc)),
            _ => Err(DocumentError::new(loc, "expected an expression")),
        }
    }
}

fn is_expression(text: &str) -> bool {
    text.contains("$(") || text.contains("${")
}

/// Rewrite a draft-2 script into a parameter reference. Function bodies stay
/// in `${...}` form.
fn draft2_script(script: &str) -> String {
    static JOB_INPUTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$job\.inputs\b").unwrap());
    static JOB_RESOURCES: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\$job\.allocatedResources\b").unwrap());
    static SELF_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$self\b").unwrap());

    let script = script.trim();
    let rewritten = JOB_INPUTS.replace_all(script, "inputs");
    let rewritten = JOB_RESOURCES.replace_all(&rewritten, "runtime");
    let rewritten = SELF_REF.replace_all(&rewritten, "self");
    if rewritten.starts_with('{') {
        format!("${rewritten}")
    } else {
        format!("$({rewritten})")
    }
}

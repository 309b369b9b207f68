//! Declared input shapes and the binding rules that turn values into text.

use indexmap::IndexMap;

use crate::core::expression::Expression;
use crate::core::value::{FileClass, JobValue, Scalar};

/// Leaf type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Int,
    Long,
    Float,
    Double,
    File,
    Directory,
    Null,
    Any,
}

impl PrimitiveKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "string" => PrimitiveKind::String,
            "int" => PrimitiveKind::Int,
            "long" => PrimitiveKind::Long,
            "float" => PrimitiveKind::Float,
            "double" => PrimitiveKind::Double,
            "File" => PrimitiveKind::File,
            "Directory" => PrimitiveKind::Directory,
            "null" => PrimitiveKind::Null,
            "Any" => PrimitiveKind::Any,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::File => "File",
            PrimitiveKind::Directory => "Directory",
            PrimitiveKind::Null => "null",
            PrimitiveKind::Any => "Any",
        }
    }
}

/// Per-input rules governing how a value becomes text.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingDescriptor {
    pub prefix: Option<String>,
    /// `false` concatenates prefix and value with no space.
    pub separate: bool,
    pub item_separator: String,
    pub value_override: Option<Expression>,
}

impl Default for BindingDescriptor {
    fn default() -> Self {
        Self {
            prefix: None,
            separate: true,
            item_separator: " ".to_string(),
            value_override: None,
        }
    }
}

impl BindingDescriptor {
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }

    pub fn separator(&self) -> &'static str {
        if self.separate { " " } else { "" }
    }

    /// Place `text` after `prefix`. The separator only appears between a
    /// non-empty prefix and the text.
    pub fn attach(&self, prefix: &str, text: &str) -> String {
        if prefix.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", prefix, self.separator(), text)
        }
    }
}

/// Declared shape of an input.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Boolean {
        /// Binding of the enclosing array when this boolean is an array item.
        items_context: Option<BindingDescriptor>,
    },
    Array {
        items: Box<TypeDescriptor>,
        item_binding: Option<BindingDescriptor>,
    },
    /// Fields in declaration order.
    Record { fields: IndexMap<String, InputDescriptor> },
    Enum { symbols: Vec<String> },
    /// A type tag the document model could not resolve.
    Unresolved(String),
}

impl TypeDescriptor {
    pub fn boolean() -> Self {
        TypeDescriptor::Boolean {
            items_context: None,
        }
    }

    pub fn array_of(items: TypeDescriptor) -> Self {
        TypeDescriptor::Array {
            items: Box::new(items),
            item_binding: None,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            TypeDescriptor::Primitive(kind) => kind.as_str(),
            TypeDescriptor::Boolean { .. } => "boolean",
            TypeDescriptor::Array { .. } => "array",
            TypeDescriptor::Record { .. } => "record",
            TypeDescriptor::Enum { .. } => "enum",
            TypeDescriptor::Unresolved(tag) => tag,
        }
    }

    pub fn items(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Array { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Shape a descriptor after a value that has no declared type, such as
    /// the structured result of an argument's `valueFrom`.
    pub fn infer(value: &JobValue) -> Self {
        match value {
            JobValue::Null => TypeDescriptor::Primitive(PrimitiveKind::Null),
            JobValue::Scalar(Scalar::Bool(_)) => TypeDescriptor::boolean(),
            JobValue::Scalar(Scalar::Number(n)) if n.is_f64() => {
                TypeDescriptor::Primitive(PrimitiveKind::Double)
            }
            JobValue::Scalar(Scalar::Number(_)) => TypeDescriptor::Primitive(PrimitiveKind::Long),
            JobValue::Scalar(Scalar::String(_)) => TypeDescriptor::Primitive(PrimitiveKind::String),
            JobValue::File(file) => match file.class {
                FileClass::File => TypeDescriptor::Primitive(PrimitiveKind::File),
                FileClass::Directory => TypeDescriptor::Primitive(PrimitiveKind::Directory),
            },
            JobValue::Sequence(items) => TypeDescriptor::array_of(
                items
                    .first()
                    .map(TypeDescriptor::infer)
                    .unwrap_or(TypeDescriptor::Primitive(PrimitiveKind::Any)),
            ),
            JobValue::Mapping(map) => TypeDescriptor::Record {
                fields: map
                    .iter()
                    .map(|(name, value)| {
                        (name.clone(), InputDescriptor::new(name, TypeDescriptor::infer(value)))
                    })
                    .collect(),
            },
        }
    }
}

/// One input (or record field): id, declared type, binding, and where it was declared.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    pub id: String,
    pub ty: TypeDescriptor,
    pub binding: BindingDescriptor,
    pub location: String,
}

impl InputDescriptor {
    pub fn new(id: &str, ty: TypeDescriptor) -> Self {
        Self {
            id: id.to_string(),
            ty,
            binding: BindingDescriptor::default(),
            location: id.to_string(),
        }
    }

    pub fn with_binding(mut self, binding: BindingDescriptor) -> Self {
        self.binding = binding;
        self
    }
}

/// A fixed command-line argument declared by the tool itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDescriptor {
    /// Literal text placed on the command line as-is.
    pub literal: Option<String>,
    pub binding: BindingDescriptor,
    pub location: String,
}

/// Standard stream a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
        }
    }

    /// Redirection operator text, including its trailing space.
    pub fn operator(self) -> &'static str {
        match self {
            StreamKind::Stdin => "< ",
            StreamKind::Stdout => "> ",
        }
    }
}

/// Stream redirection backed by an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub expression: Expression,
    pub location: String,
}

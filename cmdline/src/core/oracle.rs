//! Structural type matching between declared types and job values.

use crate::core::schema::{PrimitiveKind, TypeDescriptor};
use crate::core::value::{FileClass, JobValue, Scalar};

/// Answers whether a value structurally matches a declared type.
pub trait TypeOracle: Send + Sync {
    fn matches(&self, ty: &TypeDescriptor, value: &JobValue) -> bool;
}

/// Default oracle: compares the value's shape against the type tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOracle;

impl TypeOracle for StructuralOracle {
    fn matches(&self, ty: &TypeDescriptor, value: &JobValue) -> bool {
        match ty {
            TypeDescriptor::Primitive(kind) => primitive_matches(*kind, value),
            TypeDescriptor::Boolean { .. } => matches!(value, JobValue::Scalar(Scalar::Bool(_))),
            TypeDescriptor::Enum { symbols } => match value {
                JobValue::Scalar(Scalar::String(s)) => symbols.iter().any(|symbol| symbol == s),
                _ => false,
            },
            TypeDescriptor::Array { items, .. } => match value {
                JobValue::Sequence(values) => values.iter().all(|v| self.matches(items, v)),
                _ => false,
            },
            TypeDescriptor::Record { .. } => matches!(value, JobValue::Mapping(_)),
            TypeDescriptor::Unresolved(_) => true,
        }
    }
}

fn primitive_matches(kind: PrimitiveKind, value: &JobValue) -> bool {
    match (kind, value) {
        (PrimitiveKind::Any, _) => true,
        (PrimitiveKind::Null, JobValue::Null) => true,
        (PrimitiveKind::String, JobValue::Scalar(Scalar::String(_))) => true,
        (PrimitiveKind::Int | PrimitiveKind::Long, JobValue::Scalar(Scalar::Number(n))) => {
            n.is_i64() || n.is_u64()
        }
        (PrimitiveKind::Float | PrimitiveKind::Double, JobValue::Scalar(Scalar::Number(_))) => true,
        (PrimitiveKind::File, JobValue::File(file)) => file.class == FileClass::File,
        (PrimitiveKind::Directory, JobValue::File(file)) => file.class == FileClass::Directory,
        _ => false,
    }
}

//! Command-line tool description, decoded into the shared tagged model.
//!
//! Produced by [`crate::io::document`] from any supported document version;
//! consumed read-only by [`crate::assemble`].

use crate::core::schema::{ArgumentDescriptor, InputDescriptor, StreamDescriptor};
use crate::core::value::JobValue;

/// Document versions that map into the shared model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentVersion {
    V1_0,
    Draft2,
}

impl DocumentVersion {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None | Some("v1.0") => Some(DocumentVersion::V1_0),
            Some("draft-2" | "sbg:draft-2") => Some(DocumentVersion::Draft2),
            Some(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentVersion::V1_0 => "v1.0",
            DocumentVersion::Draft2 => "sbg:draft-2",
        }
    }
}

/// A declared tool input.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInput {
    pub descriptor: InputDescriptor,
    /// Used when the job leaves this input unset.
    pub default: Option<JobValue>,
    /// Command-line position; `None` means the input has no binding and is
    /// not placed on the command line.
    pub position: Option<i64>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgument {
    pub descriptor: ArgumentDescriptor,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub id: Option<String>,
    pub version: DocumentVersion,
    pub base_command: Vec<String>,
    pub arguments: Vec<ToolArgument>,
    pub inputs: Vec<ToolInput>,
    pub stdin: Option<StreamDescriptor>,
    pub stdout: Option<StreamDescriptor>,
}

impl ToolDescription {
    pub fn input(&self, id: &str) -> Option<&ToolInput> {
        self.inputs.iter().find(|input| input.descriptor.id == id)
    }
}

//! I/O boundary: configuration, documents and the concrete expression evaluator.

pub mod config;
pub mod document;
pub mod expression;
pub mod workflow;

//! Deterministic, pure logic for command-line construction.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! descriptors and values; the only suspension point is the expression
//! evaluator behind [`expression::Evaluator`].

pub mod expression;
pub mod fragment;
pub mod graph;
pub mod oracle;
pub mod render;
pub mod schema;
pub mod validation;
pub mod value;

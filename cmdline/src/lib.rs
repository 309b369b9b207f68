//! Command-line construction for tool descriptions.
//!
//! Given a tool description and a job (concrete input values), the engine
//! renders each bound input and argument into a command-line fragment and
//! assembles them in position order. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure rendering logic (value model, descriptors, the
//!   type-directed dispatcher, validation records, workflow graph). No I/O.
//! - **[`io`]**: Document and config loading plus the concrete expression
//!   evaluator.
//!
//! Orchestration modules ([`assemble`], [`render`], [`validate`]) combine
//! the two to implement CLI commands.

pub mod assemble;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod render;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tool;
pub mod validate;

//! Stable exit codes for `cmdline` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid document, job or config, or any other error.
pub const INVALID: i32 = 1;
/// Validation errors were recorded (render with `fail_on_diagnostics`,
/// validate or check-workflow with errors).
pub const DIAGNOSTICS: i32 = 2;
/// `cmdline render` exceeded `render_timeout_secs` and was cancelled.
pub const CANCELLED: i32 = 3;

//! `cmdline render`: load a tool and job, assemble under the configured
//! time limit.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::assemble::{Assembled, assemble, cancellation};
use crate::core::oracle::StructuralOracle;
use crate::core::render::Engine;
use crate::exit_codes;
use crate::io::config::EngineConfig;
use crate::io::document::{load_job, load_tool};
use crate::io::expression::TemplateEvaluator;

/// Load documents from disk and assemble the command line.
pub async fn render_files(
    tool_path: &Path,
    job_path: &Path,
    config: &EngineConfig,
) -> Result<Assembled> {
    let tool = load_tool(tool_path)?;
    let job = load_job(job_path)?;
    let evaluator = TemplateEvaluator::new(config.expression_fuel);
    let engine = Engine::new(&evaluator, &StructuralOracle);
    let (handle, token) = cancellation();

    let pending = assemble(&tool, &job, &engine, config.runtime.clone(), &token);
    tokio::pin!(pending);
    let limit = Duration::from_secs(config.render_timeout_secs);
    let assembled = tokio::select! {
        assembled = &mut pending => assembled,
        () = tokio::time::sleep(limit) => {
            warn!(limit_secs = config.render_timeout_secs, "render time limit exceeded");
            handle.cancel();
            pending.await
        }
    };
    debug!(fragments = assembled.fragments.len(), "render finished");
    Ok(assembled)
}

/// Exit code for a finished render.
pub fn exit_code(assembled: &Assembled, config: &EngineConfig) -> i32 {
    if assembled.cancelled {
        exit_codes::CANCELLED
    } else if config.fail_on_diagnostics && assembled.validation.has_errors() {
        exit_codes::DIAGNOSTICS
    } else {
        exit_codes::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::Issue;
    use crate::test_support::{scratch_dir, write_file};

    const TOOL: &str = r#"{
        "cwlVersion": "v1.0",
        "baseCommand": "grep",
        "inputs": {
            "pattern": {"type": "string", "inputBinding": {"position": 1}},
            "ignore_case": {"type": "boolean", "inputBinding": {"prefix": "-i", "position": 0}},
            "file": {"type": "File", "inputBinding": {"position": 2}}
        }
    }"#;

    const JOB: &str = r#"{
        "pattern": "error",
        "ignore_case": true,
        "file": {"class": "File", "path": "app.log"}
    }"#;

    #[tokio::test]
    async fn renders_from_files() {
        let dir = scratch_dir();
        let tool = write_file(dir.path(), "tool.json", TOOL);
        let job = write_file(dir.path(), "job.json", JOB);
        let assembled = render_files(&tool, &job, &EngineConfig::default())
            .await
            .expect("render");
        assert_eq!(assembled.command_line, "grep -i error app.log");
        assert_eq!(
            exit_code(&assembled, &EngineConfig::default()),
            exit_codes::OK
        );
    }

    #[tokio::test]
    async fn non_object_job_is_rejected() {
        let dir = scratch_dir();
        let tool = write_file(dir.path(), "tool.json", TOOL);
        let job = write_file(dir.path(), "job.json", "[1, 2]");
        let err = render_files(&tool, &job, &EngineConfig::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("must be a JSON object"));
    }

    #[test]
    fn diagnostics_policy_follows_config() {
        let mut assembled = Assembled::default();
        assembled.validation.error(
            Issue::ExpressionEvaluationError,
            "document.arguments[0]",
            "boom",
        );
        let mut config = EngineConfig::default();
        assert_eq!(exit_code(&assembled, &config), exit_codes::OK);
        config.fail_on_diagnostics = true;
        assert_eq!(exit_code(&assembled, &config), exit_codes::DIAGNOSTICS);
        assembled.cancelled = true;
        assert_eq!(exit_code(&assembled, &config), exit_codes::CANCELLED);
    }
}

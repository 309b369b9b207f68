//! Command-line construction engine.
//!
//! Renders a tool description plus a job into the exact command line the
//! tool would be invoked with, and checks workflow graphs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use cmdline::core::validation::Validation;
use cmdline::exit_codes;
use cmdline::io::config::{DEFAULT_CONFIG_FILE, EngineConfig, load_config};
use cmdline::io::workflow::load_workflow;
use cmdline::logging;
use cmdline::render::{exit_code, render_files};
use cmdline::validate::validate_file;

#[derive(Parser)]
#[command(
    name = "cmdline",
    version,
    about = "Render command lines from tool descriptions"
)]
struct Cli {
    /// Engine config (TOML). Defaults to `cmdline.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the command line for a tool and job.
    Render {
        #[arg(long)]
        tool: PathBuf,
        #[arg(long)]
        job: PathBuf,
        /// Print fragments and validation records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check a tool description against the schema and the type model.
    Validate {
        #[arg(long)]
        tool: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Check a workflow's dependency graph for cycles and disconnection.
    CheckWorkflow {
        #[arg(long)]
        workflow: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Render { tool, job, json } => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_render(&tool, &job, &config, json)
        }
        Command::Validate { tool, json } => cmd_validate(&tool, json),
        Command::CheckWorkflow { workflow, json } => cmd_check_workflow(&workflow, json),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    load_config(path).with_context(|| format!("load config {}", path.display()))
}

fn cmd_render(tool: &Path, job: &Path, config: &EngineConfig, json: bool) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build async runtime")?;
    let assembled = runtime.block_on(render_files(tool, job, config))?;

    if json {
        print_json(&assembled)?;
    } else {
        report(&assembled.validation);
        println!("{}", assembled.command_line);
    }
    if assembled.cancelled {
        eprintln!("render cancelled after {}s", config.render_timeout_secs);
    }
    Ok(exit_code(&assembled, config))
}

fn cmd_validate(tool: &Path, json: bool) -> Result<i32> {
    let report = validate_file(tool)?;
    if json {
        print_json(&report)?;
    } else {
        self::report(&report.validation);
        println!(
            "{}: {} inputs ({} bound, {} optional), {} arguments",
            report.version, report.inputs, report.bound_inputs, report.optional_inputs,
            report.arguments
        );
    }
    Ok(status(&report.validation))
}

fn cmd_check_workflow(workflow: &Path, json: bool) -> Result<i32> {
    let report = load_workflow(workflow)?;
    if json {
        print_json(&report)?;
    } else {
        self::report(&report.validation);
        for node in &report.order {
            println!("{node}");
        }
    }
    Ok(status(&report.validation))
}

fn status(validation: &Validation) -> i32 {
    if validation.has_errors() {
        exit_codes::DIAGNOSTICS
    } else {
        exit_codes::OK
    }
}

/// Print validation records to stderr, errors first.
fn report(validation: &Validation) {
    for record in &validation.errors {
        eprintln!("error: {record}");
    }
    for record in &validation.warnings {
        eprintln!("warning: {record}");
    }
}

/// Serialize `value` to pretty-printed JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

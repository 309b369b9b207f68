//! Engine configuration stored as TOML (default `cmdline.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::expression::RuntimeContext;
use crate::io::expression::DEFAULT_FUEL;

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "cmdline.toml";

/// Engine configuration (TOML).
///
/// Missing fields take their defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Fuel budget for a single expression evaluation.
    pub expression_fuel: u64,

    /// Exit non-zero when rendering records any validation error.
    pub fail_on_diagnostics: bool,

    /// Wall-clock limit for one render; the pass is cancelled when exceeded.
    pub render_timeout_secs: u64,

    /// Values exposed to expressions as `runtime.*`.
    pub runtime: RuntimeContext,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expression_fuel: DEFAULT_FUEL,
            fail_on_diagnostics: false,
            render_timeout_secs: 30,
            runtime: RuntimeContext::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expression_fuel == 0 {
            return Err(anyhow!("expression_fuel must be > 0"));
        }
        if self.render_timeout_secs == 0 {
            return Err(anyhow!("render_timeout_secs must be > 0"));
        }
        if self.runtime.cores == 0 {
            return Err(anyhow!("runtime.cores must be > 0"));
        }
        if self.runtime.ram_mb == 0 {
            return Err(anyhow!("runtime.ram_mb must be > 0"));
        }
        if self.runtime.outdir.trim().is_empty() || self.runtime.tmpdir.trim().is_empty() {
            return Err(anyhow!("runtime.outdir and runtime.tmpdir must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

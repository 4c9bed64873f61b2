//! Guard configuration: compiled-in defaults, optional `vard.yaml` at the
//! repo root, environment overrides on top. Resolved fresh per invocation;
//! nothing is cached across hook runs.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Override signal that lets an operator delete an orphan directory
/// (present on disk, absent from the worktree listing).
pub const ENV_ORPHAN_OK: &str = "VARD_ORPHAN_OK";

/// Session id override, consulted before the hook envelope's session field.
pub const ENV_SESSION_ID: &str = "VARD_SESSION_ID";

/// Enables the debug file log in the temp dir.
pub const ENV_DEBUG: &str = "VARD_DEBUG";

const ENV_STALE_SECS: &str = "VARD_STALE_SECS";
const ENV_GIT_TIMEOUT_SECS: &str = "VARD_GIT_TIMEOUT_SECS";
const ENV_GH_TIMEOUT_SECS: &str = "VARD_GH_TIMEOUT_SECS";

/// Resolved guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory under the repo root that holds agent worktrees.
    pub worktrees_dir: String,
    /// Session markers older than this are treated as absent.
    pub marker_stale_secs: u64,
    /// Per-call timeout for git subprocesses.
    pub git_timeout_secs: u64,
    /// Per-call timeout for gh subprocesses.
    pub gh_timeout_secs: u64,
    /// Glob patterns for paths that may never be a removal target.
    pub protected: Vec<String>,
    /// Script basenames recognized as CI monitors (always read-only).
    pub monitor_scripts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worktrees_dir: crate::types::WORKTREES_DIR.to_string(),
            marker_stale_secs: 30 * 60,
            git_timeout_secs: 10,
            gh_timeout_secs: 30,
            protected: Vec::new(),
            monitor_scripts: vec!["monitor-ci.sh".to_string()],
        }
    }
}

impl Config {
    /// Load config for a repo: `vard.yaml` at the root if present, else
    /// defaults. Environment overrides are applied last. Unreadable or
    /// invalid files fall back to defaults rather than failing the hook.
    pub fn load(repo_root: &Path) -> Config {
        let mut cfg = read_yaml(&repo_root.join("vard.yaml")).unwrap_or_default();
        cfg.apply_env();
        cfg
    }

    /// Parse a config from YAML text (exposed for tests and `vard doctor`).
    pub fn parse(yaml: &str) -> anyhow::Result<Config> {
        serde_yaml::from_str(yaml).context("invalid vard.yaml syntax")
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64(ENV_STALE_SECS) {
            self.marker_stale_secs = v;
        }
        if let Some(v) = env_u64(ENV_GIT_TIMEOUT_SECS) {
            self.git_timeout_secs = v;
        }
        if let Some(v) = env_u64(ENV_GH_TIMEOUT_SECS) {
            self.gh_timeout_secs = v;
        }
    }
}

fn read_yaml(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    Config::parse(&content).ok()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// True when the orphan-deletion override signal is set.
pub fn orphan_override() -> bool {
    matches!(
        std::env::var(ENV_ORPHAN_OK).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// True when debug file logging is enabled.
pub fn debug_enabled() -> bool {
    std::env::var_os(ENV_DEBUG).is_some()
}

use std::path::PathBuf;
use vard_core::config::Config;
use vard_worktree::{GitRegistry, WorktreeRegistry};

fn repo_root() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    GitRegistry::discover(&cwd, Config::default().git_timeout_secs)
        .map(|r| r.repo_root())
        .ok_or_else(|| anyhow::anyhow!("not inside a git repository"))
}

/// `vard install`
pub fn install() -> anyhow::Result<()> {
    vard_bridge_claude::install(&repo_root()?)
}

/// `vard uninstall`
pub fn uninstall() -> anyhow::Result<()> {
    vard_bridge_claude::uninstall(&repo_root()?)
}

/// `vard doctor`. Also useful outside a repository, where only the
/// global checks apply.
pub fn doctor() -> anyhow::Result<()> {
    let root = repo_root().or_else(|_| std::env::current_dir())?;
    vard_bridge_claude::doctor(&root)
}

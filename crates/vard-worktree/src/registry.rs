//! The two collaborator interfaces the guard reads.
//!
//! Session ownership and lock state live outside this process: in git's
//! worktree metadata, in marker files, and on the code host. Every
//! evaluation reads them fresh through these traits; nothing is cached
//! between hook invocations, and tests inject fakes.

use crate::marker::SessionMarker;
use crate::proc::SubprocessError;
use std::path::{Path, PathBuf};

/// One registered worktree as reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    /// Checked-out branch; None when detached.
    pub branch: Option<String>,
    pub locked: bool,
    /// Registered but gone from disk (listing says it can be pruned).
    pub prunable: bool,
    /// The primary working copy; never a valid deletion target.
    pub main: bool,
}

/// Snapshot of a worktree's local state for the dirty-check rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeState {
    /// Leading `git status --porcelain` lines (capped preview).
    pub dirty_lines: Vec<String>,
    pub stash_count: usize,
    /// Unix epoch of the newest commit, if any.
    pub last_commit_epoch: Option<u64>,
}

impl TreeState {
    pub fn is_dirty(&self) -> bool {
        !self.dirty_lines.is_empty()
    }
}

/// VCS-side queries and the one mutation the safe executor performs
/// against it (worktree removal).
pub trait WorktreeRegistry {
    /// All registered worktrees, main worktree first.
    fn worktrees(&self) -> Result<Vec<Worktree>, SubprocessError>;

    /// Dirty files, stash entries, and newest-commit time for a worktree.
    fn tree_state(&self, path: &Path) -> Result<TreeState, SubprocessError>;

    /// Currently checked-out branch of the directory ("HEAD" when detached).
    fn current_branch(&self, path: &Path) -> Result<String, SubprocessError>;

    /// Session marker inside a worktree. `Ok(None)` means verifiably
    /// absent, missing, or aged out; `Err` means the file exists but could
    /// not be read, which callers must treat per their failure policy.
    fn session_marker(&self, path: &Path) -> std::io::Result<Option<SessionMarker>>;

    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), SubprocessError>;

    /// Root of the primary working copy.
    fn repo_root(&self) -> PathBuf;
}

/// Code-host queries plus execution of a rewritten merge.
pub trait PrRemote {
    /// Head branch of a PR number; `Ok(None)` when the host answers that
    /// no such PR exists.
    fn pr_branch(&self, number: u64) -> Result<Option<String>, SubprocessError>;

    /// Whether the PR identified by `selector` (number, branch, or URL)
    /// has reached the merged state. A state query, not an exit code.
    fn pr_merged(&self, selector: &str) -> Result<bool, SubprocessError>;

    /// Run a rewritten merge command in `cwd`. `Ok((false, msg))` is a
    /// real refusal from the host; `Err` means the outcome is unknown.
    fn run_merge(&self, argv: &[String], cwd: &Path)
        -> Result<(bool, String), SubprocessError>;
}

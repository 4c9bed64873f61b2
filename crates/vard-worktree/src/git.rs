//! git-backed worktree registry.
//!
//! Every query shells out to git with a bounded timeout; nothing is cached
//! between calls. The porcelain worktree listing is the single source of
//! truth for registration and lock state.

use crate::marker::{self, SessionMarker};
use crate::proc::{run, SubprocessError};
use crate::registry::{TreeState, Worktree, WorktreeRegistry};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DIRTY_PREVIEW_LINES: usize = 5;

pub struct GitRegistry {
    repo_root: PathBuf,
    timeout: Duration,
}

impl GitRegistry {
    /// Locate the repository containing `dir`. Returns None when git is
    /// absent, times out, or the directory is outside any work tree.
    pub fn discover(dir: &Path, timeout_secs: u64) -> Option<GitRegistry> {
        let timeout = Duration::from_secs(timeout_secs);
        let dir_s = dir.to_string_lossy();
        let out = run(
            "git",
            &["-C", dir_s.as_ref(), "rev-parse", "--show-toplevel"],
            None,
            timeout,
        )
        .ok()?;
        let root = PathBuf::from(out.trim());
        if root.as_os_str().is_empty() {
            return None;
        }
        Some(GitRegistry { repo_root: root, timeout })
    }

    /// Registry for an already-known repo root, skipping discovery.
    pub fn at(repo_root: PathBuf, timeout_secs: u64) -> GitRegistry {
        GitRegistry {
            repo_root,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<String, SubprocessError> {
        let dir_s = dir.to_string_lossy();
        let mut full: Vec<&str> = vec!["-C", dir_s.as_ref()];
        full.extend_from_slice(args);
        run("git", &full, None, self.timeout)
    }
}

impl WorktreeRegistry for GitRegistry {
    fn worktrees(&self) -> Result<Vec<Worktree>, SubprocessError> {
        let out = self.git(&self.repo_root, &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&out))
    }

    fn tree_state(&self, path: &Path) -> Result<TreeState, SubprocessError> {
        let status = self.git(path, &["status", "--porcelain"])?;
        let dirty_lines: Vec<String> = status
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(DIRTY_PREVIEW_LINES)
            .map(str::to_string)
            .collect();

        let stash = self.git(path, &["stash", "list"])?;
        let stash_count = stash.lines().filter(|l| !l.trim().is_empty()).count();

        // Fails on a branch with no commits yet; that is a real "none".
        let last_commit_epoch = match self.git(path, &["log", "-1", "--format=%ct"]) {
            Ok(out) => out.trim().parse::<u64>().ok(),
            Err(SubprocessError::Failed { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(TreeState {
            dirty_lines,
            stash_count,
            last_commit_epoch,
        })
    }

    fn current_branch(&self, path: &Path) -> Result<String, SubprocessError> {
        let out = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn session_marker(&self, path: &Path) -> std::io::Result<Option<SessionMarker>> {
        marker::read(path)
    }

    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), SubprocessError> {
        let path_s = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_s.as_ref());
        self.git(&self.repo_root, &args).map(|_| ())
    }

    fn repo_root(&self) -> PathBuf {
        self.repo_root.clone()
    }
}

/// Parse `git worktree list --porcelain` output. Blocks are separated by
/// blank lines; the main worktree comes first.
fn parse_worktree_porcelain(out: &str) -> Vec<Worktree> {
    let mut result: Vec<Worktree> = Vec::new();
    let mut cur: Option<Worktree> = None;

    for line in out.lines() {
        if line.is_empty() {
            if let Some(w) = cur.take() {
                result.push(w);
            }
            continue;
        }
        if let Some(p) = line.strip_prefix("worktree ") {
            if let Some(w) = cur.take() {
                result.push(w);
            }
            cur = Some(Worktree {
                path: PathBuf::from(p),
                branch: None,
                locked: false,
                prunable: false,
                main: result.is_empty(),
            });
            continue;
        }
        let Some(w) = cur.as_mut() else { continue };
        if let Some(b) = line.strip_prefix("branch ") {
            w.branch = Some(b.strip_prefix("refs/heads/").unwrap_or(b).to_string());
        } else if line == "locked" || line.starts_with("locked ") {
            w.locked = true;
        } else if line == "prunable" || line.starts_with("prunable ") {
            w.prunable = true;
        }
        // "HEAD <sha>", "detached", "bare" need no handling here.
    }
    if let Some(w) = cur.take() {
        result.push(w);
    }
    result
}

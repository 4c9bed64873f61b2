//! Safe execution of a rewritten merge.
//!
//! The plan's merge runs without its branch-deleting flag; the branch and
//! worktree are cleaned up only after the host confirms the merged state
//! with a query, never from the merge command's exit code. Cleanup that
//! cannot be proven safe is skipped and reported, not forced.

use crate::rules::{is_inside, same_path};
use crate::MergePlan;
use std::path::Path;
use vard_worktree::{PrRemote, WorktreeRegistry};

#[derive(Debug)]
pub struct ExecOutcome {
    /// True when the merge itself went through (cleanup state is in the
    /// message; a skipped cleanup is still a success).
    pub success: bool,
    pub message: String,
}

pub fn execute_safely(
    plan: &MergePlan,
    registry: &dyn WorktreeRegistry,
    remote: &dyn PrRemote,
    effective_dir: &Path,
) -> ExecOutcome {
    let (ok, output) = match remote.run_merge(&plan.argv, &plan.cwd) {
        Ok(pair) => pair,
        Err(e) => {
            return ExecOutcome {
                success: false,
                message: format!(
                    "merge outcome unknown ({e}); branch {} left untouched",
                    plan.branch
                ),
            };
        }
    };
    if !ok {
        return ExecOutcome {
            success: false,
            message: format!("merge refused: {}", output.trim()),
        };
    }

    let mut message = format!("ran `{}` in {}", plan.rendered, plan.cwd.display());

    // Exit codes lie under flaky networks; only the host's own answer
    // counts as confirmation.
    let confirmed = matches!(remote.pr_merged(&plan.selector), Ok(true));
    if !confirmed {
        message.push_str("; merged state not confirmed yet, worktree left in place");
        return ExecOutcome {
            success: true,
            message,
        };
    }
    message.push_str("; merge confirmed");

    let Some(worktree) = plan.worktree.as_deref() else {
        return ExecOutcome {
            success: true,
            message,
        };
    };
    if is_inside(effective_dir, worktree) {
        message.push_str("; still inside the worktree, skipping its removal");
        return ExecOutcome {
            success: true,
            message,
        };
    }
    // An unknown listing counts as locked.
    let locked = registry
        .worktrees()
        .map(|ws| ws.iter().any(|w| same_path(&w.path, worktree) && w.locked))
        .unwrap_or(true);
    if locked {
        message.push_str("; worktree locked or lock state unknown, not removed");
        return ExecOutcome {
            success: true,
            message,
        };
    }
    match registry.remove_worktree(worktree, false) {
        Ok(()) => {
            message.push_str(&format!("; removed worktree {}", worktree.display()));
        }
        Err(e) => {
            message.push_str(&format!(
                "; worktree removal failed ({e}), remove it manually"
            ));
        }
    }
    ExecOutcome {
        success: true,
        message,
    }
}

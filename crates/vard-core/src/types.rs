use serde::{Deserialize, Serialize};

/// Session identifier as reported by the host agent (opaque string).
pub type SessionId = String;

/// Relative filename of the per-worktree session ownership marker.
pub const SESSION_MARKER_FILE: &str = ".vard-session";

/// Default directory (under the repo root) that holds agent worktrees.
pub const WORKTREES_DIR: &str = ".worktrees";

/// Verdict severity for one evaluated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approve,
    Block,
    Warn,
}

/// The approve/block/warn verdict returned for one proposed command.
///
/// Exactly one decision is emitted per evaluation. `block` short-circuits
/// before any mutating action; `warn` allows the action with an advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardDecision {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stable identifier of the rule that produced a non-approve outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl GuardDecision {
    pub fn approve() -> Self {
        GuardDecision {
            outcome: Outcome::Approve,
            message: None,
            rule: None,
        }
    }

    pub fn block(rule: &str, message: impl Into<String>) -> Self {
        GuardDecision {
            outcome: Outcome::Block,
            message: Some(message.into()),
            rule: Some(rule.to_string()),
        }
    }

    pub fn warn(rule: &str, message: impl Into<String>) -> Self {
        GuardDecision {
            outcome: Outcome::Warn,
            message: Some(message.into()),
            rule: Some(rule.to_string()),
        }
    }

    pub fn is_block(&self) -> bool {
        self.outcome == Outcome::Block
    }
}

/// Well-known rule identifiers (recorded in decisions and tested by name).
pub mod rule {
    pub const CWD_INSIDE_TARGET: &str = "cwd_inside_target";
    pub const LOCKED_FOREIGN: &str = "locked_foreign_worktree";
    pub const ORPHAN_DIR: &str = "orphan_directory";
    pub const LIVE_FOREIGN_SESSION: &str = "live_foreign_session";
    pub const DIRTY_STATE: &str = "dirty_worktree_state";
    pub const PROTECTED_PATH: &str = "protected_path";
    pub const PR_LOCKED_BRANCH: &str = "pr_locked_branch";
    pub const SELF_BRANCH_DELETE: &str = "self_branch_delete";
    pub const MAIN_WORKTREE: &str = "main_worktree_target";
}

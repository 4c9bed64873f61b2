//! Claude Code hook bridge.
//!
//! Receives the host's PreToolUse payload on stdin, runs the guard against
//! the proposed Bash command, and answers with the hook's
//! `permissionDecision` JSON. Also owns the settings install/uninstall and
//! the append-only decision ledger.

pub mod admin;
pub mod dispatch;
pub mod ledger;
mod parse;

pub use admin::{doctor, install, uninstall};
pub use dispatch::{evaluate_command, fallback_allow_json, hook_entrypoint_from_stdin, HookResult};
pub use ledger::{append_decision, read_recent, DecisionRecord};

//! Hook dispatch.
//!
//! Only `PreToolUse` for the `Bash` tool is evaluated; every other event
//! or tool passes through silently. The answer is the host's
//! `hookSpecificOutput.permissionDecision` JSON on stdout; a block is
//! additionally signaled through a distinguished exit code by the CLI
//! layer.

use crate::ledger::{self, DecisionRecord};
use crate::parse::{get_obj, get_str, parse_hook_stdin};
use std::path::{Path, PathBuf};
use vard_core::config::{Config, ENV_SESSION_ID};
use vard_core::{store, Outcome};
use vard_guard::{execute_safely, Evaluation, Guard};
use vard_worktree::{marker, GhRemote, GitRegistry, WorktreeRegistry};

/// Result from a hook dispatch.
///
/// - `stdout`: decision JSON to print (consumed by the host)
/// - `stderr`: advisory text shown to the user
/// - `block`: signal the distinguished blocking exit code
#[derive(Debug, Default, Clone)]
pub struct HookResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub block: bool,
}

impl HookResult {
    pub fn empty() -> Self {
        Self::default()
    }

    fn allow(reason: &str) -> Self {
        HookResult {
            stdout: Some(permission_json("allow", reason)),
            stderr: None,
            block: false,
        }
    }

    fn deny(reason: &str, block: bool) -> Self {
        HookResult {
            stdout: Some(permission_json("deny", reason)),
            stderr: Some(reason.to_string()),
            block,
        }
    }
}

fn permission_json(decision: &str, reason: &str) -> String {
    serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": decision,
            "permissionDecisionReason": reason,
        }
    })
    .to_string()
}

/// Decision printed when the hook itself fails: the host must always
/// receive a well-formed answer, and internal errors resolve to approve.
pub fn fallback_allow_json() -> String {
    permission_json("allow", "internal error, approved by fallback policy")
}

/// Main hook entrypoint: parse stdin, evaluate if it is a Bash command.
/// Errors bubble up to the CLI layer, which degrades them to approve.
pub fn hook_entrypoint_from_stdin(stdin: &str) -> anyhow::Result<HookResult> {
    if stdin.trim().is_empty() {
        return Ok(HookResult::empty());
    }
    let raw = parse_hook_stdin(stdin)?;

    if get_str(&raw, "hook_event_name") != "PreToolUse" {
        return Ok(HookResult::empty());
    }
    if get_str(&raw, "tool_name") != "Bash" {
        return Ok(HookResult::empty());
    }
    let command = get_obj(&raw, "tool_input")
        .map(|t| get_str(t, "command"))
        .unwrap_or_default();
    if command.trim().is_empty() {
        return Ok(HookResult::empty());
    }

    let cwd = get_str(&raw, "cwd");
    let cwd_path = (!cwd.is_empty()).then(|| PathBuf::from(&cwd));
    // Env override beats the envelope's field, matching the config layer.
    let session_id = std::env::var(ENV_SESSION_ID)
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| Some(get_str(&raw, "session_id")).filter(|s| !s.is_empty()));

    Ok(evaluate_command(&command, cwd_path.as_deref(), session_id))
}

/// Evaluate one Bash command in context. Shared by the hook path and
/// `vard check`.
pub fn evaluate_command(
    command: &str,
    cwd: Option<&Path>,
    session_id: Option<String>,
) -> HookResult {
    let probe = cwd
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // Discovery runs before the repo config is readable; the configured
    // timeout applies to everything after.
    let Some(bootstrap) = GitRegistry::discover(&probe, Config::default().git_timeout_secs)
    else {
        return HookResult::allow("not inside a git repository");
    };
    let repo_root = bootstrap.repo_root();
    let config = Config::load(&repo_root);
    let registry = GitRegistry::at(repo_root.clone(), config.git_timeout_secs);
    let remote = GhRemote::new(&repo_root, config.gh_timeout_secs);

    let guard = Guard {
        registry: &registry,
        remote: Some(&remote),
        config: &config,
        session_id: session_id.clone(),
    };
    let effective = vard_shell::resolve_effective_dir(Some(command), cwd);
    let evaluation = guard.evaluate(command, cwd);

    refresh_own_marker(&registry, &config, session_id.as_deref(), &effective);

    let session = session_id.as_deref().unwrap_or("");
    let cwd_s = effective.to_string_lossy().into_owned();
    let project_id = store::project_id(&repo_root);

    let result = match evaluation {
        Evaluation::Decision(d) => {
            record(
                &project_id,
                command,
                session,
                &cwd_s,
                d.outcome,
                d.rule.clone(),
                d.message.clone(),
            );
            match d.outcome {
                Outcome::Approve => HookResult::allow("no guarded operation detected"),
                Outcome::Warn => {
                    HookResult::allow(d.message.as_deref().unwrap_or("proceed with caution"))
                }
                Outcome::Block => {
                    HookResult::deny(d.message.as_deref().unwrap_or("blocked"), true)
                }
            }
        }
        Evaluation::Rewrite(plan) => {
            let exec = execute_safely(&plan, &registry, &remote, &effective);
            let outcome = if exec.success { Outcome::Warn } else { Outcome::Block };
            record(
                &project_id,
                command,
                session,
                &cwd_s,
                outcome,
                Some(vard_core::rule::SELF_BRANCH_DELETE.to_string()),
                Some(exec.message.clone()),
            );
            if exec.success {
                // The safe form already ran; the original must not.
                HookResult::deny(
                    &format!("already handled safely, do not re-run: {}", exec.message),
                    false,
                )
            } else {
                HookResult::deny(&exec.message, true)
            }
        }
    };
    result
}

fn record(
    project_id: &str,
    command: &str,
    session: &str,
    cwd: &str,
    outcome: Outcome,
    rule: Option<String>,
    message: Option<String>,
) {
    let rec = DecisionRecord::new(command, session, cwd, outcome, rule, message);
    // Bookkeeping never fails the hook.
    let _ = ledger::append_decision(project_id, &rec);
}

/// Heartbeat: refresh this session's marker in the worktree it works in.
/// A live marker from another session is never overwritten.
fn refresh_own_marker(
    registry: &GitRegistry,
    config: &Config,
    session_id: Option<&str>,
    dir: &Path,
) {
    let Some(sid) = session_id else {
        return;
    };
    let Ok(worktrees) = registry.worktrees() else {
        return;
    };
    let Some(wt) = worktrees.iter().find(|w| !w.main && dir.starts_with(&w.path)) else {
        return;
    };
    match registry.session_marker(&wt.path) {
        Ok(Some(m)) if m.is_live(config.marker_stale_secs) && m.is_foreign(Some(sid)) => {}
        Err(_) => {}
        _ => {
            let _ = marker::write(&wt.path, sid);
        }
    }
}

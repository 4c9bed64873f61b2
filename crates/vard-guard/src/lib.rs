//! Concurrency guard for worktree-mutating commands.
//!
//! Combines the classifier's view of a command with fresh registry state
//! and produces one decision per evaluation. The guard is an ordered list
//! of rules with a fixed priority; the first non-approve result wins, and
//! a self-branch-deleting merge that stands alone is not blocked but
//! handed to the safe executor as a rewrite plan.

mod policy;
mod pr;
mod rules;
mod safe_exec;
#[cfg(test)]
pub(crate) mod testutil;

pub use policy::OnUnknown;
pub use safe_exec::{execute_safely, ExecOutcome};

use std::path::{Path, PathBuf};
use vard_command::classify_all_with;
use vard_core::config::Config;
use vard_core::GuardDecision;
use vard_shell::resolve_effective_dir;
use vard_worktree::{PrRemote, WorktreeRegistry};

pub struct Guard<'a> {
    pub registry: &'a dyn WorktreeRegistry,
    /// Code-host lookups; None degrades every PR indirection to fail-open.
    pub remote: Option<&'a dyn PrRemote>,
    pub config: &'a Config,
    /// Session evaluating this command; markers matching it are self-owned.
    pub session_id: Option<String>,
}

/// Rewrite plan for a sole self-branch-deleting merge.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// The merge command with `--delete-branch`/`-d` stripped.
    pub argv: Vec<String>,
    /// `argv` re-serialized with quoting, for messages and the ledger.
    pub rendered: String,
    /// Directory the merge runs in (the segment's own effective dir).
    pub cwd: PathBuf,
    /// PR selector used to verify the merge actually landed.
    pub selector: String,
    /// Branch the stripped flag would have deleted.
    pub branch: String,
    /// Worktree checked out on that branch; cleanup candidate.
    pub worktree: Option<PathBuf>,
}

/// Result of evaluating one command.
#[derive(Debug)]
pub enum Evaluation {
    Decision(GuardDecision),
    /// Unsafe as written, but with a safe rewritten form: the caller runs
    /// the plan through [`execute_safely`] instead of the original.
    Rewrite(MergePlan),
}

impl Evaluation {
    pub fn decision(&self) -> Option<&GuardDecision> {
        match self {
            Evaluation::Decision(d) => Some(d),
            Evaluation::Rewrite(_) => None,
        }
    }
}

impl<'a> Guard<'a> {
    /// Evaluate one raw command string. Every operator-joined segment is
    /// checked; a chain is only as safe as its most dangerous member.
    pub fn evaluate(&self, command: &str, cwd_hint: Option<&Path>) -> Evaluation {
        let parsed = classify_all_with(command, &self.config.monitor_scripts);
        let effective = resolve_effective_dir(Some(command), cwd_hint);

        // A warn from the removal rules is advisory: later rules still get
        // their say, and any block wins over it.
        let mut advisory: Option<GuardDecision> = None;
        if let Some(d) = rules::check_removals(self, command, &parsed, cwd_hint, &effective) {
            if d.is_block() {
                return Evaluation::Decision(d);
            }
            advisory = Some(d);
        }
        if let Some(d) = pr::check_pr_mutations(self, command, &parsed, cwd_hint, &effective) {
            return Evaluation::Decision(d);
        }
        match pr::check_self_branch_delete(self, command, &parsed, cwd_hint) {
            pr::SelfDelete::Clear => {}
            pr::SelfDelete::Block(d) => return Evaluation::Decision(d),
            pr::SelfDelete::Rewrite(plan) => return Evaluation::Rewrite(plan),
        }
        Evaluation::Decision(advisory.unwrap_or_else(GuardDecision::approve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Fixture, FakeRegistry, FakeRemote};
    use vard_core::types::rule;
    use vard_core::Outcome;
    use vard_worktree::SessionMarker;

    fn cfg() -> Config {
        Config::default()
    }

    fn guard<'a>(
        reg: &'a FakeRegistry,
        remote: Option<&'a FakeRemote>,
        config: &'a Config,
    ) -> Guard<'a> {
        Guard {
            registry: reg,
            remote: remote.map(|r| r as &dyn PrRemote),
            config,
            session_id: Some("sess-self".to_string()),
        }
    }

    fn blocked_rule(eval: &Evaluation) -> Option<String> {
        match eval {
            Evaluation::Decision(d) if d.is_block() => d.rule.clone(),
            _ => None,
        }
    }

    #[test]
    fn plain_commands_are_approved() {
        let fx = Fixture::new();
        let reg = fx.registry();
        let config = cfg();
        let g = guard(&reg, None, &config);
        let eval = g.evaluate("cargo test --workspace", Some(&fx.root));
        assert!(matches!(eval, Evaluation::Decision(d) if !d.is_block()));
    }

    #[test]
    fn removing_the_directory_underfoot_blocks() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let reg = fx.registry();
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("rm -rf {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&wt));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::CWD_INSIDE_TARGET));
    }

    #[test]
    fn force_flag_never_bypasses_the_self_directory_rule() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let sub = wt.join("src");
        std::fs::create_dir_all(&sub).unwrap();
        let reg = fx.registry();
        let config = cfg();
        let g = guard(&reg, None, &config);

        // Evaluated from a subdirectory of the target, with force.
        let cmd = format!("git worktree remove --force {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&sub));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::CWD_INSIDE_TARGET));
    }

    #[test]
    fn chained_removal_is_still_caught() {
        // Regression against "check only segment 0".
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("echo starting && git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::LOCKED_FOREIGN));
    }

    #[test]
    fn locked_foreign_worktree_blocks() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::LOCKED_FOREIGN));
    }

    #[test]
    fn locked_but_self_owned_worktree_is_removable() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        reg.set_marker(
            &wt,
            SessionMarker {
                session_id: "sess-self".into(),
                age_secs: 10,
            },
        );
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn unlock_earlier_in_the_chain_clears_the_lock_rule() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!(
            "git worktree unlock {p} && git worktree remove {p}",
            p = wt.display()
        );
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn unlock_after_the_removal_does_not_help() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!(
            "git worktree remove {p} && git worktree unlock {p}",
            p = wt.display()
        );
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::LOCKED_FOREIGN));
    }

    #[test]
    fn orphan_directory_blocks_until_overridden() {
        // One test for both sides: the override env var is process-global,
        // so the cases must not run concurrently.
        let fx = Fixture::new();
        let stray = fx.add_worktree_dir("stray");
        let reg = fx.registry();
        let config = cfg();
        let g = guard(&reg, None, &config);
        let cmd = format!("rm -rf {}", stray.display());

        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::ORPHAN_DIR));

        std::env::set_var(vard_core::config::ENV_ORPHAN_OK, "1");
        let eval = g.evaluate(&cmd, Some(&fx.root));
        std::env::remove_var(vard_core::config::ENV_ORPHAN_OK);
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn live_foreign_marker_blocks_even_with_force() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_marker(
            &wt,
            SessionMarker {
                session_id: "sess-other".into(),
                age_secs: 29 * 60,
            },
        );
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("rm -rf {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(
            blocked_rule(&eval).as_deref(),
            Some(rule::LIVE_FOREIGN_SESSION)
        );
    }

    #[test]
    fn stale_foreign_marker_does_not_block() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_marker(
            &wt,
            SessionMarker {
                session_id: "sess-other".into(),
                age_secs: 31 * 60,
            },
        );
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn unreadable_marker_fails_closed() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_marker_unreadable(&wt);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(
            blocked_rule(&eval).as_deref(),
            Some(rule::LIVE_FOREIGN_SESSION)
        );
    }

    #[test]
    fn dirty_worktree_blocks_without_force_and_passes_with_it() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_dirty(&wt, &[" M src/lib.rs"]);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::DIRTY_STATE));

        let cmd = format!("git worktree remove --force {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn forced_removal_of_dirty_worktree_warns() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_dirty(&wt, &[" M src/lib.rs"]);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove --force {}", wt.display());
        match g.evaluate(&cmd, Some(&fx.root)) {
            Evaluation::Decision(d) => {
                assert_eq!(d.outcome, Outcome::Warn);
                assert_eq!(d.rule.as_deref(), Some(rule::DIRTY_STATE));
            }
            other => panic!("expected a warn decision, got {other:?}"),
        }
    }

    #[test]
    fn recent_commit_counts_as_dirty_state() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-4");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-4", false);
        reg.set_last_commit_secs_ago(&wt, 120);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::DIRTY_STATE));
    }

    #[test]
    fn main_worktree_is_never_a_deletion_target() {
        let fx = Fixture::new();
        let reg = fx.registry();
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!("git worktree remove --force {}", fx.root.display());
        let eval = g.evaluate(&cmd, Some(&fx.elsewhere()));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::MAIN_WORKTREE));
    }

    #[test]
    fn protected_glob_blocks_any_rm() {
        let fx = Fixture::new();
        let keep = fx.root.join("docs");
        std::fs::create_dir_all(&keep).unwrap();
        let reg = fx.registry();
        let mut config = cfg();
        config.protected = vec!["docs".to_string(), "docs/**".to_string()];
        let g = guard(&reg, None, &config);

        let cmd = format!("rm -rf {}", keep.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::PROTECTED_PATH));
    }

    #[test]
    fn listing_failure_fails_open_but_keeps_local_rules() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        reg.fail_listing = true;
        let config = cfg();
        let g = guard(&reg, None, &config);

        // Lock state is unknowable: the removal passes (fail open).
        let cmd = format!("git worktree remove {}", wt.display());
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());

        // The purely local self-directory rule still fires.
        let eval = g.evaluate(&cmd, Some(&wt));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::CWD_INSIDE_TARGET));
    }

    #[test]
    fn relative_target_resolves_against_segment_cd() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!(
            "cd {} && git worktree remove issue-9",
            fx.wt_root.display()
        );
        let eval = g.evaluate(&cmd, Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::LOCKED_FOREIGN));
    }

    #[test]
    fn git_c_base_directory_is_honored() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let config = cfg();
        let g = guard(&reg, None, &config);

        let cmd = format!(
            "git -C {} worktree remove .worktrees/issue-9",
            fx.root.display()
        );
        let eval = g.evaluate(&cmd, Some(&fx.elsewhere()));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::LOCKED_FOREIGN));
    }

    // ── PR indirection ──

    #[test]
    fn merge_aimed_at_a_locked_foreign_branch_blocks() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(42, "issue-9".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge 42", Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::PR_LOCKED_BRANCH));
    }

    #[test]
    fn merge_from_inside_the_locked_worktree_is_not_foreign() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        reg.set_branch(&wt, "issue-9");
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(42, "issue-9".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge 42", Some(&wt));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn read_only_pr_commands_are_always_approved() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(42, "issue-9".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        for cmd in ["gh pr view 42", "gh pr checks 42", "gh pr diff 42"] {
            let eval = g.evaluate(cmd, Some(&fx.root));
            assert!(blocked_rule(&eval).is_none(), "{cmd} should pass");
        }
    }

    #[test]
    fn pr_lookup_failure_fails_open() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let remote = FakeRemote {
            fail_lookup: true,
            ..FakeRemote::default()
        };
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge 42", Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
    }

    #[test]
    fn pr_checkout_of_locked_branch_blocks_too() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", true);
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(31, "issue-9".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr checkout 31", Some(&fx.root));
        assert_eq!(blocked_rule(&eval).as_deref(), Some(rule::PR_LOCKED_BRANCH));
    }

    // ── Self-branch deletion ──

    #[test]
    fn sole_self_deleting_merge_becomes_a_rewrite_plan() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", false);
        reg.set_branch(&wt, "issue-9");
        let remote = FakeRemote::default();
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge --squash --delete-branch", Some(&wt));
        match eval {
            Evaluation::Rewrite(plan) => {
                assert_eq!(plan.argv, vec!["gh", "pr", "merge", "--squash"]);
                assert_eq!(plan.branch, "issue-9");
                assert_eq!(plan.selector, "issue-9");
                assert_eq!(plan.worktree.as_deref(), Some(wt.as_path()));
            }
            other => panic!("expected rewrite, got {other:?}"),
        }
    }

    #[test]
    fn env_prefixed_merge_rewrite_spawns_the_real_program() {
        // The plan is spawned without a shell, so its first word must be
        // the gh binary, not a leading VAR=value assignment.
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", false);
        reg.set_branch(&wt, "issue-9");
        let remote = FakeRemote::default();
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate(
            "GIT_EDITOR=true gh pr merge --squash --delete-branch",
            Some(&wt),
        );
        match eval {
            Evaluation::Rewrite(plan) => {
                assert_eq!(plan.argv, vec!["gh", "pr", "merge", "--squash"]);
            }
            other => panic!("expected rewrite, got {other:?}"),
        }
    }

    #[test]
    fn chained_self_deleting_merge_blocks() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", false);
        reg.set_branch(&wt, "issue-9");
        let remote = FakeRemote::default();
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge --delete-branch && echo done", Some(&wt));
        assert_eq!(
            blocked_rule(&eval).as_deref(),
            Some(rule::SELF_BRANCH_DELETE)
        );
    }

    #[test]
    fn merge_deleting_a_different_branch_passes() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", false);
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(7, "other-branch".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        // Evaluated from the repo root (branch "main"), deleting PR 7's branch.
        let eval = g.evaluate("gh pr merge 7 --delete-branch", Some(&fx.root));
        assert!(blocked_rule(&eval).is_none());
        assert!(matches!(eval, Evaluation::Decision(_)));
    }

    #[test]
    fn explicit_pr_number_matching_own_branch_is_rewritten() {
        let fx = Fixture::new();
        let wt = fx.add_worktree_dir("issue-9");
        let mut reg = fx.registry();
        reg.add_worktree(&wt, "issue-9", false);
        reg.set_branch(&wt, "issue-9");
        let mut remote = FakeRemote::default();
        remote.pr_branches.insert(42, "issue-9".to_string());
        let config = cfg();
        let g = guard(&reg, Some(&remote), &config);

        let eval = g.evaluate("gh pr merge 42 -d", Some(&wt));
        match eval {
            Evaluation::Rewrite(plan) => {
                assert_eq!(plan.argv, vec!["gh", "pr", "merge", "42"]);
                assert_eq!(plan.selector, "42");
            }
            other => panic!("expected rewrite, got {other:?}"),
        }
    }
}

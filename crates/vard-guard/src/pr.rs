//! PR indirection rules.
//!
//! A merge or checkout can reach a protected worktree without naming any
//! path: the branch behind the PR is the real target. These checks resolve
//! that branch through the code host and apply the same ownership rules as
//! direct removals. Lookups that fail resolve open; the host re-validates
//! everything at merge time.

use crate::rules::{is_inside, segment_dir};
use crate::{policy, Guard, MergePlan, OnUnknown};
use std::path::Path;
use vard_command::{strip_delete_branch, CommandKind, ParsedCommand, PrTarget};
use vard_core::types::rule;
use vard_core::GuardDecision;
use vard_shell::quote;
use vard_worktree::Worktree;

pub(crate) enum SelfDelete {
    Clear,
    Block(GuardDecision),
    Rewrite(MergePlan),
}

/// Block mutating `gh pr` subcommands aimed at the branch of a locked
/// worktree owned by someone else. Read-only subcommands never enter here.
pub(crate) fn check_pr_mutations(
    guard: &Guard,
    command: &str,
    parsed: &[ParsedCommand],
    cwd_hint: Option<&Path>,
    _effective: &Path,
) -> Option<GuardDecision> {
    let mut listing: Option<Option<Vec<Worktree>>> = None;

    for (i, seg) in parsed.iter().enumerate() {
        let Some(inv) = seg.pr_invocation() else {
            continue;
        };
        if !inv.is_mutating() {
            continue;
        }
        let seg_dir = segment_dir(command, cwd_hint, i, seg.base_directory.as_deref());
        let Some(branch) = resolve_target_branch(guard, &inv.target, &seg_dir) else {
            continue;
        };
        let entries = listing.get_or_insert_with(|| guard.registry.worktrees().ok());
        let Some(entries) = entries.as_deref() else {
            continue;
        };
        let Some(entry) = entries
            .iter()
            .find(|w| !w.main && w.branch.as_deref() == Some(branch.as_str()))
        else {
            continue;
        };
        if !entry.locked {
            continue;
        }
        // Working inside the worktree (or holding its marker) makes the
        // branch your own; anything else is a foreign mutation.
        if is_inside(&seg_dir, &entry.path) || marker_owned(guard, &entry.path) {
            continue;
        }
        return Some(GuardDecision::block(
            rule::PR_LOCKED_BRANCH,
            format!(
                "gh pr {} targets branch {branch}, which is checked out in a \
                 locked worktree owned by another task",
                inv.subcommand
            ),
        ));
    }
    None
}

/// Detect a merge that would delete the branch the command itself is
/// standing on. Alone it becomes a rewrite plan; inside a chain it blocks,
/// because the follow-up commands would run in a deleted directory.
pub(crate) fn check_self_branch_delete(
    guard: &Guard,
    command: &str,
    parsed: &[ParsedCommand],
    cwd_hint: Option<&Path>,
) -> SelfDelete {
    for (i, seg) in parsed.iter().enumerate() {
        if seg.kind != CommandKind::PrMerge || !seg.has_delete_branch_flag {
            continue;
        }
        let seg_dir = segment_dir(command, cwd_hint, i, seg.base_directory.as_deref());
        let Ok(current) = guard.registry.current_branch(&seg_dir) else {
            continue;
        };
        if current == "HEAD" {
            continue;
        }
        let Some(target) = seg.pr_target() else {
            continue;
        };
        let deleted = match &target {
            PrTarget::CurrentBranch => current.clone(),
            PrTarget::Branch(b) => b.clone(),
            other => {
                let Some(b) = lookup_number(guard, other) else {
                    continue;
                };
                b
            }
        };
        if deleted != current {
            continue;
        }

        if parsed.len() > 1 {
            return SelfDelete::Block(GuardDecision::block(
                rule::SELF_BRANCH_DELETE,
                format!(
                    "this merge deletes branch {deleted} under the running \
                     command; run the merge on its own so the deletion can \
                     be sequenced after it",
                ),
            ));
        }

        // Spawned without a shell: wrapper prefixes and assignments would
        // sit in the program position and fail to exec.
        let argv = strip_delete_branch(seg.effective_words());
        let rendered = argv
            .iter()
            .map(|w| quote(w))
            .collect::<Vec<_>>()
            .join(" ");
        let selector = match &target {
            PrTarget::Number(n) => n.to_string(),
            PrTarget::Url(u) => u.clone(),
            PrTarget::Branch(b) => b.clone(),
            PrTarget::CurrentBranch => current.clone(),
        };
        let worktree = guard.registry.worktrees().ok().and_then(|ws| {
            ws.into_iter()
                .find(|w| !w.main && w.branch.as_deref() == Some(deleted.as_str()))
                .map(|w| w.path)
        });
        return SelfDelete::Rewrite(MergePlan {
            argv,
            rendered,
            cwd: seg_dir,
            selector,
            branch: deleted,
            worktree,
        });
    }
    SelfDelete::Clear
}

/// Branch a PR target points at, or None when it cannot be resolved.
/// Per the policy table an unknowable lookup resolves open (None).
fn resolve_target_branch(guard: &Guard, target: &PrTarget, seg_dir: &Path) -> Option<String> {
    match target {
        PrTarget::Branch(b) => Some(b.clone()),
        PrTarget::CurrentBranch => guard
            .registry
            .current_branch(seg_dir)
            .ok()
            .filter(|b| b != "HEAD"),
        other => lookup_number(guard, other),
    }
}

fn lookup_number(guard: &Guard, target: &PrTarget) -> Option<String> {
    let number = target.number()?;
    let remote = guard.remote?;
    match remote.pr_branch(number) {
        Ok(found) => found,
        Err(_) => {
            debug_assert_eq!(policy::PR_LOOKUP, OnUnknown::Approve);
            None
        }
    }
}

fn marker_owned(guard: &Guard, worktree: &Path) -> bool {
    matches!(
        guard.registry.session_marker(worktree),
        Ok(Some(m))
            if m.is_live(guard.config.marker_stale_secs)
                && !m.is_foreign(guard.session_id.as_deref())
    )
}

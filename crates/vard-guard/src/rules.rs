//! Ordered removal rules.
//!
//! Every segment that removes a directory is checked against the rules in
//! a fixed order; the first match decides. Force flags are consulted only
//! where a rule says so: the self-directory, main-worktree, and
//! live-session rules ignore them entirely.

use crate::{policy, Guard, OnUnknown};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use vard_command::{CommandKind, ParsedCommand};
use vard_core::config::{orphan_override, ENV_ORPHAN_OK};
use vard_core::types::rule;
use vard_core::GuardDecision;
use vard_shell::{absolutize, resolve_dir_at_segment};
use vard_worktree::Worktree;

/// A commit newer than this marks a worktree as recently active.
const RECENT_COMMIT_SECS: u64 = 3600;

/// One directory a segment would delete.
struct Removal {
    seg_index: usize,
    raw: String,
    target: PathBuf,
    force: bool,
}

/// Which session owns a worktree, as far as its marker can tell.
enum MarkerStatus {
    Absent,
    Owned,
    Foreign(String, u64),
    Unreadable,
}

/// Directory a single chain segment runs in: cd steps sequenced before it,
/// then the segment's own git `-C`/`--work-tree` base.
pub(crate) fn segment_dir(
    command: &str,
    cwd_hint: Option<&Path>,
    index: usize,
    base_directory: Option<&str>,
) -> PathBuf {
    let dir = resolve_dir_at_segment(command, cwd_hint, index);
    match base_directory {
        Some(base) => absolutize(&dir, base),
        None => dir,
    }
}

pub(crate) fn canon(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

pub(crate) fn same_path(a: &Path, b: &Path) -> bool {
    canon(a) == canon(b)
}

pub(crate) fn is_inside(child: &Path, ancestor: &Path) -> bool {
    canon(child).starts_with(canon(ancestor))
}

pub(crate) fn check_removals(
    guard: &Guard,
    command: &str,
    parsed: &[ParsedCommand],
    cwd_hint: Option<&Path>,
    effective: &Path,
) -> Option<GuardDecision> {
    let removals = gather_removals(command, parsed, cwd_hint);
    if removals.is_empty() {
        return None;
    }
    let unlocked_before = gather_unlocks(command, parsed, cwd_hint);

    let repo_root = canon(&guard.registry.repo_root());
    let wt_root = repo_root.join(&guard.config.worktrees_dir);

    // One listing per evaluation. A failed listing is "unknown": the rules
    // that need it are skipped per the fail-open row for registry listings.
    let listing: Option<Vec<Worktree>> = match guard.registry.worktrees() {
        Ok(ws) => Some(ws),
        Err(_) => match policy::REGISTRY_LISTING {
            OnUnknown::Approve => None,
            OnUnknown::Block => Some(Vec::new()),
        },
    };
    let protected = build_globset(&guard.config.protected);

    let mut advisory: Option<GuardDecision> = None;
    for removal in &removals {
        if let Some(d) = check_one(
            guard,
            removal,
            &unlocked_before,
            listing.as_deref(),
            &protected,
            &repo_root,
            &wt_root,
            effective,
        ) {
            if d.is_block() {
                return Some(d);
            }
            // Keep the first warning, but let every removal be checked for
            // a block first.
            advisory.get_or_insert(d);
        }
    }
    advisory
}

#[allow(clippy::too_many_arguments)]
fn check_one(
    guard: &Guard,
    removal: &Removal,
    unlocked_before: &[(usize, PathBuf)],
    listing: Option<&[Worktree]>,
    protected: &Option<GlobSet>,
    repo_root: &Path,
    wt_root: &Path,
    effective: &Path,
) -> Option<GuardDecision> {
    let target = &removal.target;

    // A shell whose working directory is deleted underneath it is broken
    // for every later command. No flag overrides this.
    if is_inside(effective, target) {
        return Some(GuardDecision::block(
            rule::CWD_INSIDE_TARGET,
            format!(
                "refusing to remove {}: the command would run from inside it; \
                 move out of the directory first",
                removal.raw
            ),
        ));
    }

    if same_path(target, repo_root) {
        return Some(GuardDecision::block(
            rule::MAIN_WORKTREE,
            format!(
                "{} is the main working copy and is never a removal target",
                removal.raw
            ),
        ));
    }

    let entry = listing.and_then(|ws| ws.iter().find(|w| !w.main && same_path(&w.path, target)));
    let in_scope = entry.is_some() || is_inside(target, wt_root);

    if in_scope {
        let marker = marker_status(guard, target);

        if let Some(entry) = entry {
            let unlocked = unlocked_before
                .iter()
                .any(|(i, p)| *i < removal.seg_index && same_path(p, target));
            if entry.locked && !unlocked && !matches!(marker, MarkerStatus::Owned) {
                return Some(GuardDecision::block(
                    rule::LOCKED_FOREIGN,
                    format!(
                        "{} is a locked worktree owned by another task; \
                         unlock it first if you are certain it is abandoned",
                        removal.raw
                    ),
                ));
            }
        } else if listing.is_some() && target.is_dir() && !orphan_override() {
            return Some(GuardDecision::block(
                rule::ORPHAN_DIR,
                format!(
                    "{} exists on disk but is not a registered worktree; \
                     set {ENV_ORPHAN_OK}=1 to delete an orphan directory",
                    removal.raw
                ),
            ));
        }

        match marker {
            MarkerStatus::Foreign(session, age) => {
                return Some(GuardDecision::block(
                    rule::LIVE_FOREIGN_SESSION,
                    format!(
                        "{} carries a live session marker from another agent \
                         ({session}, {age}s old); it is still working there",
                        removal.raw
                    ),
                ));
            }
            MarkerStatus::Unreadable => {
                return Some(GuardDecision::block(
                    rule::LIVE_FOREIGN_SESSION,
                    format!(
                        "the session marker in {} could not be read; \
                         refusing while ownership is unknown",
                        removal.raw
                    ),
                ));
            }
            MarkerStatus::Absent | MarkerStatus::Owned => {}
        }
    }

    if let Some(set) = protected {
        let matches_protected = set.is_match(target)
            || target
                .strip_prefix(repo_root)
                .map(|rel| set.is_match(rel))
                .unwrap_or(false);
        if matches_protected {
            return Some(GuardDecision::block(
                rule::PROTECTED_PATH,
                format!("{} matches a protected path pattern", removal.raw),
            ));
        }
    }

    if in_scope {
        if let Some(reason) = dirty_reason(guard, target) {
            if removal.force {
                return Some(GuardDecision::warn(
                    rule::DIRTY_STATE,
                    format!("{} {reason}; forced removal discards that work", removal.raw),
                ));
            }
            return Some(GuardDecision::block(
                rule::DIRTY_STATE,
                format!(
                    "{} {reason}; review it, or re-run with force to discard",
                    removal.raw
                ),
            ));
        }
    }

    None
}

fn gather_removals(
    command: &str,
    parsed: &[ParsedCommand],
    cwd_hint: Option<&Path>,
) -> Vec<Removal> {
    let mut out = Vec::new();
    for (i, seg) in parsed.iter().enumerate() {
        if !matches!(seg.kind, CommandKind::WorktreeRemove | CommandKind::Rm) {
            continue;
        }
        let dir = segment_dir(command, cwd_hint, i, seg.base_directory.as_deref());
        for raw in &seg.target_paths {
            out.push(Removal {
                seg_index: i,
                raw: raw.clone(),
                target: absolutize(&dir, raw),
                force: seg.has_force_flag,
            });
        }
    }
    out
}

fn gather_unlocks(
    command: &str,
    parsed: &[ParsedCommand],
    cwd_hint: Option<&Path>,
) -> Vec<(usize, PathBuf)> {
    let mut out = Vec::new();
    for (i, seg) in parsed.iter().enumerate() {
        if seg.kind != CommandKind::WorktreeUnlock {
            continue;
        }
        let dir = segment_dir(command, cwd_hint, i, seg.base_directory.as_deref());
        for raw in &seg.target_paths {
            out.push((i, absolutize(&dir, raw)));
        }
    }
    out
}

fn marker_status(guard: &Guard, target: &Path) -> MarkerStatus {
    match guard.registry.session_marker(target) {
        Ok(None) => MarkerStatus::Absent,
        Ok(Some(m)) => {
            if !m.is_live(guard.config.marker_stale_secs) {
                MarkerStatus::Absent
            } else if m.is_foreign(guard.session_id.as_deref()) {
                MarkerStatus::Foreign(m.session_id, m.age_secs)
            } else {
                MarkerStatus::Owned
            }
        }
        Err(_) => match policy::MARKER_READ {
            OnUnknown::Block => MarkerStatus::Unreadable,
            OnUnknown::Approve => MarkerStatus::Absent,
        },
    }
}

/// Why a worktree counts as "not finished", or None when it is clean.
/// An unreadable state is treated as clean per the fail-open row.
fn dirty_reason(guard: &Guard, target: &Path) -> Option<String> {
    let state = match guard.registry.tree_state(target) {
        Ok(s) => s,
        Err(_) => match policy::TREE_STATE {
            OnUnknown::Approve => return None,
            OnUnknown::Block => return Some("state could not be determined".to_string()),
        },
    };
    if state.is_dirty() {
        return Some(format!(
            "has {} uncommitted change(s)",
            state.dirty_lines.len()
        ));
    }
    if state.stash_count > 0 {
        return Some(format!("has {} stash entr(ies)", state.stash_count));
    }
    if let Some(epoch) = state.last_commit_epoch {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if now.saturating_sub(epoch) < RECENT_COMMIT_SECS {
            return Some("was committed to within the last hour".to_string());
        }
    }
    None
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        // A bad pattern disables itself, not the guard.
        if let Ok(glob) = Glob::new(pat) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

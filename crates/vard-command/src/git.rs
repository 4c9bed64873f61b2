//! git command recognition: global flags first, then the worktree family.

use crate::{split_flags, CommandKind, ParsedCommand};
use std::path::{Path, PathBuf};

/// git global flags that consume a following value. Closed set: anything
/// not listed is assumed boolean and skipped on its own.
const GIT_GLOBAL_VALUE_FLAGS: &[&str] = &["-C", "--git-dir", "--work-tree", "-c", "--namespace"];

/// `words[0]` names git. Returns the parsed segment; non-worktree
/// subcommands come back as `Other` with any `-C`/`--work-tree` base
/// directory still recorded.
pub(crate) fn classify(words: &[String]) -> Option<ParsedCommand> {
    let (base_directory, rest) = split_global_flags(&words[1..]);
    let Some(sub) = rest.first() else {
        let mut p = ParsedCommand::other(Vec::new());
        p.base_directory = base_directory;
        return Some(p);
    };
    let mut parsed = match sub.as_str() {
        "worktree" => classify_worktree(&rest[1..]),
        _ => ParsedCommand::other(Vec::new()),
    };
    parsed.base_directory = base_directory;
    Some(parsed)
}

fn classify_worktree(rest: &[String]) -> ParsedCommand {
    let Some(action) = rest.first() else {
        return ParsedCommand::other(Vec::new());
    };
    let (kind, value_flags): (CommandKind, &[&str]) = match action.as_str() {
        "remove" => (CommandKind::WorktreeRemove, &[]),
        "unlock" => (CommandKind::WorktreeUnlock, &[]),
        "add" => (CommandKind::WorktreeAdd, &["-b", "-B", "--reason", "--orphan"]),
        // lock/list/prune/move are left to ordinary approval.
        _ => return ParsedCommand::other(Vec::new()),
    };
    let (flags, positionals) = split_flags(&rest[1..], value_flags);
    let has_force_flag = flags.contains("-f") || flags.contains("--force");
    // The worktree path is the first non-flag token after the action.
    let target_paths = positionals.first().cloned().into_iter().collect();
    ParsedCommand {
        kind,
        target_paths,
        base_directory: None,
        positional_args: positionals,
        flags,
        has_force_flag,
        has_delete_branch_flag: false,
        words: Vec::new(),
    }
}

/// Skip git's global flags to reach the subcommand, folding every
/// `-C`/`--work-tree` value (in order) into one base directory.
fn split_global_flags(words: &[String]) -> (Option<String>, &[String]) {
    let mut base: Option<PathBuf> = None;
    let mut i = 0;
    while i < words.len() {
        let w = words[i].as_str();
        if !w.starts_with('-') {
            break;
        }
        if let Some(v) = w.strip_prefix("--work-tree=") {
            base = Some(fold_dir(base, v));
            i += 1;
            continue;
        }
        let bare = w.split_once('=').map(|(f, _)| f).unwrap_or(w);
        if GIT_GLOBAL_VALUE_FLAGS.contains(&bare) && !w.contains('=') {
            if matches!(bare, "-C" | "--work-tree") {
                if let Some(v) = words.get(i + 1) {
                    base = Some(fold_dir(base, v));
                }
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    (
        base.map(|p| p.to_string_lossy().into_owned()),
        &words[i..],
    )
}

fn fold_dir(acc: Option<PathBuf>, value: &str) -> PathBuf {
    let v = Path::new(value);
    match acc {
        Some(a) if !v.is_absolute() => a.join(v),
        _ => v.to_path_buf(),
    }
}

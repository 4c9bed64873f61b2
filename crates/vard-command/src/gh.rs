//! gh pr command recognition.
//!
//! Only the merge shape gets its own `CommandKind`; the other pr
//! subcommands surface through `PrInvocation` so the guard can tell
//! mutations (merge, close, edit, ...) from read-only lookups (view,
//! checks, ...) and resolve the branch they aim at.

use crate::{base_name, split_flags, CommandKind, ParsedCommand};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PR_URL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pull/(\d+)(?:/|$)").unwrap());

/// What a `gh pr` subcommand is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrTarget {
    /// Explicit numeric PR id.
    Number(u64),
    /// Explicit branch name.
    Branch(String),
    /// Full PR URL.
    Url(String),
    /// No positional given: the PR belonging to the current branch.
    CurrentBranch,
}

impl PrTarget {
    fn from_positional(arg: Option<&String>) -> PrTarget {
        let Some(s) = arg else {
            return PrTarget::CurrentBranch;
        };
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return PrTarget::Number(n);
            }
        }
        if s.starts_with("https://") || s.starts_with("http://") {
            return PrTarget::Url(s.clone());
        }
        PrTarget::Branch(s.clone())
    }

    /// The PR number, when the target names one directly or via URL.
    pub fn number(&self) -> Option<u64> {
        match self {
            PrTarget::Number(n) => Some(*n),
            PrTarget::Url(u) => pr_url_number(u),
            _ => None,
        }
    }
}

/// Extract the PR number from a pull-request URL.
pub fn pr_url_number(url: &str) -> Option<u64> {
    PR_URL_NUMBER
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A `gh pr <subcommand>` invocation found in one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInvocation {
    pub subcommand: String,
    pub target: PrTarget,
    pub flags: BTreeSet<String>,
    pub positionals: Vec<String>,
}

impl PrInvocation {
    /// Subcommands that change remote PR state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.subcommand.as_str(),
            "merge" | "checkout" | "close" | "reopen" | "edit" | "comment" | "review"
        )
    }

    /// Subcommands that only read PR state; always safe.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self.subcommand.as_str(),
            "view" | "list" | "checks" | "diff" | "status"
        )
    }
}

/// Value-taking flags per pr subcommand. Closed sets: a flag not listed
/// here never consumes the next word, so a quoted value can't eat the
/// positional target and a flag-shaped value can't pose as a real flag.
fn value_flags_for(sub: &str) -> &'static [&'static str] {
    match sub {
        "merge" => &[
            "--subject",
            "-t",
            "--body",
            "-b",
            "--body-file",
            "-F",
            "--match-head-commit",
            "--author-email",
            "--repo",
            "-R",
        ],
        "checkout" => &["--branch", "-b", "--repo", "-R"],
        "close" | "reopen" => &["--comment", "-c", "--repo", "-R"],
        "edit" => &[
            "--title",
            "-t",
            "--body",
            "-b",
            "--body-file",
            "-F",
            "--base",
            "-B",
            "--milestone",
            "-m",
            "--add-assignee",
            "--remove-assignee",
            "--add-label",
            "--remove-label",
            "--add-reviewer",
            "--remove-reviewer",
            "--add-project",
            "--remove-project",
            "--repo",
            "-R",
        ],
        "comment" | "review" => &["--body", "-b", "--body-file", "-F", "--repo", "-R"],
        _ => &["--repo", "-R"],
    }
}

/// Recognize `gh pr <sub>` in a stripped word list.
pub(crate) fn pr_invocation(words: &[String]) -> Option<PrInvocation> {
    if base_name(words.first()?) != "gh" {
        return None;
    }
    // Skip flags between `gh` and the command words (`gh -R o/r pr ...`).
    let mut i = 1;
    let mut seen_pr = false;
    let mut subcommand: Option<&str> = None;
    while i < words.len() {
        let w = words[i].as_str();
        if w.starts_with('-') {
            let bare = w.split_once('=').map(|(f, _)| f).unwrap_or(w);
            if matches!(bare, "-R" | "--repo") && !w.contains('=') {
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if !seen_pr {
            if w != "pr" {
                return None;
            }
            seen_pr = true;
        } else {
            subcommand = Some(w);
            i += 1;
            break;
        }
        i += 1;
    }
    let subcommand = subcommand?.to_string();
    let (flags, positionals) = split_flags(&words[i..], value_flags_for(&subcommand));
    let target = PrTarget::from_positional(positionals.first());
    Some(PrInvocation {
        subcommand,
        target,
        flags,
        positionals,
    })
}

/// Remove `--delete-branch`/`-d` from a merge segment's words, leaving
/// everything else in place. Walks with the merge flag table so a flag
/// value that happens to spell `-d` (e.g. `--body -d`) survives.
pub fn strip_delete_branch(words: &[String]) -> Vec<String> {
    let value_flags = value_flags_for("merge");
    let mut out = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let w = words[i].as_str();
        if w == "-d" || w == "--delete-branch" {
            i += 1;
            continue;
        }
        out.push(words[i].clone());
        let bare = w.split_once('=').map(|(f, _)| f).unwrap_or(w);
        if w.starts_with('-') && value_flags.contains(&bare) && !w.contains('=') {
            if let Some(v) = words.get(i + 1) {
                out.push(v.clone());
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    out
}

/// `words[0]` names gh. Only the merge shape produces a dedicated kind.
pub(crate) fn classify(words: &[String]) -> Option<ParsedCommand> {
    let inv = pr_invocation(words)?;
    if inv.subcommand != "merge" {
        return None;
    }
    let has_delete_branch_flag =
        inv.flags.contains("-d") || inv.flags.contains("--delete-branch");
    Some(ParsedCommand {
        kind: CommandKind::PrMerge,
        target_paths: Vec::new(),
        base_directory: None,
        positional_args: inv.positionals,
        flags: inv.flags,
        has_force_flag: false,
        has_delete_branch_flag,
        words: Vec::new(),
    })
}

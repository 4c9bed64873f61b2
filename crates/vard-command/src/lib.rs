//! Command classification.
//!
//! Turns a raw command string into one `ParsedCommand` per operator-delimited
//! segment. Classification is total over chains: `a && b && c` yields three
//! records, and every safety check downstream walks all of them. Recognition
//! works on the token stream with explicit, closed flag tables; nothing here
//! pattern-matches raw strings.

mod gh;
mod git;
mod rm;

pub use gh::{pr_url_number, strip_delete_branch, PrInvocation, PrTarget};

use serde::Serialize;
use std::collections::BTreeSet;
use vard_shell::{split_segments, tokenize_lossy, Segment};

/// Recognized shape of one command segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    WorktreeRemove,
    WorktreeUnlock,
    WorktreeAdd,
    PrMerge,
    Rm,
    CiMonitor,
    Other,
}

/// Structured view of one operator-delimited command segment.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    /// Filesystem paths this segment would remove or create.
    pub target_paths: Vec<String>,
    /// Directory override from git `-C`/`--work-tree`, folded in order.
    pub base_directory: Option<String>,
    /// Non-flag arguments after the recognized subcommand.
    pub positional_args: Vec<String>,
    /// Flag words seen in this segment (boolean and value-taking alike).
    pub flags: BTreeSet<String>,
    pub has_force_flag: bool,
    pub has_delete_branch_flag: bool,
    /// Raw words of the segment, wrapper prefixes included.
    #[serde(skip)]
    pub words: Vec<String>,
}

impl ParsedCommand {
    fn other(words: Vec<String>) -> Self {
        ParsedCommand {
            kind: CommandKind::Other,
            target_paths: Vec::new(),
            base_directory: None,
            positional_args: Vec::new(),
            flags: BTreeSet::new(),
            has_force_flag: false,
            has_delete_branch_flag: false,
            words,
        }
    }

    /// The `gh pr <subcommand>` invocation in this segment, for any pr
    /// subcommand (not only merge). Used by guard checks that care about
    /// PR mutations beyond the merge shape.
    pub fn pr_invocation(&self) -> Option<PrInvocation> {
        gh::pr_invocation(command_words(&self.words))
    }

    /// Words with wrapper commands, their flags, and `VAR=value`
    /// assignments stripped, so the word naming the real command comes
    /// first. Anything re-spawned without a shell must start from these:
    /// assignments and wrappers in the program position do not spawn.
    pub fn effective_words(&self) -> &[String] {
        command_words(&self.words)
    }

    /// Merge target of a `pr_merge` segment.
    pub fn pr_target(&self) -> Option<PrTarget> {
        if self.kind != CommandKind::PrMerge {
            return None;
        }
        self.pr_invocation().map(|inv| inv.target)
    }
}

/// Classify every operator-delimited segment of a command string.
pub fn classify_all(command: &str) -> Vec<ParsedCommand> {
    classify_all_with(command, &[])
}

/// Classification with repo-configured monitor script names layered over
/// the built-in set.
pub fn classify_all_with(command: &str, monitor_scripts: &[String]) -> Vec<ParsedCommand> {
    let tokens = tokenize_lossy(command);
    split_segments(&tokens)
        .iter()
        .map(|seg| classify_segment(seg, monitor_scripts))
        .collect()
}

fn classify_segment(seg: &Segment, monitor_scripts: &[String]) -> ParsedCommand {
    let words = command_words(&seg.words);
    let Some(first) = words.first() else {
        return ParsedCommand::other(seg.words.clone());
    };
    let base = base_name(first);

    let parsed = match base {
        "git" => git::classify(words),
        "gh" => gh::classify(words),
        "rm" => rm::classify(words),
        name if is_monitor_script(name, monitor_scripts) => Some(ParsedCommand {
            kind: CommandKind::CiMonitor,
            positional_args: words[1..].to_vec(),
            ..ParsedCommand::other(Vec::new())
        }),
        _ => None,
    };

    let mut parsed = parsed.unwrap_or_else(|| ParsedCommand::other(Vec::new()));
    parsed.words = seg.words.clone();
    parsed
}

/// Script basenames treated as CI monitors: the built-in names plus any
/// listed in repo config.
fn is_monitor_script(base: &str, extra: &[String]) -> bool {
    base == "monitor-ci.sh" || base == "monitor-ci" || extra.iter().any(|s| s == base)
}

/// Commands that wrap another command and pass the rest through.
const WRAPPERS: &[&str] = &["sudo", "env", "time", "nice", "nohup", "command"];

/// Flags of wrapper commands that consume a following value.
const WRAPPER_VALUE_FLAGS: &[&str] = &["-u", "-n", "--adjustment", "-C", "--chdir"];

/// Strip wrapper commands, their flags, and `VAR=value` assignments, so the
/// word naming the real command comes first.
pub(crate) fn command_words(words: &[String]) -> &[String] {
    let mut i = 0;
    while i < words.len() {
        let w = words[i].as_str();
        if is_assignment(w) {
            i += 1;
            continue;
        }
        if WRAPPERS.contains(&base_name(w)) {
            i += 1;
            // Wrapper flags (e.g. `sudo -u alice`, `nice -n 10`) precede the
            // wrapped command; skip them and their values.
            while i < words.len() {
                let f = words[i].as_str();
                if !f.starts_with('-') {
                    break;
                }
                if WRAPPER_VALUE_FLAGS.contains(&f) {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            continue;
        }
        break;
    }
    &words[i..]
}

pub(crate) fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

pub(crate) fn base_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

pub(crate) fn is_flag(word: &str) -> bool {
    word.starts_with('-') && word != "-" && word != "--"
}

/// Walk words, collecting flags and positionals, with an explicit closed set
/// of flags that consume the next word. Returns (flags, positionals).
pub(crate) fn split_flags(
    words: &[String],
    value_flags: &[&str],
) -> (BTreeSet<String>, Vec<String>) {
    let mut flags = BTreeSet::new();
    let mut positionals = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let w = words[i].as_str();
        if w == "--" {
            // End of options: everything after is positional.
            positionals.extend(words[i + 1..].iter().cloned());
            break;
        }
        if is_flag(w) {
            let bare = w.split_once('=').map(|(f, _)| f).unwrap_or(w);
            flags.insert(bare.to_string());
            // The value of a value-taking flag is neither a flag nor a
            // positional; a quoted value that looks like a flag must not
            // be misread as one.
            if value_flags.contains(&bare) && !w.contains('=') {
                i += 2;
                continue;
            }
        } else {
            positionals.push(w.to_string());
        }
        i += 1;
    }
    (flags, positionals)
}

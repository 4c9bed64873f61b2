//! rm command recognition.

use crate::{split_flags, CommandKind, ParsedCommand};

/// `words[0]` names rm. Every non-flag word is a candidate target; rm has
/// no flags that consume a following value, so nothing is skipped.
pub(crate) fn classify(words: &[String]) -> Option<ParsedCommand> {
    let (flags, positionals) = split_flags(&words[1..], &[]);
    let has_force_flag =
        flags.contains("--force") || flags.iter().any(|f| short_cluster_has(f, 'f'));
    Some(ParsedCommand {
        kind: CommandKind::Rm,
        target_paths: positionals.clone(),
        base_directory: None,
        positional_args: positionals,
        flags,
        has_force_flag,
        has_delete_branch_flag: false,
        words: Vec::new(),
    })
}

/// True when a clustered short flag (`-rf`, `-fr`, `-vf`, ...) carries the
/// given letter.
fn short_cluster_has(flag: &str, letter: char) -> bool {
    flag.starts_with('-') && !flag.starts_with("--") && flag[1..].contains(letter)
}

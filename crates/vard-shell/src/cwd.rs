//! Effective working directory resolution.
//!
//! Computes the directory a shell command would actually execute in, given
//! `cd` prefixes and git's directory-override flags, without running the
//! command. Resolution order is fixed: base directory, then cumulative `cd`
//! steps at valid chain positions, then the `-C`/`--work-tree` values of the
//! last git command, then an existence check that falls back to the base
//! directory. The same input always resolves to the same answer.

use crate::tok::{split_segments, tokenize_lossy, Operator, Segment};
use std::path::{Component, Path, PathBuf};

/// Commands that wrap another command and pass arguments through.
const WRAPPERS: &[&str] = &["sudo", "env", "time", "nice", "nohup", "command"];

/// Resolve the effective working directory for a whole command string.
///
/// `base` is used when it exists; otherwise the process working directory
/// stands in. A final path that cannot be verified on disk is discarded in
/// favor of the base directory, so the answer is always a real location.
pub fn resolve_effective_dir(command: Option<&str>, base: Option<&Path>) -> PathBuf {
    let fallback = base_dir(base);
    let command = match command {
        Some(c) if !c.trim().is_empty() => c,
        _ => return fallback,
    };
    let tokens = tokenize_lossy(command);
    let segments = split_segments(&tokens);

    let mut acc = apply_cd_steps(fallback.clone(), &segments, segments.len());
    for value in last_dir_override_values(&segments) {
        acc = apply_step(&acc, &expand_tilde(&value));
    }
    verify_or_fallback(acc, fallback)
}

/// Resolve the directory in force at one segment of a chain: only `cd`
/// steps sequenced before that segment apply. Used for checks that must
/// evaluate a single command of a chain in its own surroundings.
pub fn resolve_dir_at_segment(command: &str, base: Option<&Path>, index: usize) -> PathBuf {
    let fallback = base_dir(base);
    let tokens = tokenize_lossy(command);
    let segments = split_segments(&tokens);
    let acc = apply_cd_steps(fallback.clone(), &segments, index.min(segments.len()));
    verify_or_fallback(acc, fallback)
}

/// Expand a leading tilde to the invoking user's home directory.
/// `~user` forms are left untouched.
pub fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Turn a raw path argument into an absolute, lexically normalized path:
/// tilde expanded, joined onto `base` when relative, `.`/`..` folded.
/// Symlinks are not resolved; callers canonicalize when they need that.
pub fn absolutize(base: &Path, raw: &str) -> PathBuf {
    apply_step(base, &expand_tilde(raw))
}

fn base_dir(base: Option<&Path>) -> PathBuf {
    if let Some(b) = base {
        if b.exists() {
            return b.canonicalize().unwrap_or_else(|_| b.to_path_buf());
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn verify_or_fallback(candidate: PathBuf, fallback: PathBuf) -> PathBuf {
    match candidate.canonicalize() {
        Ok(p) => p,
        Err(_) => fallback,
    }
}

/// Apply every valid `cd` found in `segments[..upto]`, cumulatively.
fn apply_cd_steps(start: PathBuf, segments: &[Segment], upto: usize) -> PathBuf {
    let mut acc = start;
    for seg in &segments[..upto] {
        if !cd_takes_effect(seg) {
            continue;
        }
        if seg.words.first().map(String::as_str) != Some("cd") {
            continue;
        }
        match seg.words.get(1).map(String::as_str) {
            // Bare `cd` goes home.
            None => {
                if let Some(home) = dirs::home_dir() {
                    acc = home;
                }
            }
            // `cd -` targets the previous directory, which is unknowable
            // from the string alone; leave the accumulator untouched.
            Some("-") => {}
            Some(arg) => acc = apply_step(&acc, &expand_tilde(arg)),
        }
    }
    acc
}

/// A `cd` changes the parent shell only when it starts the command or
/// follows `&&`/`;`, and is not feeding a pipe. After `||` it only runs on
/// failure; inside a pipeline it runs in a subshell. Both are ignored.
fn cd_takes_effect(seg: &Segment) -> bool {
    let position_ok = matches!(seg.left, None | Some(Operator::And) | Some(Operator::Seq));
    position_ok && seg.right != Some(Operator::Pipe)
}

/// One cumulative path step: absolute targets reset, relative targets
/// resolve against the accumulator. `.` and `..` fold lexically.
fn apply_step(acc: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        normalize_lexical(target)
    } else {
        normalize_lexical(&acc.join(target))
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::RootDir | Component::Prefix(_) => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
        }
    }
    out
}

/// `-C` and `--work-tree` values of the last git command in the chain,
/// in the order given. `--git-dir` points at repository metadata, not a
/// working directory, so it does not participate.
fn last_dir_override_values(segments: &[Segment]) -> Vec<String> {
    let mut last = Vec::new();
    for seg in segments {
        let vals = dir_override_values(&seg.words);
        if !vals.is_empty() {
            last = vals;
        }
    }
    last
}

fn dir_override_values(words: &[String]) -> Vec<String> {
    let words = skip_prefix_words(words);
    let is_git = words
        .first()
        .map(|w| base_name(w) == "git")
        .unwrap_or(false);
    if !is_git {
        return Vec::new();
    }
    let mut vals = Vec::new();
    let mut i = 1;
    while i < words.len() {
        let w = words[i].as_str();
        match w {
            "-C" | "--work-tree" => {
                if let Some(v) = words.get(i + 1) {
                    vals.push(v.clone());
                    i += 2;
                    continue;
                }
            }
            // Value-taking flags that do not move the working directory;
            // skip their values so a later -C is still seen.
            "--git-dir" | "-c" | "--namespace" => {
                i += 2;
                continue;
            }
            _ => {
                if let Some(v) = w.strip_prefix("--work-tree=") {
                    vals.push(v.to_string());
                } else if !w.starts_with('-') {
                    // Reached the subcommand; later flags belong to it.
                    break;
                }
            }
        }
        i += 1;
    }
    vals
}

/// Skip leading `VAR=value` assignments and wrapper commands so the word
/// that names the real command comes first.
fn skip_prefix_words(words: &[String]) -> &[String] {
    let mut i = 0;
    while i < words.len() {
        let w = words[i].as_str();
        if is_assignment(w) {
            i += 1;
            continue;
        }
        if WRAPPERS.contains(&base_name(w)) {
            i += 1;
            continue;
        }
        break;
    }
    &words[i..]
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.chars().next().unwrap_or('0').is_ascii_digit()
        }
        None => false,
    }
}

fn base_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

use std::path::{Path, PathBuf};
use vard_core::config::{Config, ENV_SESSION_ID};
use vard_core::Outcome;
use vard_guard::{Evaluation, Guard};
use vard_worktree::{GhRemote, GitRegistry, WorktreeRegistry};

/// `vard check <command>`: evaluate a command string and print the
/// decision. Exits 2 on block so scripts can branch on it. A rewrite is
/// reported, never executed; this is a dry run.
pub fn run(command: &str, cwd: Option<&Path>, session: Option<&str>) -> anyhow::Result<()> {
    let base: PathBuf = match cwd {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let Some(bootstrap) = GitRegistry::discover(&base, Config::default().git_timeout_secs) else {
        println!("approve: not inside a git repository");
        return Ok(());
    };
    let repo_root = bootstrap.repo_root();
    let config = Config::load(&repo_root);
    let registry = GitRegistry::at(repo_root.clone(), config.git_timeout_secs);
    let remote = GhRemote::new(&repo_root, config.gh_timeout_secs);
    let session_id = session
        .map(str::to_string)
        .or_else(|| std::env::var(ENV_SESSION_ID).ok().filter(|s| !s.is_empty()));

    let guard = Guard {
        registry: &registry,
        remote: Some(&remote),
        config: &config,
        session_id,
    };
    match guard.evaluate(command, Some(&base)) {
        Evaluation::Decision(d) => {
            let label = match d.outcome {
                Outcome::Approve => "approve",
                Outcome::Block => "block",
                Outcome::Warn => "warn",
            };
            match &d.message {
                Some(m) => println!("{label}: {m}"),
                None => println!("{label}"),
            }
            if let Some(rule) = &d.rule {
                println!("  rule: {rule}");
            }
            if d.is_block() {
                std::process::exit(2);
            }
        }
        Evaluation::Rewrite(plan) => {
            println!(
                "rewrite: would run `{}` in {} and clean up branch {} after the \
                 host confirms the merge",
                plan.rendered,
                plan.cwd.display(),
                plan.branch
            );
        }
    }
    Ok(())
}

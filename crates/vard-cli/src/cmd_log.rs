use vard_core::config::Config;
use vard_core::{store, Outcome};
use vard_worktree::{GitRegistry, WorktreeRegistry};

/// `vard log`: recent guard decisions for this repository.
pub fn run(limit: usize) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let Some(registry) = GitRegistry::discover(&cwd, Config::default().git_timeout_secs) else {
        anyhow::bail!("not inside a git repository");
    };
    let project_id = store::project_id(&registry.repo_root());

    let records = vard_bridge_claude::read_recent(&project_id, limit);
    if records.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }

    for r in &records {
        let label = match r.outcome {
            Outcome::Approve => "approve",
            Outcome::Block => "BLOCK",
            Outcome::Warn => "warn",
        };
        let rule = r.rule.as_deref().unwrap_or("-");
        println!("{}  {label:7}  {rule}  cmd#{}", r.ts, r.command_hash);
        if let Some(m) = &r.message {
            println!("    {m}");
        }
        if !r.session_id.is_empty() {
            println!("    session: {}  cwd: {}", r.session_id, r.cwd);
        }
    }
    Ok(())
}

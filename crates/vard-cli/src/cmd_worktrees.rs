use vard_core::config::Config;
use vard_worktree::{GitRegistry, WorktreeRegistry};

/// `vard worktrees`: registry listing with lock and ownership state.
pub fn run() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let Some(bootstrap) = GitRegistry::discover(&cwd, Config::default().git_timeout_secs) else {
        anyhow::bail!("not inside a git repository");
    };
    let repo_root = bootstrap.repo_root();
    let config = Config::load(&repo_root);
    let registry = GitRegistry::at(repo_root, config.git_timeout_secs);

    let worktrees = registry
        .worktrees()
        .map_err(|e| anyhow::anyhow!("worktree listing failed: {e}"))?;
    if worktrees.is_empty() {
        println!("No worktrees registered.");
        return Ok(());
    }

    println!("Worktrees ({}):\n", worktrees.len());
    for wt in &worktrees {
        let branch = wt.branch.as_deref().unwrap_or("(detached)");
        let mut tags = Vec::new();
        if wt.main {
            tags.push("main".to_string());
        }
        if wt.locked {
            tags.push("locked".to_string());
        }
        if wt.prunable {
            tags.push("prunable".to_string());
        }
        let tag_s = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        println!("  {}  ({branch}){tag_s}", wt.path.display());

        if wt.main {
            continue;
        }
        match registry.session_marker(&wt.path) {
            Ok(Some(m)) => {
                let state = if m.is_live(config.marker_stale_secs) {
                    "live"
                } else {
                    "stale"
                };
                println!(
                    "    session: {} ({state}, {})",
                    m.session_id,
                    format_age(m.age_secs)
                );
            }
            Ok(None) => println!("    session: none"),
            Err(e) => println!("    session: marker unreadable ({e})"),
        }
    }
    Ok(())
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

mod cmd_admin;
mod cmd_check;
mod cmd_hook;
mod cmd_log;
mod cmd_worktrees;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vard", version, about = "Command-safety guard for coding agents")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hook entrypoints for host agents
    Hook {
        #[command(subcommand)]
        host: HookHost,
    },
    /// Evaluate a command string and print the decision (dry run)
    Check {
        /// Shell command to evaluate
        command: String,
        /// Directory to evaluate from (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Session id to evaluate as (defaults to VARD_SESSION_ID)
        #[arg(long)]
        session: Option<String>,
    },
    /// List registered worktrees with branch, lock, and ownership state
    Worktrees,
    /// Show recent guard decisions
    Log {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Install the hook into .claude/settings.local.json
    Install,
    /// Remove the hook from .claude/settings.local.json
    Uninstall,
    /// Check hook wiring, collaborators, and the state directory
    Doctor,
}

#[derive(Subcommand)]
enum HookHost {
    /// Claude Code: read the hook event from stdin, answer on stdout
    Claude,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Hook {
            host: HookHost::Claude,
        } => cmd_hook::claude(),
        Command::Check {
            command,
            cwd,
            session,
        } => cmd_check::run(&command, cwd.as_deref(), session.as_deref()),
        Command::Worktrees => cmd_worktrees::run(),
        Command::Log { limit } => cmd_log::run(limit),
        Command::Install => cmd_admin::install(),
        Command::Uninstall => cmd_admin::uninstall(),
        Command::Doctor => cmd_admin::doctor(),
    }
}

//! Settings install / uninstall / doctor.
//!
//! The hook is wired into `.claude/settings.local.json` as a PreToolUse
//! matcher group for the Bash tool. Install and uninstall are idempotent
//! and preserve everything they did not add; an existing file is backed up
//! with a timestamp before being rewritten.

use crate::parse::now_rfc3339;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vard_core::config::Config;
use vard_core::store;

const VARD_HOOK_COMMAND: &str = "vard hook claude";
const HOOK_EVENT: &str = "PreToolUse";
const HOOK_MATCHER: &str = "Bash";

fn settings_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".claude").join("settings.local.json")
}

/// True when a matcher group already carries the vard hook.
fn group_contains_vard(group: &serde_json::Value) -> bool {
    if let Some(hooks) = group.get("hooks").and_then(|h| h.as_array()) {
        for hook in hooks {
            if let Some(cmd) = hook.get("command").and_then(|c| c.as_str()) {
                if cmd.contains("vard hook") {
                    return true;
                }
            }
        }
    }
    false
}

/// Install the hook into `.claude/settings.local.json`.
pub fn install(repo_root: &Path) -> anyhow::Result<()> {
    let path = settings_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut settings: serde_json::Value = if path.exists() {
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };

    if path.exists() {
        let ts = now_rfc3339().replace(':', "-");
        let backup = path.with_extension(format!("json.vard.bak.{ts}"));
        fs::copy(&path, &backup)?;
    }

    let hooks = settings
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings is not an object"))?
        .entry("hooks")
        .or_insert_with(|| serde_json::json!({}));
    let hooks_obj = hooks
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("hooks is not an object"))?;

    let vard_group = serde_json::json!({
        "matcher": HOOK_MATCHER,
        "hooks": [
            {
                "type": "command",
                "command": VARD_HOOK_COMMAND
            }
        ]
    });

    let existing = hooks_obj
        .get(HOOK_EVENT)
        .and_then(|v| v.as_array())
        .cloned();
    let mut groups: Vec<serde_json::Value> = existing
        .unwrap_or_default()
        .into_iter()
        .filter(|g| !group_contains_vard(g))
        .collect();
    groups.push(vard_group);
    hooks_obj.insert(HOOK_EVENT.to_string(), serde_json::Value::Array(groups));

    let output = serde_json::to_string_pretty(&settings)?;
    fs::write(&path, output.as_bytes())?;

    println!("Installed vard hook into {}", path.display());
    Ok(())
}

/// Remove the hook from `.claude/settings.local.json`.
pub fn uninstall(repo_root: &Path) -> anyhow::Result<()> {
    let path = settings_path(repo_root);
    if !path.exists() {
        println!("No settings file found at {}", path.display());
        return Ok(());
    }

    let content = fs::read_to_string(&path)?;
    let mut settings: serde_json::Value = serde_json::from_str(&content)?;

    if let Some(hooks) = settings
        .as_object_mut()
        .and_then(|obj| obj.get_mut("hooks"))
        .and_then(|h| h.as_object_mut())
    {
        if let Some(arr) = hooks.get(HOOK_EVENT).and_then(|v| v.as_array()).cloned() {
            let filtered: Vec<serde_json::Value> = arr
                .into_iter()
                .filter(|g| !group_contains_vard(g))
                .collect();
            if filtered.is_empty() {
                hooks.remove(HOOK_EVENT);
            } else {
                hooks.insert(HOOK_EVENT.to_string(), serde_json::Value::Array(filtered));
            }
        }
    }
    // Drop an empty hooks object rather than leaving a stub behind.
    let hooks_empty = settings
        .get("hooks")
        .and_then(|h| h.as_object())
        .is_some_and(|h| h.is_empty());
    if hooks_empty {
        if let Some(obj) = settings.as_object_mut() {
            obj.remove("hooks");
        }
    }

    let output = serde_json::to_string_pretty(&settings)?;
    fs::write(&path, output.as_bytes())?;

    println!("Uninstalled vard hook from {}", path.display());
    Ok(())
}

/// Environment health report: hook wiring, collaborators, state dir.
pub fn doctor(repo_root: &Path) -> anyhow::Result<()> {
    let path = settings_path(repo_root);
    match fs::read_to_string(&path) {
        Ok(content) if content.contains("vard hook") => {
            println!("[OK] hook wired in {}", path.display());
        }
        Ok(_) => {
            println!("[WARN] {} exists but has no vard hook (run: vard install)", path.display());
        }
        Err(_) => {
            println!("[WARN] no settings at {} (run: vard install)", path.display());
        }
    }

    let timeout = Duration::from_secs(5);
    match vard_worktree::proc::run("git", &["--version"], None, timeout) {
        Ok(v) => println!("[OK] git available ({})", v.trim()),
        Err(e) => println!("[WARN] git not available: {e}"),
    }
    match vard_worktree::proc::run("gh", &["--version"], None, timeout) {
        Ok(v) => println!(
            "[OK] gh available ({})",
            v.lines().next().unwrap_or("").trim()
        ),
        Err(e) => println!("[WARN] gh not available, PR checks degrade to approve: {e}"),
    }

    let config_path = repo_root.join("vard.yaml");
    if config_path.exists() {
        match fs::read_to_string(&config_path)
            .map_err(anyhow::Error::from)
            .and_then(|c| Config::parse(&c))
        {
            Ok(_) => println!("[OK] vard.yaml parses"),
            Err(e) => println!("[WARN] vard.yaml invalid, defaults in use: {e}"),
        }
    } else {
        println!("[OK] no vard.yaml, defaults in use");
    }

    let state = store::state_root();
    let probe = state.join(".doctor-probe");
    match store::write_atomic(&probe, b"ok") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            println!("[OK] state dir writable ({})", state.display());
        }
        Err(e) => println!("[WARN] state dir not writable ({}): {e}", state.display()),
    }

    Ok(())
}

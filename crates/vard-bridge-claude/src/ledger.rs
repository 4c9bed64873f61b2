//! Append-only decision ledger.
//!
//! One JSONL line per evaluated command under the per-project state dir.
//! Hook invocations from concurrent sessions append to the same file, so
//! writes are serialized behind an advisory file lock. Commands are stored
//! as a hash prefix, not verbatim; the raw string may hold secrets.

use crate::parse::now_rfc3339;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use vard_core::store;
use vard_core::Outcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub ts: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
    pub command_hash: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DecisionRecord {
    pub fn new(
        command: &str,
        session_id: &str,
        cwd: &str,
        outcome: Outcome,
        rule: Option<String>,
        message: Option<String>,
    ) -> Self {
        DecisionRecord {
            id: ulid::Ulid::new().to_string(),
            ts: now_rfc3339(),
            session_id: session_id.to_string(),
            cwd: cwd.to_string(),
            command_hash: command_hash(command),
            outcome,
            rule,
            message,
        }
    }
}

/// Stable 16-hex-char identifier for a command string.
pub fn command_hash(command: &str) -> String {
    blake3::hash(command.as_bytes()).to_hex()[..16].to_string()
}

fn ledger_path(project_id: &str) -> PathBuf {
    store::project_dir(project_id).join("ledger").join("decisions.jsonl")
}

/// Append one record. Lock, append, unlock; failure is the caller's to
/// tolerate (the hook never fails over bookkeeping).
pub fn append_decision(project_id: &str, record: &DecisionRecord) -> anyhow::Result<()> {
    let path = ledger_path(project_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let _lock = store::lock_file(&path.with_extension("lock"))?;
    let line = serde_json::to_string(record)?;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Most recent `limit` records, oldest first. Unparseable lines are
/// skipped; a missing ledger is just empty.
pub fn read_recent(project_id: &str, limit: usize) -> Vec<DecisionRecord> {
    let Ok(content) = fs::read_to_string(ledger_path(project_id)) else {
        return Vec::new();
    };
    let mut records: Vec<DecisionRecord> = content
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    if records.len() > limit {
        records.drain(..records.len() - limit);
    }
    records
}

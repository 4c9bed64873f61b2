//! Session ownership markers.
//!
//! One small file per worktree records which agent session considers that
//! worktree its own. The file holds either a bare session-id string or a
//! JSON object with a `sessionId` field; its age comes from the filesystem
//! mtime. Markers older than the staleness window count as absent.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use vard_core::SESSION_MARKER_FILE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMarker {
    pub session_id: String,
    pub age_secs: u64,
}

impl SessionMarker {
    /// Live while younger than the staleness window.
    pub fn is_live(&self, stale_secs: u64) -> bool {
        self.age_secs < stale_secs
    }

    /// Owned by some other session than the one evaluating.
    pub fn is_foreign(&self, self_session: Option<&str>) -> bool {
        self_session != Some(self.session_id.as_str())
    }
}

pub fn marker_path(worktree: &Path) -> PathBuf {
    worktree.join(SESSION_MARKER_FILE)
}

/// Read the marker inside a worktree.
///
/// `Ok(None)` covers a missing file, empty or unparseable content, and an
/// unknowable age (all treated as "no owner"). An `Err` means the file is
/// there but could not be read; the caller decides what that implies.
pub fn read(worktree: &Path) -> io::Result<Option<SessionMarker>> {
    let path = marker_path(worktree);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let Some(session_id) = parse_session_id(&content) else {
        return Ok(None);
    };
    let Some(age_secs) = marker_age(&path) else {
        return Ok(None);
    };
    Ok(Some(SessionMarker {
        session_id,
        age_secs,
    }))
}

/// Write or refresh the marker claiming `worktree` for `session_id`.
pub fn write(worktree: &Path, session_id: &str) -> anyhow::Result<()> {
    let body = serde_json::to_vec(&serde_json::json!({ "sessionId": session_id }))?;
    vard_core::store::write_atomic(&marker_path(worktree), &body)
}

fn parse_session_id(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        let v: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        let id = v
            .get("sessionId")
            .or_else(|| v.get("session_id"))?
            .as_str()?;
        if id.is_empty() {
            return None;
        }
        return Some(id.to_string());
    }
    Some(trimmed.to_string())
}

fn marker_age(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    // An mtime in the future (clock skew) means freshly written.
    match SystemTime::now().duration_since(modified) {
        Ok(d) => Some(d.as_secs()),
        Err(_) => Some(0),
    }
}

//! Per-user state directory with atomic writes.
//!
//! Hook invocations from concurrent sessions share this directory, so every
//! write is either atomic (temp file + rename) or serialized behind a file
//! lock taken by the caller.

use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Compute a deterministic project ID from a repo root or cwd path.
/// project_id = blake3(normalize_path(input)) → hex string (first 32 chars).
pub fn project_id(repo_root_or_cwd: &Path) -> String {
    let normalized = normalize_path(repo_root_or_cwd);
    let hash = blake3::hash(normalized.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Normalize a path: canonicalize, lowercase on Windows, forward slashes.
fn normalize_path(p: &Path) -> String {
    let abs = p
        .canonicalize()
        .unwrap_or_else(|_| p.to_path_buf())
        .to_string_lossy()
        .to_string();
    #[cfg(windows)]
    let abs = abs.to_lowercase();
    abs.replace('\\', "/")
}

/// Return the per-user state root: platform data dir + `vard/`,
/// falling back to `~/.vard/`.
pub fn state_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("vard")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".vard")
    } else {
        PathBuf::from(".vard-state")
    }
}

/// Return the project directory: `state_root/projects/<project_id>/`
pub fn project_dir(project_id: &str) -> PathBuf {
    state_root().join("projects").join(project_id)
}

/// Ensure all subdirectories exist for a project.
pub fn ensure_dirs(project_id: &str) -> anyhow::Result<()> {
    let base = project_dir(project_id);
    for sub in &["ledger", "state"] {
        fs::create_dir_all(base.join(sub))?;
    }
    Ok(())
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock. Creates the lock file if needed.
pub fn lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(LockGuard { _file: file })
}

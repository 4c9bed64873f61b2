//! GitHub CLI backed pull-request queries.

use crate::proc::{run, SubprocessError};
use crate::registry::PrRemote;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct GhRemote {
    dir: PathBuf,
    timeout: Duration,
}

impl GhRemote {
    pub fn new(dir: &Path, timeout_secs: u64) -> GhRemote {
        GhRemote {
            dir: dir.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn gh(&self, args: &[&str]) -> Result<String, SubprocessError> {
        run("gh", args, Some(&self.dir), self.timeout)
    }
}

impl PrRemote for GhRemote {
    fn pr_branch(&self, number: u64) -> Result<Option<String>, SubprocessError> {
        let n = number.to_string();
        // A failed lookup is a definite "no such PR here", not an unknown.
        let out = match self.gh(&["pr", "view", &n, "--json", "headRefName"]) {
            Ok(out) => out,
            Err(SubprocessError::Failed { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let v: serde_json::Value = match serde_json::from_str(&out) {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };
        Ok(v.get("headRefName")
            .and_then(|b| b.as_str())
            .map(str::to_string))
    }

    fn pr_merged(&self, selector: &str) -> Result<bool, SubprocessError> {
        let out = self.gh(&["pr", "view", selector, "--json", "state"])?;
        let v: serde_json::Value =
            serde_json::from_str(&out).map_err(|e| SubprocessError::Io {
                program: "gh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
        Ok(v.get("state").and_then(|s| s.as_str()) == Some("MERGED"))
    }

    fn run_merge(&self, argv: &[String], cwd: &Path) -> Result<(bool, String), SubprocessError> {
        let Some((program, rest)) = argv.split_first() else {
            return Ok((false, "empty command".to_string()));
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();
        match run(program, &args, Some(cwd), self.timeout) {
            Ok(out) => Ok((true, out)),
            // Non-zero exit is a real refusal from gh, with its own message.
            Err(SubprocessError::Failed { stderr, .. }) => Ok((false, stderr)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_merge_reports_success_output() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = GhRemote::new(tmp.path(), 5);
        let argv: Vec<String> = ["echo", "merged ok"].iter().map(|s| s.to_string()).collect();
        let (ok, out) = remote.run_merge(&argv, tmp.path()).unwrap();
        assert!(ok);
        assert_eq!(out.trim(), "merged ok");
    }

    #[test]
    fn run_merge_reports_refusal_as_ok_false() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = GhRemote::new(tmp.path(), 5);
        let argv: Vec<String> = vec!["false".to_string()];
        let (ok, _) = remote.run_merge(&argv, tmp.path()).unwrap();
        assert!(!ok);
    }

    #[test]
    fn run_merge_missing_binary_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = GhRemote::new(tmp.path(), 5);
        let argv: Vec<String> = vec!["vard-no-such-binary".to_string()];
        let err = remote.run_merge(&argv, tmp.path()).unwrap_err();
        assert!(err.is_unknown());
    }
}

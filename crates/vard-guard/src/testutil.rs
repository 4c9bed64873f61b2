//! In-memory fakes for the registry and remote traits, plus an on-disk
//! fixture for the path rules that must see real directories.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use vard_worktree::registry::{TreeState, Worktree};
use vard_worktree::{PrRemote, SessionMarker, SubprocessError, WorktreeRegistry};

/// A repo root and worktrees directory on disk. Paths are canonicalized up
/// front so comparisons against canonicalized targets hold on platforms
/// where the temp dir is itself a symlink.
pub(crate) struct Fixture {
    _tmp: tempfile::TempDir,
    pub root: PathBuf,
    pub wt_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        let wt_root = root.join(".worktrees");
        std::fs::create_dir_all(&wt_root).unwrap();
        let root = root.canonicalize().unwrap();
        let wt_root = wt_root.canonicalize().unwrap();
        Fixture {
            _tmp: tmp,
            root,
            wt_root,
        }
    }

    /// Create a directory under the worktrees root and return its path.
    /// Registering it with the fake registry is the caller's choice.
    pub fn add_worktree_dir(&self, name: &str) -> PathBuf {
        let path = self.wt_root.join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// A real directory outside the repo entirely.
    pub fn elsewhere(&self) -> PathBuf {
        let path = self._tmp.path().join("elsewhere");
        std::fs::create_dir_all(&path).unwrap();
        path.canonicalize().unwrap()
    }

    pub fn registry(&self) -> FakeRegistry {
        FakeRegistry::new(self.root.clone())
    }
}

pub(crate) struct FakeRegistry {
    pub repo_root: PathBuf,
    pub entries: Vec<Worktree>,
    /// Branch per directory; lookup is by longest registered prefix, the
    /// way a real branch query behaves in a subdirectory.
    pub branches: HashMap<PathBuf, String>,
    pub states: HashMap<PathBuf, TreeState>,
    pub markers: HashMap<PathBuf, SessionMarker>,
    pub unreadable_markers: HashSet<PathBuf>,
    pub fail_listing: bool,
    pub removed: RefCell<Vec<PathBuf>>,
}

impl FakeRegistry {
    pub fn new(repo_root: PathBuf) -> Self {
        let mut branches = HashMap::new();
        branches.insert(repo_root.clone(), "main".to_string());
        let entries = vec![Worktree {
            path: repo_root.clone(),
            branch: Some("main".to_string()),
            locked: false,
            prunable: false,
            main: true,
        }];
        FakeRegistry {
            repo_root,
            entries,
            branches,
            states: HashMap::new(),
            markers: HashMap::new(),
            unreadable_markers: HashSet::new(),
            fail_listing: false,
            removed: RefCell::new(Vec::new()),
        }
    }

    pub fn add_worktree(&mut self, path: &Path, branch: &str, locked: bool) {
        self.entries.push(Worktree {
            path: path.to_path_buf(),
            branch: Some(branch.to_string()),
            locked,
            prunable: false,
            main: false,
        });
        self.branches.insert(path.to_path_buf(), branch.to_string());
    }

    pub fn set_branch(&mut self, path: &Path, branch: &str) {
        self.branches.insert(path.to_path_buf(), branch.to_string());
    }

    pub fn set_marker(&mut self, path: &Path, marker: SessionMarker) {
        self.markers.insert(path.to_path_buf(), marker);
    }

    pub fn set_marker_unreadable(&mut self, path: &Path) {
        self.unreadable_markers.insert(path.to_path_buf());
    }

    pub fn set_dirty(&mut self, path: &Path, lines: &[&str]) {
        let state = self.states.entry(path.to_path_buf()).or_default();
        state.dirty_lines = lines.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_last_commit_secs_ago(&mut self, path: &Path, secs: u64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let state = self.states.entry(path.to_path_buf()).or_default();
        state.last_commit_epoch = Some(now - secs);
    }

    fn timeout(program: &str) -> SubprocessError {
        SubprocessError::Timeout {
            program: program.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl WorktreeRegistry for FakeRegistry {
    fn worktrees(&self) -> Result<Vec<Worktree>, SubprocessError> {
        if self.fail_listing {
            return Err(Self::timeout("git"));
        }
        Ok(self.entries.clone())
    }

    fn tree_state(&self, path: &Path) -> Result<TreeState, SubprocessError> {
        Ok(self.states.get(path).cloned().unwrap_or_default())
    }

    fn current_branch(&self, path: &Path) -> Result<String, SubprocessError> {
        let best = self
            .branches
            .iter()
            .filter(|(dir, _)| path.starts_with(dir))
            .max_by_key(|(dir, _)| dir.components().count());
        match best {
            Some((_, branch)) => Ok(branch.clone()),
            None => Err(Self::timeout("git")),
        }
    }

    fn session_marker(&self, path: &Path) -> io::Result<Option<SessionMarker>> {
        if self.unreadable_markers.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "marker unreadable",
            ));
        }
        Ok(self.markers.get(path).cloned())
    }

    fn remove_worktree(&self, path: &Path, _force: bool) -> Result<(), SubprocessError> {
        self.removed.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn repo_root(&self) -> PathBuf {
        self.repo_root.clone()
    }
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    pub pr_branches: HashMap<u64, String>,
    /// Selectors the host answers "merged" for.
    pub merged_selectors: RefCell<HashSet<String>>,
    pub merge_ok: bool,
    pub refusal: Option<String>,
    pub fail_merge: bool,
    pub fail_lookup: bool,
    pub runs: RefCell<Vec<(Vec<String>, PathBuf)>>,
}

impl FakeRemote {
    fn timeout() -> SubprocessError {
        SubprocessError::Timeout {
            program: "gh".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PrRemote for FakeRemote {
    fn pr_branch(&self, number: u64) -> Result<Option<String>, SubprocessError> {
        if self.fail_lookup {
            return Err(Self::timeout());
        }
        Ok(self.pr_branches.get(&number).cloned())
    }

    fn pr_merged(&self, selector: &str) -> Result<bool, SubprocessError> {
        if self.fail_lookup {
            return Err(Self::timeout());
        }
        Ok(self.merged_selectors.borrow().contains(selector))
    }

    fn run_merge(
        &self,
        argv: &[String],
        cwd: &Path,
    ) -> Result<(bool, String), SubprocessError> {
        self.runs
            .borrow_mut()
            .push((argv.to_vec(), cwd.to_path_buf()));
        if self.fail_merge {
            return Err(Self::timeout());
        }
        if let Some(msg) = &self.refusal {
            return Ok((false, msg.clone()));
        }
        if self.merge_ok {
            Ok((true, "merged".to_string()))
        } else {
            Ok((false, "merge did not run".to_string()))
        }
    }
}

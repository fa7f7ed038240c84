use crate::errors::{GitcleanError, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Outcome of simulating a merge of a candidate branch into the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulation {
    /// The merge had nothing to commit: the branch content already exists on
    /// the target, typically via a squash-merge.
    Squashed,
    /// The merge produced conflicts or real changes.
    NotSquashed,
}

pub trait MergeSimulator {
    /// Probe whether merging `branch` into the current workspace would be a
    /// no-op. The tracked working tree must be identical before and after
    /// this call, for every outcome.
    fn simulate(&self, branch: &str) -> Result<Simulation>;
}

impl<S: MergeSimulator> MergeSimulator for &S {
    fn simulate(&self, branch: &str) -> Result<Simulation> {
        (**self).simulate(branch)
    }
}

pub struct GitMergeSimulator {
    workdir: PathBuf,
}

impl GitMergeSimulator {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    fn begin(&self, branch: &str) -> Result<bool> {
        let status = Command::new("git")
            .args(["merge", "--no-commit", "--no-ff", branch])
            .current_dir(&self.workdir)
            .env("GIT_MERGE_AUTOEDIT", "no")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| GitcleanError::MergeProbe {
                branch: branch.to_string(),
                message: format!("failed to execute git merge: {}", e),
            })?;
        Ok(status.success())
    }

    fn abort(&self, branch: &str) -> Result<()> {
        let output = Command::new("git")
            .args(["merge", "--abort"])
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| GitcleanError::MergeProbeAbort {
                branch: branch.to_string(),
                message: format!("failed to execute git merge --abort: {}", e),
            })?;
        if !output.status.success() {
            return Err(GitcleanError::MergeProbeAbort {
                branch: branch.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn merge_in_progress(&self) -> bool {
        Command::new("git")
            .args(["rev-parse", "-q", "--verify", "MERGE_HEAD"])
            .current_dir(&self.workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            // If git can't even tell us, assume the worst
            .unwrap_or(true)
    }
}

impl MergeSimulator for GitMergeSimulator {
    fn simulate(&self, branch: &str) -> Result<Simulation> {
        let merged_cleanly = self.begin(branch)?;
        if let Err(e) = self.abort(branch) {
            // Only a merge still in progress makes the workspace
            // inconsistent. Either exit of begin can end up here with
            // nothing to abort: a failed merge that never started, or an
            // "Already up to date" merge, which exits 0 without creating
            // any merge state.
            if self.merge_in_progress() {
                return Err(e);
            }
            log::debug!("Merge abort was a no-op for {}: {}", branch, e);
            if merged_cleanly {
                // Tip reachable from the checked-out HEAD, not squashed
                // into the target: keep the branch.
                return Ok(Simulation::NotSquashed);
            }
        }
        if merged_cleanly {
            Ok(Simulation::Squashed)
        } else {
            Ok(Simulation::NotSquashed)
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Begin(String),
    Abort(String),
}

#[cfg(test)]
pub struct MockMergeSimulator {
    pub outcomes: std::collections::HashMap<String, Simulation>,
    pub begin_failures: Vec<String>,
    pub abort_failures: Vec<String>,
    pub events: std::sync::Mutex<Vec<ProbeEvent>>,
}

#[cfg(test)]
impl MockMergeSimulator {
    pub fn new() -> Self {
        Self {
            outcomes: std::collections::HashMap::new(),
            begin_failures: Vec::new(),
            abort_failures: Vec::new(),
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_outcome(mut self, branch: &str, outcome: Simulation) -> Self {
        self.outcomes.insert(branch.to_string(), outcome);
        self
    }

    /// The probe command itself cannot run for this branch; no merge starts.
    pub fn with_begin_failure(mut self, branch: &str) -> Self {
        self.begin_failures.push(branch.to_string());
        self
    }

    /// The merge starts but the abort fails, leaving the workspace mid-merge.
    pub fn with_abort_failure(mut self, branch: &str) -> Self {
        self.abort_failures.push(branch.to_string());
        self
    }

    pub fn get_events(&self) -> Vec<ProbeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl MergeSimulator for MockMergeSimulator {
    fn simulate(&self, branch: &str) -> Result<Simulation> {
        if self.begin_failures.iter().any(|b| b == branch) {
            return Err(GitcleanError::MergeProbe {
                branch: branch.to_string(),
                message: "mock begin failure".to_string(),
            });
        }
        self.events
            .lock()
            .unwrap()
            .push(ProbeEvent::Begin(branch.to_string()));
        self.events
            .lock()
            .unwrap()
            .push(ProbeEvent::Abort(branch.to_string()));
        if self.abort_failures.iter().any(|b| b == branch) {
            return Err(GitcleanError::MergeProbeAbort {
                branch: branch.to_string(),
                message: "mock abort failure".to_string(),
            });
        }
        Ok(self
            .outcomes
            .get(branch)
            .copied()
            .unwrap_or(Simulation::NotSquashed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "--quiet"]);
        git(dir, &["checkout", "-b", "main"]);
        git(dir, &["config", "user.name", "test"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        fs::write(dir.join("a.txt"), "one\n").unwrap();
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "-m", "one"]);
    }

    fn workspace_is_clean(dir: &Path) -> bool {
        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(dir)
            .output()
            .unwrap();
        output.status.success() && output.stdout.is_empty()
    }

    #[test]
    fn test_up_to_date_branch_is_not_fatal() {
        // A branch already reachable from HEAD makes the merge exit 0 with
        // nothing to abort; that must classify as not-squashed, not as a
        // fatal abort failure
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        git(dir.path(), &["branch", "old"]);
        fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "two"]);

        let simulator = GitMergeSimulator::new(dir.path().to_path_buf());
        let result = simulator.simulate("old").unwrap();

        assert_eq!(result, Simulation::NotSquashed);
        assert!(workspace_is_clean(dir.path()));
    }

    #[test]
    fn test_content_identical_branch_is_squashed() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        git(dir.path(), &["checkout", "-b", "feat"]);
        fs::write(dir.path().join("f.txt"), "feature\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "feat"]);
        // The same content lands on main as a different commit
        git(dir.path(), &["checkout", "main"]);
        fs::write(dir.path().join("f.txt"), "feature\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "land feat"]);

        let simulator = GitMergeSimulator::new(dir.path().to_path_buf());
        let result = simulator.simulate("feat").unwrap();

        assert_eq!(result, Simulation::Squashed);
        assert!(workspace_is_clean(dir.path()));
    }

    #[test]
    fn test_conflicting_branch_is_not_squashed() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        git(dir.path(), &["checkout", "-b", "feat"]);
        fs::write(dir.path().join("a.txt"), "feature version\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "feat change"]);
        git(dir.path(), &["checkout", "main"]);
        fs::write(dir.path().join("a.txt"), "main version\n").unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-m", "main change"]);

        let simulator = GitMergeSimulator::new(dir.path().to_path_buf());
        let result = simulator.simulate("feat").unwrap();

        assert_eq!(result, Simulation::NotSquashed);
        assert!(workspace_is_clean(dir.path()));
    }
}

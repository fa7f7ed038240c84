use crate::errors::{GitcleanError, Result};
use crate::github::types::{PrStatus, PrView};
use std::process::Command;

pub trait GitHubCli {
    fn is_available(&self) -> Result<bool>;
    fn pr_status(&self, branch: &str) -> Result<PrStatus>;
}

impl<G: GitHubCli> GitHubCli for &G {
    fn is_available(&self) -> Result<bool> {
        (**self).is_available()
    }

    fn pr_status(&self, branch: &str) -> Result<PrStatus> {
        (**self).pr_status(branch)
    }
}

pub struct GitHubCliImpl;

impl GitHubCliImpl {
    pub fn new() -> Self {
        Self
    }

    fn run_command(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("gh")
            .args(args)
            .output()
            .map_err(|e| GitcleanError::GitHubCli(format!("Failed to execute gh command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitcleanError::GitHubCli(stderr.to_string()));
        }

        Ok(output)
    }
}

impl GitHubCli for GitHubCliImpl {
    fn is_available(&self) -> Result<bool> {
        match Command::new("gh").arg("--version").output() {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn pr_status(&self, branch: &str) -> Result<PrStatus> {
        log::debug!("Checking PR state for branch: {}", branch);

        // gh exits non-zero when the branch has no PR at all
        let output = match self.run_command(&["pr", "view", branch, "--json", "mergedAt,state"]) {
            Ok(output) => output,
            Err(GitcleanError::GitHubCli(error)) => {
                log::debug!("No PR found for {}: {}", branch, error.trim());
                return Ok(PrStatus::NotFound);
            }
            Err(e) => return Err(e),
        };

        let view: PrView = serde_json::from_slice(&output.stdout)?;
        let status = view.status();
        log::debug!("PR status for {}: {:?}", branch, status);

        Ok(status)
    }
}

#[cfg(test)]
pub struct MockGitHubCli {
    pub available: bool,
    pub statuses: std::collections::HashMap<String, PrStatus>,
    pub failing: Vec<String>,
    pub queries: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockGitHubCli {
    pub fn new() -> Self {
        Self {
            available: true,
            statuses: std::collections::HashMap::new(),
            failing: Vec::new(),
            queries: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(mut self, branch: &str, status: PrStatus) -> Self {
        self.statuses.insert(branch.to_string(), status);
        self
    }

    pub fn with_failing(mut self, branch: &str) -> Self {
        self.failing.push(branch.to_string());
        self
    }

    pub fn set_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn get_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl GitHubCli for MockGitHubCli {
    fn is_available(&self) -> Result<bool> {
        Ok(self.available)
    }

    fn pr_status(&self, branch: &str) -> Result<PrStatus> {
        self.queries.lock().unwrap().push(branch.to_string());
        if self.failing.iter().any(|b| b == branch) {
            return Err(GitcleanError::GitHubCli(format!(
                "mock failure for branch {}",
                branch
            )));
        }
        Ok(self
            .statuses
            .get(branch)
            .copied()
            .unwrap_or(PrStatus::NotFound))
    }
}

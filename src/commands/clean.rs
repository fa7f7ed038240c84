use crate::backup::backup_repository;
use crate::classifier::{Classification, Classifier};
use crate::errors::{GitcleanError, Result};
use crate::git::{Git, TargetRef, Vcs};
use crate::github::{GitHubCli, GitHubCliImpl};
use crate::probe::{GitMergeSimulator, MergeSimulator};
use clap::Args;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Args)]
pub struct Clean {
    /// Show what would be deleted, but do not delete anything
    #[arg(long)]
    pub dryrun: bool,

    /// Delete branches without asking for confirmation
    #[arg(long)]
    pub force: bool,

    /// Target branch to compare against
    #[arg(long, default_value = "origin/main")]
    pub target: String,
}

impl Clean {
    pub fn execute(&self, git: Git) -> Result<()> {
        let workdir = git.workdir()?;
        self.run(
            &git,
            GitHubCliImpl::new(),
            GitMergeSimulator::new(workdir),
            backup_repository,
            confirm,
        )
    }

    /// The whole phase sequence, parameterized over its collaborators so the
    /// destructive phases can be exercised with mocks.
    fn run<V, G, S, B, C>(
        &self,
        vcs: &V,
        github_cli: G,
        simulator: S,
        backup: B,
        confirm: C,
    ) -> Result<()>
    where
        V: Vcs,
        G: GitHubCli,
        S: MergeSimulator,
        B: Fn(&Path) -> Result<PathBuf>,
        C: Fn() -> Result<bool>,
    {
        preflight("git")?;
        if !github_cli.is_available()? {
            log::error!("🛑 'gh' CLI not found. Please install it and ensure it is in your PATH.");
            return Err(GitcleanError::MissingTool("gh"));
        }

        let target = TargetRef::parse(&self.target);

        log::info!(
            "🔄 Fetching latest changes for {} from {}...",
            target.branch,
            target.remote
        );
        if let Err(e) = vcs.fetch_target(&target) {
            log::warn!(
                "🛑 git fetch {} {} failed, continuing with local refs: {}",
                target.remote,
                target.branch,
                e
            );
        }

        log::debug!("Listing local branches...");
        let branches = vcs.local_branches(&target)?;
        log::debug!("Detected local branches: {:?}", branches);
        log::info!("{} local branches detected", branches.len());

        // Branches whose tip already landed on the target via an ordinary
        // or fast-forward merge; ancestry failures just mean "unknown" and
        // leave the branch to the remaining rules
        let mut merged = HashSet::new();
        for branch in &branches {
            match vcs.is_merged_into(branch, &target) {
                Ok(true) => {
                    merged.insert(branch.clone());
                }
                Ok(false) => {}
                Err(e) => log::debug!("Ancestry check failed for {}: {}", branch, e),
            }
        }

        log::debug!("Selecting candidate branches for deletion...");
        let classifier = Classifier::new(github_cli, simulator);
        let classifications = classifier.classify(&branches, &merged)?;

        let candidates: Vec<&Classification> = classifications
            .iter()
            .filter(|c| c.disposition.is_delete())
            .collect();

        let percent = if branches.is_empty() {
            None
        } else {
            Some(candidates.len() as f64 / branches.len() as f64 * 100.0)
        };

        log::info!("Branches that would be deleted ({}):", candidates.len());
        if let Some(percent) = percent {
            log::info!("{:.1}% of local branches are candidates for deletion", percent);
        }
        for candidate in &candidates {
            log::info!("- {} [{}]", candidate.branch, candidate.disposition.confidence());
        }

        if self.dryrun {
            log::info!("🧹 Dry run: no branches deleted.");
            return Ok(());
        }

        log::debug!("Backing up repository before deletion...");
        let backup_path = backup(&vcs.workdir()?).map_err(|e| {
            log::error!("🛑 Backup failed, aborting deletion.");
            e
        })?;
        log::info!("💾 Backup created at: {}", backup_path.display());
        log::info!("💾 A backup of your repository has been created before deletion.");

        if !self.force {
            if let Some(percent) = percent {
                log::info!("About to delete {:.1}% of local branches", percent);
            }
            if !confirm()? {
                log::info!("Aborted.");
                return Ok(());
            }
        }

        let mut deleted = 0;
        for candidate in &candidates {
            log::debug!("Deleting branch: {}", candidate.branch);
            match vcs.delete_branch(&candidate.branch) {
                Ok(()) => {
                    deleted += 1;
                    log::info!("🗑️ Deleted branch: {}", candidate.branch);
                }
                Err(e) => log::error!("🛑 Failed to delete branch {}: {}", candidate.branch, e),
            }
        }
        log::info!("Total branches deleted: {}", deleted);

        Ok(())
    }
}

fn preflight(tool: &'static str) -> Result<()> {
    let available = Command::new(tool)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if available {
        Ok(())
    } else {
        log::error!(
            "🛑 '{}' CLI not found. Please install it and ensure it is in your PATH.",
            tool
        );
        Err(GitcleanError::MissingTool(tool))
    }
}

fn confirm() -> Result<bool> {
    log::info!("Proceed with deletion? (y/N): ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

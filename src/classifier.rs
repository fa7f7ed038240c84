use crate::errors::{GitcleanError, Result};
use crate::github::{GitHubCli, PrStatus};
use crate::probe::{MergeSimulator, Simulation};
use std::collections::HashSet;

/// How a branch should be handled, one tier per branch per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// An open PR exists: skip, review state overrides local evidence.
    OpenPr,
    /// The branch's PR was merged on the remote.
    MergedPr,
    /// The branch tip is already reachable from the target.
    Merged,
    /// A simulated merge into the workspace was a no-op.
    Squashed,
    /// No conclusive evidence: keep the branch.
    Retained,
}

impl Disposition {
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Disposition::MergedPr | Disposition::Merged | Disposition::Squashed
        )
    }

    pub fn confidence(&self) -> &'static str {
        match self {
            Disposition::MergedPr => "🟢 high (merged PR)",
            Disposition::Merged => "🟢 high (merged)",
            Disposition::Squashed => "🟡 medium (squashed)",
            Disposition::OpenPr => "open PR",
            Disposition::Retained => "retained",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub branch: String,
    pub disposition: Disposition,
}

pub struct Classifier<G: GitHubCli, S: MergeSimulator> {
    pub github_cli: G,
    pub simulator: S,
}

impl<G: GitHubCli, S: MergeSimulator> Classifier<G, S> {
    pub fn new(github_cli: G, simulator: S) -> Self {
        Self {
            github_cli,
            simulator,
        }
    }

    /// Produce one disposition per branch, preserving input order.
    ///
    /// Evidence priority per branch: PR review state, then known ancestor
    /// merges (`merged`), then the merge simulation. Ambiguous evidence
    /// always resolves to `Retained`. A merge-abort failure aborts the whole
    /// classification, since the workspace can no longer be trusted.
    pub fn classify(
        &self,
        branches: &[String],
        merged: &HashSet<String>,
    ) -> Result<Vec<Classification>> {
        let mut classifications = Vec::with_capacity(branches.len());
        for branch in branches {
            let disposition = self.classify_branch(branch, merged)?;
            classifications.push(Classification {
                branch: branch.clone(),
                disposition,
            });
        }
        Ok(classifications)
    }

    fn classify_branch(&self, branch: &str, merged: &HashSet<String>) -> Result<Disposition> {
        match self.github_cli.pr_status(branch) {
            Ok(PrStatus::Merged) => {
                log::debug!("Branch {}: merged PR detected", branch);
                return Ok(Disposition::MergedPr);
            }
            Ok(PrStatus::Open) => {
                log::info!("Branch {}: open PR detected, skipping", branch);
                return Ok(Disposition::OpenPr);
            }
            Ok(PrStatus::NotFound) => {}
            Err(e) => {
                // Fall through to local evidence
                log::warn!("🛑 PR lookup failed for branch {}: {}", branch, e);
            }
        }

        if merged.contains(branch) {
            log::debug!("Branch {}: merged", branch);
            return Ok(Disposition::Merged);
        }

        log::debug!("Checking if branch {} is squashed...", branch);
        match self.simulator.simulate(branch) {
            Ok(Simulation::Squashed) => {
                log::debug!("Branch {}: squashed", branch);
                Ok(Disposition::Squashed)
            }
            Ok(Simulation::NotSquashed) => Ok(Disposition::Retained),
            Err(e @ GitcleanError::MergeProbeAbort { .. }) => Err(e),
            Err(e) => {
                log::warn!("🛑 Error checking if branch {} is squashed: {}", branch, e);
                Ok(Disposition::Retained)
            }
        }
    }
}

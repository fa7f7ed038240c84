use crate::errors::{GitcleanError, Result};
use auth_git2::GitAuthenticator;
use git2::{BranchType, Repository};
use std::fmt;
use std::path::PathBuf;

/// The branch everything is compared against: a remote name plus a bare
/// branch name. A bare input like `main` is coerced to `origin/main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    pub remote: String,
    pub branch: String,
}

impl TargetRef {
    pub fn parse(raw: &str) -> Self {
        let branch = raw.strip_prefix("origin/").unwrap_or(raw);
        TargetRef {
            remote: "origin".to_string(),
            branch: branch.to_string(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// The git operations the clean run sequences. `Git` is the real
/// implementation; the orchestrator is tested against a mock.
pub trait Vcs {
    fn workdir(&self) -> Result<PathBuf>;
    fn local_branches(&self, target: &TargetRef) -> Result<Vec<String>>;
    fn fetch_target(&self, target: &TargetRef) -> Result<()>;
    fn is_merged_into(&self, branch: &str, target: &TargetRef) -> Result<bool>;
    fn delete_branch(&self, name: &str) -> Result<()>;
}

pub struct Git {
    repository: Repository,
}

impl Git {
    pub fn open(path: &str) -> Result<Self> {
        let repository = Repository::discover(path)?;
        Ok(Git { repository })
    }
}

impl Vcs for Git {
    fn workdir(&self) -> Result<PathBuf> {
        self.repository
            .workdir()
            .map(PathBuf::from)
            .ok_or_else(|| GitcleanError::Listing("repository has no working tree".to_string()))
    }

    /// List local branch names, excluding any branch named like the target's
    /// bare name (that branch is never a deletion candidate).
    fn local_branches(&self, target: &TargetRef) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.repository.branches(Some(BranchType::Local))? {
            let (branch, _) = entry?;
            let name = branch
                .name()?
                .ok_or_else(|| GitcleanError::Listing("branch name is not valid UTF-8".to_string()))?;
            if name != target.branch {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Synchronize local knowledge of the target branch's remote tip.
    fn fetch_target(&self, target: &TargetRef) -> Result<()> {
        let mut remote = self.repository.find_remote(&target.remote)?;
        let auth = GitAuthenticator::new();
        let config = self.repository.config()?;
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(auth.credentials(&config));
        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(callbacks);
        remote.fetch(&[target.branch.as_str()], Some(&mut options), None)?;
        Ok(())
    }

    /// Whether the branch tip is already reachable from the target tip,
    /// i.e. the branch landed via an ordinary or fast-forward merge.
    ///
    /// Prefers the remote-tracking ref for the target, falling back to the
    /// local branch of the same name when the remote ref is absent.
    fn is_merged_into(&self, branch: &str, target: &TargetRef) -> Result<bool> {
        let branch_oid = self
            .repository
            .refname_to_id(&format!("refs/heads/{}", branch))?;
        let target_oid = self
            .repository
            .refname_to_id(&format!("refs/remotes/{}/{}", target.remote, target.branch))
            .or_else(|_| {
                self.repository
                    .refname_to_id(&format!("refs/heads/{}", target.branch))
            })?;
        if branch_oid == target_oid {
            return Ok(true);
        }
        Ok(self.repository.graph_descendant_of(target_oid, branch_oid)?)
    }

    /// Forcibly delete a local branch. Safety has already been vetted by
    /// classification; this succeeds regardless of merge status.
    fn delete_branch(&self, name: &str) -> Result<()> {
        let mut branch = self.repository.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }
}

#[cfg(test)]
pub struct MockVcs {
    pub branches: Vec<String>,
    pub merged: Vec<String>,
    pub workdir: PathBuf,
    pub failing_deletes: Vec<String>,
    pub fetches: std::sync::Mutex<Vec<String>>,
    pub listings: std::sync::atomic::AtomicUsize,
    pub deleted: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockVcs {
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            merged: Vec::new(),
            workdir: PathBuf::from("/unused"),
            failing_deletes: Vec::new(),
            fetches: std::sync::Mutex::new(Vec::new()),
            listings: std::sync::atomic::AtomicUsize::new(0),
            deleted: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_branches(mut self, branches: &[&str]) -> Self {
        self.branches = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_merged(mut self, branches: &[&str]) -> Self {
        self.merged = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_failing_delete(mut self, branch: &str) -> Self {
        self.failing_deletes.push(branch.to_string());
        self
    }

    pub fn get_fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn get_deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Vcs for MockVcs {
    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn local_branches(&self, _target: &TargetRef) -> Result<Vec<String>> {
        self.listings
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.branches.clone())
    }

    fn fetch_target(&self, target: &TargetRef) -> Result<()> {
        self.fetches.lock().unwrap().push(target.to_string());
        Ok(())
    }

    fn is_merged_into(&self, branch: &str, _target: &TargetRef) -> Result<bool> {
        Ok(self.merged.iter().any(|b| b == branch))
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        if self.failing_deletes.iter().any(|b| b == name) {
            return Err(git2::Error::from_str("mock deletion failure").into());
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::path::Path;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let signature = Signature::now("test", "test@example.com").unwrap();
            let tree_id = {
                let mut index = repo.index().unwrap();
                index.write_tree().unwrap()
            };
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])
                .unwrap();
        }
        repo
    }

    fn commit_on_head(repo: &Repository, message: &str) -> git2::Oid {
        let signature = Signature::now("test", "test@example.com").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.write_tree().unwrap()
        };
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().unwrap().peel_to_commit().unwrap();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .unwrap()
    }

    #[test]
    fn test_target_ref_coerces_bare_name() {
        let target = TargetRef::parse("main");
        assert_eq!(target.remote, "origin");
        assert_eq!(target.branch, "main");
        assert_eq!(target.to_string(), "origin/main");
    }

    #[test]
    fn test_target_ref_splits_qualified_name() {
        let target = TargetRef::parse("origin/develop");
        assert_eq!(target.remote, "origin");
        assert_eq!(target.branch, "develop");
        assert_eq!(target.to_string(), "origin/develop");
    }

    #[test]
    fn test_local_branches_excludes_target_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("trunk", &head, false).unwrap();
        repo.branch("feature-a", &head, false).unwrap();

        let git = Git::open(dir.path().to_str().unwrap()).unwrap();
        let branches = git
            .local_branches(&TargetRef::parse("origin/trunk"))
            .unwrap();

        assert!(branches.contains(&"feature-a".to_string()));
        assert!(!branches.contains(&"trunk".to_string()));
    }

    #[test]
    fn test_is_merged_into_same_tip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("trunk", &head, false).unwrap();
        repo.branch("feature-a", &head, false).unwrap();

        let git = Git::open(dir.path().to_str().unwrap()).unwrap();
        let merged = git
            .is_merged_into("feature-a", &TargetRef::parse("origin/trunk"))
            .unwrap();
        assert!(merged);
    }

    #[test]
    fn test_is_merged_into_ahead_of_target() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("trunk", &head, false).unwrap();
        // HEAD moves past trunk, and feature-b points at the newer commit
        let newer = commit_on_head(&repo, "second");
        let newer_commit = repo.find_commit(newer).unwrap();
        repo.branch("feature-b", &newer_commit, false).unwrap();

        let git = Git::open(dir.path().to_str().unwrap()).unwrap();
        let merged = git
            .is_merged_into("feature-b", &TargetRef::parse("origin/trunk"))
            .unwrap();
        assert!(!merged);
    }

    #[test]
    fn test_delete_branch_removes_ref() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("doomed", &head, false).unwrap();

        let git = Git::open(dir.path().to_str().unwrap()).unwrap();
        git.delete_branch("doomed").unwrap();
        assert!(repo.find_branch("doomed", BranchType::Local).is_err());
    }
}

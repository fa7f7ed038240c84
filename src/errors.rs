use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitcleanError {
    #[error("'{0}' CLI not found. Please install it and ensure it is in your PATH")]
    MissingTool(&'static str),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to list local branches: {0}")]
    Listing(String),

    #[error("GitHub CLI operation failed: {0}")]
    GitHubCli(String),

    #[error("Merge simulation failed for branch '{branch}': {message}")]
    MergeProbe { branch: String, message: String },

    #[error(
        "Merge abort failed for branch '{branch}': {message}. \
         The repository may be left mid-merge; run 'git merge --abort' to recover"
    )]
    MergeProbeAbort { branch: String, message: String },

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GitcleanError>;

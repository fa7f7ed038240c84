use serde::Deserialize;

/// Review state of the pull request associated with a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrStatus {
    NotFound,
    Open,
    Merged,
}

/// The subset of `gh pr view --json mergedAt,state` the classifier reads.
#[derive(Debug, Deserialize)]
pub struct PrView {
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<String>,
    pub state: String,
}

impl PrView {
    pub fn status(&self) -> PrStatus {
        if self.merged_at.is_some() {
            PrStatus::Merged
        } else if self.state == "OPEN" {
            PrStatus::Open
        } else {
            PrStatus::NotFound
        }
    }
}

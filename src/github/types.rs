use serde::Deserialize;

/// Prefix of every branch this tool creates.
pub const BRANCH_PREFIX: &str = "update-readme-";

/// Identifies the target repository for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The pull request under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
}

/// A single file changed by the pull request.
///
/// `patch` is `None` when GitHub returns no textual diff for the file
/// (binary files, pure renames, oversized diffs).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileChange {
    #[serde(rename = "filename")]
    pub path: String,
    #[serde(default)]
    pub patch: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, patch: Option<&str>) -> Self {
        Self {
            path: path.into(),
            patch: patch.map(str::to_string),
        }
    }
}

/// Decoded file content plus the blob sha GitHub requires on the next write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub decoded_text: String,
    /// Opaque optimistic-concurrency token. Must be passed unchanged to
    /// [`super::RepositoryWriter::update_file`].
    pub content_hash: String,
}

/// A branch created off the default branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub base_commit_hash: String,
}

/// Short description of a pull request, used both for listing and for the
/// PR under review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    pub head: GitRefName,
    pub base: GitRefName,
}

/// The `head`/`base` objects of a pull request payload; only the branch name is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitRefName {
    #[serde(rename = "ref")]
    pub name: String,
}

/// Result of writing a file through the contents API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub commit_sha: String,
    /// New blob sha of the written file.
    pub content_hash: String,
}

/// A write of new content to one file on one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub message: String,
    pub new_content: String,
    /// Sha returned by the read in the same run.
    pub expected_content_hash: String,
    pub branch: String,
}

/// Parameters of the pull request opened for the proposed README.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// The pull request opened by the publisher, as reported by GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestResult {
    pub number: u64,
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub url: String,
}

/// Derive the update branch name from the commit it starts at.
///
/// Uses the first seven characters of the hash, or the whole hash when shorter.
pub fn branch_name_for(base_commit_hash: &str) -> String {
    let short: String = base_commit_hash.chars().take(7).collect();
    format!("{BRANCH_PREFIX}{short}")
}

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::github::{
    branch_name_for, FileUpdate, GitHubError, NewPullRequest, PullRequestResult, RepositoryRef,
    RepositoryWriter,
};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Proposed README update based on recent code changes.";
pub const DEFAULT_PR_TITLE: &str = "Update README based on recent changes";
pub const DEFAULT_PR_BODY: &str = "This PR proposes an update to the README based on recent code changes from the previous pull request.";

/// The publisher step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    ReadDefaultBranch,
    CreateBranch,
    UpdateFile,
    CreatePullRequest,
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishStage::ReadDefaultBranch => write!(f, "reading the default branch head"),
            PublishStage::CreateBranch => write!(f, "creating the update branch"),
            PublishStage::UpdateFile => write!(f, "writing the README"),
            PublishStage::CreatePullRequest => write!(f, "opening the pull request"),
        }
    }
}

/// A failed publish. Nothing is rolled back: if the branch was already
/// created it stays on the remote and is named in `orphaned_branch`.
#[derive(Debug, Error)]
#[error("Publishing failed while {stage}: {source}")]
pub struct PublishError {
    pub stage: PublishStage,
    pub orphaned_branch: Option<String>,
    #[source]
    pub source: GitHubError,
}

/// Where and how the proposed README is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub default_branch: String,
    pub readme_path: String,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            readme_path: "README.md".to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            pr_title: DEFAULT_PR_TITLE.to_string(),
            pr_body: DEFAULT_PR_BODY.to_string(),
        }
    }
}

/// Branch off the default branch head, commit the new README there and open
/// a pull request back into the default branch.
///
/// `content_hash` must be the sha read in the same run; a stale value fails
/// with [`GitHubError::ContentHashMismatch`] and no pull request is opened.
#[instrument(skip_all, fields(repo = %repo, base = %options.default_branch))]
pub async fn publish(
    writer: &dyn RepositoryWriter,
    repo: &RepositoryRef,
    options: &PublishOptions,
    updated_readme: &str,
    content_hash: &str,
) -> Result<PullRequestResult, PublishError> {
    let head = writer
        .get_default_branch_head_commit(repo, &options.default_branch)
        .await
        .map_err(|e| fail(PublishStage::ReadDefaultBranch, None, e))?;

    let branch_name = branch_name_for(&head);
    info!(branch = %branch_name, "creating update branch");
    let branch = writer
        .create_branch(repo, &branch_name, &head)
        .await
        .map_err(|e| fail(PublishStage::CreateBranch, None, e))?;
    info!(branch = %branch.name, base_commit = %branch.base_commit_hash, "created update branch");

    let update = FileUpdate {
        path: options.readme_path.clone(),
        message: options.commit_message.clone(),
        new_content: updated_readme.to_string(),
        expected_content_hash: content_hash.to_string(),
        branch: branch.name.clone(),
    };
    let commit = writer
        .update_file(repo, &update)
        .await
        .map_err(|e| fail(PublishStage::UpdateFile, Some(&branch.name), e))?;
    info!(commit = %commit.commit_sha, path = %update.path, sha = %commit.content_hash, "committed README update");

    let request = NewPullRequest {
        title: options.pr_title.clone(),
        body: options.pr_body.clone(),
        head: branch.name.clone(),
        base: options.default_branch.clone(),
    };
    let pull_request = writer
        .create_pull_request(repo, &request)
        .await
        .map_err(|e| fail(PublishStage::CreatePullRequest, Some(&branch.name), e))?;
    info!(number = pull_request.number, url = %pull_request.url, "opened pull request");

    Ok(pull_request)
}

fn fail(stage: PublishStage, orphaned_branch: Option<&str>, source: GitHubError) -> PublishError {
    match source.status() {
        Some(status) => error!(%stage, status, error = %source, "publish step failed"),
        None => error!(%stage, error = %source, "publish step failed"),
    }
    if let Some(branch) = orphaned_branch {
        warn!(branch = %branch, "branch left on the remote; delete it manually before retrying");
    }
    PublishError {
        stage,
        orphaned_branch: orphaned_branch.map(str::to_string),
        source,
    }
}

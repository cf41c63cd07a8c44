pub mod types;

pub use types::{
    branch_name_for, BranchRef, CommitResult, FileChange, FileContent, FileUpdate,
    NewPullRequest, PullRequestRef, PullRequestResult, PullRequestSummary, RepositoryRef,
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{IntoUrl, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = "readme-updater";
const ACCEPT: &str = "application/vnd.github.v3+json";
const PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed with status {status}: {body}")]
    UpstreamRequestFailed { status: u16, body: String },

    #[error("No file content at '{path}' (missing file or directory)")]
    ContentMissing { path: String },

    #[error("Content of '{path}' is not readable text: {reason}")]
    ContentNotText { path: String, reason: String },

    #[error("Branch '{name}' already exists (status {status}: {body})")]
    BranchAlreadyExists {
        name: String,
        status: u16,
        body: String,
    },

    #[error("Content hash for '{path}' no longer matches the file on the target branch (status {status}: {body})")]
    ContentHashMismatch {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid GitHub API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("GitHub API transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GitHubError {
    /// HTTP status of a failed request, if the failure came from GitHub.
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::UpstreamRequestFailed { status, .. }
            | GitHubError::BranchAlreadyExists { status, .. }
            | GitHubError::ContentHashMismatch { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Read side of the hosting API.
#[async_trait]
pub trait RepositoryReader: Send + Sync {
    async fn list_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, GitHubError>;

    async fn get_pull_request(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<PullRequestSummary, GitHubError>;

    /// Every changed file, including those without a textual patch.
    async fn list_pull_request_files(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<FileChange>, GitHubError>;

    /// Commit messages in the order GitHub returns them.
    async fn list_commit_messages(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<String>, GitHubError>;

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, GitHubError>;
}

/// Write side of the hosting API. Every call mutates the remote repository.
#[async_trait]
pub trait RepositoryWriter: Send + Sync {
    async fn get_default_branch_head_commit(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<String, GitHubError>;

    /// Fails with [`GitHubError::BranchAlreadyExists`] on a name collision.
    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        name: &str,
        from_commit_hash: &str,
    ) -> Result<BranchRef, GitHubError>;

    /// Fails with [`GitHubError::ContentHashMismatch`] when the expected hash is stale.
    async fn update_file(
        &self,
        repo: &RepositoryRef,
        update: &FileUpdate,
    ) -> Result<CommitResult, GitHubError>;

    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestResult, GitHubError>;
}

/// Decode GitHub's base64 transport encoding into text.
///
/// GitHub wraps the encoded content at 60 columns, so whitespace is
/// stripped before decoding.
pub fn decode_content(path: &str, encoded: &str) -> Result<String, GitHubError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::ContentNotText {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| GitHubError::ContentNotText {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

pub fn encode_content(text: &str) -> String {
    general_purpose::STANDARD.encode(text.as_bytes())
}

/// Text of an error response, or the reason it could not be read.
pub(crate) fn error_body_text(body: Result<String, reqwest::Error>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable response body: {e}>"))
}

/// Body of `GET /repos/{owner}/{repo}/contents/{path}`.
///
/// A file comes back as an object, a directory as an array of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    File(ContentsFile),
    Listing(Vec<serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

fn file_content_from_payload(
    path: &str,
    payload: ContentsPayload,
) -> Result<FileContent, GitHubError> {
    let file = match payload {
        ContentsPayload::File(file) => file,
        ContentsPayload::Listing(_) => {
            return Err(GitHubError::ContentMissing {
                path: path.to_string(),
            })
        }
    };
    let encoded = file.content.ok_or_else(|| GitHubError::ContentMissing {
        path: path.to_string(),
    })?;
    Ok(FileContent {
        path: path.to_string(),
        decoded_text: decode_content(path, &encoded)?,
        content_hash: file.sha,
    })
}

/// Map a failed `POST /git/refs` onto the branch-collision error.
///
/// GitHub answers a duplicate ref with 422 "Reference already exists";
/// 409 is treated the same way.
fn classify_create_branch_failure(err: GitHubError, name: &str) -> GitHubError {
    match err {
        GitHubError::UpstreamRequestFailed { status, body }
            if status == 409
                || (status == 422 && body.to_ascii_lowercase().contains("already exists")) =>
        {
            GitHubError::BranchAlreadyExists {
                name: name.to_string(),
                status,
                body,
            }
        }
        other => other,
    }
}

/// Map a failed `PUT /contents` onto the stale-hash error.
fn classify_update_file_failure(err: GitHubError, path: &str) -> GitHubError {
    match err {
        GitHubError::UpstreamRequestFailed { status: 409, body } => {
            GitHubError::ContentHashMismatch {
                path: path.to_string(),
                status: 409,
                body,
            }
        }
        other => other,
    }
}

#[derive(Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: ShaObject,
}

#[derive(Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitRefResponse {
    object: ShaObject,
}

#[derive(Deserialize)]
struct UpdateFileResponse {
    content: ShaObject,
    commit: ShaObject,
}

#[derive(Deserialize)]
struct CreatedPullRequest {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    head: types::GitRefName,
    base: types::GitRefName,
}

/// reqwest-backed client for the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn repo_url(&self, repo: &RepositoryRef, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url,
            repo.owner,
            repo.name,
            rest.trim_start_matches('/')
        )
    }

    /// `/repos/{owner}/{repo}/contents/{path}` with every segment percent-encoded.
    fn contents_url(&self, repo: &RepositoryRef, path: &str) -> Result<Url, GitHubError> {
        let invalid = |reason: String| GitHubError::InvalidUrl {
            url: self.api_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str(), "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Request against the contents API, pinned to `git_ref` when given.
    fn contents_request(
        &self,
        method: Method,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<RequestBuilder, GitHubError> {
        let builder = self.request(method, self.contents_url(repo, path)?);
        Ok(match git_ref {
            Some(git_ref) => builder.query(&[("ref", git_ref)]),
            None => builder,
        })
    }

    fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", ACCEPT)
    }

    /// Send a request; non-2xx responses become `UpstreamRequestFailed`.
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, GitHubError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = error_body_text(response.text().await);
        debug!(status = status.as_u16(), body = %body, "GitHub API returned an error");
        Err(GitHubError::UpstreamRequestFailed {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        let response = self.execute(self.request(Method::GET, url)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Follow `page=` until a page comes back shorter than `PER_PAGE`.
    async fn get_paginated<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let builder = self
                .request(Method::GET, url)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch = self.execute(builder).await?.json::<Vec<T>>().await?;
            let fetched = batch.len();
            items.extend(batch);
            debug!(page, fetched, "fetched page");
            if fetched < PER_PAGE {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl RepositoryReader for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, GitHubError> {
        self.get_paginated(&self.repo_url(repo, "pulls")).await
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr.number))]
    async fn get_pull_request(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<PullRequestSummary, GitHubError> {
        self.get_json(&self.repo_url(repo, &format!("pulls/{}", pr.number)))
            .await
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr.number))]
    async fn list_pull_request_files(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<FileChange>, GitHubError> {
        let files: Vec<FileChange> = self
            .get_paginated(&self.repo_url(repo, &format!("pulls/{}/files", pr.number)))
            .await?;
        debug!(
            files = files.len(),
            with_patch = files.iter().filter(|f| f.patch.is_some()).count(),
            "received PR files"
        );
        Ok(files)
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr.number))]
    async fn list_commit_messages(
        &self,
        repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<String>, GitHubError> {
        let commits: Vec<CommitEntry> = self
            .get_paginated(&self.repo_url(repo, &format!("pulls/{}/commits", pr.number)))
            .await?;
        debug!(commits = commits.len(), "received PR commits");
        Ok(commits.into_iter().map(|c| c.commit.message).collect())
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, GitHubError> {
        let builder = self.contents_request(Method::GET, repo, path, git_ref)?;
        let payload = self
            .execute(builder)
            .await?
            .json::<ContentsPayload>()
            .await?;
        let content = file_content_from_payload(path, payload)?;
        debug!(bytes = content.decoded_text.len(), sha = %content.content_hash, "received file content");
        Ok(content)
    }
}

#[async_trait]
impl RepositoryWriter for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn get_default_branch_head_commit(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<String, GitHubError> {
        let response: BranchResponse = self
            .get_json(&self.repo_url(repo, &format!("branches/{branch}")))
            .await?;
        Ok(response.commit.sha)
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn create_branch(
        &self,
        repo: &RepositoryRef,
        name: &str,
        from_commit_hash: &str,
    ) -> Result<BranchRef, GitHubError> {
        let body = serde_json::json!({
            "ref": format!("refs/heads/{name}"),
            "sha": from_commit_hash,
        });
        let builder = self
            .request(Method::POST, &self.repo_url(repo, "git/refs"))
            .json(&body);
        let response = self
            .execute(builder)
            .await
            .map_err(|e| classify_create_branch_failure(e, name))?;
        let created: GitRefResponse = response.json().await?;
        Ok(BranchRef {
            name: name.to_string(),
            base_commit_hash: created.object.sha,
        })
    }

    #[instrument(skip(self, update), fields(repo = %repo, path = %update.path, branch = %update.branch))]
    async fn update_file(
        &self,
        repo: &RepositoryRef,
        update: &FileUpdate,
    ) -> Result<CommitResult, GitHubError> {
        let body = serde_json::json!({
            "message": update.message,
            "content": encode_content(&update.new_content),
            "sha": update.expected_content_hash,
            "branch": update.branch,
        });
        let builder = self
            .contents_request(Method::PUT, repo, &update.path, None)?
            .json(&body);
        let response = self
            .execute(builder)
            .await
            .map_err(|e| classify_update_file_failure(e, &update.path))?;
        let written: UpdateFileResponse = response.json().await?;
        Ok(CommitResult {
            commit_sha: written.commit.sha,
            content_hash: written.content.sha,
        })
    }

    #[instrument(skip(self, pull_request), fields(repo = %repo, head = %pull_request.head, base = %pull_request.base))]
    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestResult, GitHubError> {
        let body = serde_json::json!({
            "title": pull_request.title,
            "head": pull_request.head,
            "base": pull_request.base,
            "body": pull_request.body,
        });
        let builder = self
            .request(Method::POST, &self.repo_url(repo, "pulls"))
            .json(&body);
        let created: CreatedPullRequest = self.execute(builder).await?.json().await?;
        Ok(PullRequestResult {
            number: created.number,
            title: created.title,
            head: created.head.name,
            base: created.base.name,
            body: created.body.unwrap_or_default(),
            url: created.html_url,
        })
    }
}

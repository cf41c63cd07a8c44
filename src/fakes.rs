//! In-memory GitHub and completion doubles shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::{Completer, CompletionError};
use crate::github::types::GitRefName;
use crate::github::{
    BranchRef, CommitResult, FileChange, FileContent, FileUpdate, GitHubError, NewPullRequest,
    PullRequestRef, PullRequestResult, PullRequestSummary, RepositoryReader, RepositoryRef,
    RepositoryWriter,
};

pub struct FakeRepository {
    files: Vec<FileChange>,
    commits: Vec<String>,
    readme: Option<FileContent>,
    head: String,
    pull_request_failure: Option<u16>,
    remote_readme_hash: Option<String>,
    branches: Mutex<Vec<String>>,
    written: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self {
            files: vec![
                FileChange::new("src/config.rs", Some("@@ -0,0 +1 @@\n+pub fn load() {}")),
                FileChange::new("assets/logo.png", None),
            ],
            commits: vec!["Add config loader".to_string()],
            readme: Some(FileContent {
                path: "README.md".to_string(),
                decoded_text: "# Demo\n".to_string(),
                content_hash: "readme-sha-1".to_string(),
            }),
            head: "abcdef1234567890".to_string(),
            pull_request_failure: None,
            remote_readme_hash: None,
            branches: Mutex::new(vec!["main".to_string()]),
            written: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_head(mut self, head: &str) -> Self {
        self.head = head.to_string();
        self
    }

    pub fn with_existing_branch(self, name: &str) -> Self {
        self.branches.lock().unwrap().push(name.to_string());
        self
    }

    pub fn with_pull_request_failure(mut self, status: u16) -> Self {
        self.pull_request_failure = Some(status);
        self
    }

    /// Simulate someone else committing to the README after it was read.
    pub fn with_concurrent_readme_edit(mut self) -> Self {
        self.remote_readme_hash = Some("readme-sha-edited".to_string());
        self
    }

    pub fn with_files(mut self, files: Vec<FileChange>) -> Self {
        self.files = files;
        self
    }

    pub fn with_commits(mut self, commits: Vec<String>) -> Self {
        self.commits = commits;
        self
    }

    pub fn without_readme(mut self) -> Self {
        self.readme = None;
        self
    }

    pub fn readme_hash(&self) -> String {
        self.readme
            .as_ref()
            .map(|r| r.content_hash.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn branches(&self) -> Vec<String> {
        self.branches.lock().unwrap().clone()
    }

    pub fn written_readme(&self) -> Option<String> {
        self.written.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn summary(&self, number: u64) -> PullRequestSummary {
        PullRequestSummary {
            number,
            title: "Add config loader".to_string(),
            html_url: format!("https://github.com/org/repo/pull/{number}"),
            head: GitRefName {
                name: "feature/config".to_string(),
            },
            base: GitRefName {
                name: "main".to_string(),
            },
        }
    }
}

#[async_trait]
impl RepositoryReader for FakeRepository {
    async fn list_pull_requests(
        &self,
        _repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, GitHubError> {
        self.record("list_pull_requests".to_string());
        Ok(vec![self.summary(3)])
    }

    async fn get_pull_request(
        &self,
        _repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<PullRequestSummary, GitHubError> {
        self.record(format!("get_pull_request {}", pr.number));
        Ok(self.summary(pr.number))
    }

    async fn list_pull_request_files(
        &self,
        _repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<FileChange>, GitHubError> {
        self.record(format!("list_pull_request_files {}", pr.number));
        Ok(self.files.clone())
    }

    async fn list_commit_messages(
        &self,
        _repo: &RepositoryRef,
        pr: PullRequestRef,
    ) -> Result<Vec<String>, GitHubError> {
        self.record(format!("list_commit_messages {}", pr.number));
        Ok(self.commits.clone())
    }

    async fn get_file_content(
        &self,
        _repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, GitHubError> {
        self.record(format!(
            "get_file_content {path} @{}",
            git_ref.unwrap_or("<repository default>")
        ));
        self.readme
            .clone()
            .filter(|r| r.path == path)
            .ok_or_else(|| GitHubError::ContentMissing {
                path: path.to_string(),
            })
    }
}

#[async_trait]
impl RepositoryWriter for FakeRepository {
    async fn get_default_branch_head_commit(
        &self,
        _repo: &RepositoryRef,
        branch: &str,
    ) -> Result<String, GitHubError> {
        self.record(format!("get_default_branch_head_commit {branch}"));
        Ok(self.head.clone())
    }

    async fn create_branch(
        &self,
        _repo: &RepositoryRef,
        name: &str,
        from_commit_hash: &str,
    ) -> Result<BranchRef, GitHubError> {
        self.record(format!("create_branch {name} {from_commit_hash}"));
        let mut branches = self.branches.lock().unwrap();
        if branches.iter().any(|b| b == name) {
            return Err(GitHubError::BranchAlreadyExists {
                name: name.to_string(),
                status: 422,
                body: r#"{"message":"Reference already exists"}"#.to_string(),
            });
        }
        branches.push(name.to_string());
        Ok(BranchRef {
            name: name.to_string(),
            base_commit_hash: from_commit_hash.to_string(),
        })
    }

    async fn update_file(
        &self,
        _repo: &RepositoryRef,
        update: &FileUpdate,
    ) -> Result<CommitResult, GitHubError> {
        self.record(format!("update_file {} {}", update.path, update.branch));
        if !self.branches().contains(&update.branch) {
            return Err(GitHubError::UpstreamRequestFailed {
                status: 404,
                body: "Branch not found".to_string(),
            });
        }
        let current = self
            .remote_readme_hash
            .clone()
            .unwrap_or_else(|| self.readme_hash());
        if update.expected_content_hash != current {
            return Err(GitHubError::ContentHashMismatch {
                path: update.path.clone(),
                status: 409,
                body: format!(
                    r#"{{"message":"{} does not match {}"}}"#,
                    update.path, update.expected_content_hash
                ),
            });
        }
        *self.written.lock().unwrap() = Some(update.new_content.clone());
        Ok(CommitResult {
            commit_sha: "c0ffee0".to_string(),
            content_hash: "readme-sha-2".to_string(),
        })
    }

    async fn create_pull_request(
        &self,
        _repo: &RepositoryRef,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequestResult, GitHubError> {
        self.record(format!(
            "create_pull_request {} -> {}",
            pull_request.head, pull_request.base
        ));
        if let Some(status) = self.pull_request_failure {
            return Err(GitHubError::UpstreamRequestFailed {
                status,
                body: "Validation Failed".to_string(),
            });
        }
        Ok(PullRequestResult {
            number: 4,
            title: pull_request.title.clone(),
            head: pull_request.head.clone(),
            base: pull_request.base.clone(),
            body: pull_request.body.clone(),
            url: "https://github.com/org/repo/pull/4".to_string(),
        })
    }
}

pub struct FakeCompleter {
    answer: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeCompleter {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(system, user)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for FakeCompleter {
    async fn complete(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), user_prompt.to_string()));
        self.answer.clone().ok_or(CompletionError::EmptyResponse)
    }
}

use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

use crate::completion::Completer;
use crate::github::{GitHubError, PullRequestRef, PullRequestResult, RepositoryReader, RepositoryRef, RepositoryWriter};
use crate::prompt::{format_prompt, SYSTEM_INSTRUCTION};
use crate::publish::{publish, PublishError, PublishOptions};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to read pull request data: {0}")]
    Fetch(#[from] GitHubError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// How far the run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Fetch, ask the model, and open the pull request.
    #[default]
    Publish,
    /// Stop after the model answers; nothing is written to GitHub.
    DryRun,
    /// Stop after rendering the prompt; the model is not called.
    PromptOnly,
}

/// Everything one run needs to know about its target.
#[derive(Debug, Clone)]
pub struct Job {
    pub repo: RepositoryRef,
    pub pull_request: PullRequestRef,
    /// Ref the README is read from; `None` reads `publish.default_branch`,
    /// the branch the update is committed on top of.
    pub readme_ref: Option<String>,
    pub mode: RunMode,
    pub publish: PublishOptions,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    PromptOnly { prompt: String },
    DryRun { updated_readme: String },
    Published(PullRequestResult),
    /// The model call failed; the publisher was skipped.
    CompletionFailed { reason: String },
}

/// Fetch → format → complete → publish.
///
/// Read failures abort before any prompt is built. A completion failure is
/// logged and reported as [`RunOutcome::CompletionFailed`] without touching
/// the repository. Publisher failures propagate.
pub async fn run(
    reader: &dyn RepositoryReader,
    completer: &dyn Completer,
    writer: &dyn RepositoryWriter,
    job: &Job,
) -> Result<RunOutcome, WorkflowError> {
    let readme_path = job.publish.readme_path.as_str();
    let readme_ref = job
        .readme_ref
        .as_deref()
        .unwrap_or(job.publish.default_branch.as_str());

    let (readme, files, commits) = async {
        let pr = reader.get_pull_request(&job.repo, job.pull_request).await?;
        info!(number = pr.number, title = %pr.title, head = %pr.head.name, base = %pr.base.name, "reviewing pull request");

        let readme = reader
            .get_file_content(&job.repo, readme_path, Some(readme_ref))
            .await?;
        let files = reader
            .list_pull_request_files(&job.repo, job.pull_request)
            .await?;
        let commits = reader
            .list_commit_messages(&job.repo, job.pull_request)
            .await?;
        Ok::<_, GitHubError>((readme, files, commits))
    }
    .instrument(info_span!("fetch", repo = %job.repo, pr = job.pull_request.number))
    .await
    .map_err(|e| {
        error!(error = %e, "fetch stage failed");
        e
    })?;

    let skipped = files.iter().filter(|f| f.patch.is_none()).count();
    debug!(files = files.len(), skipped, commits = commits.len(), readme = %readme.path, readme_bytes = readme.decoded_text.len(), "fetched inputs");

    let prompt = format_prompt(&files, &readme.decoded_text, &commits);
    debug!(prompt_bytes = prompt.len(), "rendered prompt");

    if job.mode == RunMode::PromptOnly {
        return Ok(RunOutcome::PromptOnly { prompt });
    }

    let updated_readme = match completer
        .complete(SYSTEM_INSTRUCTION, &prompt)
        .instrument(info_span!("complete"))
        .await
    {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "completion failed; skipping publish");
            return Ok(RunOutcome::CompletionFailed {
                reason: e.to_string(),
            });
        }
    };
    info!(bytes = updated_readme.len(), "received proposed README");

    if job.mode == RunMode::DryRun {
        return Ok(RunOutcome::DryRun { updated_readme });
    }

    let pull_request = publish(
        writer,
        &job.repo,
        &job.publish,
        &updated_readme,
        &readme.content_hash,
    )
    .instrument(info_span!("publish"))
    .await?;

    Ok(RunOutcome::Published(pull_request))
}

mod completion;
mod config;
#[cfg(test)]
mod fakes;
mod github;
mod prompt;
mod publish;
mod report;
mod workflow;

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use crate::completion::OpenAiCompleter;
use crate::github::{GitHubClient, RepositoryReader};
use crate::workflow::{RunMode, RunOutcome};

/// README Updater — reads a GitHub Pull Request, asks an LLM whether the
/// README should change, and opens a pull request with the proposed update.
///
/// Repository, PR number and credentials come from `.readme-updater.toml`
/// and the environment (OWNER, REPO, PR_NUMBER, GITHUB_PAT, OPENAI_API_KEY).
#[derive(Parser, Debug)]
#[command(name = "readme-updater", version, about)]
struct Cli {
    /// Pull request number to review (overrides PR_NUMBER)
    #[arg(long)]
    pr: Option<u64>,

    /// Alternate configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result (prompt, proposed README or PR summary) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ask the model but do not create a branch or pull request
    #[arg(long, conflicts_with = "prompt_only")]
    dry_run: bool,

    /// Print the prompt and stop before calling the model
    #[arg(long)]
    prompt_only: bool,

    /// List open pull requests of the configured repository and exit
    #[arg(long, conflicts_with_all = ["dry_run", "prompt_only", "pr"])]
    list_pulls: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.prompt_only {
            RunMode::PromptOnly
        } else if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Publish
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(number) = cli.pr {
        config.github.pull_request = Some(number);
    }

    if cli.list_pulls {
        let access = config.github_access()?;
        let client = GitHubClient::new(&access.api_url, &access.token);
        let pulls = client.list_pull_requests(&access.repo).await?;
        info!(count = pulls.len(), repo = %access.repo, "listed pull requests");
        report::print_pull_requests(&pulls);
        return Ok(());
    }

    let settings = config.settings()?;
    let job = settings.job(cli.mode());
    let span = info_span!(
        "readme_update",
        repo = %job.repo,
        pr = job.pull_request.number,
        mode = ?job.mode
    );

    let github = GitHubClient::new(&settings.github.api_url, &settings.github.token);
    let completer = OpenAiCompleter::new(
        &settings.openai.api_url,
        &settings.openai.api_key,
        &settings.openai.model,
    );

    let outcome = workflow::run(&github, &completer, &github, &job)
        .instrument(span.clone())
        .await?;
    let _enter = span.enter();
    match &outcome {
        RunOutcome::CompletionFailed { reason } => {
            warn!(reason = %reason, "no README update proposed")
        }
        RunOutcome::Published(pr) => info!(number = pr.number, url = %pr.url, "done"),
        _ => info!("done"),
    }

    report::output(&outcome, cli.output.as_deref())?;
    Ok(())
}

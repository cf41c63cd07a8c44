use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::{PullRequestResult, PullRequestSummary};
use crate::workflow::RunOutcome;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write output file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Print the outcome to the terminal, or write it to `output_path`.
///
/// Prompt and README text are written verbatim; a published pull request
/// is written as a short Markdown summary.
#[instrument(skip(outcome), fields(kind = outcome_kind(outcome)))]
pub fn output(outcome: &RunOutcome, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing outcome to terminal");
            print_terminal(outcome);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing outcome to file");
            std::fs::write(path, render_file(outcome))?;
            Ok(())
        }
    }
}

fn outcome_kind(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::PromptOnly { .. } => "prompt",
        RunOutcome::DryRun { .. } => "dry-run",
        RunOutcome::Published(_) => "published",
        RunOutcome::CompletionFailed { .. } => "completion-failed",
    }
}

fn print_terminal(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::PromptOnly { prompt } => print!("{prompt}"),
        RunOutcome::DryRun { updated_readme } => {
            println!("{}", "═══ Proposed README (not published) ═══".bold());
            println!("{updated_readme}");
        }
        RunOutcome::Published(pr) => {
            println!();
            println!("{} #{}: \"{}\"", "Opened PR".green().bold(), pr.number, pr.title);
            println!("Branch: {} → {}", pr.head, pr.base);
            println!("{}", pr.url.underline());
            println!();
        }
        RunOutcome::CompletionFailed { reason } => {
            println!();
            println!("{} {}", "Completion failed:".red().bold(), reason);
            println!("No branch or pull request was created.");
            println!();
        }
    }
}

fn render_file(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::PromptOnly { prompt } => prompt.clone(),
        RunOutcome::DryRun { updated_readme } => updated_readme.clone(),
        RunOutcome::Published(pr) => render_pull_request_markdown(pr),
        RunOutcome::CompletionFailed { reason } => {
            format!("# README update skipped\n\nCompletion failed: {reason}\n")
        }
    }
}

fn render_pull_request_markdown(pr: &PullRequestResult) -> String {
    let mut md = String::new();
    md.push_str(&format!("# PR #{}: \"{}\"\n\n", pr.number, pr.title));
    md.push_str(&format!("**Branch:** `{}` → `{}`\n\n", pr.head, pr.base));
    md.push_str(&format!("{}\n\n", pr.url));
    if !pr.body.is_empty() {
        md.push_str(&pr.body);
        md.push('\n');
    }
    md
}

/// Print open pull requests, one per line.
pub fn print_pull_requests(pull_requests: &[PullRequestSummary]) {
    if pull_requests.is_empty() {
        println!("No open pull requests.");
        return;
    }
    for pr in pull_requests {
        println!(
            "{} {} ({} → {}) {}",
            format!("#{}", pr.number).bold(),
            pr.title,
            pr.head.name,
            pr.base.name,
            pr.html_url.dimmed()
        );
    }
}

use crate::github::FileChange;

/// System role message sent with every completion request.
pub const SYSTEM_INSTRUCTION: &str =
    "You are an AI trained to help with updating README files based on code changes.";

const HEADER: &str =
    "Please review the following code changes and commit messages from a GitHub pull request:\n";
const INSTRUCTION: &str = "Consider the code changes and commit messages, determine if the README needs to be updated. If so, edit the README, ensuring to maintain its existing style and clarity.\n";

/// Render the user prompt for the completion model.
///
/// Files without a patch are skipped silently. Output depends only on the
/// inputs, so identical inputs give byte-identical prompts.
pub fn format_prompt(diffs: &[FileChange], readme_text: &str, commit_messages: &[String]) -> String {
    let changes = diffs
        .iter()
        .filter_map(|file| {
            file.patch
                .as_deref()
                .map(|patch| format!("File: {}\nDiff: \n{}\n", file.path, patch))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let commits = commit_messages.join("\n");

    let mut prompt = String::with_capacity(
        HEADER.len() + INSTRUCTION.len() + changes.len() + commits.len() + readme_text.len() + 128,
    );
    prompt.push_str(HEADER);
    prompt.push_str("Code changes from Pull Request:\n");
    prompt.push_str(&changes);
    prompt.push('\n');
    prompt.push_str("Commit messages:\n");
    prompt.push_str(&commits);
    prompt.push_str("\n\n");
    prompt.push_str("Here is the current README file content:\n");
    prompt.push_str(readme_text);
    prompt.push('\n');
    prompt.push_str(INSTRUCTION);
    prompt.push_str("Updated README:\n");
    prompt
}

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::github::{PullRequestRef, RepositoryRef};
use crate::publish::PublishOptions;
use crate::workflow::{Job, RunMode};

pub const DEFAULT_CONFIG_FILE: &str = ".readme-updater.toml";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration as read from `.readme-updater.toml` and the environment.
///
/// Every field is optional here; [`Config::settings`] checks that the
/// required ones are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token. Overridden by GITHUB_PAT, then GITHUB_TOKEN.
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub pull_request: Option<u64>,
    pub default_branch: Option<String>,
    pub readme_path: Option<String>,
    /// Read the README at this ref instead of the default branch.
    pub readme_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    pub commit_message: Option<String>,
    pub pr_title: Option<String>,
    pub pr_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubAccess {
    pub api_url: String,
    pub token: String,
    pub repo: RepositoryRef,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub github: GitHubAccess,
    pub pull_request: PullRequestRef,
    pub readme_ref: Option<String>,
    pub publish: PublishOptions,
    pub openai: OpenAiSettings,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl Settings {
    pub fn job(&self, mode: RunMode) -> Job {
        Job {
            repo: self.github.repo.clone(),
            pull_request: self.pull_request,
            readme_ref: Some(
                self.readme_ref
                    .clone()
                    .unwrap_or_else(|| self.publish.default_branch.clone()),
            ),
            mode,
            publish: self.publish.clone(),
        }
    }
}

impl Config {
    /// Load from `path` (or `.readme-updater.toml` when `None`) and overlay
    /// the process environment.
    ///
    /// A missing default file yields the default config; an explicitly
    /// requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay environment values; a set variable wins over the file.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(token) = get("GITHUB_PAT").or_else(|| get("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(value) = get("GITHUB_API_URL") {
            self.github.api_url = Some(value);
        }
        if let Some(value) = get("OWNER") {
            self.github.owner = Some(value);
        }
        if let Some(value) = get("REPO") {
            self.github.repo = Some(value);
        }
        if let Some(value) = get("PR_NUMBER") {
            let number = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "PR_NUMBER",
                    value: value.clone(),
                })?;
            self.github.pull_request = Some(number);
        }
        if let Some(value) = get("DEFAULT_BRANCH") {
            self.github.default_branch = Some(value);
        }
        if let Some(value) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_API_URL") {
            self.openai.api_url = Some(value);
        }
        if let Some(value) = get("OPENAI_MODEL") {
            self.openai.model = Some(value);
        }
        Ok(())
    }

    /// Credentials and target repository; enough for read-only listing.
    pub fn github_access(&self) -> Result<GitHubAccess, ConfigError> {
        let github = &self.github;
        let token = github.token.clone().ok_or(ConfigError::Missing("github.token"))?;
        let owner = github.owner.clone().ok_or(ConfigError::Missing("github.owner"))?;
        let repo = github.repo.clone().ok_or(ConfigError::Missing("github.repo"))?;
        Ok(GitHubAccess {
            api_url: github
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            token,
            repo: RepositoryRef::new(owner, repo),
        })
    }

    /// Check required values and fill in defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let access = self.github_access()?;
        let number = self
            .github
            .pull_request
            .ok_or(ConfigError::Missing("github.pull_request"))?;
        if number == 0 {
            return Err(ConfigError::InvalidValue {
                key: "github.pull_request",
                value: number.to_string(),
            });
        }
        let api_key = self
            .openai
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("openai.api_key"))?;

        let defaults = PublishOptions::default();
        let publish = &self.publish;
        Ok(Settings {
            github: access,
            pull_request: PullRequestRef { number },
            readme_ref: self.github.readme_ref.clone(),
            publish: PublishOptions {
                default_branch: self
                    .github
                    .default_branch
                    .clone()
                    .unwrap_or(defaults.default_branch),
                readme_path: self
                    .github
                    .readme_path
                    .clone()
                    .unwrap_or(defaults.readme_path),
                commit_message: publish
                    .commit_message
                    .clone()
                    .unwrap_or(defaults.commit_message),
                pr_title: publish.pr_title.clone().unwrap_or(defaults.pr_title),
                pr_body: publish.pr_body.clone().unwrap_or(defaults.pr_body),
            },
            openai: OpenAiSettings {
                api_url: self
                    .openai
                    .api_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),
                api_key,
                model: self
                    .openai
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
        })
    }
}

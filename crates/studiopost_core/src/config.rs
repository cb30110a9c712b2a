use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "studiopost/0.1";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: usize = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_POSTS_DIR: &str = "_posts";
pub const DEFAULT_PUBLISH_LABEL: &str = "publish";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TABLE_OUTPUT: &str = "posts/posts.json";
pub const DEFAULT_MEDIA_ROOT: &str = "assets/media";
pub const DEFAULT_MEDIA_BASE_PATH: &str = "assets/media/";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StudioConfig {
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub issues: IssuesSection,
    #[serde(default)]
    pub table: TableSection,
    #[serde(default)]
    pub media: MediaSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct GitHubSection {
    /// `owner/name` of the repository whose issues become posts.
    pub repo: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub per_page: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IssuesSection {
    pub posts_dir: Option<String>,
    pub publish_label: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Only rows whose status is in the approved list are published.
    #[default]
    AllowList,
    /// Every row is published unless its status is in the rejected list.
    Permissive,
}

impl StatusPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowList => "allow_list",
            Self::Permissive => "permissive",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TableSection {
    pub data_dir: Option<String>,
    pub input_candidates: Option<Vec<String>>,
    pub output: Option<String>,
    pub status_policy: Option<StatusPolicy>,
    pub approved_statuses: Option<Vec<String>>,
    pub rejected_statuses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MediaSection {
    pub root: Option<String>,
    pub base_path: Option<String>,
    pub prefer_year_subfolder: Option<bool>,
}

/// Directories and files a run reads or writes, resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    pub posts_dir: PathBuf,
    pub data_dir: PathBuf,
    pub table_output: PathBuf,
    pub media_root: PathBuf,
}

impl StudioConfig {
    /// Resolve the repository: env GITHUB_REPO > config > None.
    pub fn github_repo_with_lookup<F>(&self, lookup_env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(lookup_env("GITHUB_REPO")).or_else(|| non_empty(self.github.repo.clone()))
    }

    /// Resolve the API base URL: env GITHUB_API_URL > config > DEFAULT_GITHUB_API_URL.
    pub fn github_api_url_with_lookup<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(lookup_env("GITHUB_API_URL"))
            .or_else(|| non_empty(self.github.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolve user agent: env STUDIOPOST_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent_with_lookup<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(lookup_env("STUDIOPOST_USER_AGENT"))
            .or_else(|| non_empty(self.github.user_agent.clone()))
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn per_page(&self) -> usize {
        self.github.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, 100)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.github.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn publish_label(&self) -> &str {
        self.issues
            .publish_label
            .as_deref()
            .unwrap_or(DEFAULT_PUBLISH_LABEL)
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.table.status_policy.unwrap_or_default()
    }

    pub fn approved_statuses(&self) -> Vec<String> {
        lowercase_list(self.table.approved_statuses.as_deref(), &["approved"])
    }

    pub fn rejected_statuses(&self) -> Vec<String> {
        lowercase_list(self.table.rejected_statuses.as_deref(), &["rejected"])
    }

    pub fn input_candidates(&self) -> Vec<String> {
        match &self.table.input_candidates {
            Some(candidates) if !candidates.is_empty() => candidates.clone(),
            _ => vec!["submissions.tsv".to_string(), "submissions.csv".to_string()],
        }
    }

    pub fn media_base_path(&self) -> &str {
        self.media
            .base_path
            .as_deref()
            .unwrap_or(DEFAULT_MEDIA_BASE_PATH)
    }

    pub fn prefer_year_subfolder(&self) -> bool {
        self.media.prefer_year_subfolder.unwrap_or(true)
    }

    pub fn layout(&self, project_root: &Path) -> SiteLayout {
        let resolve = |value: &Option<String>, default: &str| {
            let raw = value.as_deref().unwrap_or(default);
            let path = Path::new(raw);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                project_root.join(path)
            }
        };
        SiteLayout {
            posts_dir: resolve(&self.issues.posts_dir, DEFAULT_POSTS_DIR),
            data_dir: resolve(&self.table.data_dir, DEFAULT_DATA_DIR),
            table_output: resolve(&self.table.output, DEFAULT_TABLE_OUTPUT),
            media_root: resolve(&self.media.root, DEFAULT_MEDIA_ROOT),
        }
    }
}

/// Load and parse a StudioConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<StudioConfig> {
    if !config_path.exists() {
        return Ok(StudioConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: StudioConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn render_default_config() -> String {
    format!(
        "# studiopost configuration (materialized by `studiopost init`)\n# GITHUB_TOKEN is read from the environment only.\n\n[github]\n# repo = \"owner/name\"\napi_url = \"{DEFAULT_GITHUB_API_URL}\"\nuser_agent = \"{DEFAULT_USER_AGENT}\"\nper_page = {DEFAULT_PER_PAGE}\n\n[issues]\nposts_dir = \"{DEFAULT_POSTS_DIR}\"\npublish_label = \"{DEFAULT_PUBLISH_LABEL}\"\n\n[table]\ndata_dir = \"{DEFAULT_DATA_DIR}\"\ninput_candidates = [\"submissions.tsv\", \"submissions.csv\"]\noutput = \"{DEFAULT_TABLE_OUTPUT}\"\n# allow_list publishes approved rows only; permissive publishes all but rejected rows\nstatus_policy = \"allow_list\"\napproved_statuses = [\"approved\"]\nrejected_statuses = [\"rejected\"]\n\n[media]\nroot = \"{DEFAULT_MEDIA_ROOT}\"\nbase_path = \"{DEFAULT_MEDIA_BASE_PATH}\"\nprefer_year_subfolder = true\n"
    )
}

fn lowercase_list(values: Option<&[String]>, default: &[&str]) -> Vec<String> {
    match values {
        Some(values) => values
            .iter()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .collect(),
        None => default.iter().map(|value| value.to_string()).collect(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::StudioConfig;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Present when the listing entry is a pull request.
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels
            .iter()
            .any(|label| label.name().eq_ignore_ascii_case(name))
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IssueLabel {
    Named { name: String },
    Bare(String),
}

impl IssueLabel {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name } | Self::Bare(name) => name,
        }
    }
}

/// Read access to a repository's open issues, one page at a time.
pub trait IssueApi {
    fn open_issues_page(&mut self, page: usize, per_page: usize) -> Result<Vec<Issue>>;
    fn request_count(&self) -> usize;
}

/// Page through open issues until a short page signals the end of the listing.
pub fn collect_open_issues<A: IssueApi + ?Sized>(api: &mut A, per_page: usize) -> Result<Vec<Issue>> {
    let per_page = per_page.max(1);
    let mut issues = Vec::new();
    let mut page = 1usize;
    loop {
        let batch = api.open_issues_page(page, per_page)?;
        let exhausted = batch.len() < per_page;
        debug!(page, count = batch.len(), "fetched open issues page");
        issues.extend(batch);
        if exhausted {
            break;
        }
        page += 1;
    }
    Ok(issues)
}

/// Extract the issue carried by a webhook event payload, if any.
///
/// A missing file or a payload without an `issue` object yields `None`.
pub fn load_event_issue(path: &Path) -> Result<Option<Issue>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    parse_event_issue(&content)
        .with_context(|| format!("failed to parse event payload {}", path.display()))
}

pub fn parse_event_issue(content: &str) -> Result<Option<Issue>> {
    let payload: Value = serde_json::from_str(content).context("event payload is not JSON")?;
    match payload.get("issue") {
        Some(issue) if issue.is_object() => {
            let issue = serde_json::from_value(issue.clone())
                .context("event payload issue has an unexpected shape")?;
            Ok(Some(issue))
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_url: String,
    pub repository: String,
    pub token: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl GitHubClientConfig {
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        Self::from_config_with_lookup(config, |key| std::env::var(key).ok())
    }

    pub fn from_config_with_lookup<F>(config: &StudioConfig, lookup_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(repository) = config.github_repo_with_lookup(&lookup_env) else {
            bail!("GITHUB_REPO is not set (env or [github].repo in config)");
        };
        if !is_repository_slug(&repository) {
            bail!("GITHUB_REPO must look like owner/name, got {repository}");
        }
        let token = lookup_env("GITHUB_TOKEN")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GITHUB_TOKEN is not set"))?;

        Ok(Self {
            api_url: config.github_api_url_with_lookup(&lookup_env),
            repository,
            token,
            user_agent: config.user_agent_with_lookup(&lookup_env),
            timeout_ms: config.timeout_ms(),
        })
    }

    pub fn issues_url(&self) -> String {
        format!("{}/repos/{}/issues", self.api_url, self.repository)
    }
}

pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
    request_count: usize,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }
}

impl IssueApi for GitHubClient {
    fn open_issues_page(&mut self, page: usize, per_page: usize) -> Result<Vec<Issue>> {
        let url = Url::parse(&self.config.issues_url())
            .with_context(|| format!("invalid GitHub API URL: {}", self.config.api_url))?;
        let query = [
            ("state", "open".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];

        self.request_count += 1;
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.config.user_agent.clone())
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.config.token)
            .query(&query)
            .send()
            .context("failed to call GitHub issues API")?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "GitHub issues request for {} failed with HTTP {status}",
                self.config.repository
            );
        }
        response
            .json::<Vec<Issue>>()
            .context("failed to decode GitHub issues JSON response")
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn is_repository_slug(value: &str) -> bool {
    let mut parts = value.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use anyhow::bail;
    use tempfile::tempdir;

    use super::{
        GitHubClientConfig, Issue, IssueApi, IssueLabel, collect_open_issues, load_event_issue,
        parse_event_issue,
    };
    use crate::config::StudioConfig;

    struct PagedApi {
        total: usize,
        fail_on_page: Option<usize>,
        requested_pages: Vec<usize>,
    }

    impl IssueApi for PagedApi {
        fn open_issues_page(&mut self, page: usize, per_page: usize) -> anyhow::Result<Vec<Issue>> {
            self.requested_pages.push(page);
            if self.fail_on_page == Some(page) {
                bail!("simulated transport failure");
            }
            let start = (page - 1) * per_page;
            let end = (start + per_page).min(self.total);
            Ok((start..end)
                .map(|index| Issue {
                    number: index as u64 + 1,
                    title: format!("Issue {}", index + 1),
                    body: None,
                    labels: Vec::new(),
                    created_at: None,
                    pull_request: None,
                })
                .collect())
        }

        fn request_count(&self) -> usize {
            self.requested_pages.len()
        }
    }

    #[test]
    fn pagination_stops_on_short_page() {
        let mut api = PagedApi {
            total: 5,
            fail_on_page: None,
            requested_pages: Vec::new(),
        };
        let issues = collect_open_issues(&mut api, 2).expect("collect");
        assert_eq!(issues.len(), 5);
        assert_eq!(api.requested_pages, vec![1, 2, 3]);
        assert_eq!(issues.last().map(|issue| issue.number), Some(5));
    }

    #[test]
    fn pagination_requests_one_extra_page_on_exact_multiple() {
        let mut api = PagedApi {
            total: 4,
            fail_on_page: None,
            requested_pages: Vec::new(),
        };
        let issues = collect_open_issues(&mut api, 2).expect("collect");
        assert_eq!(issues.len(), 4);
        assert_eq!(api.request_count(), 3);
    }

    #[test]
    fn transport_failure_aborts_the_sweep() {
        let mut api = PagedApi {
            total: 10,
            fail_on_page: Some(2),
            requested_pages: Vec::new(),
        };
        let error = collect_open_issues(&mut api, 3).expect_err("must fail");
        assert!(error.to_string().contains("simulated transport failure"));
    }

    #[test]
    fn event_payload_with_issue_is_extracted() {
        let issue = parse_event_issue(
            r#"{"action":"opened","issue":{"number":42,"title":"Hi","body":"---\ntitle: x\n---\n","labels":[{"name":"Publish"}],"created_at":"2024-05-01T10:00:00Z"}}"#,
        )
        .expect("parse")
        .expect("issue present");
        assert_eq!(issue.number, 42);
        assert!(issue.has_label("publish"));
        assert_eq!(issue.labels, vec![IssueLabel::Named { name: "Publish".to_string() }]);
        assert!(!issue.is_pull_request());
    }

    #[test]
    fn event_payload_without_issue_yields_none() {
        assert!(parse_event_issue(r#"{"action":"push"}"#).expect("parse").is_none());
        assert!(parse_event_issue("not json").is_err());
    }

    #[test]
    fn missing_event_file_yields_none() {
        let temp = tempdir().expect("tempdir");
        assert!(
            load_event_issue(&temp.path().join("event.json"))
                .expect("load")
                .is_none()
        );
        let path = temp.path().join("payload.json");
        fs::write(&path, r#"{"issue":{"number":7,"labels":["publish"]}}"#).expect("write");
        let issue = load_event_issue(&path).expect("load").expect("issue");
        assert_eq!(issue.number, 7);
        assert!(issue.has_label("publish"));
    }

    #[test]
    fn client_config_requires_repository_and_token() {
        let config = StudioConfig::default();
        let error = GitHubClientConfig::from_config_with_lookup(&config, |_| None).expect_err("no repo");
        assert!(error.to_string().contains("GITHUB_REPO"));

        let env = HashMap::from([("GITHUB_REPO".to_string(), "studio/site".to_string())]);
        let error = GitHubClientConfig::from_config_with_lookup(&config, |key| env.get(key).cloned())
            .expect_err("no token");
        assert!(error.to_string().contains("GITHUB_TOKEN"));

        let env = HashMap::from([
            ("GITHUB_REPO".to_string(), "studio/site".to_string()),
            ("GITHUB_TOKEN".to_string(), "secret".to_string()),
        ]);
        let resolved = GitHubClientConfig::from_config_with_lookup(&config, |key| env.get(key).cloned())
            .expect("config");
        assert_eq!(resolved.issues_url(), "https://api.github.com/repos/studio/site/issues");
        assert_eq!(resolved.token, "secret");
    }

    #[test]
    fn client_config_rejects_malformed_repository() {
        let env = HashMap::from([
            ("GITHUB_REPO".to_string(), "just-a-name".to_string()),
            ("GITHUB_TOKEN".to_string(), "secret".to_string()),
        ]);
        let error = GitHubClientConfig::from_config_with_lookup(&StudioConfig::default(), |key| {
            env.get(key).cloned()
        })
        .expect_err("bad repo");
        assert!(error.to_string().contains("owner/name"));
    }
}

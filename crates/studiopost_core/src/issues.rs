use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::dates::{CALENDAR_DATE_FORMAT, format_timestamp, parse_timestamp, timestamp_or};
use crate::frontmatter::split_front_matter;
use crate::github::{Issue, IssueApi, collect_open_issues};
use crate::slug::slugify;

pub const POST_LAYOUT: &str = "post";
pub const POST_EXTENSION: &str = "md";

/// Produces the issues one run should consider.
pub trait IssueSource {
    fn name(&self) -> &'static str;
    fn candidate_issues(&mut self) -> Result<Vec<Issue>>;

    /// Network requests issued so far.
    fn requests(&self) -> usize {
        0
    }
}

/// The single issue delivered with a webhook event.
#[derive(Debug, Clone)]
pub struct EventIssueSource {
    issue: Option<Issue>,
}

impl EventIssueSource {
    pub fn new(issue: Issue) -> Self {
        Self { issue: Some(issue) }
    }
}

impl IssueSource for EventIssueSource {
    fn name(&self) -> &'static str {
        "event"
    }

    fn candidate_issues(&mut self) -> Result<Vec<Issue>> {
        Ok(self.issue.take().into_iter().collect())
    }
}

/// Every open issue of the repository, fetched page by page.
pub struct OpenIssueSweep<A: IssueApi> {
    api: A,
    per_page: usize,
}

impl<A: IssueApi> OpenIssueSweep<A> {
    pub fn new(api: A, per_page: usize) -> Self {
        Self { api, per_page }
    }
}

impl<A: IssueApi> IssueSource for OpenIssueSweep<A> {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn candidate_issues(&mut self) -> Result<Vec<Issue>> {
        collect_open_issues(&mut self.api, self.per_page)
    }

    fn requests(&self) -> usize {
        self.api.request_count()
    }
}

#[derive(Debug, Clone)]
pub struct IssuePipelineOptions {
    pub posts_dir: PathBuf,
    pub publish_label: String,
    pub write: bool,
}

/// Front matter written at the top of every generated post file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuePost {
    pub layout: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub caption: String,
    pub link: String,
    pub images: Vec<String>,
    pub date: String,
    pub published: bool,
    pub issue_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Create,
    Update,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    Written {
        number: u64,
        path: PathBuf,
        action: WriteAction,
        published: bool,
    },
    Skipped {
        number: u64,
        reason: String,
    },
}

impl IssueOutcome {
    pub fn describe(&self) -> String {
        match self {
            Self::Written {
                number,
                path,
                action,
                published,
            } => {
                let verb = match action {
                    WriteAction::Create => "Wrote",
                    WriteAction::Update => "Updated",
                    WriteAction::Unchanged => "Unchanged",
                };
                let state = if *published { "" } else { " (unpublished)" };
                format!("{verb} {} for issue #{number}{state}", path.display())
            }
            Self::Skipped { number, reason } => format!("Skipping issue #{number} ({reason})."),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueRunReport {
    pub source: String,
    pub requests: usize,
    pub outcomes: Vec<IssueOutcome>,
    pub published: usize,
    pub unpublished: usize,
    pub skipped: usize,
}

impl IssueRunReport {
    pub fn summary(&self) -> String {
        format!(
            "Published: {} | Unpublished: {} | Skipped: {}",
            self.published, self.unpublished, self.skipped
        )
    }
}

pub fn run_issue_pipeline(
    source: &mut dyn IssueSource,
    options: &IssuePipelineOptions,
) -> Result<IssueRunReport> {
    let issues = source.candidate_issues()?;
    let mut report = IssueRunReport {
        source: source.name().to_string(),
        ..IssueRunReport::default()
    };

    for issue in &issues {
        let outcome = process_issue(issue, options, Utc::now())?;
        match &outcome {
            IssueOutcome::Written { published: true, .. } => report.published += 1,
            IssueOutcome::Written { published: false, .. } => report.unpublished += 1,
            IssueOutcome::Skipped { .. } => report.skipped += 1,
        }
        report.outcomes.push(outcome);
    }
    report.requests = source.requests();
    Ok(report)
}

/// Turn one issue into a post file. `now` is the last-resort date.
pub fn process_issue(
    issue: &Issue,
    options: &IssuePipelineOptions,
    now: DateTime<Utc>,
) -> Result<IssueOutcome> {
    if issue.is_pull_request() {
        return Ok(skipped(issue, "pull request"));
    }

    let body = issue.body.as_deref().unwrap_or_default();
    let (block, content) = split_front_matter(body);
    let Some(block) = block.filter(|block| !block.trim().is_empty()) else {
        return Ok(skipped(issue, "no YAML front matter"));
    };

    let front_matter = match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => Mapping::new(),
        Ok(_) => {
            warn!(issue = issue.number, "front matter is not a mapping");
            return Ok(skipped(issue, "front matter is not a mapping"));
        }
        Err(error) => {
            warn!(issue = issue.number, %error, "front matter is not valid YAML");
            return Ok(skipped(issue, "front matter is not valid YAML"));
        }
    };

    let fallback_date = issue
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let post = build_issue_post(issue, &front_matter, &options.publish_label, fallback_date);
    let date = parse_timestamp(&post.date).unwrap_or(fallback_date);
    let rendered = render_post(&post, content)?;

    let existing = find_existing_post(&options.posts_dir, issue.number)?;
    let (path, action) = match existing {
        Some(path) => {
            let current = fs::read_to_string(&path).ok();
            let action = if current.as_deref() == Some(rendered.as_str()) {
                WriteAction::Unchanged
            } else {
                WriteAction::Update
            };
            (path, action)
        }
        None => (
            options
                .posts_dir
                .join(post_file_name(&date, &post.title, issue.number)),
            WriteAction::Create,
        ),
    };

    if options.write && action != WriteAction::Unchanged {
        fs::create_dir_all(&options.posts_dir)
            .with_context(|| format!("failed to create {}", options.posts_dir.display()))?;
        fs::write(&path, &rendered)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(issue = issue.number, path = %path.display(), "wrote post");
    }

    Ok(IssueOutcome::Written {
        number: issue.number,
        path,
        action,
        published: post.published,
    })
}

pub fn build_issue_post(
    issue: &Issue,
    front_matter: &Mapping,
    publish_label: &str,
    fallback_date: DateTime<Utc>,
) -> IssuePost {
    let text = |key: &str| field_text(front_matter, key).unwrap_or_default();

    let title = field_text(front_matter, "title")
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| issue.title.clone());
    let date = timestamp_or(&text("date"), fallback_date);
    let published_flag = match front_matter.get("published") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => scalar_text(other)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
    };

    IssuePost {
        layout: POST_LAYOUT.to_string(),
        title,
        author: text("author"),
        category: text("category"),
        caption: text("caption"),
        link: text("link"),
        images: image_list(front_matter.get("images")),
        date: format_timestamp(&date),
        published: published_flag || issue.has_label(publish_label),
        issue_number: issue.number,
    }
}

/// Render the post file: YAML front matter, blank line, trimmed body.
pub fn render_post(post: &IssuePost, content: &str) -> Result<String> {
    let front = serde_yaml::to_string(post).context("failed to serialize post front matter")?;
    Ok(format!("---\n{}\n---\n\n{}\n", front.trim(), content.trim()))
}

/// `<date>-<slug>-i<number>.md`
pub fn post_file_name(date: &DateTime<Utc>, title: &str, number: u64) -> String {
    format!(
        "{}-{}-i{number}.{POST_EXTENSION}",
        date.format(CALENDAR_DATE_FORMAT),
        slugify(title)
    )
}

/// Locate the post file already generated for `number`, if any.
pub fn find_existing_post(posts_dir: &Path, number: u64) -> Result<Option<PathBuf>> {
    if !posts_dir.is_dir() {
        return Ok(None);
    }
    let suffix = format!("-i{number}.{POST_EXTENSION}");
    let mut matches = Vec::new();
    for entry in fs::read_dir(posts_dir)
        .with_context(|| format!("failed to read {}", posts_dir.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read {}", posts_dir.display()))?;
        if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

fn skipped(issue: &Issue, reason: &str) -> IssueOutcome {
    IssueOutcome::Skipped {
        number: issue.number,
        reason: reason.to_string(),
    }
}

fn field_text(front_matter: &Mapping, key: &str) -> Option<String> {
    front_matter.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

fn image_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(scalar_text)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(other) => scalar_text(other)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .into_iter()
            .collect(),
        None => Vec::new(),
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StatusPolicy;
use crate::dates::{calendar_date, parse_calendar_date};
use crate::embed::classify_link;
use crate::media::{MediaResolver, MediaWarning, MediaWarningKind};
use crate::tags::derive_tags;

pub const COL_STATUS: &str = "Status";
pub const COL_TITLE: &str = "Post Title";
pub const COL_SUMMARY: &str = "Post Caption/Summary";
pub const COL_NICKNAME: &str = "Name/Nickname";
pub const COL_NAME: &str = "Name";
pub const COL_POST_TYPE: &str = "Post Type";
pub const COL_LINK: &str = "Link";
pub const COL_FILES: &str = "Upload Files!";
pub const COL_START_TIME: &str = "Start time";
pub const COL_COMPLETION_TIME: &str = "Completion time";

/// One data row of the submissions table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    /// 0-based position among data rows.
    pub position: usize,
    /// 1-based line in the source file where the row starts.
    pub line: usize,
    fields: HashMap<String, String>,
}

impl SubmissionRow {
    pub fn new(position: usize, line: usize, fields: &[(&str, &str)]) -> Self {
        let mut map = HashMap::new();
        for (header, value) in fields {
            map.entry(normalize_header(header))
                .or_insert_with(|| value.to_string());
        }
        Self {
            position,
            line,
            fields: map,
        }
    }

    /// Value of `column`, or `None` when the table has no such column.
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(&normalize_header(column)).map(String::as_str)
    }

    /// Trimmed value of `column`, empty when absent.
    pub fn text(&self, column: &str) -> &str {
        self.field(column).map(str::trim).unwrap_or_default()
    }
}

/// Header lookup key: lowercase ASCII letters and digits only.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Parse a tab- or comma-delimited table with a header row.
pub fn parse_submissions(content: &str) -> Result<Vec<SubmissionRow>> {
    let content = strip_bom(content);
    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .context("failed to read table header row")?
        .iter()
        .map(normalize_header)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read table row {}", index + 1))?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let mut fields = HashMap::new();
        for (column, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            fields
                .entry(header.clone())
                .or_insert_with(|| record.get(column).unwrap_or_default().to_string());
        }
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(index + 2);
        rows.push(SubmissionRow {
            position: rows.len(),
            line,
            fields,
        });
    }
    Ok(rows)
}

fn detect_delimiter(content: &str) -> u8 {
    let first = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    if first.contains('\t') { b'\t' } else { b',' }
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter {
    pub policy: StatusPolicy,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
}

impl StatusFilter {
    /// Whether a row with this status (or no status column) is published.
    pub fn admits(&self, status: Option<&str>) -> bool {
        let normalized = status.map(|value| value.trim().to_lowercase());
        match self.policy {
            StatusPolicy::AllowList => normalized
                .is_some_and(|value| self.approved.iter().any(|approved| *approved == value)),
            StatusPolicy::Permissive => normalized
                .is_none_or(|value| !self.rejected.iter().any(|rejected| *rejected == value)),
        }
    }
}

/// Post entry in the aggregate JSON document. Empty fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TablePost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl TablePost {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn media_count(&self) -> usize {
        usize::from(self.image.is_some()) + self.images.len()
    }
}

#[derive(Debug, Clone)]
pub struct BuiltPost {
    pub position: usize,
    pub date: Option<NaiveDate>,
    pub post: TablePost,
    pub warnings: Vec<MediaWarning>,
}

pub fn build_table_post(row: &SubmissionRow, resolver: &MediaResolver) -> BuiltPost {
    let raw_date = match row.text(COL_START_TIME) {
        "" => row.text(COL_COMPLETION_TIME),
        start => start,
    };
    let date_text = calendar_date(raw_date);
    let date = parse_calendar_date(&date_text);

    let link = classify_link(row.text(COL_LINK));
    let tags = derive_tags(row.text(COL_POST_TYPE), &link);
    let media = resolver.resolve_field(row.text(COL_FILES), date.map(|day| day.year()));

    let mut references = media
        .references
        .into_iter()
        .map(|reference| reference.into_string())
        .collect::<Vec<_>>();
    let (image, images) = if references.len() == 1 {
        (references.pop(), Vec::new())
    } else {
        (None, references)
    };

    let nickname = match row.text(COL_NICKNAME) {
        "" => row.text(COL_NAME),
        nickname => nickname,
    };

    let post = TablePost {
        title: non_empty(row.text(COL_TITLE)),
        date: non_empty(&date_text),
        summary: non_empty(row.text(COL_SUMMARY)),
        tags,
        image,
        images,
        embed: link.embed().map(ToString::to_string),
        link: link.link_out().map(ToString::to_string),
        caption: non_empty(nickname).map(|nickname| format!("Submitted by {nickname}")),
    };

    BuiltPost {
        position: row.position,
        date,
        post,
        warnings: media.warnings,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFeedback {
    Published { line: usize, parts: Vec<String> },
    Skipped { line: usize, reason: String },
}

impl RowFeedback {
    pub fn describe(&self) -> String {
        match self {
            Self::Published { line, parts } => format!("+ Row {line}: {}", parts.join(" | ")),
            Self::Skipped { line, reason } => format!("- Row {line}: SKIP ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub posts: Vec<BuiltPost>,
    pub feedback: Vec<RowFeedback>,
    pub published: usize,
    pub skipped: usize,
}

impl Assembly {
    pub fn into_posts(self) -> Vec<TablePost> {
        self.posts.into_iter().map(|built| built.post).collect()
    }
}

/// Filter, transform and order every row of the table.
pub fn assemble_posts(
    rows: &[SubmissionRow],
    filter: &StatusFilter,
    resolver: &MediaResolver,
) -> Assembly {
    let mut assembly = Assembly::default();

    for row in rows {
        let status = row.field(COL_STATUS);
        if !filter.admits(status) {
            let shown = status.map(str::trim).filter(|value| !value.is_empty());
            assembly.feedback.push(RowFeedback::Skipped {
                line: row.line,
                reason: format!(
                    "Status={} title=\"{}\"",
                    shown.unwrap_or("blank"),
                    row.text(COL_TITLE)
                ),
            });
            assembly.skipped += 1;
            continue;
        }

        let built = build_table_post(row, resolver);
        if built.post.is_empty() {
            assembly.feedback.push(RowFeedback::Skipped {
                line: row.line,
                reason: "empty row".to_string(),
            });
            assembly.skipped += 1;
            continue;
        }

        assembly.feedback.push(RowFeedback::Published {
            line: row.line,
            parts: feedback_parts(&built),
        });
        assembly.published += 1;
        assembly.posts.push(built);
    }

    sort_posts(&mut assembly.posts);
    assembly
}

/// Dated posts newest first, undated last; ties keep table order.
pub fn sort_posts(posts: &mut [BuiltPost]) {
    posts.sort_by(|left, right| {
        let by_date = match (left.date, right.date) {
            (Some(left), Some(right)) => right.cmp(&left),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then(left.position.cmp(&right.position))
    });
}

fn feedback_parts(built: &BuiltPost) -> Vec<String> {
    let post = &built.post;
    let mut parts = vec![
        if post.title.is_some() { "title" } else { "title?" }.to_string(),
        if post.date.is_some() { "date" } else { "date?" }.to_string(),
    ];
    if !post.tags.is_empty() {
        parts.push(format!("tags:{}", post.tags.join("|")));
    }
    match post.media_count() {
        0 => {}
        1 => parts.push("1 image".to_string()),
        count => parts.push(format!("{count} images")),
    }
    if post.embed.is_some() {
        parts.push("embed".to_string());
    }
    if post.link.is_some() {
        parts.push("link".to_string());
    }
    if post.media_count() == 0 && post.embed.is_none() && post.link.is_none() {
        parts.push("(no media)".to_string());
    }
    if built
        .warnings
        .iter()
        .any(|warning| warning.kind == MediaWarningKind::CloudStorage)
    {
        parts.push("! SharePoint/OneDrive URL (not public)".to_string());
    }
    let missing = built
        .warnings
        .iter()
        .filter(|warning| warning.kind == MediaWarningKind::NotFound)
        .count();
    if missing > 0 {
        parts.push(format!("! {missing} media not found locally"));
    }
    parts
}

#[derive(Debug, Clone)]
pub struct TablePipelineOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub filter: StatusFilter,
    pub resolver: MediaResolver,
    pub write: bool,
}

#[derive(Debug, Clone)]
pub struct TableRunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub feedback: Vec<RowFeedback>,
    pub posts: Vec<TablePost>,
    pub published: usize,
    pub skipped: usize,
}

impl TableRunReport {
    pub fn summary(&self) -> String {
        format!("Published: {} | Skipped: {}", self.published, self.skipped)
    }
}

/// First existing input file: the explicit path, else a candidate under `data_dir`.
pub fn locate_input(
    explicit: Option<&Path>,
    data_dir: &Path,
    candidates: &[String],
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("Missing submissions table: {}", path.display());
    }
    for candidate in candidates {
        let path = data_dir.join(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }
    bail!(
        "Missing submissions table: none of {} found under {}",
        candidates.join(" or "),
        data_dir.display()
    );
}

pub fn render_posts_json(posts: &[TablePost]) -> Result<String> {
    let rendered = serde_json::to_string_pretty(posts).context("failed to serialize posts JSON")?;
    Ok(format!("{rendered}\n"))
}

pub fn run_table_pipeline(options: &TablePipelineOptions) -> Result<TableRunReport> {
    let content = fs::read_to_string(&options.input)
        .with_context(|| format!("failed to read {}", options.input.display()))?;
    let rows = parse_submissions(&content)
        .with_context(|| format!("failed to parse {}", options.input.display()))?;

    let assembly = assemble_posts(&rows, &options.filter, &options.resolver);
    let feedback = assembly.feedback.clone();
    let (published, skipped) = (assembly.published, assembly.skipped);
    let posts = assembly.into_posts();

    if options.write {
        let rendered = render_posts_json(&posts)?;
        if let Some(parent) = options.output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&options.output, rendered)
            .with_context(|| format!("failed to write {}", options.output.display()))?;
        info!(path = %options.output.display(), posts = posts.len(), "wrote posts document");
    }

    Ok(TableRunReport {
        input: options.input.clone(),
        output: options.output.clone(),
        feedback,
        posts,
        published,
        skipped,
    })
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::warn;
use walkdir::WalkDir;

const CLOUD_STORAGE_HOSTS: &[&str] = &["sharepoint.com", "onedrive.live.com", "onedrive.com", "1drv.ms"];

/// Split a multi-value field on commas, semicolons and newlines.
pub fn split_multi(value: &str) -> Vec<String> {
    value
        .split([',', ';', '\n', '\r'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Path under the site's published media base path.
    Local(String),
    /// Original token, kept because no local file matched.
    External(String),
}

impl MediaRef {
    pub fn into_string(self) -> String {
        match self {
            Self::Local(value) | Self::External(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaWarningKind {
    CloudStorage,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaWarning {
    pub token: String,
    pub kind: MediaWarningKind,
}

impl MediaWarning {
    pub fn message(&self) -> String {
        match self.kind {
            MediaWarningKind::CloudStorage => format!(
                "{} points at SharePoint/OneDrive storage and is unlikely to be public",
                self.token
            ),
            MediaWarningKind::NotFound => {
                format!("{} was not found under the media root; kept as-is", self.token)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedMedia {
    pub references: Vec<MediaRef>,
    pub warnings: Vec<MediaWarning>,
}

#[derive(Debug, Clone)]
pub struct MediaResolver {
    root: PathBuf,
    base_path: String,
    prefer_year_subfolder: bool,
}

impl MediaResolver {
    pub fn new(root: impl Into<PathBuf>, base_path: &str, prefer_year_subfolder: bool) -> Self {
        let trimmed = base_path.trim().trim_end_matches('/');
        // An empty prefix publishes paths relative to the site root.
        let base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
        Self {
            root: root.into(),
            base_path,
            prefer_year_subfolder,
        }
    }

    /// Resolve every token of a multi-value media field, in order.
    pub fn resolve_field(&self, field: &str, year: Option<i32>) -> ResolvedMedia {
        let mut resolved = ResolvedMedia::default();
        for token in split_multi(field) {
            match self.resolve(&token, year) {
                Ok(reference) => resolved.references.push(reference),
                Err(warning) => {
                    warn!(token = %warning.token, "{}", warning.message());
                    resolved
                        .references
                        .push(MediaRef::External(warning.token.clone()));
                    resolved.warnings.push(warning);
                }
            }
        }
        resolved
    }

    /// Map a single token to a published local path. On failure the warning
    /// carries the original token so callers can keep it.
    pub fn resolve(&self, token: &str, year: Option<i32>) -> Result<MediaRef, MediaWarning> {
        if !self.base_path.is_empty() && token.starts_with(&self.base_path) {
            return Ok(MediaRef::Local(token.to_string()));
        }

        let name = file_name_from_token(token);
        if is_plain_file_name(&name)
            && let Some(relative) = self.find_local(&name, year)
        {
            return Ok(MediaRef::Local(format!("{}{relative}", self.base_path)));
        }

        Err(MediaWarning {
            token: token.to_string(),
            kind: if is_cloud_storage_url(token) {
                MediaWarningKind::CloudStorage
            } else {
                MediaWarningKind::NotFound
            },
        })
    }

    fn find_local(&self, name: &str, year: Option<i32>) -> Option<String> {
        if self.prefer_year_subfolder
            && let Some(year) = year
        {
            let folder = year.to_string();
            if self.root.join(&folder).join(name).is_file() {
                return Some(format!("{folder}/{name}"));
            }
        }

        if self.root.join(name).is_file() {
            return Some(name.to_string());
        }

        self.search_case_insensitive(name)
    }

    fn search_case_insensitive(&self, name: &str) -> Option<String> {
        if !self.root.is_dir() {
            return None;
        }
        let wanted = name.to_lowercase();
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
            .and_then(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(normalize_relative)
            })
    }
}

/// Final path segment of a URL or path, without query or fragment, decoded.
pub fn file_name_from_token(token: &str) -> String {
    let without_fragment = token.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    let segment = without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

pub fn is_cloud_storage_url(token: &str) -> bool {
    let lowered = token.to_ascii_lowercase();
    CLOUD_STORAGE_HOSTS.iter().any(|host| lowered.contains(host))
}

/// A decoded name must stay a single component under the media root.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !Path::new(name).is_absolute()
}

fn normalize_relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The feed contained records that cannot be indexed. Nothing was built.
    #[error("invalid document feed: {}", render_issues(.0))]
    InvalidDocument(Vec<DocumentIssue>),
    #[error("no index has been built yet")]
    EmptyIndex,
    #[error("index build was cancelled by a newer rebuild")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("malformed feed: {0}")]
    Feed(String),
    #[error("malformed feed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single feed record was rejected. Indices are positions in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIssue {
    #[error("record #{index} ({title:?}) has an empty location")]
    EmptyLocation { index: usize, title: String },
    #[error("location {location:?} is used by record #{first} ({first_title:?}) and record #{second} ({second_title:?})")]
    DuplicateLocation {
        location: String,
        first: usize,
        first_title: String,
        second: usize,
        second_title: String,
    },
    #[error("record #{index} at {location:?} has unknown category {label:?}")]
    UnknownCategory { index: usize, location: String, label: String },
}

fn render_issues(issues: &[DocumentIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SearchError {
    pub fn issues(&self) -> &[DocumentIssue] {
        match self {
            SearchError::InvalidDocument(issues) => issues,
            _ => &[],
        }
    }
}

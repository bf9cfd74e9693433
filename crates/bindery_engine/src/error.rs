use std::fmt;

use thiserror::Error;

use crate::FetchError;

/// Stable classification of a per-article problem, used in the failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FetchFailed,
    NoArticleRoot,
    PaginationLoop,
    InvalidUrl,
    Markup,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::FetchFailed => "FetchFailed",
            ErrorKind::NoArticleRoot => "NoArticleRoot",
            ErrorKind::PaginationLoop => "PaginationLoop",
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::Markup => "Markup",
        };
        f.write_str(name)
    }
}

/// Failure to turn one URL into an article (or one page into a fragment).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("no article root found in {url}")]
    NoArticleRoot { url: String },
    #[error("pagination of {url} exceeded {max_pages} pages")]
    PaginationLoop { url: String, max_pages: usize },
    #[error("invalid article url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to rewrite markup of {url}: {message}")]
    Markup { url: String, message: String },
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::FetchFailed { .. } => ErrorKind::FetchFailed,
            ExtractionError::NoArticleRoot { .. } => ErrorKind::NoArticleRoot,
            ExtractionError::PaginationLoop { .. } => ErrorKind::PaginationLoop,
            ExtractionError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            ExtractionError::Markup { .. } => ErrorKind::Markup,
        }
    }

    /// The URL the error is about.
    pub fn url(&self) -> &str {
        match self {
            ExtractionError::FetchFailed { url, .. }
            | ExtractionError::NoArticleRoot { url }
            | ExtractionError::PaginationLoop { url, .. }
            | ExtractionError::InvalidUrl { url, .. }
            | ExtractionError::Markup { url, .. } => url,
        }
    }
}

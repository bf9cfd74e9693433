use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::article::Article;
use crate::classify::Classifier;
use crate::epub::{ArchiveMetadata, AssemblyError, EpubArchive};
use crate::filename::book_identifier;
use crate::images::ImageHarvester;
use crate::normalize::Normalizer;
use crate::paginate::PaginationStitcher;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::rules::{RulesError, SiteRules};
use crate::{ErrorKind, ExtractionError, Fetcher};

/// Where and under which title the archive is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub dir: PathBuf,
    pub filename: String,
    pub title: String,
}

/// What happened to the article a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The article is not in the archive.
    Skipped,
    /// The article is in the archive with only its first `pages_kept` pages.
    Partial { pages_kept: usize },
    /// The article is in the archive without this image.
    ImageDropped { article_url: String },
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Skipped => write!(f, "article skipped"),
            Disposition::Partial { pages_kept } => write!(f, "kept {pages_kept} page(s)"),
            Disposition::ImageDropped { article_url } => write!(f, "image dropped from {article_url}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    /// The offending URL: the article, the failed page or the failed image.
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub archive_path: PathBuf,
    pub attempted: usize,
    pub chapters: usize,
    pub images: usize,
    pub failures: Vec<FailureEntry>,
    /// The run was interrupted; the archive holds the articles finished before it.
    pub cancelled: bool,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no article could be extracted ({} failure(s))", failures.len())]
    EmptyArchive { failures: Vec<FailureEntry> },
    #[error("failed to assemble archive: {0}")]
    Assembly(#[source] AssemblyError),
    #[error("failed to write archive: {0}")]
    Persist(#[from] PersistError),
}

impl RunError {
    pub fn failures(&self) -> &[FailureEntry] {
        match self {
            RunError::EmptyArchive { failures } => failures,
            _ => &[],
        }
    }
}

/// A finished article plus the recoverable problems met while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub article: Article,
    pub failures: Vec<FailureEntry>,
}

/// Sequential driver: one article at a time, one request at a time.
pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    classifier: Classifier,
    normalizer: Normalizer,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, rules: SiteRules) -> Result<Self, RulesError> {
        let normalizer = Normalizer::from_rules(&rules);
        let classifier = Classifier::new(rules)?;
        Ok(Self {
            fetcher,
            classifier,
            normalizer,
        })
    }

    pub fn rules(&self) -> &SiteRules {
        self.classifier.rules()
    }

    /// Stitch, harvest and normalize one article. `ordinal` (1-based) keeps
    /// image names of different articles apart.
    pub async fn extract_article(
        &self,
        url: &str,
        ordinal: usize,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let collected = PaginationStitcher::new(self.fetcher, &self.classifier)
            .collect(url)
            .await?;
        let mut failures = Vec::new();
        let mut article = collected.article;
        if let Some(failure) = collected.page_failure {
            failures.push(FailureEntry {
                url: failure.url,
                kind: failure.error.kind(),
                message: failure.error.to_string(),
                disposition: Disposition::Partial {
                    pages_kept: article.page_count(),
                },
            });
        }

        let base = Url::parse(&article.source_url).map_err(|err| ExtractionError::InvalidUrl {
            url: article.source_url.clone(),
            message: err.to_string(),
        })?;
        let prefix = format!("a{ordinal:03}");
        let harvested = ImageHarvester::new(self.fetcher, &self.rules().image_attributes)
            .harvest(std::mem::take(&mut article.fragments), &base, &prefix)
            .await?;
        for image in harvested.failed_images() {
            failures.push(FailureEntry {
                url: image.original_url.clone(),
                kind: ErrorKind::FetchFailed,
                message: "image could not be fetched".to_string(),
                disposition: Disposition::ImageDropped {
                    article_url: article.source_url.clone(),
                },
            });
        }
        article.fragments = harvested.fragments;
        article.images = harvested.images;

        Ok(ExtractedArticle {
            article: self.normalizer.normalize(article),
            failures,
        })
    }

    /// Process `urls` in order and write one archive.
    ///
    /// Per-article failures land in the report; the run only fails when no
    /// article survives or the archive cannot be written. Cancellation stops
    /// the run before the next article, discarding the one in flight.
    pub async fn run<I>(
        &self,
        urls: I,
        output: &OutputDescriptor,
        max_articles: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut articles = Vec::new();
        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        let mut attempted = 0;
        let mut cancelled = false;

        for url in urls {
            if max_articles.is_some_and(|max| attempted >= max) {
                engine_info!("article limit of {} reached", attempted);
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let url = url.trim().to_string();
            if url.is_empty() || !seen.insert(url.clone()) {
                engine_debug!("skipping duplicate or empty url `{}`", url);
                continue;
            }
            attempted += 1;
            engine_info!("article {}: {}", attempted, url);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    engine_warn!("cancelled while processing {}; discarding it", url);
                    cancelled = true;
                    break;
                }
                result = self.extract_article(&url, attempted) => result,
            };

            match result {
                Ok(extracted) => {
                    failures.extend(extracted.failures);
                    articles.push(extracted.article);
                }
                Err(err) => {
                    engine_warn!("skipping {}: {}", url, err);
                    failures.push(FailureEntry {
                        url,
                        kind: err.kind(),
                        message: err.to_string(),
                        disposition: Disposition::Skipped,
                    });
                }
            }
        }

        if articles.is_empty() {
            engine_warn!("no article survived; nothing written");
            return Err(RunError::EmptyArchive { failures });
        }

        let created = Utc::now();
        let sources: Vec<String> = articles.iter().map(|a| a.source_url.clone()).collect();
        let metadata = ArchiveMetadata::from_rules(
            self.rules(),
            output.title.clone(),
            book_identifier(&sources, &created),
            created,
        );
        let archive = EpubArchive::new(articles, metadata).map_err(RunError::Assembly)?;
        let chapters = archive.chapter_count();
        let images = archive.image_count();
        let bytes = archive.to_bytes().map_err(RunError::Assembly)?;
        let archive_path = AtomicFileWriter::new(output.dir.clone()).write(&output.filename, &bytes)?;
        engine_info!(
            "wrote {} ({} chapter(s), {} failure(s))",
            archive_path.display(),
            chapters,
            failures.len()
        );

        Ok(RunReport {
            archive_path,
            attempted,
            chapters,
            images,
            failures,
            cancelled,
        })
    }
}

use std::collections::HashSet;

use engine_logging::{engine_debug, engine_info, engine_warn};
use url::Url;

use crate::article::{Article, ContentNode, Fragment, PageMetadata, RawPage};
use crate::classify::{ClassifiedPage, Classifier};
use crate::decode::decode_html;
use crate::{ExtractionError, Fetcher, ResourceKind};

/// A page ≥ 2 that could not be fetched or classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: usize,
    pub url: String,
    pub error: ExtractionError,
}

/// Result of following one article's next-page chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedArticle {
    pub article: Article,
    /// Set when the chain broke after page 1; `article` holds the pages before it.
    pub page_failure: Option<PageFailure>,
}

impl CollectedArticle {
    pub fn is_partial(&self) -> bool {
        self.page_failure.is_some()
    }
}

/// Drives the fetcher across a next-page chain and stitches the fragments.
pub struct PaginationStitcher<'a> {
    fetcher: &'a dyn Fetcher,
    classifier: &'a Classifier,
}

impl<'a> PaginationStitcher<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, classifier: &'a Classifier) -> Self {
        Self {
            fetcher,
            classifier,
        }
    }

    pub fn max_pages(&self) -> usize {
        self.classifier.rules().max_pages
    }

    /// Fetch `start_url` and every page after it, in reading order.
    ///
    /// Title, author and date come from page 1 only.
    pub async fn collect(&self, start_url: &str) -> Result<CollectedArticle, ExtractionError> {
        let start = visit_key(start_url).ok_or_else(|| ExtractionError::InvalidUrl {
            url: start_url.to_string(),
            message: "not an absolute http(s) url".to_string(),
        })?;
        let max_pages = self.max_pages();

        let mut visited = HashSet::new();
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut metadata = PageMetadata::default();
        let mut page_failure = None;
        let mut next = Some(start);

        while let Some(url) = next.take() {
            let page = fragments.len() + 1;
            if page > max_pages {
                engine_warn!("{} still has a next page after {} pages", start_url, max_pages);
                return Err(ExtractionError::PaginationLoop {
                    url: start_url.to_string(),
                    max_pages,
                });
            }
            visited.insert(url.clone());

            let (classified, final_url) = match self.fetch_page(&url).await {
                Ok(result) => result,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    engine_warn!("keeping {} pages of {}: page {} failed: {}", page - 1, start_url, page, err);
                    page_failure = Some(PageFailure {
                        page,
                        url,
                        error: err,
                    });
                    break;
                }
            };
            if let Some(key) = visit_key(&final_url) {
                visited.insert(key);
            }

            let ClassifiedPage {
                content: ContentNode { html, next_page },
                metadata: page_metadata,
            } = classified;
            if page == 1 {
                metadata = page_metadata;
            }
            fragments.push(Fragment {
                page,
                url: url.clone(),
                html,
            });

            next = match next_page.as_deref().and_then(visit_key) {
                Some(candidate) if visited.contains(&candidate) => {
                    engine_warn!("next page {} of {} was already visited; stopping", candidate, start_url);
                    None
                }
                other => other,
            };
        }

        engine_info!("collected {} page(s) of {}", fragments.len(), start_url);
        Ok(CollectedArticle {
            article: Article::new(start_url, metadata, fragments),
            page_failure,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<(ClassifiedPage, String), ExtractionError> {
        let output = self
            .fetcher
            .fetch(url, ResourceKind::Page)
            .await
            .map_err(|source| ExtractionError::FetchFailed {
                url: url.to_string(),
                source,
            })?;

        let decoded = decode_html(&output.bytes, output.metadata.content_type.as_deref());
        if decoded.had_errors {
            engine_debug!("{} had malformed {} sequences", url, decoded.encoding_label);
        }
        let final_url = output.metadata.final_url;
        let page = RawPage {
            url: url.to_string(),
            final_url: final_url.clone(),
            markup: decoded.html,
            encoding: decoded.encoding_label,
        };
        let classified = self.classifier.classify_page(&page)?;
        Ok((classified, final_url))
    }
}

/// Canonical form used for cycle detection: absolute http(s), no fragment.
fn visit_key(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_key_ignores_fragments() {
        assert_eq!(
            visit_key("https://www.golem.de/a-2.html#top").as_deref(),
            Some("https://www.golem.de/a-2.html")
        );
    }

    #[test]
    fn visit_key_rejects_relative_and_non_http() {
        assert_eq!(visit_key("/a-2.html"), None);
        assert_eq!(visit_key("ftp://example.com/a"), None);
    }
}

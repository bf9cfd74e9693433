//! Data model shared by the pipeline stages.

/// One fetched HTML document. Discarded after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// URL the page was requested with.
    pub url: String,
    /// URL after redirects; relative references on the page resolve against it.
    pub final_url: String,
    pub markup: String,
    pub encoding: String,
}

/// Cleaned content of one page plus its pagination signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    /// Outer HTML of the pruned article root.
    pub html: String,
    /// Absolute URL of the next page, `None` on the last page.
    pub next_page: Option<String>,
}

impl ContentNode {
    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }
}

/// Title, author and date as found on page 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

/// One page's worth of article body, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1-based page number within the article.
    pub page: usize,
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDate {
    /// As captured from the page.
    pub raw: String,
    /// Locale display form, or `raw` when it could not be parsed.
    pub display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Fetched,
    Failed,
    /// Same bytes as an image fetched earlier under another URL; shares its file.
    SkippedDuplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Absolute URL the image was referenced by.
    pub original_url: String,
    /// Filename inside the archive's image folder; `None` when the fetch failed.
    pub local_name: Option<String>,
    pub status: ImageStatus,
    pub media_type: String,
    /// Image bytes; empty unless `status` is `Fetched`.
    pub data: Vec<u8>,
    /// Number of `<img>` elements that pointed at `original_url`.
    pub references: usize,
}

impl ImageRef {
    /// Archive-relative path used in chapter markup, e.g. `images/a001_001.jpg`.
    pub fn href(&self) -> Option<String> {
        self.local_name
            .as_ref()
            .map(|name| format!("{}/{name}", crate::epub::IMAGE_DIR))
    }
}

pub const UNTITLED: &str = "Untitled";

/// The unit of output: one chapter of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub author: Option<String>,
    pub date: Option<ArticleDate>,
    /// Page fragments in original order 1..k.
    pub fragments: Vec<Fragment>,
    pub images: Vec<ImageRef>,
    pub source_url: String,
}

impl Article {
    pub fn new(source_url: impl Into<String>, metadata: PageMetadata, fragments: Vec<Fragment>) -> Self {
        let title = metadata
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        Self {
            title,
            author: metadata.author,
            date: metadata.date.map(|raw| ArticleDate {
                display: raw.clone(),
                raw,
            }),
            fragments,
            images: Vec::new(),
            source_url: source_url.into(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.fragments.len()
    }

    /// Images whose bytes will be stored in the archive.
    pub fn embedded_images(&self) -> impl Iterator<Item = &ImageRef> {
        self.images
            .iter()
            .filter(|img| img.status == ImageStatus::Fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_falls_back_to_placeholder() {
        let meta = PageMetadata {
            title: Some("   ".to_string()),
            ..PageMetadata::default()
        };
        let article = Article::new("https://example.com/a", meta, Vec::new());
        assert_eq!(article.title, UNTITLED);
    }

    #[test]
    fn raw_date_is_the_initial_display_form() {
        let meta = PageMetadata {
            date: Some("2025-10-29T10:36:01Z".to_string()),
            ..PageMetadata::default()
        };
        let article = Article::new("https://example.com/a", meta, Vec::new());
        let date = article.date.unwrap();
        assert_eq!(date.raw, date.display);
    }
}

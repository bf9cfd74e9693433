//! Shared fixtures: an in-memory fetcher and golem-shaped pages.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use bindery_engine::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher, ResourceKind,
};

pub const BASE: &str = "https://www.golem.de/news";

pub fn url(path: &str) -> String {
    format!("{BASE}/{path}")
}

/// Serves canned responses; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Result<(Vec<u8>, String), FailureKind>>,
    requests: Mutex<Vec<String>>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.responses.insert(
            url.into(),
            Ok((html.into().into_bytes(), "text/html; charset=utf-8".to_string())),
        );
        self
    }

    pub fn image(mut self, url: impl Into<String>, bytes: &[u8], content_type: &str) -> Self {
        self.responses
            .insert(url.into(), Ok((bytes.to_vec(), content_type.to_string())));
        self
    }

    pub fn failing(mut self, url: impl Into<String>, status: u16) -> Self {
        self.responses
            .insert(url.into(), Err(FailureKind::HttpStatus(status)));
        self
    }

    /// Cancel `token` while `url` is being fetched, then yield once so the
    /// caller sees the cancellation before the fetch completes.
    pub fn cancel_on(mut self, url: impl Into<String>, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.into(), token));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _kind: ResourceKind) -> Result<FetchOutput, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
                tokio::task::yield_now().await;
            }
        }
        match self.responses.get(url) {
            Some(Ok((bytes, content_type))) => Ok(FetchOutput {
                bytes: bytes.clone(),
                metadata: FetchMetadata {
                    original_url: url.to_string(),
                    final_url: url.to_string(),
                    redirect_count: 0,
                    content_type: Some(content_type.clone()),
                    byte_len: bytes.len() as u64,
                },
            }),
            Some(Err(kind)) => Err(FetchError::new(kind.clone(), "canned failure")),
            None => Err(FetchError::new(FailureKind::HttpStatus(404), "404 Not Found")),
        }
    }
}

/// A golem-like article page with clutter around and inside the article.
pub fn article_page(title: &str, body: &str, next: Option<&str>) -> String {
    let pagination = next
        .map(|href| {
            format!(
                r#"<ul class="go-pagination"><li class="go-pagination__item--next"><a href="{href}">weiter</a></li></ul>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="de">
<head><meta charset="utf-8"><title>{title} - Golem.de</title></head>
<body>
<nav class="go-nav"><a href="/">Startseite</a></nav>
<article>
  <header>
    <h1>{title}</h1>
    <span class="go-article-header__author">Anna Beispiel</span>
    <time datetime="2025-10-29T10:36:01.000Z">29.10.2025, 10:36 Uhr</time>
  </header>
  {body}
  <div class="go-teaser-block"><p>Auch interessant</p></div>
  <div class="advertisement">Anzeige</div>
  {pagination}
  <div class="go-article-end"></div>
  <section class="comments"><p>Kommentare</p></section>
</article>
<footer>Impressum</footer>
</body>
</html>"#
    )
}

/// Every entry of a zip archive, by name, plus the names in archive order.
pub fn read_archive(bytes: &[u8]) -> (Vec<String>, BTreeMap<String, Vec<u8>>) {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut order = Vec::new();
    let mut entries = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        order.push(entry.name().to_string());
        entries.insert(entry.name().to_string(), data);
    }
    (order, entries)
}

pub fn text(entries: &BTreeMap<String, Vec<u8>>, name: &str) -> String {
    String::from_utf8(entries.get(name).unwrap_or_else(|| panic!("{name} missing")).clone()).unwrap()
}

/// `src` of every `<img>` in an XHTML document.
pub fn image_sources(xhtml: &str) -> Vec<String> {
    let doc = scraper::Html::parse_document(xhtml);
    let selector = scraper::Selector::parse("img").unwrap();
    doc.select(&selector)
        .filter_map(|img| img.value().attr("src").map(str::to_string))
        .collect()
}

//! EPUB 3 container assembly (with an NCX for older readers).
//!
//! Layout:
//!
//! ```text
//! mimetype                      (stored, first entry)
//! META-INF/container.xml
//! OEBPS/content.opf
//! OEBPS/nav.xhtml
//! OEBPS/toc.ncx
//! OEBPS/style.css
//! OEBPS/chapter_001.xhtml ...
//! OEBPS/images/a001_001.jpg ...
//! ```

use std::collections::{BTreeSet, HashSet};
use std::io::{Cursor, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use engine_logging::{engine_debug, engine_info};
use scraper::{ElementRef, Html};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::article::{Article, ImageStatus};
use crate::classify::CODE_BLOCK_CLASS;
use crate::markup::{escape_attr, escape_text};
use crate::rules::SiteRules;
use crate::xhtml::to_xhtml;

/// Folder (relative to the package document) holding embedded images.
pub const IMAGE_DIR: &str = "images";

const OEBPS: &str = "OEBPS";
const STYLESHEET: &str = "style.css";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no articles to assemble")]
    EmptyArchive,
    #[error("chapter {chapter} references {href}, which is not in the archive")]
    DanglingReference { chapter: usize, href: String },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub title: String,
    pub language: String,
    pub creator: String,
    pub identifier: String,
    pub created: DateTime<Utc>,
    pub toc_title: String,
    /// Label of the marker between stitched pages, e.g. `Seite`.
    pub page_label: String,
}

impl ArchiveMetadata {
    pub fn from_rules(
        rules: &SiteRules,
        title: impl Into<String>,
        identifier: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            language: rules.language.clone(),
            creator: rules.creator.clone(),
            identifier: identifier.into(),
            created,
            toc_title: rules.toc_label.clone(),
            page_label: rules.page_label.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Chapter {
    file_name: String,
    title: String,
    document: String,
}

#[derive(Debug, Clone)]
struct ArchiveImage {
    file_name: String,
    media_type: String,
    data: Vec<u8>,
}

/// Fully rendered archive, ready to be zipped.
#[derive(Debug, Clone)]
pub struct EpubArchive {
    metadata: ArchiveMetadata,
    chapters: Vec<Chapter>,
    images: Vec<ArchiveImage>,
}

impl EpubArchive {
    /// Render one chapter per article, in the order given.
    ///
    /// Fails when `articles` is empty or a chapter references an image that
    /// would not be in the archive. Fetched images no chapter references are
    /// left out.
    pub fn new(articles: Vec<Article>, metadata: ArchiveMetadata) -> Result<Self, AssemblyError> {
        if articles.is_empty() {
            return Err(AssemblyError::EmptyArchive);
        }

        let mut chapters = Vec::with_capacity(articles.len());
        let mut referenced: Vec<BTreeSet<String>> = Vec::with_capacity(articles.len());
        for (index, article) in articles.iter().enumerate() {
            let body = render_body(article, &metadata.page_label);
            referenced.push(image_references(&body));
            chapters.push(Chapter {
                file_name: format!("chapter_{:03}.xhtml", index + 1),
                title: article.title.clone(),
                document: chapter_document(&article.title, &metadata.language, &body),
            });
        }

        let all_referenced: HashSet<&str> = referenced
            .iter()
            .flat_map(|set| set.iter().map(String::as_str))
            .collect();
        let mut images = Vec::new();
        let mut seen = HashSet::new();
        for article in articles {
            for image in article.images {
                if image.status != ImageStatus::Fetched {
                    continue;
                }
                let Some(href) = image.href() else { continue };
                if !all_referenced.contains(href.as_str()) {
                    engine_debug!("leaving out unreferenced image {}", href);
                    continue;
                }
                if seen.insert(href.clone()) {
                    images.push(ArchiveImage {
                        file_name: href,
                        media_type: image.media_type,
                        data: image.data,
                    });
                }
            }
        }

        for (index, refs) in referenced.iter().enumerate() {
            if let Some(missing) = refs.iter().find(|href| !seen.contains(*href)) {
                return Err(AssemblyError::DanglingReference {
                    chapter: index + 1,
                    href: missing.clone(),
                });
            }
        }

        Ok(Self {
            metadata,
            chapters,
            images,
        })
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Zip the archive into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AssemblyError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file(format!("{OEBPS}/content.opf"), deflated)?;
        zip.write_all(self.package_document().as_bytes())?;

        zip.start_file(format!("{OEBPS}/nav.xhtml"), deflated)?;
        zip.write_all(self.nav_document().as_bytes())?;

        zip.start_file(format!("{OEBPS}/toc.ncx"), deflated)?;
        zip.write_all(self.ncx_document().as_bytes())?;

        zip.start_file(format!("{OEBPS}/{STYLESHEET}"), deflated)?;
        zip.write_all(stylesheet().as_bytes())?;

        for chapter in &self.chapters {
            zip.start_file(format!("{OEBPS}/{}", chapter.file_name), deflated)?;
            zip.write_all(chapter.document.as_bytes())?;
        }

        for image in &self.images {
            let options = if image.media_type == "image/svg+xml" {
                deflated
            } else {
                stored
            };
            zip.start_file(format!("{OEBPS}/{}", image.file_name), options)?;
            zip.write_all(&image.data)?;
        }

        let bytes = zip.finish()?.into_inner();
        engine_info!(
            "assembled archive: {} chapter(s), {} image(s), {} bytes",
            self.chapters.len(),
            self.images.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn package_document(&self) -> String {
        let meta = &self.metadata;
        let modified = meta.created.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut opf = String::new();
        opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
        );
        opf.push_str(&format!(
            "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
            escape_text(&meta.identifier)
        ));
        opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_text(&meta.title)));
        opf.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape_text(&meta.language)
        ));
        opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", escape_text(&meta.creator)));
        opf.push_str(&format!(
            "    <dc:date>{}</dc:date>\n",
            meta.created.format("%Y-%m-%d")
        ));
        opf.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{modified}</meta>\n"
        ));
        opf.push_str("  </metadata>\n  <manifest>\n");
        opf.push_str(
            "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
        );
        opf.push_str(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
        opf.push_str(&format!(
            "    <item id=\"css\" href=\"{STYLESHEET}\" media-type=\"text/css\"/>\n"
        ));
        for (index, chapter) in self.chapters.iter().enumerate() {
            opf.push_str(&format!(
                "    <item id=\"chapter{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                index + 1,
                escape_attr(&chapter.file_name)
            ));
        }
        for (index, image) in self.images.iter().enumerate() {
            opf.push_str(&format!(
                "    <item id=\"img{}\" href=\"{}\" media-type=\"{}\"/>\n",
                index + 1,
                escape_attr(&image.file_name),
                escape_attr(&image.media_type)
            ));
        }
        opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
        for index in 0..self.chapters.len() {
            opf.push_str(&format!("    <itemref idref=\"chapter{}\"/>\n", index + 1));
        }
        opf.push_str("  </spine>\n</package>\n");
        opf
    }

    fn nav_document(&self) -> String {
        let meta = &self.metadata;
        let lang = escape_attr(&meta.language);
        let mut nav = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
<head>
  <title>{toc}</title>
  <link rel="stylesheet" type="text/css" href="{STYLESHEET}"/>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{toc}</h1>
    <ol>
"#,
            toc = escape_text(&meta.toc_title),
        );
        for chapter in &self.chapters {
            nav.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape_attr(&chapter.file_name),
                escape_text(&chapter.title)
            ));
        }
        nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
        nav
    }

    fn ncx_document(&self) -> String {
        let meta = &self.metadata;
        let mut ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle><text>{}</text></docTitle>
  <navMap>
"#,
            escape_attr(&meta.identifier),
            escape_text(&meta.title)
        );
        for (index, chapter) in self.chapters.iter().enumerate() {
            let order = index + 1;
            ncx.push_str(&format!(
                "    <navPoint id=\"navpoint-{order}\" playOrder=\"{order}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
                escape_text(&chapter.title),
                escape_attr(&chapter.file_name)
            ));
        }
        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }
}

/// Render and zip `articles` in one step.
pub fn assemble(articles: Vec<Article>, metadata: &ArchiveMetadata) -> Result<Vec<u8>, AssemblyError> {
    EpubArchive::new(articles, metadata.clone())?.to_bytes()
}

fn render_body(article: &Article, page_label: &str) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape_text(&article.title));

    let byline: Vec<&str> = article
        .author
        .as_deref()
        .into_iter()
        .chain(article.date.as_ref().map(|d| d.display.as_str()))
        .filter(|part| !part.trim().is_empty())
        .collect();
    if !byline.is_empty() {
        body.push_str(&format!(
            "<p class=\"byline\">{}</p>\n",
            escape_text(&byline.join(" | "))
        ));
    }

    for (index, fragment) in article.fragments.iter().enumerate() {
        if index > 0 {
            body.push_str(&format!(
                "<hr class=\"page-break\"/>\n<p class=\"page-marker\"><em>{} {}</em></p>\n",
                escape_text(page_label),
                fragment.page
            ));
        }
        body.push_str(&format!(
            "<div class=\"page\" id=\"page-{}\">\n{}\n</div>\n",
            fragment.page,
            to_xhtml(&fragment.html)
        ));
    }
    body
}

fn chapter_document(title: &str, language: &str, body: &str) -> String {
    let lang = escape_attr(language);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head>
  <title>{}</title>
  <link rel="stylesheet" type="text/css" href="{STYLESHEET}"/>
</head>
<body>
{body}</body>
</html>
"#,
        escape_text(title)
    )
}

/// `src` of every `<img>` in a rendered chapter body.
fn image_references(body: &str) -> BTreeSet<String> {
    Html::parse_fragment(body)
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "img")
        .filter_map(|el| el.value().attr("src").map(str::to_string))
        .collect()
}

fn stylesheet() -> String {
    format!(
        r#"body {{ font-family: serif; line-height: 1.5; margin: 0 0.5em; }}
h1 {{ font-size: 1.5em; margin: 1em 0 0.5em; }}
h2, h3 {{ margin: 1em 0 0.4em; }}
p {{ margin: 0 0 0.8em; }}
img {{ max-width: 100%; height: auto; }}
figure {{ margin: 1em 0; }}
figcaption {{ font-size: 0.85em; font-style: italic; }}
.byline {{ color: #555; font-size: 0.9em; }}
.page-break {{ border: 0; border-top: 1px solid #ccc; margin: 1.5em 0 0.5em; }}
.page-marker {{ color: #777; font-size: 0.85em; text-align: center; }}
.source-link {{ border-top: 1px solid #ccc; margin-top: 2em; padding-top: 0.5em; font-size: 0.9em; }}
pre, code, .{CODE_BLOCK_CLASS} {{ font-family: "Courier New", Courier, monospace; }}
pre, .{CODE_BLOCK_CLASS} {{ white-space: pre-wrap; background: #f4f4f4; padding: 0.5em; font-size: 0.85em; }}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{ArticleDate, Fragment, ImageRef};
    use chrono::TimeZone;

    fn metadata() -> ArchiveMetadata {
        ArchiveMetadata::from_rules(
            &SiteRules::default(),
            "Golem Wochenende",
            "bindery-test",
            Utc.with_ymd_and_hms(2025, 10, 29, 10, 36, 1).unwrap(),
        )
    }

    fn article(html: &str) -> Article {
        Article {
            title: "Titel & mehr".to_string(),
            author: Some("Anna".to_string()),
            date: Some(ArticleDate {
                raw: "2025-10-29".to_string(),
                display: "29. Oktober 2025".to_string(),
            }),
            fragments: vec![
                Fragment {
                    page: 1,
                    url: "https://x.test/a".to_string(),
                    html: html.to_string(),
                },
                Fragment {
                    page: 2,
                    url: "https://x.test/a-2".to_string(),
                    html: "<p>zwei</p>".to_string(),
                },
            ],
            images: Vec::new(),
            source_url: "https://x.test/a".to_string(),
        }
    }

    #[test]
    fn body_has_byline_and_page_marker() {
        let body = render_body(&article("<p>eins</p>"), "Seite");
        assert!(body.contains("<h1>Titel &amp; mehr</h1>"));
        assert!(body.contains("<p class=\"byline\">Anna | 29. Oktober 2025</p>"));
        assert!(body.contains("<p class=\"page-marker\"><em>Seite 2</em></p>"));
        assert!(!body.contains("Seite 1"));
    }

    #[test]
    fn zero_articles_is_an_error() {
        assert!(matches!(
            EpubArchive::new(Vec::new(), metadata()),
            Err(AssemblyError::EmptyArchive)
        ));
    }

    #[test]
    fn missing_image_is_a_dangling_reference() {
        let err = EpubArchive::new(
            vec![article(r#"<img src="images/a001_001.jpg">"#)],
            metadata(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::DanglingReference { chapter: 1, ref href } if href == "images/a001_001.jpg"
        ));
    }

    #[test]
    fn unreferenced_images_are_left_out() {
        let mut a = article("<p>kein Bild</p>");
        a.images.push(ImageRef {
            original_url: "https://x.test/i.jpg".to_string(),
            local_name: Some("a001_001.jpg".to_string()),
            status: ImageStatus::Fetched,
            media_type: "image/jpeg".to_string(),
            data: vec![1, 2, 3],
            references: 1,
        });
        let archive = EpubArchive::new(vec![a], metadata()).unwrap();
        assert_eq!(archive.image_count(), 0);
        assert_eq!(archive.chapter_count(), 1);
    }

    #[test]
    fn package_lists_spine_in_order() {
        let archive =
            EpubArchive::new(vec![article("<p>a</p>"), article("<p>b</p>")], metadata()).unwrap();
        let opf = archive.package_document();
        let first = opf.find("idref=\"chapter1\"").unwrap();
        let second = opf.find("idref=\"chapter2\"").unwrap();
        assert!(first < second);
        assert!(opf.contains("<dc:language>de</dc:language>"));
        assert!(opf.contains("<meta property=\"dcterms:modified\">2025-10-29T10:36:01Z</meta>"));
    }
}

//! Image discovery, download and reference rewriting for one article.

use std::collections::HashMap;

use engine_logging::{engine_debug, engine_info, engine_warn};
use html_escape::decode_html_entities;
use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};
use url::Url;

use crate::article::{Fragment, ImageRef, ImageStatus};
use crate::filename::image_filename;
use crate::links::resolve_url;
use crate::markup::rewrite;
use crate::{ExtractionError, Fetcher, ResourceKind};

/// Responsive-image attributes that would point outside the archive.
const STRIPPED_ATTRIBUTES: [&str; 5] = ["srcset", "data-srcset", "sizes", "loading", "decoding"];

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutput {
    /// Fragments with every surviving `<img>` pointing into the archive.
    pub fragments: Vec<Fragment>,
    /// One entry per distinct absolute image URL, in first-seen order.
    pub images: Vec<ImageRef>,
}

impl HarvestOutput {
    pub fn failed_images(&self) -> impl Iterator<Item = &ImageRef> {
        self.images
            .iter()
            .filter(|img| img.status == ImageStatus::Failed)
    }
}

pub struct ImageHarvester<'a> {
    fetcher: &'a dyn Fetcher,
    source_attributes: &'a [String],
}

impl<'a> ImageHarvester<'a> {
    /// `source_attributes` are tried in order, e.g. `src` then `data-src`.
    pub fn new(fetcher: &'a dyn Fetcher, source_attributes: &'a [String]) -> Self {
        Self {
            fetcher,
            source_attributes,
        }
    }

    /// Fetch every distinct image referenced by `fragments` and rewrite the markup.
    ///
    /// Names are `{prefix}_{n:03}.{ext}`, numbered per call. A failed fetch
    /// drops the affected `<img>` elements but never fails the article.
    pub async fn harvest(
        &self,
        fragments: Vec<Fragment>,
        base: &Url,
        prefix: &str,
    ) -> Result<HarvestOutput, ExtractionError> {
        let discovered = self.discover(&fragments, base);
        engine_debug!("{} distinct image(s) referenced by {}", discovered.len(), base);

        let mut images = Vec::with_capacity(discovered.len());
        let mut by_digest: HashMap<Vec<u8>, String> = HashMap::new();
        let mut seq = 0;

        for (url, references) in discovered {
            let output = match self.fetcher.fetch(&url, ResourceKind::Image).await {
                Ok(output) if !output.bytes.is_empty() => output,
                Ok(_) => {
                    engine_warn!("dropping image {}: empty response", url);
                    images.push(failed_image(url, references));
                    continue;
                }
                Err(err) => {
                    engine_warn!("dropping image {}: {}", url, err);
                    images.push(failed_image(url, references));
                    continue;
                }
            };

            let extension = image_extension(&url, output.metadata.mime_essence().as_deref());
            let media_type = media_type_for(extension).to_string();
            let digest = Sha256::digest(&output.bytes).to_vec();
            if let Some(existing) = by_digest.get(&digest) {
                engine_debug!("{} has the same bytes as {}", url, existing);
                images.push(ImageRef {
                    original_url: url,
                    local_name: Some(existing.clone()),
                    status: ImageStatus::SkippedDuplicate,
                    media_type,
                    data: Vec::new(),
                    references,
                });
                continue;
            }

            seq += 1;
            let local_name = image_filename(prefix, seq, extension);
            by_digest.insert(digest, local_name.clone());
            images.push(ImageRef {
                original_url: url,
                local_name: Some(local_name),
                status: ImageStatus::Fetched,
                media_type,
                data: output.bytes,
                references,
            });
        }

        let hrefs: HashMap<String, String> = images
            .iter()
            .filter_map(|img| img.href().map(|href| (img.original_url.clone(), href)))
            .collect();

        let mut rewritten = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let html = self
                .rewrite_fragment(&fragment.html, base, &hrefs)
                .map_err(|err| ExtractionError::Markup {
                    url: fragment.url.clone(),
                    message: err.to_string(),
                })?;
            rewritten.push(Fragment { html, ..fragment });
        }

        engine_info!(
            "embedded {} image(s) for {} ({} failed)",
            seq,
            base,
            images.iter().filter(|i| i.status == ImageStatus::Failed).count()
        );
        Ok(HarvestOutput {
            fragments: rewritten,
            images,
        })
    }

    /// Distinct absolute image URLs in document order with their reference counts.
    fn discover(&self, fragments: &[Fragment], base: &Url) -> Vec<(String, usize)> {
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for fragment in fragments {
            let doc = Html::parse_fragment(&fragment.html);
            let sources = doc
                .tree
                .root()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "img")
                .filter_map(|el| self.source_of(|name| el.value().attr(name)))
                .filter_map(|src| resolve_url(&src, base));

            for url in sources {
                let url = String::from(url);
                match index.get(&url) {
                    Some(&i) => order[i].1 += 1,
                    None => {
                        index.insert(url.clone(), order.len());
                        order.push((url, 1));
                    }
                }
            }
        }
        order
    }

    /// First configured source attribute holding a real (non-inline) reference.
    fn source_of<S: AsRef<str>>(&self, attr: impl Fn(&str) -> Option<S>) -> Option<String> {
        self.source_attributes.iter().find_map(|name| {
            let value = attr(name.as_str())?;
            let value = value.as_ref().trim();
            let inline = value.to_ascii_lowercase().starts_with("data:");
            (!value.is_empty() && !inline).then(|| value.to_string())
        })
    }

    fn rewrite_fragment(
        &self,
        html: &str,
        base: &Url,
        hrefs: &HashMap<String, String>,
    ) -> Result<String, lol_html::errors::RewritingError> {
        rewrite(
            html,
            lol_html::Settings {
                element_content_handlers: vec![
                    lol_html::element!("img", |el| {
                        // lol_html hands out attribute values still entity-encoded.
                        let target = self
                            .source_of(|name| {
                                el.get_attribute(name)
                                    .map(|raw| decode_html_entities(&raw).into_owned())
                            })
                            .and_then(|src| resolve_url(&src, base))
                            .and_then(|url| hrefs.get(url.as_str()));
                        let Some(href) = target else {
                            el.remove();
                            return Ok(());
                        };
                        el.set_attribute("src", href)?;
                        for name in self.source_attributes.iter().filter(|n| n.as_str() != "src") {
                            el.remove_attribute(name);
                        }
                        for name in STRIPPED_ATTRIBUTES {
                            el.remove_attribute(name);
                        }
                        if !el.has_attribute("alt") {
                            el.set_attribute("alt", "")?;
                        }
                        Ok(())
                    }),
                    lol_html::element!("picture source", |el| {
                        el.remove();
                        Ok(())
                    }),
                ],
                ..Default::default()
            },
        )
    }
}

fn failed_image(original_url: String, references: usize) -> ImageRef {
    ImageRef {
        original_url,
        local_name: None,
        status: ImageStatus::Failed,
        media_type: String::new(),
        data: Vec::new(),
        references,
    }
}

/// Extension from the URL path when it names an image type, else from the
/// response's content type, else `jpg`.
pub fn image_extension(url: &str, content_type: Option<&str>) -> &'static str {
    let from_path = Url::parse(url).ok().and_then(|u| {
        let last = u.path_segments()?.next_back()?.to_string();
        let (_, ext) = last.rsplit_once('.')?;
        known_extension(&ext.to_ascii_lowercase())
    });
    from_path
        .or_else(|| content_type.and_then(extension_for_media_type))
        .unwrap_or(DEFAULT_EXTENSION)
}

fn known_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "jpg" | "jpeg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        "svg" => "svg",
        "avif" => "avif",
        _ => return None,
    })
}

fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    Some(match media_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => return None,
    })
}

pub fn media_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "image/jpeg",
    }
}

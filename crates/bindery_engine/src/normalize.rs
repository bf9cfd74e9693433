use engine_logging::{engine_debug, engine_warn};
use lol_html::html_content::ContentType;
use scraper::node::Node;
use scraper::Html;
use url::Url;

use crate::article::Article;
use crate::dates::{display_or_raw, format_display_date, DateLocale};
use crate::links::absolutize_href;
use crate::markup::{escape_attr, escape_text, rewrite};
use crate::rules::SiteRules;

/// Attribute marking the appended source block; its presence makes
/// normalization a no-op the second time.
pub const SOURCE_MARKER: &str = "data-bindery-source";

/// Date display, absolute links and the trailing source link.
#[derive(Debug, Clone)]
pub struct Normalizer {
    locale: DateLocale,
    source_label: String,
}

impl Normalizer {
    pub fn new(locale: DateLocale, source_label: impl Into<String>) -> Self {
        Self {
            locale,
            source_label: source_label.into(),
        }
    }

    pub fn from_rules(rules: &SiteRules) -> Self {
        Self::new(rules.date_locale, rules.source_label.clone())
    }

    /// Total: unparsable dates and unparsable URLs are left as they are.
    pub fn normalize(&self, mut article: Article) -> Article {
        if let Some(date) = article.date.as_mut() {
            date.display = display_or_raw(&date.raw, self.locale);
        }

        let article_base = Url::parse(&article.source_url).ok();
        for fragment in &mut article.fragments {
            let base = Url::parse(&fragment.url).ok().or_else(|| article_base.clone());
            match self.rewrite_fragment(&fragment.html, base.as_ref()) {
                Ok(html) => fragment.html = html,
                Err(err) => {
                    engine_warn!("leaving page {} of {} as is: {}", fragment.page, article.source_url, err)
                }
            }
        }

        let has_source = article.fragments.iter().any(|f| has_source_marker(&f.html));
        if !has_source {
            let block = self.source_block(&article.source_url);
            if let Some(last) = article.fragments.last_mut() {
                last.html.push_str(&block);
            }
        } else {
            engine_debug!("{} already carries a source link", article.source_url);
        }
        article
    }

    fn rewrite_fragment(
        &self,
        html: &str,
        base: Option<&Url>,
    ) -> Result<String, lol_html::errors::RewritingError> {
        let locale = self.locale;
        rewrite(
            html,
            lol_html::Settings {
                element_content_handlers: vec![
                    lol_html::element!("a[href]", move |el| {
                        if let (Some(base), Some(href)) = (base, el.get_attribute("href")) {
                            let absolute = absolutize_href(&href, base);
                            if absolute != href {
                                el.set_attribute("href", &absolute)?;
                            }
                        }
                        Ok(())
                    }),
                    lol_html::element!("time[datetime]", move |el| {
                        let display = el
                            .get_attribute("datetime")
                            .and_then(|raw| format_display_date(&raw, locale));
                        if let Some(display) = display {
                            el.set_inner_content(&display, ContentType::Text);
                        }
                        Ok(())
                    }),
                ],
                ..Default::default()
            },
        )
    }

    fn source_block(&self, source_url: &str) -> String {
        let href = escape_attr(source_url);
        format!(
            "<div class=\"source-link\" {SOURCE_MARKER}=\"true\"><p><strong>{}:</strong> <a href=\"{href}\">{}</a></p></div>",
            escape_text(&self.source_label),
            escape_text(source_url),
        )
    }
}

fn has_source_marker(html: &str) -> bool {
    Html::parse_fragment(html)
        .tree
        .values()
        .any(|node| matches!(node, Node::Element(el) if el.attr(SOURCE_MARKER).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_found_by_attribute_not_text() {
        assert!(has_source_marker(
            r#"<p>x</p><div data-bindery-source="true"></div>"#
        ));
        assert!(!has_source_marker("<p>Quelle: https://www.golem.de/</p>"));
    }

    #[test]
    fn source_block_is_escaped() {
        let n = Normalizer::new(DateLocale::German, "Quelle");
        let block = n.source_block("https://x.test/a?b=1&c=2");
        assert!(block.contains(r#"href="https://x.test/a?b=1&amp;c=2""#));
        assert!(block.contains("<strong>Quelle:</strong>"));
    }
}

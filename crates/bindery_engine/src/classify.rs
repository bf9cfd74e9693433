use ego_tree::NodeId;
use engine_logging::{engine_debug, engine_trace};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::article::{ContentNode, PageMetadata, RawPage};
use crate::links::resolve_url;
use crate::markup::{collapse_whitespace, rewrite};
use crate::rules::{CompiledRules, RulesError, SiteRules};
use crate::ExtractionError;

/// Class added to `<pre>` blocks so the stylesheet renders them monospace.
pub const CODE_BLOCK_CLASS: &str = "code-block";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPage {
    pub content: ContentNode,
    pub metadata: PageMetadata,
}

/// Rule-driven article extraction for a single page.
///
/// Pure: the result depends only on the page markup and the rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: SiteRules,
    compiled: CompiledRules,
}

impl Classifier {
    pub fn new(rules: SiteRules) -> Result<Self, RulesError> {
        let compiled = rules.compile()?;
        Ok(Self { rules, compiled })
    }

    pub fn rules(&self) -> &SiteRules {
        &self.rules
    }

    /// Locate and prune the article root of `page`.
    pub fn classify(&self, page: &RawPage) -> Result<ContentNode, ExtractionError> {
        self.classify_page(page).map(|classified| classified.content)
    }

    /// Like [`classify`](Self::classify), also returning the page metadata.
    pub fn classify_page(&self, page: &RawPage) -> Result<ClassifiedPage, ExtractionError> {
        let base = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(&page.url))
            .map_err(|err| ExtractionError::InvalidUrl {
                url: page.url.clone(),
                message: err.to_string(),
            })?;
        let mut doc = Html::parse_document(&page.markup);

        // Pagination controls usually live in clutter regions, so read them first.
        let metadata = self.read_metadata(&doc);
        let next_page = self.find_next_page(&doc, &base);

        let root_id = self
            .find_root(&doc)
            .ok_or_else(|| ExtractionError::NoArticleRoot {
                url: page.url.clone(),
            })?;

        let doomed = self.clutter_nodes(&doc, root_id);
        engine_trace!("removing {} clutter nodes from {}", doomed.len(), page.url);
        for id in doomed {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }

        let html = doc
            .tree
            .get(root_id)
            .and_then(ElementRef::wrap)
            .map(|root| root.html())
            .ok_or_else(|| ExtractionError::NoArticleRoot {
                url: page.url.clone(),
            })?;

        let html = self
            .rules
            .text_replacements
            .iter()
            .filter(|r| !r.find.is_empty())
            .fold(html, |acc, r| replace_text(&acc, &r.find, &r.replace));

        let html = tag_code_blocks(&html).map_err(|err| ExtractionError::Markup {
            url: page.url.clone(),
            message: err.to_string(),
        })?;

        Ok(ClassifiedPage {
            content: ContentNode { html, next_page },
            metadata,
        })
    }

    fn find_root(&self, doc: &Html) -> Option<NodeId> {
        self.compiled
            .root
            .iter()
            .zip(&self.rules.root_selectors)
            .find_map(|(selector, raw)| {
                let found = doc.select(selector).find(has_content)?;
                engine_debug!("article root matched `{}`", raw);
                Some(found.id())
            })
    }

    fn clutter_nodes(&self, doc: &Html, root_id: NodeId) -> Vec<NodeId> {
        let Some(root) = doc.tree.get(root_id).and_then(ElementRef::wrap) else {
            return Vec::new();
        };

        let mut ids = Vec::new();
        for selector in &self.compiled.clutter {
            ids.extend(
                root.select(selector)
                    .map(|el| el.id())
                    .filter(|id| *id != root_id),
            );
        }
        for selector in &self.compiled.truncate_after {
            if let Some(marker) = root.select(selector).next() {
                ids.extend(marker.next_siblings().map(|node| node.id()));
            }
        }
        ids
    }

    fn find_next_page(&self, doc: &Html, base: &Url) -> Option<String> {
        self.compiled.next_page.iter().find_map(|selector| {
            doc.select(selector).find_map(|control| {
                let href = link_target(control)?;
                let url = resolve_url(href, base)?;
                engine_debug!("next page link {}", url);
                Some(String::from(url))
            })
        })
    }

    fn read_metadata(&self, doc: &Html) -> PageMetadata {
        PageMetadata {
            title: first_text(doc, &self.compiled.title),
            author: first_text(doc, &self.compiled.author),
            date: first_date(doc, &self.compiled.date),
        }
    }
}

fn has_content(el: &ElementRef<'_>) -> bool {
    el.text().any(|t| !t.trim().is_empty())
        || el
            .descendants()
            .any(|node| matches!(node.value(), Node::Element(e) if e.name() == "img"))
}

/// `href` of the control itself when it is a link, else of the first link inside it.
fn link_target<'a>(control: ElementRef<'a>) -> Option<&'a str> {
    if control.value().name() == "a" {
        return control.value().attr("href");
    }
    control
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .find_map(|a| a.value().attr("href"))
}

fn first_text(doc: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        doc.select(selector)
            .map(|el| collapse_whitespace(el.text()))
            .find(|text| !text.is_empty())
    })
}

fn first_date(doc: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        doc.select(selector).find_map(|el| {
            el.value()
                .attr("datetime")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| Some(collapse_whitespace(el.text())).filter(|t| !t.is_empty()))
        })
    })
}

/// Replace every `find` in `html`. A match that ends a link's text also takes
/// the whitespace around it, so `KI (suffix)</a>` becomes `KI</a>`.
fn replace_text(html: &str, find: &str, replace: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find(find) {
        let before = &rest[..pos];
        let after = &rest[pos + find.len()..];
        let tail = after.trim_start();
        if tail.starts_with("</a>") {
            out.push_str(before.trim_end());
            out.push_str(replace.trim());
            rest = tail;
        } else {
            out.push_str(before);
            out.push_str(replace);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Mark every `<pre>` with [`CODE_BLOCK_CLASS`], keeping existing classes.
fn tag_code_blocks(html: &str) -> Result<String, lol_html::errors::RewritingError> {
    rewrite(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("pre", |el| {
                let class = match el.get_attribute("class") {
                    Some(existing)
                        if existing.split_whitespace().any(|c| c == CODE_BLOCK_CLASS) =>
                    {
                        return Ok(());
                    }
                    Some(existing) if !existing.trim().is_empty() => {
                        format!("{} {CODE_BLOCK_CLASS}", existing.trim())
                    }
                    _ => CODE_BLOCK_CLASS.to_string(),
                };
                el.set_attribute("class", &class)?;
                Ok(())
            })],
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_at_link_end_is_trimmed() {
        let html = r#"<a href="/a">KI (öffnet im neuen Fenster) </a> und (öffnet im neuen Fenster) mehr"#;
        assert_eq!(
            replace_text(html, "(öffnet im neuen Fenster)", ""),
            r#"<a href="/a">KI</a> und  mehr"#
        );
    }
}

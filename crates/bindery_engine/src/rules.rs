//! Declarative, per-site extraction rules.
//!
//! Everything the classifier and normalizer know about a site's markup lives
//! in [`SiteRules`], so another site can be targeted by swapping the rules
//! file rather than touching pipeline code. The built-in default describes
//! golem.de.

use std::fs;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dates::DateLocale;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid selector `{selector}` in {field}: {message}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        message: String,
    },
    #[error("rules must define at least one {0}")]
    Missing(&'static str),
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacement {
    pub find: String,
    pub replace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteRules {
    pub name: String,
    /// Candidate article roots, tried in order; the first non-empty match wins.
    pub root_selectors: Vec<String>,
    /// Clutter regions removed (with their subtrees) from inside the root.
    pub clutter_selectors: Vec<String>,
    /// Markers whose following siblings are dropped (comments, related articles).
    pub truncate_after: Vec<String>,
    /// Next-page controls; either the link itself or an element wrapping it.
    pub next_page_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub author_selectors: Vec<String>,
    /// Date holders; the `datetime` attribute is preferred over the text.
    pub date_selectors: Vec<String>,
    /// Image source attributes in order of preference.
    pub image_attributes: Vec<String>,
    pub text_replacements: Vec<TextReplacement>,
    pub cookie_domain: String,
    pub language: String,
    pub date_locale: DateLocale,
    /// Hard ceiling on pages per article.
    pub max_pages: usize,
    pub page_label: String,
    pub source_label: String,
    pub toc_label: String,
    pub creator: String,
}

impl Default for SiteRules {
    fn default() -> Self {
        Self::golem()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SiteRules {
    /// Rules for golem.de articles, including Golem Plus.
    pub fn golem() -> Self {
        Self {
            name: "golem.de".to_string(),
            root_selectors: strings(&[
                "article",
                r#"div[class*="content"]"#,
                r#"div[class*="article"]"#,
                "main",
                "div.main",
            ]),
            clutter_selectors: strings(&[
                r#"[class*="go-teaser-block"]"#,
                r#"[class*="advertisement"]"#,
                r#"[class*="ad-container"]"#,
                r#"[class*="go-button-bar"]"#,
                r#"[class*="go-alink-list"]"#,
                r#"[class*="share-buttons"]"#,
                r#"[class*="related-articles"]"#,
                r#"[class*="comments"]"#,
                r#"[class*="go-pagination"]"#,
                "nav",
                "form",
                "script",
                "style",
                "noscript",
                "iframe",
            ]),
            truncate_after: strings(&[".go-article-end"]),
            next_page_selectors: strings(&[
                ".go-pagination__item--next",
                ".gsnw-link__article-pagination",
            ]),
            title_selectors: strings(&["h1"]),
            author_selectors: strings(&[r#"[class*="author"]"#, r#"[class*="byline"]"#]),
            date_selectors: strings(&[
                "time",
                r#"[class*="date"]"#,
                r#"[class*="published"]"#,
            ]),
            image_attributes: strings(&["src", "data-src"]),
            text_replacements: vec![TextReplacement {
                find: "(öffnet im neuen Fenster)".to_string(),
                replace: String::new(),
            }],
            cookie_domain: "golem.de".to_string(),
            language: "de".to_string(),
            date_locale: DateLocale::German,
            max_pages: 20,
            page_label: "Seite".to_string(),
            source_label: "Quelle".to_string(),
            toc_label: "Inhalt".to_string(),
            creator: "Golem.de".to_string(),
        }
    }

    pub fn from_ron_str(text: &str) -> Result<Self, RulesError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let text = fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
    }

    /// Parse every selector once; invalid rules are rejected up front.
    pub fn compile(&self) -> Result<CompiledRules, RulesError> {
        if self.root_selectors.is_empty() {
            return Err(RulesError::Missing("root selector"));
        }
        if self.max_pages == 0 {
            return Err(RulesError::Missing("page (max_pages is 0)"));
        }
        Ok(CompiledRules {
            root: parse_all("root_selectors", &self.root_selectors)?,
            clutter: parse_all("clutter_selectors", &self.clutter_selectors)?,
            truncate_after: parse_all("truncate_after", &self.truncate_after)?,
            next_page: parse_all("next_page_selectors", &self.next_page_selectors)?,
            title: parse_all("title_selectors", &self.title_selectors)?,
            author: parse_all("author_selectors", &self.author_selectors)?,
            date: parse_all("date_selectors", &self.date_selectors)?,
        })
    }
}

/// Parsed selectors of a [`SiteRules`].
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub root: Vec<Selector>,
    pub clutter: Vec<Selector>,
    pub truncate_after: Vec<Selector>,
    pub next_page: Vec<Selector>,
    pub title: Vec<Selector>,
    pub author: Vec<Selector>,
    pub date: Vec<Selector>,
}

fn parse_all(field: &'static str, selectors: &[String]) -> Result<Vec<Selector>, RulesError> {
    selectors
        .iter()
        .map(|raw| {
            Selector::parse(raw).map_err(|err| RulesError::InvalidSelector {
                field,
                selector: raw.clone(),
                message: err.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_compile() {
        let compiled = SiteRules::golem().compile().unwrap();
        assert_eq!(compiled.root.len(), 5);
        assert!(!compiled.clutter.is_empty());
    }

    #[test]
    fn invalid_selector_names_the_field() {
        let rules = SiteRules {
            clutter_selectors: vec!["div[".to_string()],
            ..SiteRules::golem()
        };
        match rules.compile() {
            Err(RulesError::InvalidSelector { field, selector, .. }) => {
                assert_eq!(field, "clutter_selectors");
                assert_eq!(selector, "div[");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_root_list_is_rejected() {
        let rules = SiteRules {
            root_selectors: Vec::new(),
            ..SiteRules::golem()
        };
        assert!(matches!(rules.compile(), Err(RulesError::Missing(_))));
    }

    #[test]
    fn ron_round_trip_and_partial_files() {
        let text = SiteRules::golem().to_ron_string().unwrap();
        assert_eq!(SiteRules::from_ron_str(&text).unwrap(), SiteRules::golem());

        let partial = SiteRules::from_ron_str(r#"(name: "example", max_pages: 3)"#).unwrap();
        assert_eq!(partial.name, "example");
        assert_eq!(partial.max_pages, 3);
        assert_eq!(partial.root_selectors, SiteRules::golem().root_selectors);
    }
}

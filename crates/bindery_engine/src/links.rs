use url::Url;

/// Resolve a reference found in markup against `base`.
///
/// Returns `None` for empty values, fragment-only and query-only references,
/// `javascript:` pseudo links and inline `data:` payloads.
pub fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#')
        || lower.starts_with('?')
        || lower.starts_with("javascript:")
        || lower.starts_with("data:")
    {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.join(trimmed).ok()
}

/// Rewrite a hyperlink target to absolute form.
///
/// Already-absolute targets (any scheme, including `mailto:`) and in-page
/// anchors are returned unchanged.
pub fn absolutize_href(href: &str, base: &Url) -> String {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || Url::parse(trimmed).is_ok() {
        return href.to_string();
    }
    match base.join(trimmed) {
        Ok(url) => url.into(),
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.golem.de/news/artikel-2510-1.html").unwrap()
    }

    #[test]
    fn relative_references_are_joined() {
        let url = resolve_url("../img/a.jpg", &base()).unwrap();
        assert_eq!(url.as_str(), "https://www.golem.de/img/a.jpg");
        let url = resolve_url("//cdn.golem.de/b.png", &base()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.golem.de/b.png");
    }

    #[test]
    fn non_resources_are_ignored() {
        assert!(resolve_url("", &base()).is_none());
        assert!(resolve_url("#top", &base()).is_none());
        assert!(resolve_url("javascript:void(0)", &base()).is_none());
        assert!(resolve_url("data:image/gif;base64,R0lGOD", &base()).is_none());
    }

    #[test]
    fn hrefs_become_absolute_but_keep_other_schemes() {
        assert_eq!(
            absolutize_href("/specials/", &base()),
            "https://www.golem.de/specials/"
        );
        assert_eq!(absolutize_href("mailto:a@b.de", &base()), "mailto:a@b.de");
        assert_eq!(absolutize_href("#fn1", &base()), "#fn1");
        assert_eq!(
            absolutize_href("https://example.com/x", &base()),
            "https://example.com/x"
        );
    }
}

//! Article URL list: positional arguments followed by the lines of `--urls-file`.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use url::Url;

/// Gather URLs in order, validating that each is absolute http(s).
pub fn collect_urls(positional: &[String], urls_file: Option<&Path>) -> Result<Vec<String>> {
    let mut urls: Vec<String> = positional.to_vec();

    if let Some(path) = urls_file {
        let text = if path == Path::new("-") {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read article URLs from stdin")?;
            buffer
        } else {
            fs::read_to_string(path)
                .with_context(|| format!("failed to read URL list {}", path.display()))?
        };
        urls.extend(parse_url_list(&text));
    }

    for url in &urls {
        let parsed = Url::parse(url).with_context(|| format!("not a valid URL: {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("only http(s) article URLs are supported: {url}");
        }
    }
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are ignored.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| !token.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# weekend reading\nhttps://www.golem.de/a.html\n\n  https://www.golem.de/b.html  # second\n";
        assert_eq!(
            parse_url_list(text),
            vec![
                "https://www.golem.de/a.html".to_string(),
                "https://www.golem.de/b.html".to_string()
            ]
        );
    }

    #[test]
    fn url_fragments_are_not_comments() {
        assert_eq!(
            parse_url_list("https://www.golem.de/a.html#kommentare\n"),
            vec!["https://www.golem.de/a.html#kommentare".to_string()]
        );
    }

    #[test]
    fn file_urls_follow_positional_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        fs::write(&path, "https://x.test/2\n").unwrap();
        let urls = collect_urls(&["https://x.test/1".to_string()], Some(&path)).unwrap();
        assert_eq!(urls, vec!["https://x.test/1", "https://x.test/2"]);
    }

    #[test]
    fn non_http_urls_are_rejected() {
        assert!(collect_urls(&["ftp://x.test/a".to_string()], None).is_err());
        assert!(collect_urls(&["golem.de/a".to_string()], None).is_err());
    }
}

use bindery_engine::{Article, DateLocale, Fragment, Normalizer, PageMetadata, SiteRules};
use pretty_assertions::assert_eq;

fn article(date: Option<&str>, pages: &[&str]) -> Article {
    let fragments = pages
        .iter()
        .enumerate()
        .map(|(i, html)| Fragment {
            page: i + 1,
            url: format!("https://www.golem.de/news/serie-{}.html", i + 1),
            html: html.to_string(),
        })
        .collect();
    Article::new(
        "https://www.golem.de/news/serie-1.html",
        PageMetadata {
            title: Some("Serie".to_string()),
            author: None,
            date: date.map(str::to_string),
        },
        fragments,
    )
}

fn golem() -> Normalizer {
    Normalizer::from_rules(&SiteRules::golem())
}

fn source_links(article: &Article) -> usize {
    article
        .fragments
        .iter()
        .map(|f| f.html.matches("data-bindery-source").count())
        .sum()
}

#[test]
fn normalizing_twice_equals_normalizing_once() {
    let raw = article(
        Some("2025-10-29T10:36:01.000Z"),
        &[
            r#"<p><a href="/news/mehr.html">mehr</a> <time datetime="2025-10-29T10:36:01.000Z">gestern</time></p>"#,
            "<p>Seite zwei</p>",
        ],
    );

    let once = golem().normalize(raw);
    let twice = golem().normalize(once.clone());

    assert_eq!(twice, once);
    assert_eq!(source_links(&once), 1);
}

#[test]
fn source_link_goes_at_the_end_of_the_last_page() {
    let normalized = golem().normalize(article(None, &["<p>eins</p>", "<p>zwei</p>"]));

    assert_eq!(normalized.fragments[0].html, "<p>eins</p>");
    assert_eq!(
        normalized.fragments[1].html,
        concat!(
            "<p>zwei</p>",
            r#"<div class="source-link" data-bindery-source="true"><p><strong>Quelle:</strong> "#,
            r#"<a href="https://www.golem.de/news/serie-1.html">https://www.golem.de/news/serie-1.html</a></p></div>"#
        )
    );
}

#[test]
fn relative_links_become_absolute() {
    let normalized = golem().normalize(article(
        None,
        &[r##"<a href="../specials/ki/">KI</a><a href="#fn1">1</a><a href="mailto:leser@golem.de">Post</a><a href="https://example.com/x">x</a>"##],
    ));

    let html = &normalized.fragments[0].html;
    assert!(html.contains(r#"<a href="https://www.golem.de/specials/ki/">KI</a>"#));
    assert!(html.contains(r##"<a href="#fn1">1</a>"##));
    assert!(html.contains(r#"<a href="mailto:leser@golem.de">Post</a>"#));
    assert!(html.contains(r#"<a href="https://example.com/x">x</a>"#));
}

#[test]
fn dates_get_a_german_display_form() {
    let normalized = golem().normalize(article(
        Some("2025-10-29T10:36:01.000Z"),
        &[r#"<p><time datetime="2024-03-01">1.3.</time></p>"#],
    ));

    let date = normalized.date.unwrap();
    assert_eq!(date.raw, "2025-10-29T10:36:01.000Z");
    assert_eq!(date.display, "29. Oktober 2025, 10:36 Uhr");
    assert!(normalized.fragments[0]
        .html
        .starts_with(r#"<p><time datetime="2024-03-01">1. März 2024</time></p>"#));
}

#[test]
fn unparsable_and_missing_dates_pass_through() {
    let odd = golem().normalize(article(Some("irgendwann"), &["<p>x</p>"]));
    let date = odd.date.unwrap();
    assert_eq!(date.display, "irgendwann");
    assert_eq!(date.raw, "irgendwann");

    let none = golem().normalize(article(None, &["<p>x</p>"]));
    assert_eq!(none.date, None);
}

#[test]
fn english_locale_is_available() {
    let normalizer = Normalizer::new(DateLocale::English, "Source");
    let normalized = normalizer.normalize(article(Some("2025-10-29T10:36:01Z"), &["<p>x</p>"]));
    assert_eq!(normalized.date.unwrap().display, "29 October 2025, 10:36");
    assert!(normalized.fragments[0].html.contains("<strong>Source:</strong>"));
}

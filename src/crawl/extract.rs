// src/crawl/extract.rs
// =============================================================================
// Pulls what the checks need out of a fetched HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// For every <a href> we keep the raw href and try to turn it into an
// absolute URL with the `url` crate. Links to other schemes (mailto:, ftp:,
// sms:...) are dropped. Links that can't be parsed at all are kept with no
// URL, so the Links check can report them as malformed.
//
// Rust concepts:
// - Enums: an href resolves to a web URL, another scheme, or nothing
// - OnceLock: build the CSS selectors once and reuse them
// =============================================================================

use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::asset::{DiscoveredLink, PageData};

fn link_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    // "a[href]" is a constant, known-valid selector
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("valid selector"))
}

fn title_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("title").expect("valid selector"))
}

// Parses a page and returns its title and links
//
// Parameters:
//   html: the HTML content (borrowed as &str)
//   base: the URL the page was fetched from (for resolving relative links)
//
// The HTTP fields of PageData are left empty; the crawler fills them in.
pub fn parse_page(html: &str, base: &Url) -> PageData {
    let document = Html::parse_document(html);

    let title = document
        .select(title_selector())
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let links = document
        .select(link_selector())
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| is_followable(href))
        .filter_map(|href| {
            let url = match resolve_href(base, href) {
                Href::Web(url) => Some(url),
                Href::OtherScheme => return None,
                Href::Malformed => None,
            };
            Some(DiscoveredLink {
                href: href.to_string(),
                url,
            })
        })
        .collect();

    PageData {
        title,
        links,
        ..PageData::default()
    }
}

// Same-page anchors point back at the page itself
fn is_followable(href: &str) -> bool {
    let href = href.trim();
    !(href.is_empty() || href.starts_with('#'))
}

/// What an href turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Href {
    /// An absolute http(s) URL, fragment dropped
    Web(Url),
    /// A valid URL we never fetch (mailto:, tel:, ftp:, javascript:...)
    OtherScheme,
    /// Not a URL at all
    Malformed,
}

// Resolves a (possibly relative) href against the page URL.
//
// The fragment is dropped: "/docs#install" and "/docs" are the same page.
//
// Examples:
//   base = "https://example.com/page/"
//   href = "/docs" -> Web("https://example.com/docs")
//   href = "../other#x" -> Web("https://example.com/other")
//   href = "mailto:me@example.com" -> OtherScheme
//   href = "http://[::1" -> Malformed
pub fn resolve_href(base: &Url, href: &str) -> Href {
    let Ok(mut url) = base.join(href.trim()) else {
        return Href::Malformed;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return Href::OtherScheme;
    }
    url.set_fragment(None);
    Href::Web(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/page/").unwrap()
    }

    fn web(href: &str) -> String {
        match resolve_href(&base(), href) {
            Href::Web(url) => url.to_string(),
            other => panic!("{} resolved to {:?}", href, other),
        }
    }

    #[test]
    fn test_resolve_relative_link() {
        assert_eq!(web("/docs"), "https://example.com/docs");
    }

    #[test]
    fn test_resolve_strips_fragment() {
        assert_eq!(web("../other#section"), "https://example.com/other");
    }

    #[test]
    fn test_resolve_absolute_link() {
        assert_eq!(web("https://other.com"), "https://other.com/");
    }

    #[test]
    fn test_malformed_href_does_not_resolve() {
        assert_eq!(resolve_href(&base(), "http://[::1"), Href::Malformed);
    }

    #[test]
    fn test_other_schemes_are_recognised() {
        for href in ["ftp://example.com/file.tar", "sms:+123", "mailto:a@b.c", "javascript:void(0)"] {
            assert_eq!(resolve_href(&base(), href), Href::OtherScheme, "{}", href);
        }
    }

    #[test]
    fn test_non_web_links_are_dropped() {
        let html = r#"
            <a href="ftp://example.com/file.tar">Archive</a>
            <a href="sms:+123">Text us</a>
            <a href="tel:+123">Call</a>
            <a href="/ok">Ok</a>
        "#;
        let page = parse_page(html, &base());
        let hrefs: Vec<_> = page.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/ok"]);
    }

    #[test]
    fn test_parse_page_collects_title_and_links() {
        let html = r##"
            <html><head><title> Home </title></head>
            <body>
              <a href="/docs">Docs</a>
              <a href="#top">Top</a>
              <a href="mailto:test@example.com">Email</a>
              <a href="https://rust-lang.org">Rust</a>
              <a href="http://[::1">Broken</a>
            </body></html>
        "##;
        let page = parse_page(html, &base());

        assert_eq!(page.title.as_deref(), Some("Home"));
        let hrefs: Vec<_> = page.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/docs", "https://rust-lang.org", "http://[::1"]);
        assert!(page.links[2].url.is_none());
    }

    #[test]
    fn test_missing_title() {
        let page = parse_page("<p>no head here</p>", &base());
        assert_eq!(page.title, None);
        assert!(page.links.is_empty());
    }
}

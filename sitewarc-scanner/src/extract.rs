use crate::error::{Result, ScanError};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

static CSS_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(['"]?([^'")\s]+)['"]?\)"#).expect("hardcoded regex pattern is valid")
});

/// Read access to a parsed HTML document, as much as link extraction needs.
pub trait LinkSource {
    /// Values of `attr` on every element that carries it, in document order.
    fn attribute_values(&self, attr: &str) -> Result<Vec<String>>;

    /// Values of `attr` on every `tag` element that carries it.
    fn tag_attribute_values(&self, tag: &str, attr: &str) -> Result<Vec<String>>;

    /// Text content of every `tag` element.
    fn element_texts(&self, tag: &str) -> Result<Vec<String>>;
}

/// [`LinkSource`] backed by the `scraper` HTML5 parser.
pub struct ScraperDocument {
    document: Html,
}

impl ScraperDocument {
    pub fn parse(html: &str) -> Result<Self> {
        panic::catch_unwind(AssertUnwindSafe(|| Html::parse_document(html)))
            .map(|document| Self { document })
            .map_err(|_| ScanError::ParseError("HTML parser panicked".to_string()))
    }

    fn select_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        let selector = Selector::parse(selector)
            .map_err(|e| ScanError::ParseError(format!("selector {}: {}", selector, e)))?;
        Ok(self
            .document
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::to_string)
            .collect())
    }
}

impl LinkSource for ScraperDocument {
    fn attribute_values(&self, attr: &str) -> Result<Vec<String>> {
        self.select_attr(&format!("[{}]", attr), attr)
    }

    fn tag_attribute_values(&self, tag: &str, attr: &str) -> Result<Vec<String>> {
        self.select_attr(&format!("{}[{}]", tag, attr), attr)
    }

    fn element_texts(&self, tag: &str) -> Result<Vec<String>> {
        let selector = Selector::parse(tag)
            .map_err(|e| ScanError::ParseError(format!("selector {}: {}", tag, e)))?;
        Ok(self
            .document
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .collect())
    }
}

/// Every outbound reference in `html`, resolved against `base_url`, once
/// each and in the order first seen.
///
/// A document that cannot be parsed yields no links.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        warn!("Cannot extract links, invalid base URL: {}", base_url);
        return Vec::new();
    };

    let links = ScraperDocument::parse(html).and_then(|document| collect_links(&document, &base));
    match links {
        Ok(links) => {
            debug!("Extracted {} links from {}", links.len(), base_url);
            links
        }
        Err(e) => {
            warn!("Error parsing HTML from {}: {}", base_url, e);
            Vec::new()
        }
    }
}

/// Extraction policy over any [`LinkSource`].
pub fn collect_links<S: LinkSource>(source: &S, base: &Url) -> Result<Vec<String>> {
    let mut links = DiscoveredLinks::default();

    for href in source.attribute_values("href")? {
        if !is_skipped_href(&href) {
            links.insert_resolved(base, &href);
        }
    }

    for src in source.attribute_values("src")? {
        links.insert_resolved(base, &src);
    }

    for css in source.element_texts("style")? {
        for reference in css_urls(&css) {
            links.insert_resolved(base, reference);
        }
    }

    // Stylesheet links are scanned on their own so they survive any change
    // to the generic href rule above
    for href in source.tag_attribute_values("link", "href")? {
        links.insert_resolved(base, &href);
    }

    Ok(links.ordered)
}

/// `url(...)` targets inside a block of CSS.
pub fn css_urls(css: &str) -> impl Iterator<Item = &str> {
    CSS_URL_PATTERN
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_skipped_href(href: &str) -> bool {
    let href = href.trim_start();
    let lower = href.get(..11).unwrap_or(href).to_ascii_lowercase();
    href.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:")
}

/// Resolved links in discovery order, without repeats.
#[derive(Default)]
struct DiscoveredLinks {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl DiscoveredLinks {
    fn insert_resolved(&mut self, base: &Url, reference: &str) {
        let reference = reference.trim();
        if reference.is_empty() {
            return;
        }
        match base.join(reference) {
            Ok(resolved) => {
                let resolved = resolved.to_string();
                if self.seen.insert(resolved.clone()) {
                    self.ordered.push(resolved);
                }
            }
            Err(e) => debug!("Unresolvable reference {:?} on {}: {}", reference, base, e),
        }
    }
}

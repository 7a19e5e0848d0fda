//! HTML parsing and extraction
//!
//! Turns a fetched body into the indexed fields: title, visible text,
//! keywords, and the out-links to feed back into the frontier. Link
//! candidates that fail normalization are dropped silently; a page with no
//! usable links is a perfectly ordinary page.

use crate::url::normalize_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Number of keywords kept per page
const KEYWORD_LIMIT: usize = 10;

/// Minimum token length considered for keywords
const MIN_TOKEN_LEN: usize = 3;

/// Common English words excluded from keyword extraction
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old",
    "see", "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use",
    "that", "with", "have", "this", "will", "your", "from", "they", "know", "want", "been",
    "good", "much", "some", "time", "very", "when", "come", "here", "just", "like", "long",
    "make", "many", "more", "only", "over", "such", "take", "than", "them", "well", "were",
    "what", "which", "their", "there", "about", "would", "these", "other", "into", "could",
    "then", "also", "after", "first", "where", "most", "should",
];

/// Extracted fields from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// Text of the first `<title>` element; empty when absent
    pub title: String,

    /// Visible text with whitespace runs collapsed
    pub text: String,

    /// Up to ten most frequent tokens, ties broken by first occurrence
    pub keywords: Vec<String>,

    /// Canonical absolute out-links
    pub links: Vec<Url>,
}

/// Parsing failures
///
/// Decode failure is the only error condition: the HTML5 tree construction
/// underneath `scraper` synthesizes an `<html>` root for every input, so a
/// structurally malformed document repairs into an empty-ish page rather
/// than an error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("body is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
}

/// Parses an HTML body fetched from `page_url`
///
/// # Extraction Rules
///
/// - **Title**: text of the first `<title>` element, trimmed; empty string
///   if the document has none.
/// - **Text**: concatenation of text nodes outside `<script>`, `<style>`,
///   and `<noscript>`, with whitespace runs collapsed to single spaces.
/// - **Keywords**: the ten most frequent lowercased alphanumeric tokens of
///   length ≥ 3 not on the stop-word list.
/// - **Links**: every `href` of an anchor element, resolved against
///   `page_url` and canonicalized; rejects are dropped silently.
///
/// The underlying parser recovers from malformation at any nesting level,
/// so arbitrarily broken markup yields a best-effort result rather than an
/// error.
pub fn parse(body: &[u8], page_url: &Url) -> Result<ParsedPage, ParseError> {
    let html = std::str::from_utf8(body)?;
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let text = extract_text(&document);
    let keywords = extract_keywords(&text);
    let links = extract_links(&document, page_url);

    Ok(ParsedPage {
        title,
        text,
        keywords,
        links,
    })
}

/// Parses a selector that is known-valid at compile time
fn selector(css: &str) -> Selector {
    // All selectors in this module are static strings; a parse failure is a
    // programming error, not an input condition.
    Selector::parse(css).unwrap_or_else(|_| unreachable!("invalid static selector: {css}"))
}

fn extract_title(document: &Html) -> String {
    document
        .select(&selector("title"))
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Collects visible text, skipping script/style/noscript subtrees
fn extract_text(document: &Html) -> String {
    let mut chunks: Vec<String> = Vec::new();

    if let Some(root) = document.select(&selector("html")).next() {
        collect_text(root, &mut chunks);
    }

    chunks
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text(element: ElementRef, chunks: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if matches!(name, "script" | "style" | "noscript") {
                continue;
            }
            collect_text(child_element, chunks);
        } else if let Some(text) = child.value().as_text() {
            if !text.trim().is_empty() {
                chunks.push(text.to_string());
            }
        }
    }
}

/// Picks the most frequent tokens from collapsed page text
fn extract_keywords(text: &str) -> Vec<String> {
    // token -> (count, index of first occurrence)
    let mut frequencies: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.len() < MIN_TOKEN_LEN {
            continue;
        }
        let token = raw.to_lowercase();
        if STOP_WORDS.contains(&token.as_str()) {
            continue;
        }

        let entry = frequencies.entry(token).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    ranked
        .into_iter()
        .take(KEYWORD_LIMIT)
        .map(|(token, _)| token)
        .collect()
}

/// Extracts canonical out-links from anchor elements
fn extract_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    for element in document.select(&selector("a[href]")) {
        if let Some(href) = element.value().attr("href") {
            let href = href.trim();
            // Empty and fragment-only hrefs point back at the page itself.
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            if let Ok(url) = normalize_url(href, Some(page_url)) {
                links.push(url);
            }
        }
    }

    links
}

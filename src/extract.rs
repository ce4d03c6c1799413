//! Plain-text extraction from scraped company pages.

use std::path::Path;
use std::sync::LazyLock;

use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::filters::{dedup, FilterRules};
use crate::model::ExtractMethod;
use crate::preprocess::strip_boilerplate;

static P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static META_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static HREF_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static TEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^tel:(.*)").unwrap());
static MAILTO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^mailto:(.*)").unwrap());

/// Subtrees whose text is never visible page content.
const INVISIBLE_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Meta names kept when filtering.
const META_ALLOWED: &[&str] = &["title", "description"];

/// Options for [`DataExtractor::extract`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ExtractOptions {
    pub filter: bool,
    pub paragraphs_only: bool,
    pub extract_meta: bool,
    pub extract_body: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            filter: true,
            paragraphs_only: false,
            extract_meta: true,
            extract_body: true,
        }
    }
}

impl ExtractOptions {
    pub fn with_filter(mut self, v: bool) -> Self {
        self.filter = v;
        self
    }
    pub fn with_paragraphs_only(mut self, v: bool) -> Self {
        self.paragraphs_only = v;
        self
    }
    pub fn with_extract_meta(mut self, v: bool) -> Self {
        self.extract_meta = v;
        self
    }
    pub fn with_extract_body(mut self, v: bool) -> Self {
        self.extract_body = v;
        self
    }

    /// The flags recorded alongside stored text.
    pub fn method(&self) -> ExtractMethod {
        ExtractMethod {
            extract_meta: self.extract_meta,
            extract_body: self.extract_body,
            paragraphs_only: self.paragraphs_only,
        }
    }
}

/// Telephone numbers and e-mail addresses linked from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleData {
    pub tel: Vec<String>,
    pub email: Vec<String>,
}

/// Extracts text and contact data from one loaded HTML document at a time.
///
/// # Example
///
/// ```rust
/// use sni_corpus::{DataExtractor, ExtractOptions};
///
/// let mut extractor = DataExtractor::new();
/// extractor.load("<html><body><p>Vi bygger hus.</p></body></html>").unwrap();
/// let text = extractor.extract(&ExtractOptions::default()).unwrap();
/// assert_eq!(text, "Vi bygger hus.");
/// ```
#[derive(Debug, Default)]
pub struct DataExtractor {
    doc: Option<Html>,
    rules: FilterRules,
}

impl DataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: FilterRules) -> Self {
        Self { doc: None, rules }
    }

    /// `true` once a document has been loaded successfully.
    pub fn has_document(&self) -> bool {
        self.doc.is_some()
    }

    /// Parse `raw_html`, replacing any previously loaded document.
    pub fn load(&mut self, raw_html: &str) -> Result<(), ExtractError> {
        self.doc = None;
        let doc = Html::parse_document(raw_html);
        let has_root = doc.tree.root().children().any(|c| c.value().is_element());
        if !has_root {
            return Err(ExtractError::Parse("no document element".to_string()));
        }
        self.doc = Some(doc);
        Ok(())
    }

    /// Load from raw bytes, which must be UTF-8.
    pub fn load_bytes(&mut self, raw: &[u8]) -> Result<(), ExtractError> {
        self.doc = None;
        let html = std::str::from_utf8(raw).map_err(|e| ExtractError::Parse(e.to_string()))?;
        self.load(html)
    }

    /// Load an HTML file from disk.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let path = path.as_ref();
        self.doc = None;
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractError::NotFound(path.to_path_buf()),
            _ => ExtractError::Io(e),
        })?;
        self.load_bytes(&raw)
    }

    fn document(&self) -> Result<&Html, ExtractError> {
        self.doc.as_ref().ok_or(ExtractError::NoDocument)
    }

    /// Extract a single cleaned string from the loaded document.
    ///
    /// Stages run in a fixed order: prune links, scripts and cookie banners;
    /// collect body strings; drop strings mentioning a year; deduplicate; add
    /// meta title/description; strip filtered characters and collapse
    /// whitespace. Without `filter` only collection and whitespace collapsing
    /// happen.
    pub fn extract(&self, options: &ExtractOptions) -> Result<String, ExtractError> {
        let doc = self.document()?;
        let mut parts = Vec::new();

        if options.extract_body || options.paragraphs_only {
            let mut body = if options.filter {
                collect_body(&strip_boilerplate(doc), options.paragraphs_only)
            } else {
                collect_body(doc, options.paragraphs_only)
            };
            if options.filter {
                self.rules.drop_filtered(&mut body);
                body = dedup(body);
            }
            parts.extend(body);
        }

        if options.extract_meta {
            let meta = collect_meta(doc, options.filter);
            parts.extend(if options.filter { dedup(meta) } else { meta });
        }

        let mut text = parts.join(" ");
        if options.filter {
            text = self.rules.strip_chars(&text);
        }
        Ok(self.rules.collapse_whitespace(&text))
    }

    /// Find telephone numbers and e-mail addresses in links whose `href`
    /// starts with `tel:` / `mailto:`.
    pub fn extract_simple_data(&self) -> Result<SimpleData, ExtractError> {
        let doc = self.document()?;
        let tel = from_href(doc, &TEL_RE)
            .into_iter()
            .map(|t| t.replace(['-', ' '], ""))
            .collect();
        let email = from_href(doc, &MAILTO_RE);
        Ok(SimpleData {
            tel: dedup(tel),
            email: dedup(email),
        })
    }
}

/// Body strings in document order: one per `<p>`, or one per visible text node.
fn collect_body(doc: &Html, paragraphs_only: bool) -> Vec<String> {
    if paragraphs_only {
        // From the root: pruned subtrees are detached but still in the arena.
        return doc
            .root_element()
            .select(&P_SEL)
            .map(|p| p.text().collect::<String>())
            .collect();
    }
    let mut out = Vec::new();
    collect_text_nodes(&doc.tree.root(), &mut out);
    out
}

fn collect_text_nodes(node: &NodeRef<Node>, out: &mut Vec<String>) {
    match node.value() {
        Node::Element(el) if INVISIBLE_TAGS.contains(&el.name()) => {}
        Node::Text(text) => {
            let stripped = text.text.trim();
            if !stripped.is_empty() {
                out.push(stripped.to_string());
            }
        }
        _ => {
            for child in node.children() {
                collect_text_nodes(&child, out);
            }
        }
    }
}

/// `content` of every `<meta>` carrying a `name` (or `property`) attribute.
fn collect_meta(doc: &Html, filter: bool) -> Vec<String> {
    doc.select(&META_SEL)
        .filter_map(|meta| {
            let el = meta.value();
            let name = el.attr("name").or_else(|| el.attr("property"))?;
            if filter && !META_ALLOWED.iter().any(|allowed| name.contains(allowed)) {
                return None;
            }
            Some(el.attr("content").unwrap_or_default().to_string())
        })
        .collect()
}

/// Everything after the scheme of each `href` that starts with it.
fn from_href(doc: &Html, re: &Regex) -> Vec<String> {
    doc.select(&HREF_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| re.captures(href))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

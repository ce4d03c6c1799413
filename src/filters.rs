//! Regex filter rules applied by the extractor.
//!
//! String filters drop a whole collected string; character filters strip
//! matching substrings from the joined text. Whitespace collapsing runs last.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Four consecutive digits anywhere: treated as "mentions a year".
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

static PIPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|+").unwrap());

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").unwrap());

/// Emoji, pictographs, dingbats and joiners.
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}",
        r"\x{1F300}-\x{1F5FF}",
        r"\x{1F680}-\x{1F6FF}",
        r"\x{1F1E0}-\x{1F1FF}",
        r"\x{2702}-\x{27B0}",
        r"\x{24C2}-\x{1F251}",
        r"\x{1F926}-\x{1F937}",
        r"\x{10000}-\x{10FFFF}",
        r"\x{2640}-\x{2642}",
        r"\x{2600}-\x{2B55}",
        r"\x{200D}",
        r"\x{23CF}",
        r"\x{23E9}",
        r"\x{231A}",
        r"\x{FE0F}",
        r"\x{3030}",
        "]+"
    ))
    .unwrap()
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Ordered filter rules used by [`DataExtractor`](crate::DataExtractor).
#[derive(Debug, Clone)]
pub struct FilterRules {
    string_filters: Vec<&'static Regex>,
    character_filters: Vec<&'static Regex>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            string_filters: vec![&*YEAR_RE],
            character_filters: vec![&*PIPE_RE, &*HASHTAG_RE, &*EMOJI_RE],
        }
    }
}

impl FilterRules {
    /// Returns `true` if any string filter matches somewhere in `s`.
    pub fn is_filtered(&self, s: &str) -> bool {
        self.string_filters.iter().any(|re| re.is_match(s))
    }

    /// Remove every string matched by a string filter, in place.
    pub fn drop_filtered(&self, strings: &mut Vec<String>) {
        strings.retain(|s| !self.is_filtered(s));
    }

    /// Strip every character-filter match from `text`, in rule order.
    pub fn strip_chars(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.character_filters {
            if re.is_match(&out) {
                out = re.replace_all(&out, "").into_owned();
            }
        }
        out
    }

    /// Collapse whitespace runs to one space and trim the ends.
    pub fn collapse_whitespace(&self, text: &str) -> String {
        WHITESPACE_RE.replace_all(text, " ").trim().to_string()
    }
}

/// Set-based deduplication. Keeps the first occurrence of each value.
pub fn dedup(strings: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(strings.len());
    strings
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

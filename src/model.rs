//! Records exchanged between the pipeline stages and the store.

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept for one stored or scored text.
///
/// Hard ceiling of the downstream text-processing consumer.
pub const MAX_TEXT_CHARS: usize = 1_000_000;

/// Truncate `text` to at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One scraped page as written by the crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub raw_html: String,
    /// Organization number of the company the page belongs to.
    pub label: String,
}

/// Which parts of a page an extraction looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractMethod {
    pub extract_meta: bool,
    pub extract_body: bool,
    pub paragraphs_only: bool,
}

impl Default for ExtractMethod {
    fn default() -> Self {
        Self {
            extract_meta: true,
            extract_body: true,
            paragraphs_only: false,
        }
    }
}

/// Extraction result for a single URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub url: String,
    pub method: ExtractMethod,
    pub text: String,
}

/// All extracted items for one company from one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Store-assigned, increasing with insertion order.
    pub id: u64,
    pub company_id: String,
    /// Run timestamp (`%Y-%m-%d %H:%M:%S`) shared by every item of the run.
    pub date: String,
    pub data: Vec<ExtractedItem>,
}

/// A company as fetched from the business registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub org_nr: String,
    pub name: String,
    /// Website; blank when unknown.
    #[serde(default)]
    pub url: String,
    /// SNI codes, primary code first.
    #[serde(default)]
    pub branch_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Company {
    pub fn primary_code(&self) -> Option<&str> {
        self.branch_codes.first().map(String::as_str)
    }

    /// `true` if the URL has at least one non-whitespace character.
    pub fn has_url(&self) -> bool {
        self.url.chars().any(|c| !c.is_whitespace())
    }
}

/// Companies sharing one primary SNI code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniAggregate {
    /// Primary code; empty for companies without any branch code.
    pub category_code: String,
    pub companies: Vec<String>,
    pub count: usize,
}

/// An extracted record labeled with its company's branch codes.
///
/// Element type of the train, dev and test partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledDocument {
    pub company_id: String,
    pub date: String,
    pub data: Vec<ExtractedItem>,
    pub branch_codes: Vec<String>,
}

impl LabeledDocument {
    pub fn from_record(record: ExtractedRecord, branch_codes: Vec<String>) -> Self {
        Self {
            company_id: record.company_id,
            date: record.date,
            data: record.data,
            branch_codes,
        }
    }

    pub fn primary_code(&self) -> Option<&str> {
        self.branch_codes.first().map(String::as_str)
    }

    /// All item texts, each preceded by a single space.
    pub fn joined_text(&self) -> String {
        let mut text = String::with_capacity(self.data.iter().map(|d| d.text.len() + 1).sum());
        for item in &self.data {
            text.push(' ');
            text.push_str(&item.text);
        }
        text
    }
}

/// Dataset partitions written by the partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Partition {
    Train,
    Dev,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Dev, Partition::Test];

    pub fn collection(self) -> Collection {
        match self {
            Partition::Train => Collection::TrainSet,
            Partition::Dev => Collection::DevSet,
            Partition::Test => Collection::TestSet,
        }
    }
}

/// Named collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Companies,
    ExtractedData,
    TrainSet,
    DevSet,
    TestSet,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Companies,
        Collection::ExtractedData,
        Collection::TrainSet,
        Collection::DevSet,
        Collection::TestSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Companies => "companies",
            Collection::ExtractedData => "extracted_data",
            Collection::TrainSet => "train_set",
            Collection::DevSet => "dev_set",
            Collection::TestSet => "test_set",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

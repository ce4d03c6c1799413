//! Export of dataset partitions as labeled training examples.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::CorpusError;
use crate::model::{truncate_chars, LabeledDocument, Partition, MAX_TEXT_CHARS};
use crate::store::{CompanyStore, DatasetStore};

/// Every known SNI code with a zero score.
///
/// Each training example receives its own copy with the true code set to 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTemplate {
    labels: BTreeMap<String, f64>,
}

impl LabelTemplate {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: codes.into_iter().map(|c| (c.into(), 0.0)).collect(),
        }
    }

    /// All branch codes of all companies in the store.
    pub fn from_store<S: CompanyStore>(store: &S) -> Result<Self, CorpusError> {
        let companies = store.companies()?;
        Ok(Self::new(
            companies.into_iter().flat_map(|c| c.branch_codes.into_iter()),
        ))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// An owned label map with only `code` set.
    pub fn labels_for(&self, code: &str) -> BTreeMap<String, f64> {
        let mut cats = self.labels.clone();
        cats.insert(code.to_string(), 1.0);
        cats
    }
}

/// One line of an exported corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingExample {
    pub text: String,
    pub cats: BTreeMap<String, f64>,
}

/// Build a training example, or `None` if the text is shorter than `min_data_length`.
pub fn build_example(
    template: &LabelTemplate,
    doc: &LabeledDocument,
    min_data_length: usize,
) -> Option<TrainingExample> {
    let code = doc.primary_code()?;
    let joined = doc.joined_text();
    let text = truncate_chars(&joined, MAX_TEXT_CHARS);
    let length = text.chars().count();
    if length < min_data_length {
        debug!(company_id = %doc.company_id, length, "skipping company with too short text");
        return None;
    }
    debug!(company_id = %doc.company_id, sni = code, length, "processed company");
    Some(TrainingExample {
        text: text.to_string(),
        cats: template.labels_for(code),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusSummary {
    pub written: usize,
    pub skipped: usize,
    pub total_length: usize,
    pub per_label: BTreeMap<String, usize>,
}

/// Write one partition as JSON lines to `path`, replacing any existing file.
pub fn export_partition<S: DatasetStore>(
    store: &S,
    partition: Partition,
    template: &LabelTemplate,
    min_data_length: usize,
    path: &Path,
) -> Result<CorpusSummary, CorpusError> {
    let docs = store.partition(partition)?;
    let io_err = |source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    let mut summary = CorpusSummary::default();

    for doc in &docs {
        let Some(example) = build_example(template, doc, min_data_length) else {
            summary.skipped += 1;
            continue;
        };
        serde_json::to_writer(&mut out, &example)?;
        out.write_all(b"\n").map_err(io_err)?;

        summary.written += 1;
        summary.total_length += example.text.chars().count();
        if let Some(code) = doc.primary_code() {
            *summary.per_label.entry(code.to_string()).or_default() += 1;
        }
    }
    out.flush().map_err(io_err)?;

    info!(
        ?partition,
        path = %path.display(),
        written = summary.written,
        skipped = summary.skipped,
        "saved corpus"
    );
    Ok(summary)
}

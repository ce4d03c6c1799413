//! Extraction stage: scraped pages in, stored company text out.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::extract::{DataExtractor, ExtractOptions};
use crate::model::{truncate_chars, ExtractedItem, RawPage, MAX_TEXT_CHARS};
use crate::store::{CompanyStore, ExtractStore};

/// Timestamp format of extraction runs; also the bucket key of stored records.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read every `*.json` scraped page in `dir`, sorted by file name.
///
/// Unreadable or malformed files are logged and skipped.
pub fn read_scraped_dir(dir: &Path) -> Result<Vec<RawPage>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x == "json"))
        .collect();
    paths.sort();

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let page = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<RawPage>(&raw).map_err(|e| e.to_string()));
        match page {
            Ok(page) => pages.push(page),
            Err(error) => warn!(path = %path.display(), %error, "skipping scraped file"),
        }
    }
    Ok(pages)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub extracted: usize,
    pub skipped: usize,
    pub total_length: usize,
    /// Extracted pages per primary SNI code.
    pub per_label: BTreeMap<String, usize>,
}

/// One extraction run. Every page it stores shares the run timestamp.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    options: ExtractOptions,
    timestamp: String,
}

impl ExtractionRun {
    /// A run stamped with the current local time.
    pub fn new(options: ExtractOptions) -> Self {
        let timestamp = chrono::Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        Self::with_timestamp(options, timestamp)
    }

    pub fn with_timestamp(options: ExtractOptions, timestamp: impl Into<String>) -> Self {
        Self {
            options,
            timestamp: timestamp.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Extract every page and append its text to the owning company's record.
    ///
    /// Pages whose company is unknown or whose HTML cannot be loaded are
    /// skipped with a warning. Store errors abort the run.
    pub fn run<S>(&self, pages: &[RawPage], store: &mut S) -> Result<ExtractionSummary, StoreError>
    where
        S: CompanyStore + ExtractStore,
    {
        info!(pages = pages.len(), timestamp = %self.timestamp, "starting extraction");
        let mut extractor = DataExtractor::new();
        let mut summary = ExtractionSummary::default();

        for page in pages {
            debug!(url = %page.url, "extracting page");
            let Some(company) = store.company_by_org_nr(&page.label)? else {
                warn!(url = %page.url, org_nr = %page.label, "no company found for page");
                summary.skipped += 1;
                continue;
            };

            let loaded = extractor.load(&page.raw_html);
            let text = match loaded.and_then(|()| extractor.extract(&self.options)) {
                Ok(text) => text,
                Err(error) => {
                    warn!(url = %page.url, %error, "could not extract page");
                    summary.skipped += 1;
                    continue;
                }
            };

            let length = text.chars().count();
            if length > MAX_TEXT_CHARS {
                debug!(company = %company.name, length, "truncating extracted text");
            }
            let text = truncate_chars(&text, MAX_TEXT_CHARS).to_string();
            let stored_length = text.chars().count();

            store.append_extracted(
                &company.id,
                &self.timestamp,
                ExtractedItem {
                    url: page.url.clone(),
                    method: self.options.method(),
                    text,
                },
            )?;

            summary.extracted += 1;
            summary.total_length += stored_length;
            if let Some(code) = company.primary_code() {
                *summary.per_label.entry(code.to_string()).or_default() += 1;
            }
        }

        log_summary(&summary);
        Ok(summary)
    }
}

fn log_summary(summary: &ExtractionSummary) {
    for (label, count) in &summary.per_label {
        debug!(sni = %label, pages = count, "extracted pages per label");
    }
    let average = if summary.per_label.is_empty() {
        0
    } else {
        summary.total_length / summary.per_label.len()
    };
    info!(
        extracted = summary.extracted,
        skipped = summary.skipped,
        labels = summary.per_label.len(),
        total_length = summary.total_length,
        average_length_per_label = average,
        "extraction finished"
    );
}

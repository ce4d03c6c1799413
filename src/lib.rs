//! Company web-text extraction and SNI-stratified dataset building.
//!
//! `sni_corpus` turns scraped company websites into a labeled text dataset
//! for industry (SNI code) classification:
//!
//! 1. [`DataExtractor`] cleans raw HTML into plain text.
//! 2. [`ExtractionRun`] stores that text per company and run.
//! 3. [`Partitioner`] splits companies into train/dev/test, stratified by
//!    primary SNI code.
//! 4. [`export_partition`] writes each partition as labeled JSON lines.
//! 5. [`Scorer`] rates a model's ranked predictions on the test partition.
//!
//! # Quick start
//!
//! ```rust
//! use sni_corpus::{DataExtractor, ExtractOptions};
//!
//! let html = r#"<html><head><meta name="description" content="Bageri i Umeå"></head>
//! <body><a href="/">Hem</a><p>Vi bakar bröd.</p><p>Grundat 1998.</p></body></html>"#;
//!
//! let mut extractor = DataExtractor::new();
//! extractor.load(html).unwrap();
//! let text = extractor.extract(&ExtractOptions::default()).unwrap();
//! assert_eq!(text, "Vi bakar bröd. Bageri i Umeå");
//! ```

mod corpus;
mod error;
mod evaluate;
mod extract;
pub mod filters;
mod model;
mod partition;
mod pipeline;
mod preprocess;
pub mod store;

pub use corpus::{build_example, export_partition, CorpusSummary, LabelTemplate, TrainingExample};
pub use error::{CorpusError, EvaluationError, ExtractError, PartitionError, StoreError};
pub use evaluate::{
    evaluate, percentage, EvaluationReport, LabelResults, Outcome, PointResult, Predictions,
    Scorer,
};
pub use extract::{DataExtractor, ExtractOptions, SimpleData};
pub use filters::FilterRules;
pub use model::{
    truncate_chars, Collection, Company, ExtractMethod, ExtractedItem, ExtractedRecord,
    LabeledDocument, Partition, RawPage, SniAggregate, MAX_TEXT_CHARS,
};
pub use partition::{CategorySplit, PartitionSummary, Partitioner, SplitPercentages};
pub use pipeline::{read_scraped_dir, ExtractionRun, ExtractionSummary, RUN_TIMESTAMP_FORMAT};
pub use store::{CompanyStore, DatasetStore, ExtractStore, MemoryStore};

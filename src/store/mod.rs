//! Persistence traits for companies, extracted text and dataset partitions.
//!
//! The storage layer is split into focused traits:
//! - `CompanyStore`: registry records and the per-SNI aggregation
//! - `ExtractStore`: extracted text grouped per (company, run)
//! - `DatasetStore`: the train/dev/test partitions
//!
//! All operations are whole-document reads or writes.

mod memory;

pub use memory::MemoryStore;

use url::Url;

use crate::error::StoreError;
use crate::model::{Company, ExtractedItem, ExtractedRecord, LabeledDocument, Partition, SniAggregate};

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait CompanyStore {
    /// Append companies in the given order.
    fn insert_companies(&mut self, companies: Vec<Company>) -> Result<()>;

    fn company_by_id(&self, id: &str) -> Result<Option<Company>>;

    fn company_by_org_nr(&self, org_nr: &str) -> Result<Option<Company>>;

    /// First company whose URL contains `needle`.
    fn company_by_url_fragment(&self, needle: &str) -> Result<Option<Company>>;

    /// All companies in insertion order.
    fn companies(&self) -> Result<Vec<Company>>;

    /// Companies with a non-blank URL grouped by primary SNI code.
    ///
    /// Groups are ordered by code; companies keep insertion order. Companies
    /// without branch codes form the group with the empty code.
    fn aggregate_by_primary_code(&self) -> Result<Vec<SniAggregate>>;

    /// Find the company owning `url`: full host first, then `domain.tld`.
    fn company_by_url(&self, url: &str, try_base_domain: bool) -> Result<Option<Company>> {
        let Some(host) = host_of(url) else {
            return Ok(None);
        };
        if let Some(company) = self.company_by_url_fragment(&host)? {
            return Ok(Some(company));
        }
        if !try_base_domain {
            return Ok(None);
        }
        match base_domain(&host) {
            Some(base) if base != host => self.company_by_url_fragment(base),
            _ => Ok(None),
        }
    }
}

pub trait ExtractStore {
    /// Append `item` to the record of `(company_id, date)`, creating it if needed.
    fn append_extracted(&mut self, company_id: &str, date: &str, item: ExtractedItem)
        -> Result<()>;

    /// Most recently created record for the company.
    fn latest_extracted(&self, company_id: &str) -> Result<Option<ExtractedRecord>>;
}

pub trait DatasetStore {
    /// Delete every document in all three partitions.
    fn clear_partitions(&mut self) -> Result<()>;

    fn insert_partition(&mut self, partition: Partition, docs: Vec<LabeledDocument>)
        -> Result<()>;

    fn partition(&self, partition: Partition) -> Result<Vec<LabeledDocument>>;
}

/// Host of `url`; bare domains such as `ssab.se/om` are accepted.
pub(crate) fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("http://{url}")).ok())?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Registrable domain of a host per the public suffix list
/// (`www.shop.ssab.se` → `ssab.se`, `shop.acme.co.uk` → `acme.co.uk`).
pub(crate) fn base_domain(host: &str) -> Option<&str> {
    psl::domain_str(host)
}

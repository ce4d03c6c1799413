//! In-memory store with optional JSON snapshots on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{CompanyStore, DatasetStore, ExtractStore, Result};
use crate::error::StoreError;
use crate::model::{
    Collection, Company, ExtractedItem, ExtractedRecord, LabeledDocument, Partition, SniAggregate,
};

/// Store kept entirely in memory.
///
/// [`MemoryStore::open`] and [`MemoryStore::save`] persist each collection as
/// `<dir>/<collection>.json`, which is how the CLI keeps state between stages.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    companies: Vec<Company>,
    extracted: Vec<ExtractedRecord>,
    /// Positions in `extracted` per company, in insertion order.
    extracted_by_company: HashMap<String, Vec<usize>>,
    next_record_id: u64,
    train: Vec<LabeledDocument>,
    dev: Vec<LabeledDocument>,
    test: Vec<LabeledDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every collection found in `dir`; missing files are empty collections.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut store = Self {
            companies: read_collection(dir, Collection::Companies)?,
            extracted: read_collection(dir, Collection::ExtractedData)?,
            train: read_collection(dir, Collection::TrainSet)?,
            dev: read_collection(dir, Collection::DevSet)?,
            test: read_collection(dir, Collection::TestSet)?,
            ..Self::default()
        };
        store.reindex_extracted();
        debug!(
            dir = %dir.display(),
            companies = store.companies.len(),
            extracted = store.extracted.len(),
            "opened store"
        );
        Ok(store)
    }

    /// Write every collection to `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write_collection(dir, Collection::Companies, &self.companies)?;
        write_collection(dir, Collection::ExtractedData, &self.extracted)?;
        write_collection(dir, Collection::TrainSet, &self.train)?;
        write_collection(dir, Collection::DevSet, &self.dev)?;
        write_collection(dir, Collection::TestSet, &self.test)?;
        debug!(dir = %dir.display(), "saved store");
        Ok(())
    }

    pub fn extracted_count(&self) -> usize {
        self.extracted.len()
    }

    fn reindex_extracted(&mut self) {
        self.extracted_by_company.clear();
        for (pos, record) in self.extracted.iter().enumerate() {
            self.extracted_by_company
                .entry(record.company_id.clone())
                .or_default()
                .push(pos);
        }
        self.next_record_id = self.extracted.iter().map(|r| r.id + 1).max().unwrap_or(0);
    }

    fn records_of<'a>(&'a self, company_id: &str) -> impl Iterator<Item = &'a ExtractedRecord> + 'a {
        self.extracted_by_company
            .get(company_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.extracted[pos])
    }

    fn partition_mut(&mut self, partition: Partition) -> &mut Vec<LabeledDocument> {
        match partition {
            Partition::Train => &mut self.train,
            Partition::Dev => &mut self.dev,
            Partition::Test => &mut self.test,
        }
    }

    fn partition_ref(&self, partition: Partition) -> &[LabeledDocument] {
        match partition {
            Partition::Train => &self.train,
            Partition::Dev => &self.dev,
            Partition::Test => &self.test,
        }
    }
}

fn collection_path(dir: &Path, collection: Collection) -> std::path::PathBuf {
    dir.join(format!("{}.json", collection.as_str()))
}

fn read_collection<T: DeserializeOwned>(dir: &Path, collection: Collection) -> Result<Vec<T>> {
    let path = collection_path(dir, collection);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(StoreError::Io { path, source }),
    };
    serde_json::from_str(&raw).map_err(|source| StoreError::Json { path, source })
}

fn write_collection<T: Serialize>(dir: &Path, collection: Collection, items: &[T]) -> Result<()> {
    let path = collection_path(dir, collection);
    let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
}

impl CompanyStore for MemoryStore {
    fn insert_companies(&mut self, companies: Vec<Company>) -> Result<()> {
        self.companies.extend(companies);
        Ok(())
    }

    fn company_by_id(&self, id: &str) -> Result<Option<Company>> {
        Ok(self.companies.iter().find(|c| c.id == id).cloned())
    }

    fn company_by_org_nr(&self, org_nr: &str) -> Result<Option<Company>> {
        Ok(self.companies.iter().find(|c| c.org_nr == org_nr).cloned())
    }

    fn company_by_url_fragment(&self, needle: &str) -> Result<Option<Company>> {
        Ok(self
            .companies
            .iter()
            .find(|c| c.url.to_ascii_lowercase().contains(needle))
            .cloned())
    }

    fn companies(&self) -> Result<Vec<Company>> {
        Ok(self.companies.clone())
    }

    fn aggregate_by_primary_code(&self) -> Result<Vec<SniAggregate>> {
        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for company in self.companies.iter().filter(|c| c.has_url()) {
            groups
                .entry(company.primary_code().unwrap_or_default())
                .or_default()
                .push(company.id.clone());
        }
        Ok(groups
            .into_iter()
            .map(|(code, companies)| SniAggregate {
                category_code: code.to_string(),
                count: companies.len(),
                companies,
            })
            .collect())
    }
}

impl ExtractStore for MemoryStore {
    fn append_extracted(
        &mut self,
        company_id: &str,
        date: &str,
        item: ExtractedItem,
    ) -> Result<()> {
        let positions = self
            .extracted_by_company
            .entry(company_id.to_string())
            .or_default();
        if let Some(&pos) = positions.iter().find(|&&pos| self.extracted[pos].date == date) {
            self.extracted[pos].data.push(item);
            return Ok(());
        }
        positions.push(self.extracted.len());
        self.extracted.push(ExtractedRecord {
            id: self.next_record_id,
            company_id: company_id.to_string(),
            date: date.to_string(),
            data: vec![item],
        });
        self.next_record_id += 1;
        Ok(())
    }

    fn latest_extracted(&self, company_id: &str) -> Result<Option<ExtractedRecord>> {
        Ok(self.records_of(company_id).max_by_key(|r| r.id).cloned())
    }
}

impl DatasetStore for MemoryStore {
    fn clear_partitions(&mut self) -> Result<()> {
        for partition in Partition::ALL {
            self.partition_mut(partition).clear();
        }
        Ok(())
    }

    fn insert_partition(
        &mut self,
        partition: Partition,
        docs: Vec<LabeledDocument>,
    ) -> Result<()> {
        self.partition_mut(partition).extend(docs);
        Ok(())
    }

    fn partition(&self, partition: Partition) -> Result<Vec<LabeledDocument>> {
        Ok(self.partition_ref(partition).to_vec())
    }
}

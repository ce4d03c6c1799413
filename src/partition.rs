//! Stratified train/dev/test split keyed by primary SNI code.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PartitionError;
use crate::model::{LabeledDocument, Partition};
use crate::store::{CompanyStore, DatasetStore, ExtractStore};

/// Target percentages for the three partitions. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPercentages {
    pub train: u32,
    pub dev: u32,
    pub test: u32,
}

impl Default for SplitPercentages {
    fn default() -> Self {
        Self {
            train: 70,
            dev: 20,
            test: 10,
        }
    }
}

impl SplitPercentages {
    pub fn new(train: u32, dev: u32, test: u32) -> Self {
        Self { train, dev, test }
    }

    /// Reject percentages that do not add up to exactly 100.
    pub fn validate(self) -> Result<Self, PartitionError> {
        // Summed in u64: three u32 values never overflow.
        let sum = u64::from(self.train) + u64::from(self.dev) + u64::from(self.test);
        if sum != 100 {
            return Err(PartitionError::InvalidSplit {
                train: self.train,
                dev: self.dev,
                test: self.test,
                sum,
            });
        }
        Ok(self)
    }

    /// Dev and test quotas for a category of `count` companies (rounded down).
    pub fn quotas(self, count: usize) -> (usize, usize) {
        let quota = |p: u32| count * p as usize / 100;
        (quota(self.dev), quota(self.test))
    }
}

/// Per-category outcome of a partitioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySplit {
    /// Companies with a URL in this category.
    pub total: usize,
    pub train: usize,
    pub dev: usize,
    pub test: usize,
    /// Companies without extracted text (or without a registry record).
    pub skipped: usize,
}

impl CategorySplit {
    pub fn assigned(&self) -> usize {
        self.train + self.dev + self.test
    }

    fn record(&mut self, partition: Partition) {
        match partition {
            Partition::Train => self.train += 1,
            Partition::Dev => self.dev += 1,
            Partition::Test => self.test += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub categories: BTreeMap<String, CategorySplit>,
}

impl PartitionSummary {
    pub fn total(&self) -> CategorySplit {
        self.categories
            .values()
            .fold(CategorySplit::default(), |mut acc, c| {
                acc.total += c.total;
                acc.train += c.train;
                acc.dev += c.dev;
                acc.test += c.test;
                acc.skipped += c.skipped;
                acc
            })
    }
}

/// Splits extracted company text into train, dev and test partitions.
///
/// For every category independently, the first `floor(count * dev%)`
/// companies with extracted text go to dev, the next `floor(count * test%)`
/// to test, and the rest to train. Companies are visited in aggregation order,
/// so an unchanged store always yields the same assignment.
///
/// All reads happen before any write. A run either rewrites all three
/// partitions or leaves them untouched.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    split: SplitPercentages,
}

impl Partitioner {
    pub fn new(split: SplitPercentages) -> Self {
        Self { split }
    }

    pub fn split(&self) -> SplitPercentages {
        self.split
    }

    pub fn run<S>(&self, store: &mut S) -> Result<PartitionSummary, PartitionError>
    where
        S: CompanyStore + ExtractStore + DatasetStore,
    {
        let split = self.split.validate()?;
        let (assignments, summary) = assign(split, store)?;

        store.clear_partitions()?;
        debug!("cleared previous partitions");
        for (partition, docs) in assignments {
            debug!(?partition, count = docs.len(), "inserting partition");
            store.insert_partition(partition, docs)?;
        }

        log_summary(&summary);
        Ok(summary)
    }
}

type Assignments = BTreeMap<Partition, Vec<LabeledDocument>>;

/// Read-only pass: decide the partition of every eligible company.
fn assign<S>(
    split: SplitPercentages,
    store: &S,
) -> Result<(Assignments, PartitionSummary), PartitionError>
where
    S: CompanyStore + ExtractStore,
{
    let mut assignments: Assignments = Partition::ALL.into_iter().map(|p| (p, Vec::new())).collect();
    let mut summary = PartitionSummary::default();
    // Running dev+test count per primary code.
    let mut assigned: HashMap<String, usize> = HashMap::new();

    for aggregate in store.aggregate_by_primary_code()? {
        let (n_dev, n_test) = split.quotas(aggregate.count);
        debug!(
            sni = %aggregate.category_code,
            count = aggregate.count,
            n_dev,
            n_test,
            "partitioning category"
        );
        let stats = summary
            .categories
            .entry(aggregate.category_code.clone())
            .or_default();
        stats.total += aggregate.count;

        for company_id in &aggregate.companies {
            let Some(record) = store.latest_extracted(company_id)? else {
                stats.skipped += 1;
                continue;
            };
            let Some(company) = store.company_by_id(company_id)? else {
                warn!(company_id = %company_id, "extracted data without company record, skipping");
                stats.skipped += 1;
                continue;
            };
            let Some(primary) = company.primary_code() else {
                return Err(PartitionError::MissingCategory(company.id));
            };

            let running = assigned.entry(primary.to_string()).or_insert(0);
            let partition = if *running < n_dev {
                *running += 1;
                Partition::Dev
            } else if *running < n_dev + n_test {
                *running += 1;
                Partition::Test
            } else {
                Partition::Train
            };

            stats.record(partition);
            let doc = LabeledDocument::from_record(record, company.branch_codes);
            assignments.entry(partition).or_default().push(doc);
        }
    }

    Ok((assignments, summary))
}

fn log_summary(summary: &PartitionSummary) {
    for (code, stats) in &summary.categories {
        debug!(
            sni = %code,
            train = stats.train,
            dev = stats.dev,
            test = stats.test,
            skipped = stats.skipped,
            "category split"
        );
    }
    let total = summary.total();
    info!(
        categories = summary.categories.len(),
        train = total.train,
        dev = total.dev,
        test = total.test,
        skipped = total.skipped,
        "dataset division finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Company, ExtractMethod, ExtractedItem};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn company(id: &str, codes: &[&str]) -> Company {
        Company {
            id: id.to_string(),
            org_nr: format!("org-{id}"),
            name: format!("Company {id}"),
            url: format!("https://{id}.se"),
            branch_codes: codes.iter().map(|c| c.to_string()).collect(),
            ..Company::default()
        }
    }

    fn add_text(store: &mut MemoryStore, id: &str) {
        let item = ExtractedItem {
            url: format!("https://{id}.se"),
            method: ExtractMethod::default(),
            text: format!("text for {id}"),
        };
        store.append_extracted(id, "2024-05-01 12:00:00", item).unwrap();
    }

    fn ids(store: &MemoryStore, partition: Partition) -> Vec<String> {
        store
            .partition(partition)
            .unwrap()
            .into_iter()
            .map(|d| d.company_id)
            .collect()
    }

    #[test]
    fn test_validate_rejects_bad_sum() {
        let err = SplitPercentages::new(70, 20, 5).validate().unwrap_err();
        assert!(matches!(err, PartitionError::InvalidSplit { sum: 95, .. }));
        assert!(SplitPercentages::new(80, 10, 10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overflowing_sum() {
        // Wraps to exactly 100 in u32 arithmetic.
        let err = SplitPercentages::new(u32::MAX, 1, 100).validate().unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InvalidSplit { sum, .. } if sum == u64::from(u32::MAX) + 101
        ));
        assert!(SplitPercentages::new(0, 0, u32::MAX).validate().is_err());
        assert!(SplitPercentages::new(0, 0, 100).validate().is_ok());
    }

    #[test]
    fn test_quotas_round_down() {
        let split = SplitPercentages::default();
        assert_eq!(split.quotas(10), (2, 1));
        assert_eq!(split.quotas(9), (1, 0));
        assert_eq!(split.quotas(4), (0, 0));
        assert_eq!(split.quotas(0), (0, 0));
    }

    #[test]
    fn test_invalid_split_leaves_store_untouched() {
        let mut store = MemoryStore::new();
        store.insert_companies(vec![company("a", &["01110"])]).unwrap();
        add_text(&mut store, "a");
        Partitioner::new(SplitPercentages::default()).run(&mut store).unwrap();
        let before = ids(&store, Partition::Train);

        let err = Partitioner::new(SplitPercentages::new(70, 20, 5))
            .run(&mut store)
            .unwrap_err();
        assert!(matches!(err, PartitionError::InvalidSplit { .. }));
        assert_eq!(ids(&store, Partition::Train), before);
    }

    #[test]
    fn test_dev_then_test_then_train_in_order() {
        let mut store = MemoryStore::new();
        let companies: Vec<Company> = (0..10).map(|i| company(&format!("c{i}"), &["01110"])).collect();
        store.insert_companies(companies).unwrap();
        for i in 0..10 {
            add_text(&mut store, &format!("c{i}"));
        }

        let summary = Partitioner::default().run(&mut store).unwrap();
        assert_eq!(ids(&store, Partition::Dev), vec!["c0", "c1"]);
        assert_eq!(ids(&store, Partition::Test), vec!["c2"]);
        assert_eq!(ids(&store, Partition::Train).len(), 7);

        let stats = &summary.categories["01110"];
        assert_eq!((stats.dev, stats.test, stats.train, stats.skipped), (2, 1, 7, 0));
    }

    #[test]
    fn test_missing_text_is_skipped_not_counted() {
        let mut store = MemoryStore::new();
        let companies: Vec<Company> = (0..10).map(|i| company(&format!("c{i}"), &["01110"])).collect();
        store.insert_companies(companies).unwrap();
        // c0 and c2 were never extracted.
        for i in [1, 3, 4, 5, 6, 7, 8, 9] {
            add_text(&mut store, &format!("c{i}"));
        }

        let summary = Partitioner::default().run(&mut store).unwrap();
        // Quotas come from the aggregate count (10), so dev still gets two.
        assert_eq!(ids(&store, Partition::Dev), vec!["c1", "c3"]);
        assert_eq!(ids(&store, Partition::Test), vec!["c4"]);
        assert_eq!(summary.categories["01110"].skipped, 2);
        assert_eq!(summary.categories["01110"].assigned(), 8);
    }

    #[test]
    fn test_branch_codes_attached() {
        let mut store = MemoryStore::new();
        store
            .insert_companies(vec![company("a", &["01110", "46210", "02100"])])
            .unwrap();
        add_text(&mut store, "a");
        Partitioner::default().run(&mut store).unwrap();
        let train = store.partition(Partition::Train).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(train[0].branch_codes, vec!["01110", "46210", "02100"]);
        assert_eq!(train[0].data[0].text, "text for a");
    }

    #[test]
    fn test_missing_category_aborts_before_writes() {
        let mut store = MemoryStore::new();
        store
            .insert_companies(vec![company("a", &["01110"]), company("b", &[])])
            .unwrap();
        add_text(&mut store, "a");
        add_text(&mut store, "b");
        let stale = LabeledDocument {
            company_id: "old".to_string(),
            date: "d".to_string(),
            data: Vec::new(),
            branch_codes: vec!["99999".to_string()],
        };
        store.insert_partition(Partition::Test, vec![stale]).unwrap();

        let err = Partitioner::default().run(&mut store).unwrap_err();
        assert!(matches!(err, PartitionError::MissingCategory(ref id) if id == "b"));
        assert_eq!(ids(&store, Partition::Test), vec!["old"]);
    }

    #[test]
    fn test_rerun_replaces_partitions() {
        let mut store = MemoryStore::new();
        let companies: Vec<Company> = (0..5).map(|i| company(&format!("c{i}"), &["01110"])).collect();
        store.insert_companies(companies).unwrap();
        for i in 0..5 {
            add_text(&mut store, &format!("c{i}"));
        }
        let partitioner = Partitioner::new(SplitPercentages::new(60, 20, 20));
        partitioner.run(&mut store).unwrap();
        let first: Vec<Vec<String>> = Partition::ALL.iter().map(|p| ids(&store, *p)).collect();
        partitioner.run(&mut store).unwrap();
        let second: Vec<Vec<String>> = Partition::ALL.iter().map(|p| ids(&store, *p)).collect();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(Vec::len).sum::<usize>(), 5);
    }
}

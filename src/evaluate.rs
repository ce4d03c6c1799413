//! Rank-weighted scoring of category predictions.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EvaluationError;
use crate::model::{truncate_chars, LabeledDocument, MAX_TEXT_CHARS};

/// Model output for one document: SNI code → score.
///
/// Iteration order breaks ties between equal scores.
pub type Predictions = IndexMap<String, f64>;

/// Signals for a single scored document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PointResult {
    pub correct_label: bool,
    pub top_n_label: bool,
    pub correct_category: bool,
    pub top_n_category: bool,
    pub weighted_category_score: f64,
}

/// The coarse category of an SNI code: its first two characters.
fn category(code: &str) -> &str {
    match code.char_indices().nth(2) {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}

fn same_category(a: &str, b: &str) -> bool {
    category(a) == category(b)
}

/// Score one document's predictions against its true label.
///
/// Predictions are ranked by score, highest first; equal scores keep their
/// input order. `top_n` of zero matches nothing in the top-n signals.
pub fn evaluate(predictions: &Predictions, true_label: &str, top_n: usize) -> PointResult {
    let mut ranked: Vec<(&str, f64)> = predictions.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    debug!(
        top = ?&ranked[..top_n.min(ranked.len())],
        true_label,
        "ranked predictions"
    );

    let mut result = PointResult::default();
    for (rank, (code, score)) in ranked.iter().enumerate() {
        if *code == true_label {
            result.correct_label |= rank == 0;
            result.top_n_label |= rank < top_n;
        }
        if same_category(code, true_label) {
            result.correct_category |= rank == 0;
            result.top_n_category |= rank < top_n;
            result.weighted_category_score += score / (rank + 1) as f64;
        }
    }
    result
}

/// Accumulated signals for one label (or for all labels).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelResults {
    pub correct_label: usize,
    pub top_n_label: usize,
    pub correct_category: usize,
    pub top_n_category: usize,
    pub weighted_category_score: f64,
    /// Documents actually scored.
    pub label_count: usize,
    /// Documents skipped for short text.
    pub skipped: usize,
}

impl LabelResults {
    fn add_point(&mut self, point: &PointResult) {
        self.correct_label += usize::from(point.correct_label);
        self.top_n_label += usize::from(point.top_n_label);
        self.correct_category += usize::from(point.correct_category);
        self.top_n_category += usize::from(point.top_n_category);
        self.weighted_category_score += point.weighted_category_score;
        self.label_count += 1;
    }

    fn merge(&mut self, other: &LabelResults) {
        self.correct_label += other.correct_label;
        self.top_n_label += other.top_n_label;
        self.correct_category += other.correct_category;
        self.top_n_category += other.top_n_category;
        self.weighted_category_score += other.weighted_category_score;
        self.label_count += other.label_count;
        self.skipped += other.skipped;
    }

    pub fn correct_label_pct(&self) -> f64 {
        percentage(self.correct_label, self.label_count)
    }

    pub fn top_n_label_pct(&self) -> f64 {
        percentage(self.top_n_label, self.label_count)
    }

    pub fn correct_category_pct(&self) -> f64 {
        percentage(self.correct_category, self.label_count)
    }

    pub fn top_n_category_pct(&self) -> f64 {
        percentage(self.top_n_category, self.label_count)
    }

    /// Summed weighted category score, rounded to 3 decimals.
    pub fn weighted_score(&self) -> f64 {
        round3(self.weighted_category_score)
    }
}

/// `100 * count / total` rounded to 3 decimals; 0 when nothing was scored.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round3(count as f64 / total as f64 * 100.0)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// What happened to one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Scored(PointResult),
    Skipped,
}

/// Accumulates per-label results over a test set.
#[derive(Debug, Clone)]
pub struct Scorer {
    top_n: usize,
    min_data_length: usize,
    results: BTreeMap<String, LabelResults>,
}

impl Scorer {
    pub fn new(top_n: usize, min_data_length: usize) -> Result<Self, EvaluationError> {
        if top_n == 0 {
            return Err(EvaluationError::InvalidTopN);
        }
        Ok(Self {
            top_n,
            min_data_length,
            results: BTreeMap::new(),
        })
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Score one labeled document.
    ///
    /// The document's texts are concatenated; documents shorter than
    /// `min_data_length` characters are counted as skipped without calling
    /// `predict`. Longer texts are cut to [`MAX_TEXT_CHARS`] first.
    pub fn score_document<F>(
        &mut self,
        doc: &LabeledDocument,
        predict: F,
    ) -> Result<Outcome, EvaluationError>
    where
        F: FnOnce(&str) -> Result<Predictions, EvaluationError>,
    {
        let label = doc
            .primary_code()
            .ok_or_else(|| EvaluationError::MissingCategory(doc.company_id.clone()))?
            .to_string();
        let text = doc.joined_text();
        let length = text.chars().count();

        if length < self.min_data_length {
            debug!(company_id = %doc.company_id, label = %label, length, "text too short, skipping");
            self.results.entry(label).or_default().skipped += 1;
            return Ok(Outcome::Skipped);
        }
        if length > MAX_TEXT_CHARS {
            debug!(company_id = %doc.company_id, label = %label, length, "truncating text");
        }

        let predictions = predict(truncate_chars(&text, MAX_TEXT_CHARS))?;
        let point = evaluate(&predictions, &label, self.top_n);
        self.results.entry(label).or_default().add_point(&point);
        Ok(Outcome::Scored(point))
    }

    pub fn report(&self) -> EvaluationReport {
        let mut total = LabelResults::default();
        for results in self.results.values() {
            total.merge(results);
        }
        EvaluationReport {
            top_n: self.top_n,
            per_label: self.results.clone(),
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub top_n: usize,
    pub per_label: BTreeMap<String, LabelResults>,
    pub total: LabelResults,
}

impl EvaluationReport {
    /// Log per-label lines at debug level and the totals at info level.
    pub fn log(&self) {
        let n = self.top_n;
        for (label, r) in &self.per_label {
            debug!(
                "label {label}: correct label {:.3}%, label in top {n} {:.3}%, correct category {:.3}%, category in top {n} {:.3}%, weighted category {:.3}, scored {}, skipped {}",
                r.correct_label_pct(),
                r.top_n_label_pct(),
                r.correct_category_pct(),
                r.top_n_category_pct(),
                r.weighted_score(),
                r.label_count,
                r.skipped,
            );
        }
        let t = &self.total;
        info!(
            scored = t.label_count,
            skipped = t.skipped,
            correct_label = t.correct_label_pct(),
            top_n_label = t.top_n_label_pct(),
            correct_category = t.correct_category_pct(),
            top_n_category = t.top_n_category_pct(),
            weighted_category_score = t.weighted_score(),
            top_n = n,
            "evaluation finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractMethod, ExtractedItem};
    use pretty_assertions::assert_eq;

    fn preds(items: &[(&str, f64)]) -> Predictions {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn doc(label: &str, text: &str) -> LabeledDocument {
        LabeledDocument {
            company_id: format!("company-{label}"),
            date: "2024-05-01 12:00:00".to_string(),
            data: vec![ExtractedItem {
                url: "https://example.se".to_string(),
                method: ExtractMethod::default(),
                text: text.to_string(),
            }],
            branch_codes: vec![label.to_string()],
        }
    }

    #[test]
    fn test_reference_example() {
        let p = preds(&[("01110", 0.9), ("01120", 0.05), ("02100", 0.05)]);
        let r = evaluate(&p, "01110", 2);
        assert!(r.correct_label);
        assert!(r.top_n_label);
        assert!(r.correct_category);
        assert!(r.top_n_category);
        assert!((r.weighted_category_score - 0.925).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let p = preds(&[("02100", 0.4), ("01110", 0.4), ("01120", 0.2)]);
        let r = evaluate(&p, "01110", 1);
        assert!(!r.correct_label);
        assert!(!r.top_n_label);
        assert!(!r.correct_category);
        // 01110 at rank 1, 01120 at rank 2.
        assert!((r.weighted_category_score - (0.4 / 2.0 + 0.2 / 3.0)).abs() < 1e-9);

        let swapped = preds(&[("01110", 0.4), ("02100", 0.4)]);
        assert!(evaluate(&swapped, "01110", 1).correct_label);
    }

    #[test]
    fn test_top_n_boundary() {
        let p = preds(&[("46210", 0.5), ("47110", 0.3), ("01110", 0.2)]);
        assert!(!evaluate(&p, "01110", 2).top_n_label);
        assert!(evaluate(&p, "01110", 3).top_n_label);
        assert!(!evaluate(&p, "01110", 2).top_n_category);
    }

    #[test]
    fn test_weighted_score_covers_ranks_beyond_top_n() {
        let p = preds(&[("46210", 0.5), ("01110", 0.3), ("01130", 0.2)]);
        let r = evaluate(&p, "01120", 1);
        assert!(!r.top_n_category);
        assert!((r.weighted_category_score - (0.3 / 2.0 + 0.2 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_category_only_match() {
        let p = preds(&[("01120", 0.7), ("01110", 0.3)]);
        let r = evaluate(&p, "01110", 1);
        assert!(!r.correct_label);
        assert!(r.correct_category);
        assert!(r.top_n_category);
    }

    #[test]
    fn test_empty_predictions() {
        let r = evaluate(&Predictions::new(), "01110", 5);
        assert_eq!(r, PointResult::default());
    }

    #[test]
    fn test_scorer_rejects_zero_top_n() {
        assert!(matches!(Scorer::new(0, 10), Err(EvaluationError::InvalidTopN)));
    }

    #[test]
    fn test_scorer_skips_short_text() {
        let mut scorer = Scorer::new(2, 20).unwrap();
        let outcome = scorer
            .score_document(&doc("01110", "kort"), |_| panic!("must not predict"))
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);

        let long = "en betydligt längre text om jordbruk";
        let outcome = scorer
            .score_document(&doc("01110", long), |_| Ok(preds(&[("01110", 1.0)])))
            .unwrap();
        assert!(matches!(outcome, Outcome::Scored(p) if p.correct_label));

        let report = scorer.report();
        assert_eq!(report.total.label_count, 1);
        assert_eq!(report.total.skipped, 1);
        assert_eq!(report.total.correct_label_pct(), 100.0);
    }

    #[test]
    fn test_scorer_truncates_before_predict() {
        let mut scorer = Scorer::new(1, 0).unwrap();
        let big = "a".repeat(MAX_TEXT_CHARS + 50);
        scorer
            .score_document(&doc("01110", &big), |text| {
                assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
                Ok(Predictions::new())
            })
            .unwrap();
    }

    #[test]
    fn test_report_aggregation() {
        let mut scorer = Scorer::new(2, 0).unwrap();
        let cases = [
            ("01110", vec![("01110", 0.9), ("01120", 0.1)]),
            ("01110", vec![("01120", 0.6), ("01110", 0.4)]),
            ("46210", vec![("01110", 0.8), ("47110", 0.2)]),
        ];
        for (label, p) in cases {
            scorer
                .score_document(&doc(label, "text"), |_| Ok(preds(&p)))
                .unwrap();
        }
        let report = scorer.report();
        let farming = &report.per_label["01110"];
        assert_eq!(farming.label_count, 2);
        assert_eq!(farming.correct_label, 1);
        assert_eq!(farming.top_n_label, 2);
        assert_eq!(farming.correct_category, 2);

        assert_eq!(report.total.label_count, 3);
        assert_eq!(report.total.correct_label_pct(), 33.333);
        assert_eq!(report.total.top_n_label_pct(), 66.667);
        assert_eq!(report.total.correct_category_pct(), 66.667);
        // 0.9 + 0.1/2 + 0.6 + 0.4/2 + 0 = 1.75
        assert_eq!(report.total.weighted_score(), 1.75);
    }

    #[test]
    fn test_percentage_of_nothing() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(LabelResults::default().top_n_category_pct(), 0.0);
    }

    #[test]
    fn test_short_codes_compare_whole() {
        assert!(same_category("0", "0"));
        assert!(!same_category("0", "01"));
        assert!(same_category("01", "01999"));
    }
}

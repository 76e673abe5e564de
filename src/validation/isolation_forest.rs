//! Isolation forest outlier detection over the numeric columns of a batch.
//!
//! Points that are isolated by few random splits get scores near 1; typical
//! points sit near or below 0.5.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{numeric_value, ValidationError};
use crate::pipeline::Transaction;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Multivariate outlier detector.
pub trait OutlierDetector {
    /// Fit the detector to training rows.
    fn fit(&mut self, data: &[Vec<f64>]) -> Result<(), ValidationError>;

    /// Anomaly scores without thresholding; higher is more anomalous.
    fn score(&self, data: &[Vec<f64>]) -> Result<Vec<f64>, ValidationError>;

    /// `true` for rows scored above the fitted threshold.
    fn detect(&self, data: &[Vec<f64>]) -> Result<Vec<bool>, ValidationError>;

    fn is_fitted(&self) -> bool;
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_trees: usize,
    sample_size: usize,
    contamination: f64,
    seed: u64,
    trees: Vec<Node>,
    dims: usize,
    /// Sample size actually used (bounded by the row count).
    psi: usize,
    threshold: Option<f64>,
}

impl IsolationForest {
    pub fn new(n_trees: usize, sample_size: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            sample_size: sample_size.max(2),
            contamination: contamination.clamp(0.0, 0.5),
            seed,
            trees: Vec::new(),
            dims: 0,
            psi: 0,
            threshold: None,
        }
    }

    /// Score cut-off fixed at fit time.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    fn check_dims(&self, data: &[Vec<f64>]) -> Result<(), ValidationError> {
        match data.iter().find(|row| row.len() != self.dims) {
            Some(row) => Err(ValidationError::DimensionMismatch {
                expected: self.dims,
                found: row.len(),
            }),
            None => Ok(()),
        }
    }

    fn build(&self, data: &[Vec<f64>], rows: Vec<usize>, depth: usize, limit: usize, rng: &mut StdRng) -> Node {
        if depth >= limit || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        // Only features that still vary within this node can split it.
        let splittable: Vec<(usize, f64, f64)> = (0..self.dims)
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(data[r][f]), hi.max(data[r][f]))
                });
                (hi > lo && lo.is_finite() && hi.is_finite()).then_some((f, lo, hi))
            })
            .collect();
        if splittable.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
        // A convex combination never overflows, even when `hi - lo` would.
        let u: f64 = rng.gen();
        let value = (lo * (1.0 - u) + hi * u).clamp(lo, hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(self.build(data, left, depth + 1, limit, rng)),
            right: Box::new(self.build(data, right, depth + 1, limit, rng)),
        }
    }

    fn path_length(node: &Node, point: &[f64], depth: usize) -> f64 {
        match node {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                value,
                left,
                right,
            } => {
                if point[*feature] < *value {
                    Self::path_length(left, point, depth + 1)
                } else {
                    Self::path_length(right, point, depth + 1)
                }
            }
        }
    }

    fn score_point(&self, point: &[f64]) -> f64 {
        let norm = average_path_length(self.psi);
        if norm <= 0.0 {
            return 0.5;
        }
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| Self::path_length(tree, point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_depth / norm)
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(100, 256, 0.1, 42)
    }
}

impl OutlierDetector for IsolationForest {
    fn fit(&mut self, data: &[Vec<f64>]) -> Result<(), ValidationError> {
        let first = data.first().ok_or(ValidationError::EmptyInput)?;
        self.dims = first.len();
        self.check_dims(data)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.psi = self.sample_size.min(data.len());
        let limit = (self.psi as f64).log2().ceil().max(1.0) as usize;

        self.trees = (0..self.n_trees)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut rng, data.len(), self.psi).into_vec();
                self.build(data, rows, 0, limit, &mut rng)
            })
            .collect();

        let scores = self.score(data)?;
        self.threshold = Some(percentile(&scores, 1.0 - self.contamination));
        Ok(())
    }

    fn score(&self, data: &[Vec<f64>]) -> Result<Vec<f64>, ValidationError> {
        if self.trees.is_empty() {
            return Err(ValidationError::NotFitted);
        }
        self.check_dims(data)?;
        Ok(data.iter().map(|p| self.score_point(p)).collect())
    }

    fn detect(&self, data: &[Vec<f64>]) -> Result<Vec<bool>, ValidationError> {
        let threshold = self.threshold.ok_or(ValidationError::NotFitted)?;
        Ok(self.score(data)?.into_iter().map(|s| s > threshold).collect())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Average unsuccessful-search path length in a binary search tree of `n`
/// points; normalises depths.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Numeric view of a batch of records.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

fn is_id_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id" || lower == "transaction_id" || lower.ends_with("_id")
}

/// Columns whose non-null values are all numeric (numbers or numeric strings),
/// excluding identifier columns. Gaps are filled with the column mean.
pub fn numeric_matrix(records: &[Transaction]) -> NumericMatrix {
    let mut names: Vec<&String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }

    let mut columns = Vec::new();
    let mut values_by_column: Vec<Vec<Option<f64>>> = Vec::new();
    for name in names {
        if is_id_column(name) {
            continue;
        }
        let mut all_numeric = true;
        let mut seen = 0usize;
        let cells: Vec<Option<f64>> = records
            .iter()
            .map(|r| match r.get(name.as_str()) {
                None | Some(serde_json::Value::Null) => None,
                Some(v) => {
                    seen += 1;
                    let n = numeric_value(v);
                    all_numeric &= n.is_some();
                    n
                }
            })
            .collect();
        if all_numeric && seen > 0 {
            columns.push(name.clone());
            values_by_column.push(cells);
        }
    }

    let means: Vec<f64> = values_by_column
        .iter()
        .map(|cells| {
            let present: Vec<f64> = cells.iter().flatten().copied().collect();
            let n = present.len() as f64;
            present.iter().map(|v| v / n).sum::<f64>()
        })
        .collect();

    let rows = (0..records.len())
        .map(|i| {
            values_by_column
                .iter()
                .zip(&means)
                .map(|(cells, mean)| cells[i].unwrap_or(*mean))
                .collect()
        })
        .collect();

    NumericMatrix { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.3;
                vec![100.0 + jitter, 50.0 - jitter]
            })
            .collect();
        data.push(vec![10_000.0, -4_000.0]);
        data
    }

    #[test]
    fn extreme_point_is_flagged() {
        let data = cluster_with_outlier();
        let mut forest = IsolationForest::default();
        forest.fit(&data).unwrap();

        let scores = forest.score(&data).unwrap();
        let flags = forest.detect(&data).unwrap();
        let outlier = data.len() - 1;

        assert!(flags[outlier]);
        let max = scores.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(scores[outlier], max);
        assert!(scores[outlier] > 0.6);
        assert!(flags.iter().filter(|&&f| f).count() <= data.len() / 5);
    }

    #[test]
    fn threshold_is_set_by_fit() {
        let data = cluster_with_outlier();
        let mut forest = IsolationForest::default();
        assert_eq!(forest.threshold(), None);
        forest.fit(&data).unwrap();
        let threshold = forest.threshold().unwrap();
        let flagged = forest.detect(&data).unwrap();
        let scores = forest.score(&data).unwrap();
        for (score, flag) in scores.iter().zip(flagged) {
            assert_eq!(*score > threshold, flag);
        }
    }

    #[test]
    fn near_max_magnitudes_do_not_overflow() {
        let data = vec![vec![1e308], vec![-1e308], vec![5.0], vec![f64::MAX], vec![f64::MIN]];
        let mut forest = IsolationForest::default();
        forest.fit(&data).unwrap();
        let scores = forest.score(&data).unwrap();
        assert!(scores.iter().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn non_finite_columns_are_not_split() {
        let data = vec![
            vec![f64::INFINITY, 1.0],
            vec![f64::NEG_INFINITY, 2.0],
            vec![0.0, 3.0],
        ];
        let mut forest = IsolationForest::new(10, 8, 0.1, 1);
        forest.fit(&data).unwrap();
        assert_eq!(forest.detect(&data).unwrap().len(), 3);
    }

    #[test]
    fn identical_rows_flag_nothing() {
        let data = vec![vec![1.0, 2.0]; 20];
        let mut forest = IsolationForest::default();
        forest.fit(&data).unwrap();
        assert!(forest.detect(&data).unwrap().iter().all(|f| !f));
    }

    #[test]
    fn same_seed_same_scores() {
        let data = cluster_with_outlier();
        let mut a = IsolationForest::new(50, 32, 0.1, 7);
        let mut b = IsolationForest::new(50, 32, 0.1, 7);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a.score(&data).unwrap(), b.score(&data).unwrap());
    }

    #[test]
    fn errors() {
        let mut forest = IsolationForest::default();
        assert!(!forest.is_fitted());
        assert_eq!(forest.score(&[vec![1.0]]), Err(ValidationError::NotFitted));
        assert_eq!(forest.fit(&[]), Err(ValidationError::EmptyInput));
        assert_eq!(
            forest.fit(&[vec![1.0, 2.0], vec![1.0]]),
            Err(ValidationError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.5), 3.0);
        assert!((percentile(&v, 0.9) - 4.6).abs() < 1e-9);
        assert_eq!(percentile(&v, 1.0), 5.0);
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn matrix_selects_numeric_columns() {
        let records: Vec<Transaction> = vec![
            json!({"transaction_id": 1, "Customer_ID": 7, "Amount": 100, "Rate": "0.5", "Country": "US"}),
            json!({"transaction_id": 2, "Customer_ID": 8, "Amount": null, "Rate": "1.5", "Country": "DE"}),
            json!({"transaction_id": 3, "Customer_ID": 9, "Amount": 300, "Rate": "x", "Country": "UK"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        let m = numeric_matrix(&records);
        assert_eq!(m.columns, vec!["Amount"]);
        assert_eq!(m.rows, vec![vec![100.0], vec![200.0], vec![300.0]]);
    }

    #[test]
    fn matrix_mean_of_huge_values_stays_finite() {
        let records: Vec<Transaction> = vec![
            json!({"Amount": 1e308}),
            json!({"Amount": 1e308}),
            json!({"Amount": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        let m = numeric_matrix(&records);
        assert_eq!(m.rows[2], vec![1e308]);
    }
}

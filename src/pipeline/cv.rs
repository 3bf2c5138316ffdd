//! Stratified k-fold cross-validation splits

use crate::error::{ChurnError, Result};

/// Row indices for one train/validation split, both ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K folds that preserve the class balance of the target, without shuffling.
///
/// Class members are dealt out to the folds in row order, so every row lands
/// in exactly one validation fold and fold sizes differ by at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(ChurnError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: n_splits.to_string(),
                reason: "at least 2 folds are required".to_string(),
            });
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, y: &[f64]) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        let n = y.len();
        if n < k {
            return Err(ChurnError::InvalidShape(format!(
                "cannot split {} rows into {} folds",
                n, k
            )));
        }

        let labels: Vec<usize> = y.iter().map(|&v| usize::from(v >= 0.5)).collect();
        let mut counts = [0usize; 2];
        for &label in &labels {
            counts[label] += 1;
        }
        if counts.iter().all(|&c| c < k) {
            return Err(ChurnError::InvalidShape(format!(
                "cv_folds={} is greater than the number of members in each class {:?}",
                k, counts
            )));
        }
        if counts.iter().any(|&c| c > 0 && c < k) {
            tracing::warn!(
                folds = k,
                class_counts = ?counts,
                "The least populated class has fewer members than folds"
            );
        }

        // Deal sorted labels round-robin to get each fold's per-class quota
        let mut sorted = labels.clone();
        sorted.sort_unstable();
        let mut allocation = vec![[0usize; 2]; k];
        for (i, &label) in sorted.iter().enumerate() {
            allocation[i % k][label] += 1;
        }

        // Fill the quotas in row order, fold 0 first
        let mut test_fold = vec![0usize; n];
        for class in 0..2 {
            let mut assignments = allocation
                .iter()
                .enumerate()
                .flat_map(|(fold, quota)| std::iter::repeat(fold).take(quota[class]));
            for (row, &label) in labels.iter().enumerate() {
                if label == class {
                    if let Some(fold) = assignments.next() {
                        test_fold[row] = fold;
                    }
                }
            }
        }

        let folds = (0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&row| test_fold[row] == fold);
                Fold { train, test }
            })
            .collect();
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_fewer_than_two_folds() {
        assert!(matches!(
            StratifiedKFold::new(1),
            Err(ChurnError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rows_partitioned_exactly_once() {
        let y: Vec<f64> = (0..23).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        let folds = StratifiedKFold::new(5).unwrap().split(&y).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0; y.len()];
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), y.len());
            for &i in &fold.test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_class_balance_preserved() {
        // 10 positives, 20 negatives over 5 folds -> 2 + 4 per fold
        let y: Vec<f64> = (0..30).map(|i| if i < 10 { 1.0 } else { 0.0 }).collect();
        let folds = StratifiedKFold::new(5).unwrap().split(&y).unwrap();
        for fold in folds {
            let positives = fold.test.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 2);
            assert_eq!(fold.test.len(), 6);
        }
    }

    #[test]
    fn test_no_shuffle_is_deterministic_and_ordered() {
        let y = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let folds = StratifiedKFold::new(3).unwrap().split(&y).unwrap();
        assert_eq!(folds[0].test, vec![0, 1]);
        assert_eq!(folds[1].test, vec![2, 3]);
        assert_eq!(folds[2].test, vec![4, 5]);
    }

    #[test]
    fn test_too_few_rows() {
        let y = vec![0.0, 1.0];
        assert!(matches!(
            StratifiedKFold::new(3).unwrap().split(&y),
            Err(ChurnError::InvalidShape(_))
        ));
    }
}

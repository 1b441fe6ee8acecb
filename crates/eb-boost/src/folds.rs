//! Cross-validation fold splitting over the time axis.

use std::ops::Range;

use eb_types::{EbResult, FoldError};

/// One train/test split of the time axis.
///
/// The test range is a contiguous block; the train set is one or two
/// contiguous ranges. Train cost and incremental-delta cost must be summed
/// across all train ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub test: Range<usize>,
    pub train: Vec<Range<usize>>,
}

impl Fold {
    /// Builds fold `index` of `count` over an axis of `samples` samples.
    ///
    /// Test blocks have length floor(samples / count). Fold 0 trains on
    /// everything after its test block, the last fold trains on the first
    /// `samples - block` samples, and interior folds train on the union of
    /// the two ranges flanking their test block. Samples beyond
    /// `count * block` never enter a test block; they are trained on only by
    /// folds whose train range reaches the end of the axis.
    pub fn split(samples: usize, count: usize, index: usize) -> EbResult<Self> {
        if count == 0 {
            return Err(FoldError::ZeroFoldCount.into());
        }
        if index >= count {
            return Err(FoldError::IndexOutOfRange { index, count }.into());
        }
        if samples < count {
            return Err(FoldError::TooFewSamples {
                samples,
                folds: count,
            }
            .into());
        }

        let block = samples / count;
        let test = index * block..(index + 1) * block;
        let train = if index == 0 {
            vec![test.end..samples]
        } else if index == count - 1 {
            vec![0..samples - block]
        } else {
            vec![0..test.start, test.end..samples]
        };

        Ok(Self { index, test, train })
    }

    /// All folds for one run, in ascending fold order.
    pub fn split_all(samples: usize, count: usize) -> EbResult<Vec<Self>> {
        (0..count).map(|i| Self::split(samples, count, i)).collect()
    }

    /// Total number of training samples in this fold.
    pub fn train_len(&self) -> usize {
        self.train.iter().map(|r| r.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_blocks_partition_evenly() {
        let folds = Fold::split_all(100, 10).unwrap();

        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.index, i);
            assert_eq!(fold.test, i * 10..(i + 1) * 10);
        }

        // pairwise non-overlapping
        for a in &folds {
            for b in &folds {
                if a.index != b.index {
                    assert!(a.test.end <= b.test.start || b.test.end <= a.test.start);
                }
            }
        }
    }

    #[test]
    fn test_edge_folds_train_on_single_range() {
        let first = Fold::split(100, 10, 0).unwrap();
        assert_eq!(first.train, vec![10..100]);

        let last = Fold::split(100, 10, 9).unwrap();
        assert_eq!(last.train, vec![0..90]);
    }

    #[test]
    fn test_interior_fold_trains_on_complement() {
        let fold = Fold::split(100, 10, 4).unwrap();
        assert_eq!(fold.test, 40..50);
        assert_eq!(fold.train, vec![0..40, 50..100]);

        // every sample in [0, 100) is in exactly one of test/train
        let mut seen = vec![0usize; 100];
        for t in fold.test.clone() {
            seen[t] += 1;
        }
        for range in &fold.train {
            for t in range.clone() {
                seen[t] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_remainder_is_absorbed_into_train() {
        // 103 samples, 10 folds: block = 10, samples 100..103 never tested
        let folds = Fold::split_all(103, 10).unwrap();

        for fold in &folds {
            assert!(fold.test.end <= 100);
        }
        // fold 0 and interior folds reach the end of the axis
        assert_eq!(folds[0].train, vec![10..103]);
        assert_eq!(folds[4].train, vec![0..40, 50..103]);
        // the last fold trains on samples - block, not on the complement
        assert_eq!(folds[9].train, vec![0..93]);
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        assert!(Fold::split(100, 0, 0).is_err());
        assert!(Fold::split(100, 10, 10).is_err());
        assert!(Fold::split(5, 10, 0).is_err());
    }

    #[test]
    fn test_train_len_sums_ranges() {
        let fold = Fold::split(100, 10, 4).unwrap();
        assert_eq!(fold.train_len(), 90);
    }
}

use std::ops::Range;

use crate::error::{DataError, Result};

/// Split `len` trials of one session into contiguous training and
/// validation ranges.
///
/// The first `floor(len · training_fraction)` trials train, the rest
/// validate. Trials are never shuffled across the boundary, so the
/// validation block is always the end of the session.
pub fn train_valid_split(len: usize, training_fraction: f64) -> Result<(Range<usize>, Range<usize>)> {
    if len == 0 {
        return Err(DataError::EmptyDataset);
    }
    if !(training_fraction > 0.0 && training_fraction <= 1.0) {
        return Err(DataError::InvalidSplit(format!(
            "training fraction must be in (0, 1], got {}",
            training_fraction
        )));
    }
    let n_train = (len as f64 * training_fraction).floor() as usize;
    if n_train == 0 {
        return Err(DataError::InvalidSplit(format!(
            "fraction {} of {} trials leaves no training data",
            training_fraction, len
        )));
    }
    Ok((0..n_train, n_train..len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eighty_twenty() {
        let (train, valid) = train_valid_split(288, 0.8).unwrap();
        assert_eq!(train, 0..230);
        assert_eq!(valid, 230..288);
    }

    #[test]
    fn full_training_fraction_leaves_empty_validation() {
        let (train, valid) = train_valid_split(5, 1.0).unwrap();
        assert_eq!(train.len(), 5);
        assert!(valid.is_empty());
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(matches!(train_valid_split(0, 0.8), Err(DataError::EmptyDataset)));
        assert!(train_valid_split(10, 0.0).is_err());
        assert!(train_valid_split(10, 1.5).is_err());
        assert!(train_valid_split(10, f64::NAN).is_err());
        assert!(train_valid_split(1, 0.5).is_err());
    }
}

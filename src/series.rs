//! The immutable input series.
//!
//! A [`Series`] is an ordered sequence of `(timestamp, value)` pairs produced
//! by an upstream ingestion/cleaning collaborator. Construction asserts the
//! boundary contract once — strictly increasing timestamps, no missing values —
//! so the sampler's hot loop never re-validates.

use crate::error::{Error, Result};

/// An ordered univariate time series, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    timestamps: Vec<i64>,
    values: Vec<f64>,
}

impl Series {
    /// Builds a series from parallel timestamp/value vectors.
    ///
    /// Rejects mismatched lengths, non-strictly-increasing timestamps
    /// (duplicates included) and non-finite values. Interpolation and
    /// forward-fill are upstream policy, not this crate's.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use changepoint_mcmc::series::Series;
    ///
    /// let series = Series::new(vec![0, 1, 2], vec![1.0, 1.1, 0.9]).unwrap();
    /// assert_eq!(series.len(), 3);
    ///
    /// assert!(Series::new(vec![0, 0, 1], vec![1.0, 2.0, 3.0]).is_err());
    /// assert!(Series::new(vec![0, 1], vec![1.0, f64::NAN]).is_err());
    /// ```
    pub fn new(timestamps: Vec<i64>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(Error::LengthMismatch {
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        for (i, w) in timestamps.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(Error::NonIncreasingTimestamps { index: i + 1 });
            }
        }
        for (i, v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(Error::NonFiniteValue { index: i });
            }
        }
        Ok(Self { timestamps, values })
    }

    /// Builds a series over positional indices `0..n`, for data whose
    /// calendar timestamps were already consumed upstream.
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        let timestamps = (0..values.len() as i64).collect();
        Self::new(timestamps, values)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_clean_series() {
        let s = Series::new(vec![10, 20, 35], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.timestamps(), &[10, 20, 35]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = Series::new(vec![0, 1], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                timestamps: 2,
                values: 1
            }
        ));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = Series::new(vec![0, 1, 1], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::NonIncreasingTimestamps { index: 2 }));
    }

    #[test]
    fn rejects_unsorted_timestamps() {
        let err = Series::new(vec![5, 3], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::NonIncreasingTimestamps { index: 1 }));
    }

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(matches!(
            Series::from_values(vec![1.0, f64::NAN]).unwrap_err(),
            Error::NonFiniteValue { index: 1 }
        ));
        assert!(matches!(
            Series::from_values(vec![f64::INFINITY]).unwrap_err(),
            Error::NonFiniteValue { index: 0 }
        ));
    }

    #[test]
    fn from_values_uses_positional_indices() {
        let s = Series::from_values(vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(s.timestamps(), &[0, 1, 2]);
    }
}

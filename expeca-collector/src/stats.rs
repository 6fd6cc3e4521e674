//! Offset statistics

use serde::Serialize;

/// Summary of one offset series, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStats {
    pub stddev: f64,
    pub max: i64,
    pub min: i64,
}

impl AggregateStats {
    /// Sample standard deviation (n - 1), max and min.
    ///
    /// `None` for an empty series. A single sample has a stddev of 0.
    pub fn from_offsets(offsets: &[i64]) -> Option<Self> {
        let (&first, rest) = offsets.split_first()?;

        let (min, max) = rest
            .iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x)));

        Some(Self {
            stddev: sample_stddev(offsets),
            max,
            min,
        })
    }
}

fn sample_stddev(offsets: &[i64]) -> f64 {
    let n = offsets.len();
    if n < 2 {
        return 0.0;
    }

    let sum: i128 = offsets.iter().map(|&x| x as i128).sum();
    let mean = sum as f64 / n as f64;
    let squares: f64 = offsets
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum();

    (squares / (n - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series() {
        assert!(AggregateStats::from_offsets(&[]).is_none());
    }

    #[test]
    fn test_three_offsets() {
        let stats = AggregateStats::from_offsets(&[5, 10, 15]).unwrap();
        assert_eq!(stats.min, 5);
        assert_eq!(stats.max, 15);
        assert!((stats.stddev - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample() {
        let stats = AggregateStats::from_offsets(&[-42]).unwrap();
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.min, -42);
        assert_eq!(stats.max, -42);
    }

    #[test]
    fn test_signed_offsets() {
        let stats = AggregateStats::from_offsets(&[-3, 7, -11, 2]).unwrap();
        assert_eq!(stats.min, -11);
        assert_eq!(stats.max, 7);
        // mean -1.25, squares sum 176.75, / 3
        assert!((stats.stddev - (176.75f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_large_offsets_do_not_overflow() {
        let stats = AggregateStats::from_offsets(&[i64::MAX, i64::MAX]).unwrap();
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.max, i64::MAX);
    }
}

//! Associative point-wise reduction of series
//!
//! A [`ReduceOp`] collapses the members of a terminal group into one
//! synthetic series. The merge is a union over timestamps: where both
//! series hold a sample at a timestamp the values combine under the
//! operator, everywhere else the lone sample passes through unchanged.
//! The synthetic series carries two reserved labels, [`LABEL_REDUCER`]
//! and [`LABEL_SOURCE`]; downstream consumers parse them, so their names
//! and formats are a stable contract.

use crate::series::{Sample, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reserved label naming the reducer that produced a synthetic series.
pub const LABEL_REDUCER: &str = "__reducer__";

/// Reserved label listing the member keys a synthetic series was reduced
/// from, comma-joined in ascending key order.
pub const LABEL_SOURCE: &str = "__source__";

/// Associative operator applied point-wise when reducing a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    /// Lowercase operator name, as written into [`LABEL_REDUCER`].
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
        }
    }

    /// Combine two values that share a timestamp.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Error returned when a reducer name does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReduceOpError(String);

impl std::fmt::Display for ParseReduceOpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown reducer '{}', expected sum, min or max", self.0)
    }
}

impl std::error::Error for ParseReduceOpError {}

impl FromStr for ReduceOp {
    type Err = ParseReduceOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("sum") {
            Ok(ReduceOp::Sum)
        } else if s.eq_ignore_ascii_case("min") {
            Ok(ReduceOp::Min)
        } else if s.eq_ignore_ascii_case("max") {
            Ok(ReduceOp::Max)
        } else {
            Err(ParseReduceOpError(s.to_string()))
        }
    }
}

/// Merge `source` into `acc` point-wise under `op`.
///
/// Both sample runs are sorted by timestamp, so this is a two-pointer
/// union walk. The result keeps strictly increasing timestamps; its
/// length is the size of the timestamp union. `acc` keeps its name and
/// labels, only its samples change.
pub fn merge_pointwise(acc: &mut Series, source: &Series, op: ReduceOp) {
    let left = acc.samples();
    let right = source.samples();
    let mut merged = Vec::with_capacity(left.len().max(right.len()));

    let mut i = 0;
    let mut j = 0;
    while i < left.len() && j < right.len() {
        let a = left[i];
        let b = right[j];
        if a.timestamp == b.timestamp {
            merged.push(Sample::new(a.timestamp, op.apply(a.value, b.value)));
            i += 1;
            j += 1;
        } else if a.timestamp < b.timestamp {
            merged.push(a);
            i += 1;
        } else {
            merged.push(b);
            j += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);

    acc.replace_samples(merged);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1() -> Series {
        Series::new("s1").with_samples([(1, 100.0), (2, 95.0)])
    }

    fn s2() -> Series {
        Series::new("s2").with_samples([(2, 55.0)])
    }

    #[test]
    fn test_parse_reduce_op() {
        assert_eq!("sum".parse::<ReduceOp>(), Ok(ReduceOp::Sum));
        assert_eq!("MAX".parse::<ReduceOp>(), Ok(ReduceOp::Max));
        assert_eq!("Min".parse::<ReduceOp>(), Ok(ReduceOp::Min));
        assert!("avg".parse::<ReduceOp>().is_err());
    }

    #[test]
    fn test_merge_sum_unions_timestamps() {
        let mut acc = s1();
        merge_pointwise(&mut acc, &s2(), ReduceOp::Sum);

        // Timestamp 1 exists only on the left and passes through;
        // timestamp 2 exists on both and sums.
        assert_eq!(
            acc.samples(),
            &[Sample::new(1, 100.0), Sample::new(2, 150.0)]
        );
    }

    #[test]
    fn test_merge_min_max() {
        let mut acc = s1();
        merge_pointwise(&mut acc, &s2(), ReduceOp::Min);
        assert_eq!(acc.samples(), &[Sample::new(1, 100.0), Sample::new(2, 55.0)]);

        let mut acc = s1();
        merge_pointwise(&mut acc, &s2(), ReduceOp::Max);
        assert_eq!(acc.samples(), &[Sample::new(1, 100.0), Sample::new(2, 95.0)]);
    }

    #[test]
    fn test_merge_into_empty_accumulator() {
        let mut acc = Series::new("empty");
        merge_pointwise(&mut acc, &s1(), ReduceOp::Sum);
        assert_eq!(acc.samples(), s1().samples());
    }

    #[test]
    fn test_merge_preserves_increasing_timestamps() {
        let mut acc = Series::new("a").with_samples([(1, 1.0), (5, 5.0), (9, 9.0)]);
        let source = Series::new("b").with_samples([(2, 2.0), (5, 5.0), (10, 10.0)]);
        merge_pointwise(&mut acc, &source, ReduceOp::Sum);

        let timestamps: Vec<i64> = acc.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 5, 9, 10]);
        assert_eq!(acc.samples()[2].value, 10.0);
    }
}

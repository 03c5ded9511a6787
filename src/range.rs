//! Time-range projection and downsampling
//!
//! [`project`] produces the range-restricted, optionally bucket-aggregated
//! view of a single series. The result-set tree applies it to every
//! terminal series in place; it is also what a reply sink applies when the
//! caller skips the explicit projection pass, so it must be deterministic
//! and idempotent for a fixed set of options.

use crate::series::{Sample, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aggregation applied within one downsampling bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketAggregator {
    Avg,
    Sum,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl BucketAggregator {
    pub fn name(self) -> &'static str {
        match self {
            BucketAggregator::Avg => "avg",
            BucketAggregator::Sum => "sum",
            BucketAggregator::Min => "min",
            BucketAggregator::Max => "max",
            BucketAggregator::Count => "count",
            BucketAggregator::First => "first",
            BucketAggregator::Last => "last",
        }
    }

    /// Collapse one non-empty bucket of samples into a single value.
    fn aggregate(self, bucket: &[Sample]) -> f64 {
        match self {
            BucketAggregator::Avg => {
                bucket.iter().map(|s| s.value).sum::<f64>() / bucket.len() as f64
            }
            BucketAggregator::Sum => bucket.iter().map(|s| s.value).sum(),
            BucketAggregator::Min => bucket.iter().map(|s| s.value).fold(f64::INFINITY, f64::min),
            BucketAggregator::Max => bucket
                .iter()
                .map(|s| s.value)
                .fold(f64::NEG_INFINITY, f64::max),
            BucketAggregator::Count => bucket.len() as f64,
            BucketAggregator::First => bucket[0].value,
            BucketAggregator::Last => bucket[bucket.len() - 1].value,
        }
    }
}

/// Error returned when an aggregator name does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAggregatorError(String);

impl std::fmt::Display for ParseAggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown aggregator '{}'", self.0)
    }
}

impl std::error::Error for ParseAggregatorError {}

impl FromStr for BucketAggregator {
    type Err = ParseAggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        match lowered.as_str() {
            "avg" => Ok(BucketAggregator::Avg),
            "sum" => Ok(BucketAggregator::Sum),
            "min" => Ok(BucketAggregator::Min),
            "max" => Ok(BucketAggregator::Max),
            "count" => Ok(BucketAggregator::Count),
            "first" => Ok(BucketAggregator::First),
            "last" => Ok(BucketAggregator::Last),
            _ => Err(ParseAggregatorError(s.to_string())),
        }
    }
}

/// Downsampling step: aggregate samples into `bucket_width`-wide buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAggregation {
    pub op: BucketAggregator,
    /// Bucket width in timestamp units. Widths below 1 disable
    /// downsampling.
    pub bucket_width: i64,
}

/// Parameters of a range projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeOptions {
    /// Inclusive start timestamp.
    pub start: i64,
    /// Inclusive end timestamp.
    pub end: i64,
    pub aggregation: Option<BucketAggregation>,
    /// Cap on the number of returned samples, applied after reversal.
    pub max_results: Option<usize>,
    /// Emit samples newest-first.
    pub reverse: bool,
}

impl RangeOptions {
    /// The whole timeline, no downsampling, no cap.
    pub fn all() -> Self {
        RangeOptions {
            start: i64::MIN,
            end: i64::MAX,
            aggregation: None,
            max_results: None,
            reverse: false,
        }
    }

    pub fn between(start: i64, end: i64) -> Self {
        RangeOptions {
            start,
            end,
            ..Self::all()
        }
    }
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self::all()
    }
}

/// Project a series onto a time range.
///
/// Samples outside `[start, end]` are dropped. With an aggregation step,
/// survivors are grouped into buckets aligned to multiples of
/// `bucket_width` (bucket timestamp = floored multiple) and each bucket
/// collapses to one sample. Reversal and the `max_results` cap apply
/// last, in that order. The projected series keeps the original's name
/// and labels; the original is untouched.
pub fn project(series: &Series, opts: &RangeOptions) -> Series {
    let in_range = series
        .samples()
        .iter()
        .copied()
        .filter(|s| s.timestamp >= opts.start && s.timestamp <= opts.end);

    let mut samples: Vec<Sample> = match opts.aggregation {
        Some(agg) if agg.bucket_width > 0 => downsample(in_range, agg),
        _ => in_range.collect(),
    };

    if opts.reverse {
        samples.reverse();
    }
    if let Some(max) = opts.max_results {
        samples.truncate(max);
    }

    let mut projected = Series::new(series.name());
    projected.set_labels(series.labels().to_vec());
    projected.replace_samples(samples);
    projected
}

fn downsample(samples: impl Iterator<Item = Sample>, agg: BucketAggregation) -> Vec<Sample> {
    let mut out = Vec::new();
    let mut bucket: Vec<Sample> = Vec::new();
    let mut bucket_ts: Option<i64> = None;

    for sample in samples {
        let aligned = sample.timestamp.div_euclid(agg.bucket_width) * agg.bucket_width;
        match bucket_ts {
            Some(current) if current == aligned => bucket.push(sample),
            Some(current) => {
                out.push(Sample::new(current, agg.op.aggregate(&bucket)));
                bucket.clear();
                bucket.push(sample);
                bucket_ts = Some(aligned);
            }
            None => {
                bucket.push(sample);
                bucket_ts = Some(aligned);
            }
        }
    }
    if let Some(current) = bucket_ts {
        out.push(Sample::new(current, agg.op.aggregate(&bucket)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Series {
        Series::new("cpu")
            .with_label("region", "us")
            .with_samples([(0, 1.0), (5, 2.0), (10, 3.0), (15, 4.0), (20, 5.0)])
    }

    #[test]
    fn test_range_filter_inclusive() {
        let projected = project(&series(), &RangeOptions::between(5, 15));
        let timestamps: Vec<i64> = projected.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![5, 10, 15]);

        // Name and labels carry over
        assert_eq!(projected.name(), "cpu");
        assert_eq!(projected.label_value("region"), Some("us"));
    }

    #[test]
    fn test_downsample_avg_alignment() {
        let opts = RangeOptions {
            aggregation: Some(BucketAggregation {
                op: BucketAggregator::Avg,
                bucket_width: 10,
            }),
            ..RangeOptions::all()
        };
        let projected = project(&series(), &opts);

        // Buckets [0,10): {1,2} avg 1.5; [10,20): {3,4} avg 3.5; [20,30): {5}
        assert_eq!(
            projected.samples(),
            &[
                Sample::new(0, 1.5),
                Sample::new(10, 3.5),
                Sample::new(20, 5.0),
            ]
        );
    }

    #[test]
    fn test_downsample_count_and_sum() {
        let agg = |op| RangeOptions {
            aggregation: Some(BucketAggregation {
                op,
                bucket_width: 10,
            }),
            ..RangeOptions::all()
        };

        let counts = project(&series(), &agg(BucketAggregator::Count));
        let values: Vec<f64> = counts.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 2.0, 1.0]);

        let sums = project(&series(), &agg(BucketAggregator::Sum));
        let values: Vec<f64> = sums.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0, 7.0, 5.0]);
    }

    #[test]
    fn test_reverse_then_truncate() {
        let opts = RangeOptions {
            reverse: true,
            max_results: Some(2),
            ..RangeOptions::all()
        };
        let projected = project(&series(), &opts);

        // Newest two samples, newest first
        assert_eq!(
            projected.samples(),
            &[Sample::new(20, 5.0), Sample::new(15, 4.0)]
        );
    }

    #[test]
    fn test_projection_is_idempotent() {
        let opts = RangeOptions::between(5, 15);
        let once = project(&series(), &opts);
        let twice = project(&once, &opts);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_zero_bucket_width_disables_downsampling() {
        let opts = RangeOptions {
            aggregation: Some(BucketAggregation {
                op: BucketAggregator::Avg,
                bucket_width: 0,
            }),
            ..RangeOptions::all()
        };
        let projected = project(&series(), &opts);
        assert_eq!(projected.samples(), series().samples());
    }
}

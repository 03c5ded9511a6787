//! Grouped result sets for multi-series range queries
//!
//! This crate implements the result-shaping stage of a time-series store's
//! multi-range query path: a flat set of selected series is optionally
//! partitioned into nested groups by label value, each terminal group is
//! optionally collapsed into one synthetic series with an associative
//! reducer (sum/min/max), every remaining series is projected onto the
//! requested time range, and the finished tree is streamed to a reply sink
//! in sorted key order.
//!
//! The central type is [`ResultSet`], a recursive tree that owns every
//! series inserted into it. [`MultiRangeQuery`] drives the canonical
//! pipeline (insert, reduce, project, emit) for callers that do not need
//! to run the stages individually.

pub mod query;
pub mod range;
pub mod reduce;
pub mod reply;
pub mod resultset;
pub mod series;

pub use query::MultiRangeQuery;
pub use range::{BucketAggregation, BucketAggregator, RangeOptions};
pub use reduce::{merge_pointwise, ReduceOp, LABEL_REDUCER, LABEL_SOURCE};
pub use reply::{EmitOptions, ReplySink, RespReplySink};
pub use resultset::{DuplicateSeries, ResultSet};
pub use series::{Label, Sample, Series};

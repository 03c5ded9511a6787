//! Multi-series range query driver
//!
//! [`MultiRangeQuery`] runs the canonical pipeline over a flat set of
//! selected series: build the (optionally grouped) result tree, reduce
//! if a reducer was requested, project every series onto the requested
//! range, then stream the tree to a reply sink. Callers that need the
//! stages individually use [`ResultSet`] directly.

use crate::range::RangeOptions;
use crate::reduce::ReduceOp;
use crate::reply::{EmitOptions, ReplySink};
use crate::resultset::ResultSet;
use crate::series::Series;
use tracing::{debug, warn};

/// A grouped multi-series range query.
///
/// `reduce` is only meaningful together with a non-empty `group_by`,
/// mirroring the query syntax where a reducer requires a grouping clause;
/// it is ignored otherwise.
#[derive(Debug, Clone, Default)]
pub struct MultiRangeQuery {
    /// Labels to partition by, outermost first. Empty means no grouping.
    pub group_by: Vec<String>,
    pub reduce: Option<ReduceOp>,
    pub with_labels: bool,
    pub range: RangeOptions,
}

impl MultiRangeQuery {
    /// Build the fully transformed result tree for this query: series
    /// inserted under their own names, reduced and range-projected.
    ///
    /// A duplicate series name within its resolved group is skipped with a
    /// warning rather than failing the query.
    pub fn materialize(&self, series: impl IntoIterator<Item = Series>) -> ResultSet {
        let mut result = if self.group_by.is_empty() {
            ResultSet::new()
        } else {
            ResultSet::grouped_by(self.group_by.iter().cloned())
        };

        let mut inserted = 0usize;
        for s in series {
            let name = s.name().to_string();
            match result.insert(&name, s) {
                Ok(()) => inserted += 1,
                Err(err) => warn!("skipping duplicate series '{}' in range query", err.name),
            }
        }
        debug!("materialized result set from {} series", inserted);

        if !self.group_by.is_empty() {
            if let Some(op) = self.reduce {
                result.reduce(op);
            }
        }
        result.apply_range(&self.range);
        result
    }

    /// Run the query end to end, streaming the result tree to `sink`.
    pub fn execute<S, I>(&self, series: I, sink: &mut S) -> Result<(), S::Error>
    where
        S: ReplySink,
        I: IntoIterator<Item = Series>,
    {
        let result = self.materialize(series);
        let opts = EmitOptions {
            with_labels: self.with_labels,
            range: self.range.clone(),
        };
        result.emit(sink, &opts)
    }
}

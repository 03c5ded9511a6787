//! Grouped result-set tree
//!
//! [`ResultSet`] is the recursive container at the heart of the multi-range
//! query path. A node is either *terminal* (its members are series, keyed
//! by series name) or *partitioned* (its members are nested result sets,
//! keyed by the value of a group-by label). Whether a node partitions is
//! decided at construction and never changes, so a series can never land
//! in a node that later turns into a group.
//!
//! The tree owns every series inserted into it: reduction consumes member
//! series as they are merged into the synthetic accumulator, projection
//! replaces each series with its range-restricted view, and dropping the
//! tree releases everything that is left. Members are stored in a
//! `BTreeMap`, so every walk over the tree (reduce, project, emit) runs in
//! ascending lexicographic key order.

use crate::range::{project, RangeOptions};
use crate::reduce::{merge_pointwise, ReduceOp, LABEL_REDUCER, LABEL_SOURCE};
use crate::reply::{EmitOptions, ReplySink};
use crate::series::{Label, Series};
use std::collections::BTreeMap;
use tracing::debug;

/// Error returned when an insert hits an existing series name.
///
/// The rejected series is handed back so the caller keeps ownership; the
/// tree is unchanged.
#[derive(Debug)]
pub struct DuplicateSeries {
    pub name: String,
    pub series: Series,
}

impl std::fmt::Display for DuplicateSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a series named '{}' already exists in this group", self.name)
    }
}

impl std::error::Error for DuplicateSeries {}

enum Members {
    /// Terminal group: series keyed by name.
    Series(BTreeMap<String, Series>),
    /// Partitioned group: child result sets keyed by the value of `by`.
    /// `rest` holds the group-by labels applied at deeper levels.
    Groups {
        by: String,
        rest: Vec<String>,
        children: BTreeMap<String, ResultSet>,
    },
}

/// A tree of grouped query results. See the module docs for the model.
pub struct ResultSet {
    members: Members,
    /// Label identity this node represents within its parent's partition.
    /// `None` on the root.
    label_key: Option<String>,
    label_value: Option<String>,
}

impl ResultSet {
    /// Create an empty terminal result set (no grouping).
    pub fn new() -> Self {
        ResultSet {
            members: Members::Series(BTreeMap::new()),
            label_key: None,
            label_value: None,
        }
    }

    /// Create an empty result set partitioned by the given labels, applied
    /// in sequence: the root partitions on the first label, the children
    /// it materializes partition on the second, and so on. An empty label
    /// list yields a terminal set, same as [`ResultSet::new`].
    pub fn grouped_by<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels = labels.into_iter().map(Into::into);
        match labels.next() {
            None => Self::new(),
            Some(by) => ResultSet {
                members: Members::Groups {
                    by,
                    rest: labels.collect(),
                    children: BTreeMap::new(),
                },
                label_key: None,
                label_value: None,
            },
        }
    }

    /// Whether this node partitions its members into nested groups.
    pub fn is_grouped(&self) -> bool {
        matches!(self.members, Members::Groups { .. })
    }

    /// The label this node partitions its children by, if partitioned.
    pub fn group_label(&self) -> Option<&str> {
        match &self.members {
            Members::Groups { by, .. } => Some(by),
            Members::Series(_) => None,
        }
    }

    /// The label key this node represents within its parent's partition.
    pub fn label_key(&self) -> Option<&str> {
        self.label_key.as_deref()
    }

    /// The label value this node represents within its parent's partition.
    pub fn label_value(&self) -> Option<&str> {
        self.label_value.as_deref()
    }

    /// Number of direct members (series or child groups) of this node.
    pub fn len(&self) -> usize {
        match &self.members {
            Members::Series(map) => map.len(),
            Members::Groups { children, .. } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct member keys in ascending order.
    pub fn keys(&self) -> Vec<&str> {
        match &self.members {
            Members::Series(map) => map.keys().map(String::as_str).collect(),
            Members::Groups { children, .. } => children.keys().map(String::as_str).collect(),
        }
    }

    /// Child group for a partition value, if this node is partitioned and
    /// has seen that value.
    pub fn get_group(&self, value: &str) -> Option<&ResultSet> {
        match &self.members {
            Members::Groups { children, .. } => children.get(value),
            Members::Series(_) => None,
        }
    }

    /// Member series by name, if this node is terminal and holds it.
    pub fn get_series(&self, name: &str) -> Option<&Series> {
        match &self.members {
            Members::Series(map) => map.get(name),
            Members::Groups { .. } => None,
        }
    }

    /// Every series reachable from this node, in emission order.
    pub fn series(&self) -> Vec<&Series> {
        let mut out = Vec::new();
        self.collect_series(&mut out);
        out
    }

    fn collect_series<'a>(&'a self, out: &mut Vec<&'a Series>) {
        match &self.members {
            Members::Series(map) => out.extend(map.values()),
            Members::Groups { children, .. } => {
                for child in children.values() {
                    child.collect_series(out);
                }
            }
        }
    }

    /// Add a series to the tree under `name`.
    ///
    /// On a partitioned node the series is routed to the child group for
    /// its value of the partition label (series missing the label group
    /// under the empty value), creating and tagging the child on first
    /// sight. On a terminal node the series is stored under `name`;
    /// a name collision is rejected and the series handed back unchanged.
    pub fn insert(&mut self, name: &str, series: Series) -> Result<(), DuplicateSeries> {
        match &mut self.members {
            Members::Groups { by, rest, children } => {
                let value = series.label_value(by).unwrap_or_default().to_string();
                let child = children.entry(value.clone()).or_insert_with(|| {
                    let mut group = ResultSet::grouped_by(rest.iter().cloned());
                    group.label_key = Some(by.clone());
                    group.label_value = Some(value);
                    group
                });
                child.insert(name, series)
            }
            Members::Series(map) => {
                if map.contains_key(name) {
                    return Err(DuplicateSeries {
                        name: name.to_string(),
                        series,
                    });
                }
                map.insert(name.to_string(), series);
                Ok(())
            }
        }
    }

    /// Collapse every terminal group under this node into one synthetic
    /// series per group.
    ///
    /// On a terminal node the members are drained in ascending key order:
    /// the first becomes the accumulator and each later member is merged
    /// into it point-wise, then dropped. The survivor is renamed to
    /// `"<label_key>=<label_value>"` and relabelled with the group
    /// identity plus [`LABEL_REDUCER`] and [`LABEL_SOURCE`]. An empty
    /// terminal node is left untouched.
    ///
    /// On a partitioned node the children reduce in place; the partition
    /// structure itself survives, so a grouped tree keeps one level of
    /// nesting per group-by label after reduction.
    ///
    /// Reducing an ungrouped root works but has no label identity, so the
    /// synthetic name degenerates to `"="`; callers that need meaningful
    /// names group first.
    pub fn reduce(&mut self, op: ReduceOp) {
        match &mut self.members {
            Members::Groups { children, .. } => {
                for child in children.values_mut() {
                    child.reduce(op);
                }
            }
            Members::Series(map) => {
                if map.is_empty() {
                    return;
                }
                let members = std::mem::take(map);
                let total = members.len();

                // BTreeMap drains in ascending key order, which fixes both
                // the merge order and the __source__ key order.
                let mut iter = members.into_iter();
                let Some((first_key, mut acc)) = iter.next() else {
                    return;
                };
                let mut sources = first_key;
                for (key, series) in iter {
                    merge_pointwise(&mut acc, &series, op);
                    sources.push(',');
                    sources.push_str(&key);
                }

                let key = self.label_key.as_deref().unwrap_or_default();
                let value = self.label_value.as_deref().unwrap_or_default();
                let name = format!("{}={}", key, value);
                debug!(
                    "reduced {} member series of group '{}' with {}",
                    total,
                    name,
                    op.name()
                );

                acc.set_name(name.clone());
                acc.set_labels(vec![
                    Label::new(key, value),
                    Label::new(LABEL_REDUCER, op.name()),
                    Label::new(LABEL_SOURCE, sources),
                ]);
                map.insert(name, acc);
            }
        }
    }

    /// Replace every series in the tree with its projection onto the
    /// given range. Keys and structure are untouched; only values change.
    pub fn apply_range(&mut self, opts: &RangeOptions) {
        match &mut self.members {
            Members::Series(map) => {
                for series in map.values_mut() {
                    *series = project(series, opts);
                }
            }
            Members::Groups { children, .. } => {
                for child in children.values_mut() {
                    child.apply_range(opts);
                }
            }
        }
    }

    /// Stream the tree to a reply sink in ascending key order.
    ///
    /// A partitioned node frames its children with an array header sized
    /// to its cardinality; a terminal node writes each member series.
    /// Sink errors abort the walk and propagate unchanged.
    pub fn emit<S: ReplySink>(&self, sink: &mut S, opts: &EmitOptions) -> Result<(), S::Error> {
        match &self.members {
            Members::Series(map) => {
                for series in map.values() {
                    sink.write_series(series, opts)?;
                }
            }
            Members::Groups { children, .. } => {
                sink.array_start(children.len())?;
                for child in children.values() {
                    child.emit(sink, opts)?;
                }
            }
        }
        Ok(())
    }

    /// Debug rendering of the tree shape as JSON: partition values map to
    /// subtrees, series names map to their sample pairs.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.members {
            Members::Series(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(name, series)| {
                        let samples: Vec<serde_json::Value> = series
                            .samples()
                            .iter()
                            .map(|s| serde_json::json!([s.timestamp, s.value]))
                            .collect();
                        (name.clone(), serde_json::Value::Array(samples))
                    })
                    .collect(),
            ),
            Members::Groups { children, .. } => serde_json::Value::Object(
                children
                    .iter()
                    .map(|(value, child)| (value.clone(), child.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

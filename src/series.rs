//! Series, label, and sample value model
//!
//! A [`Series`] is a named, labelled, time-ordered run of samples. The
//! result-set tree takes exclusive ownership of every series inserted into
//! it, so the type is a plain owned value with no interior sharing.

use serde::{Deserialize, Serialize};

/// A single data point: a millisecond timestamp and a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Sample { timestamp, value }
    }
}

/// A key/value metadata pair attached to a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Label {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A named time series with labels and samples sorted by strictly
/// increasing timestamp.
///
/// The sorted-samples invariant is maintained by [`Series::push_sample`];
/// it is what the point-wise merge and range projection rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    labels: Vec<Label>,
    samples: Vec<Sample>,
}

impl Series {
    /// Create an empty series with the given name and no labels.
    pub fn new(name: impl Into<String>) -> Self {
        Series {
            name: name.into(),
            labels: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Builder-style label attachment, for concise construction.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push(Label::new(key, value));
        self
    }

    /// Builder-style sample attachment. Samples are pushed through
    /// [`Series::push_sample`], so out-of-order timestamps are dropped.
    pub fn with_samples(mut self, samples: impl IntoIterator<Item = (i64, f64)>) -> Self {
        for (timestamp, value) in samples {
            self.push_sample(timestamp, value);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn set_labels(&mut self, labels: Vec<Label>) {
        self.labels = labels;
    }

    /// Look up the value of a label by key.
    pub fn label_value(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.key == key)
            .map(|label| label.value.as_str())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn replace_samples(&mut self, samples: Vec<Sample>) {
        self.samples = samples;
    }

    /// Append a sample.
    ///
    /// A timestamp newer than the last sample appends, an equal timestamp
    /// overwrites the last value, and an older timestamp is rejected.
    /// Returns whether the series was modified.
    pub fn push_sample(&mut self, timestamp: i64, value: f64) -> bool {
        match self.samples.last_mut() {
            Some(last) if timestamp < last.timestamp => false,
            Some(last) if timestamp == last.timestamp => {
                last.value = value;
                true
            }
            _ => {
                self.samples.push(Sample::new(timestamp, value));
                true
            }
        }
    }

    /// Number of samples in the series.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
